// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Conversions from the neutral descriptors to Vulkan enumerants and create infos.

use super::api::{
    consts as vk, ColorBlendAttachmentState, DepthStencilStateCreateInfo,
    RasterizationStateCreateInfo, SamplerCreateInfo, StencilOpState, VkFormat,
};
use tessera_core::renderer::api::*;

/// A local extension trait to convert our types into Vulkan values.
pub trait IntoVulkan<T> {
    /// Consumes self and converts it into its Vulkan counterpart.
    fn into_vulkan(self) -> T;
}

/// The `VkFormat` for `format`.
///
/// Vulkan images in a depth format can be both attached and sampled, with
/// the aspect selected per view, so both intents resolve to the same face.
pub fn to_native_format(format: PixelFormat, _usage: FormatUsage) -> VkFormat {
    match format {
        PixelFormat::R8Unorm => VkFormat::R8_UNORM,
        PixelFormat::R8G8Unorm => VkFormat::R8G8_UNORM,
        PixelFormat::R8G8B8A8Unorm => VkFormat::R8G8B8A8_UNORM,
        PixelFormat::R8G8B8A8UnormSrgb => VkFormat::R8G8B8A8_SRGB,
        PixelFormat::B8G8R8A8Unorm => VkFormat::B8G8R8A8_UNORM,
        PixelFormat::B8G8R8A8UnormSrgb => VkFormat::B8G8R8A8_SRGB,
        PixelFormat::R16Float => VkFormat::R16_SFLOAT,
        PixelFormat::R16G16Float => VkFormat::R16G16_SFLOAT,
        PixelFormat::R16G16B16A16Float => VkFormat::R16G16B16A16_SFLOAT,
        PixelFormat::R32Float => VkFormat::R32_SFLOAT,
        PixelFormat::R32Uint => VkFormat::R32_UINT,
        PixelFormat::R32G32Float => VkFormat::R32G32_SFLOAT,
        PixelFormat::R32G32B32Float => VkFormat::R32G32B32_SFLOAT,
        PixelFormat::R32G32B32A32Float => VkFormat::R32G32B32A32_SFLOAT,
        PixelFormat::R10G10B10A2Unorm => VkFormat::A2B10G10R10_UNORM_PACK32,
        PixelFormat::R11G11B10Float => VkFormat::B10G11R11_UFLOAT_PACK32,
        PixelFormat::Bc1RgbaUnorm => VkFormat::BC1_RGBA_UNORM_BLOCK,
        PixelFormat::Bc1RgbaUnormSrgb => VkFormat::BC1_RGBA_SRGB_BLOCK,
        PixelFormat::Bc2Unorm => VkFormat::BC2_UNORM_BLOCK,
        PixelFormat::Bc3Unorm => VkFormat::BC3_UNORM_BLOCK,
        PixelFormat::Bc3UnormSrgb => VkFormat::BC3_SRGB_BLOCK,
        PixelFormat::Bc4Unorm => VkFormat::BC4_UNORM_BLOCK,
        PixelFormat::Bc5Unorm => VkFormat::BC5_UNORM_BLOCK,
        PixelFormat::Bc7Unorm => VkFormat::BC7_UNORM_BLOCK,
        PixelFormat::Bc7UnormSrgb => VkFormat::BC7_SRGB_BLOCK,
        PixelFormat::D16Unorm => VkFormat::D16_UNORM,
        PixelFormat::D24UnormS8Uint => VkFormat::D24_UNORM_S8_UINT,
        PixelFormat::D32Float => VkFormat::D32_SFLOAT,
        PixelFormat::D32FloatS8Uint => VkFormat::D32_SFLOAT_S8_UINT,
    }
}

/// Aspects covered by an attachment view of `format`.
pub fn attachment_aspect(format: PixelFormat) -> u32 {
    if !format.is_depth() {
        vk::IMAGE_ASPECT_COLOR
    } else if format.has_stencil() {
        vk::IMAGE_ASPECT_DEPTH | vk::IMAGE_ASPECT_STENCIL
    } else {
        vk::IMAGE_ASPECT_DEPTH
    }
}

/// Aspect read when sampling `format`. Sampled views of depth/stencil images
/// must select the depth aspect alone.
pub fn sampled_aspect(format: PixelFormat) -> u32 {
    if format.is_depth() {
        vk::IMAGE_ASPECT_DEPTH
    } else {
        vk::IMAGE_ASPECT_COLOR
    }
}

/// `VkImageType` of a texture.
pub fn image_type(texture_type: TextureType) -> u32 {
    match texture_type {
        TextureType::D1 => vk::IMAGE_TYPE_1D,
        TextureType::D2 | TextureType::Cube => vk::IMAGE_TYPE_2D,
        TextureType::D3 => vk::IMAGE_TYPE_3D,
    }
}

/// The view type covering a whole texture.
pub fn view_type(desc: &TextureDescriptor) -> u32 {
    let layered = desc.array_size > 1;
    match (desc.texture_type, layered) {
        (TextureType::D1, false) => vk::IMAGE_VIEW_TYPE_1D,
        (TextureType::D1, true) => vk::IMAGE_VIEW_TYPE_1D_ARRAY,
        (TextureType::D2, false) => vk::IMAGE_VIEW_TYPE_2D,
        (TextureType::D2, true) => vk::IMAGE_VIEW_TYPE_2D_ARRAY,
        (TextureType::D3, _) => vk::IMAGE_VIEW_TYPE_3D,
        (TextureType::Cube, false) => vk::IMAGE_VIEW_TYPE_CUBE,
        (TextureType::Cube, true) => vk::IMAGE_VIEW_TYPE_CUBE_ARRAY,
    }
}

/// The view type of an attachment view selecting one layer.
pub fn attachment_view_type(desc: &TextureDescriptor) -> u32 {
    match desc.texture_type {
        TextureType::D1 => vk::IMAGE_VIEW_TYPE_1D,
        TextureType::D3 => vk::IMAGE_VIEW_TYPE_3D,
        TextureType::D2 | TextureType::Cube => vk::IMAGE_VIEW_TYPE_2D,
    }
}

/// `VkImageUsageFlags` of a texture. Every texture can be a transfer
/// destination so initial data and updates go through staging copies.
pub fn image_usage(usage: TextureUsage) -> u32 {
    let mut flags = vk::IMAGE_USAGE_TRANSFER_DST;
    if usage.contains(TextureUsage::SAMPLED) {
        flags |= vk::IMAGE_USAGE_SAMPLED;
    }
    if usage.contains(TextureUsage::RENDER_TARGET) {
        flags |= vk::IMAGE_USAGE_COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL) {
        flags |= vk::IMAGE_USAGE_DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(TextureUsage::STORAGE) {
        flags |= vk::IMAGE_USAGE_STORAGE;
    }
    flags
}

/// The layout a texture rests in between uses.
pub fn resting_layout(desc: &TextureDescriptor) -> u32 {
    if desc.usage.contains(TextureUsage::SAMPLED) {
        vk::IMAGE_LAYOUT_SHADER_READ_ONLY_OPTIMAL
    } else if desc.usage.contains(TextureUsage::DEPTH_STENCIL) {
        vk::IMAGE_LAYOUT_DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    } else if desc.usage.contains(TextureUsage::RENDER_TARGET) {
        vk::IMAGE_LAYOUT_COLOR_ATTACHMENT_OPTIMAL
    } else {
        vk::IMAGE_LAYOUT_GENERAL
    }
}

/// `VkBufferUsageFlags` of a buffer. Static buffers are filled by staging copies.
pub fn buffer_usage(desc: &BufferDescriptor) -> u32 {
    let kind = match desc.kind {
        BufferKind::Vertex => vk::BUFFER_USAGE_VERTEX_BUFFER,
        BufferKind::Index => vk::BUFFER_USAGE_INDEX_BUFFER,
        BufferKind::Uniform => vk::BUFFER_USAGE_UNIFORM_BUFFER,
        BufferKind::Storage => vk::BUFFER_USAGE_STORAGE_BUFFER,
    };
    kind | vk::BUFFER_USAGE_TRANSFER_DST
}

/// `VkShaderStageFlagBits` of a stage.
pub fn shader_stage(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => vk::SHADER_STAGE_VERTEX,
        ShaderStage::Geometry => vk::SHADER_STAGE_GEOMETRY,
        ShaderStage::Fragment => vk::SHADER_STAGE_FRAGMENT,
        ShaderStage::Compute => vk::SHADER_STAGE_COMPUTE,
    }
}

impl IntoVulkan<u32> for PrimitiveTopology {
    fn into_vulkan(self) -> u32 {
        match self {
            PrimitiveTopology::PointList => vk::PRIMITIVE_TOPOLOGY_POINT_LIST,
            PrimitiveTopology::LineList => vk::PRIMITIVE_TOPOLOGY_LINE_LIST,
            PrimitiveTopology::LineStrip => vk::PRIMITIVE_TOPOLOGY_LINE_STRIP,
            PrimitiveTopology::TriangleList => vk::PRIMITIVE_TOPOLOGY_TRIANGLE_LIST,
            PrimitiveTopology::TriangleStrip => vk::PRIMITIVE_TOPOLOGY_TRIANGLE_STRIP,
        }
    }
}

impl IntoVulkan<u32> for IndexFormat {
    fn into_vulkan(self) -> u32 {
        match self {
            IndexFormat::Uint16 => vk::INDEX_TYPE_UINT16,
            IndexFormat::Uint32 => vk::INDEX_TYPE_UINT32,
        }
    }
}

impl IntoVulkan<VkFormat> for VertexFormat {
    fn into_vulkan(self) -> VkFormat {
        match self {
            VertexFormat::Float32 => VkFormat::R32_SFLOAT,
            VertexFormat::Float32x2 => VkFormat::R32G32_SFLOAT,
            VertexFormat::Float32x3 => VkFormat::R32G32B32_SFLOAT,
            VertexFormat::Float32x4 => VkFormat::R32G32B32A32_SFLOAT,
            VertexFormat::Uint32 => VkFormat::R32_UINT,
            VertexFormat::Uint32x2 => VkFormat::R32G32_UINT,
            VertexFormat::Uint32x3 => VkFormat::R32G32B32_UINT,
            VertexFormat::Uint32x4 => VkFormat::R32G32B32A32_UINT,
            VertexFormat::Sint32 => VkFormat::R32_SINT,
            VertexFormat::Sint32x2 => VkFormat::R32G32_SINT,
            VertexFormat::Sint32x3 => VkFormat::R32G32B32_SINT,
            VertexFormat::Sint32x4 => VkFormat::R32G32B32A32_SINT,
            VertexFormat::Float16x2 => VkFormat::R16G16_SFLOAT,
            VertexFormat::Float16x4 => VkFormat::R16G16B16A16_SFLOAT,
            VertexFormat::Unorm8x4 => VkFormat::R8G8B8A8_UNORM,
            VertexFormat::Uint8x4 => VkFormat::R8G8B8A8_UINT,
            VertexFormat::Snorm16x2 => VkFormat::R16G16_SNORM,
        }
    }
}

impl IntoVulkan<u32> for VertexInputRate {
    fn into_vulkan(self) -> u32 {
        match self {
            VertexInputRate::Vertex => vk::VERTEX_INPUT_RATE_VERTEX,
            VertexInputRate::Instance => vk::VERTEX_INPUT_RATE_INSTANCE,
        }
    }
}

impl IntoVulkan<u32> for CompareFunction {
    fn into_vulkan(self) -> u32 {
        match self {
            CompareFunction::Never => vk::COMPARE_OP_NEVER,
            CompareFunction::Less => vk::COMPARE_OP_LESS,
            CompareFunction::Equal => vk::COMPARE_OP_EQUAL,
            CompareFunction::LessEqual => vk::COMPARE_OP_LESS_OR_EQUAL,
            CompareFunction::Greater => vk::COMPARE_OP_GREATER,
            CompareFunction::NotEqual => vk::COMPARE_OP_NOT_EQUAL,
            CompareFunction::GreaterEqual => vk::COMPARE_OP_GREATER_OR_EQUAL,
            CompareFunction::Always => vk::COMPARE_OP_ALWAYS,
        }
    }
}

impl IntoVulkan<u32> for StencilOperation {
    fn into_vulkan(self) -> u32 {
        match self {
            StencilOperation::Keep => vk::STENCIL_OP_KEEP,
            StencilOperation::Zero => vk::STENCIL_OP_ZERO,
            StencilOperation::Replace => vk::STENCIL_OP_REPLACE,
            StencilOperation::Invert => vk::STENCIL_OP_INVERT,
            StencilOperation::IncrementClamp => vk::STENCIL_OP_INCREMENT_AND_CLAMP,
            StencilOperation::DecrementClamp => vk::STENCIL_OP_DECREMENT_AND_CLAMP,
            StencilOperation::IncrementWrap => vk::STENCIL_OP_INCREMENT_AND_WRAP,
            StencilOperation::DecrementWrap => vk::STENCIL_OP_DECREMENT_AND_WRAP,
        }
    }
}

impl IntoVulkan<u32> for BlendFactor {
    fn into_vulkan(self) -> u32 {
        match self {
            BlendFactor::Zero => vk::BLEND_FACTOR_ZERO,
            BlendFactor::One => vk::BLEND_FACTOR_ONE,
            BlendFactor::SrcColor => vk::BLEND_FACTOR_SRC_COLOR,
            BlendFactor::OneMinusSrcColor => vk::BLEND_FACTOR_ONE_MINUS_SRC_COLOR,
            BlendFactor::SrcAlpha => vk::BLEND_FACTOR_SRC_ALPHA,
            BlendFactor::OneMinusSrcAlpha => vk::BLEND_FACTOR_ONE_MINUS_SRC_ALPHA,
            BlendFactor::DstColor => vk::BLEND_FACTOR_DST_COLOR,
            BlendFactor::OneMinusDstColor => vk::BLEND_FACTOR_ONE_MINUS_DST_COLOR,
            BlendFactor::DstAlpha => vk::BLEND_FACTOR_DST_ALPHA,
            BlendFactor::OneMinusDstAlpha => vk::BLEND_FACTOR_ONE_MINUS_DST_ALPHA,
            BlendFactor::SrcAlphaSaturated => vk::BLEND_FACTOR_SRC_ALPHA_SATURATE,
            BlendFactor::Constant => vk::BLEND_FACTOR_CONSTANT_COLOR,
            BlendFactor::OneMinusConstant => vk::BLEND_FACTOR_ONE_MINUS_CONSTANT_COLOR,
        }
    }
}

impl IntoVulkan<u32> for BlendOperation {
    fn into_vulkan(self) -> u32 {
        match self {
            BlendOperation::Add => vk::BLEND_OP_ADD,
            BlendOperation::Subtract => vk::BLEND_OP_SUBTRACT,
            BlendOperation::ReverseSubtract => vk::BLEND_OP_REVERSE_SUBTRACT,
            BlendOperation::Min => vk::BLEND_OP_MIN,
            BlendOperation::Max => vk::BLEND_OP_MAX,
        }
    }
}

impl IntoVulkan<u32> for ColorWrites {
    fn into_vulkan(self) -> u32 {
        let mut mask = 0;
        if self.contains(ColorWrites::RED) {
            mask |= vk::COLOR_COMPONENT_R;
        }
        if self.contains(ColorWrites::GREEN) {
            mask |= vk::COLOR_COMPONENT_G;
        }
        if self.contains(ColorWrites::BLUE) {
            mask |= vk::COLOR_COMPONENT_B;
        }
        if self.contains(ColorWrites::ALPHA) {
            mask |= vk::COLOR_COMPONENT_A;
        }
        mask
    }
}

impl IntoVulkan<u32> for AddressMode {
    fn into_vulkan(self) -> u32 {
        match self {
            AddressMode::Repeat => vk::SAMPLER_ADDRESS_MODE_REPEAT,
            AddressMode::MirrorRepeat => vk::SAMPLER_ADDRESS_MODE_MIRRORED_REPEAT,
            AddressMode::ClampToEdge => vk::SAMPLER_ADDRESS_MODE_CLAMP_TO_EDGE,
            AddressMode::ClampToBorder => vk::SAMPLER_ADDRESS_MODE_CLAMP_TO_BORDER,
        }
    }
}

impl IntoVulkan<u32> for FilterMode {
    fn into_vulkan(self) -> u32 {
        match self {
            FilterMode::Nearest => vk::FILTER_NEAREST,
            FilterMode::Linear => vk::FILTER_LINEAR,
        }
    }
}

impl IntoVulkan<u32> for BorderColor {
    fn into_vulkan(self) -> u32 {
        match self {
            BorderColor::TransparentBlack => vk::BORDER_COLOR_FLOAT_TRANSPARENT_BLACK,
            BorderColor::OpaqueBlack => vk::BORDER_COLOR_FLOAT_OPAQUE_BLACK,
            BorderColor::OpaqueWhite => vk::BORDER_COLOR_FLOAT_OPAQUE_WHITE,
        }
    }
}

impl IntoVulkan<ColorBlendAttachmentState> for &BlendDescriptor {
    fn into_vulkan(self) -> ColorBlendAttachmentState {
        ColorBlendAttachmentState {
            blend_enable: self.enabled,
            src_color_blend_factor: self.color.src_factor.into_vulkan(),
            dst_color_blend_factor: self.color.dst_factor.into_vulkan(),
            color_blend_op: self.color.operation.into_vulkan(),
            src_alpha_blend_factor: self.alpha.src_factor.into_vulkan(),
            dst_alpha_blend_factor: self.alpha.dst_factor.into_vulkan(),
            alpha_blend_op: self.alpha.operation.into_vulkan(),
            color_write_mask: self.write_mask.into_vulkan(),
        }
    }
}

fn stencil_face(face: StencilFaceState, desc: &DepthStencilDescriptor) -> StencilOpState {
    StencilOpState {
        fail_op: face.fail_op.into_vulkan(),
        pass_op: face.pass_op.into_vulkan(),
        depth_fail_op: face.depth_fail_op.into_vulkan(),
        compare_op: face.compare.into_vulkan(),
        compare_mask: desc.stencil_read_mask as u32,
        write_mask: desc.stencil_write_mask as u32,
    }
}

impl IntoVulkan<DepthStencilStateCreateInfo> for &DepthStencilDescriptor {
    fn into_vulkan(self) -> DepthStencilStateCreateInfo {
        DepthStencilStateCreateInfo {
            depth_test_enable: self.depth_test_enabled,
            depth_write_enable: self.depth_write_enabled,
            depth_compare_op: self.depth_compare.into_vulkan(),
            stencil_test_enable: self.stencil_enabled,
            front: stencil_face(self.front, self),
            back: stencil_face(self.back, self),
        }
    }
}

impl IntoVulkan<RasterizationStateCreateInfo> for &RasterizerDescriptor {
    fn into_vulkan(self) -> RasterizationStateCreateInfo {
        RasterizationStateCreateInfo {
            depth_clamp_enable: !self.depth_clip_enabled,
            polygon_mode: match self.fill_mode {
                FillMode::Solid => vk::POLYGON_MODE_FILL,
                FillMode::Wireframe => vk::POLYGON_MODE_LINE,
            },
            cull_mode: match self.cull_mode {
                CullMode::None => vk::CULL_MODE_NONE,
                CullMode::Front => vk::CULL_MODE_FRONT,
                CullMode::Back => vk::CULL_MODE_BACK,
            },
            front_face: match self.front_face {
                FrontFace::Ccw => vk::FRONT_FACE_COUNTER_CLOCKWISE,
                FrontFace::Cw => vk::FRONT_FACE_CLOCKWISE,
            },
            depth_bias_enable: self.has_depth_bias(),
            depth_bias_constant_factor: self.depth_bias as f32,
            depth_bias_clamp: self.depth_bias_clamp,
            depth_bias_slope_factor: self.depth_bias_slope_scale,
        }
    }
}

impl IntoVulkan<SamplerCreateInfo> for &SamplerDescriptor {
    fn into_vulkan(self) -> SamplerCreateInfo {
        SamplerCreateInfo {
            mag_filter: self.mag_filter.into_vulkan(),
            min_filter: self.min_filter.into_vulkan(),
            mipmap_mode: match self.mip_filter {
                FilterMode::Nearest => vk::SAMPLER_MIPMAP_MODE_NEAREST,
                FilterMode::Linear => vk::SAMPLER_MIPMAP_MODE_LINEAR,
            },
            address_mode_u: self.address_u.into_vulkan(),
            address_mode_v: self.address_v.into_vulkan(),
            address_mode_w: self.address_w.into_vulkan(),
            mip_lod_bias: self.mip_lod_bias,
            anisotropy_enable: self.max_anisotropy > 1,
            max_anisotropy: self.max_anisotropy.max(1) as f32,
            compare_enable: self.compare.is_some(),
            compare_op: self
                .compare
                .map_or(vk::COMPARE_OP_NEVER, IntoVulkan::into_vulkan),
            min_lod: self.lod_min_clamp,
            max_lod: self.lod_max_clamp,
            border_color: self.border_color.into_vulkan(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats_have_a_single_face() {
        for format in PixelFormat::ALL {
            assert_eq!(
                to_native_format(format, FormatUsage::Attachment),
                to_native_format(format, FormatUsage::ShaderRead),
                "{format:?}"
            );
            assert_ne!(to_native_format(format, FormatUsage::Attachment), VkFormat::UNDEFINED);
        }
        assert_eq!(
            to_native_format(PixelFormat::D24UnormS8Uint, FormatUsage::ShaderRead),
            VkFormat::D24_UNORM_S8_UINT
        );
    }

    #[test]
    fn aspects_follow_the_format() {
        assert_eq!(attachment_aspect(PixelFormat::R8G8B8A8Unorm), vk::IMAGE_ASPECT_COLOR);
        assert_eq!(attachment_aspect(PixelFormat::D32Float), vk::IMAGE_ASPECT_DEPTH);
        assert_eq!(
            attachment_aspect(PixelFormat::D24UnormS8Uint),
            vk::IMAGE_ASPECT_DEPTH | vk::IMAGE_ASPECT_STENCIL
        );
        assert_eq!(sampled_aspect(PixelFormat::D24UnormS8Uint), vk::IMAGE_ASPECT_DEPTH);
    }

    #[test]
    fn sampled_textures_rest_in_shader_read_layout() {
        let mut desc = TextureDescriptor::new_2d(4, 4, PixelFormat::D32Float);
        desc.usage = TextureUsage::SAMPLED | TextureUsage::DEPTH_STENCIL;
        assert_eq!(resting_layout(&desc), vk::IMAGE_LAYOUT_SHADER_READ_ONLY_OPTIMAL);
        desc.usage = TextureUsage::DEPTH_STENCIL;
        assert_eq!(resting_layout(&desc), vk::IMAGE_LAYOUT_DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn disabled_depth_clip_enables_depth_clamp() {
        let desc = RasterizerDescriptor {
            depth_clip_enabled: false,
            cull_mode: CullMode::None,
            ..RasterizerDescriptor::default()
        };
        let info: RasterizationStateCreateInfo = (&desc).into_vulkan();
        assert!(info.depth_clamp_enable);
        assert_eq!(info.cull_mode, vk::CULL_MODE_NONE);
        assert!(!info.depth_bias_enable);
    }
}
