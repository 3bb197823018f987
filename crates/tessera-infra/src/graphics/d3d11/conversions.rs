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

//! Conversions from the neutral descriptors to D3D11 enumerants and descriptions.

use super::api::{
    consts as d3d, BlendStateDesc, DepthStencilStateDesc, DxgiFormat, RasterizerStateDesc,
    SamplerStateDesc, StencilOpDesc, ViewDimension,
};
use tessera_core::renderer::api::*;

/// A local extension trait to convert our types into D3D11 values.
pub trait IntoD3d11<T> {
    /// Consumes self and converts it into its D3D11 counterpart.
    fn into_d3d11(self) -> T;
}

/// The DXGI format for `format` used with `usage`.
///
/// Depth formats have two faces. The strict `D*` format is the only one a
/// depth-stencil view accepts, but a texture created with it cannot also be
/// bound as a shader resource; such textures are created with the typeless
/// face instead and each view picks its own typed format.
pub fn to_native_format(format: PixelFormat, usage: FormatUsage) -> DxgiFormat {
    match (format, usage) {
        (PixelFormat::D16Unorm, FormatUsage::Attachment) => DxgiFormat::D16_UNORM,
        (PixelFormat::D16Unorm, FormatUsage::ShaderRead) => DxgiFormat::R16_TYPELESS,
        (PixelFormat::D24UnormS8Uint, FormatUsage::Attachment) => DxgiFormat::D24_UNORM_S8_UINT,
        (PixelFormat::D24UnormS8Uint, FormatUsage::ShaderRead) => DxgiFormat::R24G8_TYPELESS,
        (PixelFormat::D32Float, FormatUsage::Attachment) => DxgiFormat::D32_FLOAT,
        (PixelFormat::D32Float, FormatUsage::ShaderRead) => DxgiFormat::R32_TYPELESS,
        (PixelFormat::D32FloatS8Uint, FormatUsage::Attachment) => DxgiFormat::D32_FLOAT_S8X24_UINT,
        (PixelFormat::D32FloatS8Uint, FormatUsage::ShaderRead) => DxgiFormat::R32G8X24_TYPELESS,
        (format, _) => color_format(format),
    }
}

/// The format of a shader-resource view over a texture created with the
/// [`FormatUsage::ShaderRead`] face.
pub fn shader_view_format(format: PixelFormat) -> DxgiFormat {
    match format {
        PixelFormat::D16Unorm => DxgiFormat::R16_UNORM,
        PixelFormat::D24UnormS8Uint => DxgiFormat::R24_UNORM_X8_TYPELESS,
        PixelFormat::D32Float => DxgiFormat::R32_FLOAT,
        PixelFormat::D32FloatS8Uint => DxgiFormat::R32_FLOAT_X8X24_TYPELESS,
        format => color_format(format),
    }
}

fn color_format(format: PixelFormat) -> DxgiFormat {
    match format {
        PixelFormat::R8Unorm => DxgiFormat::R8_UNORM,
        PixelFormat::R8G8Unorm => DxgiFormat::R8G8_UNORM,
        PixelFormat::R8G8B8A8Unorm => DxgiFormat::R8G8B8A8_UNORM,
        PixelFormat::R8G8B8A8UnormSrgb => DxgiFormat::R8G8B8A8_UNORM_SRGB,
        PixelFormat::B8G8R8A8Unorm => DxgiFormat::B8G8R8A8_UNORM,
        PixelFormat::B8G8R8A8UnormSrgb => DxgiFormat::B8G8R8A8_UNORM_SRGB,
        PixelFormat::R16Float => DxgiFormat::R16_FLOAT,
        PixelFormat::R16G16Float => DxgiFormat::R16G16_FLOAT,
        PixelFormat::R16G16B16A16Float => DxgiFormat::R16G16B16A16_FLOAT,
        PixelFormat::R32Float => DxgiFormat::R32_FLOAT,
        PixelFormat::R32Uint => DxgiFormat::R32_UINT,
        PixelFormat::R32G32Float => DxgiFormat::R32G32_FLOAT,
        PixelFormat::R32G32B32Float => DxgiFormat::R32G32B32_FLOAT,
        PixelFormat::R32G32B32A32Float => DxgiFormat::R32G32B32A32_FLOAT,
        PixelFormat::R10G10B10A2Unorm => DxgiFormat::R10G10B10A2_UNORM,
        PixelFormat::R11G11B10Float => DxgiFormat::R11G11B10_FLOAT,
        PixelFormat::Bc1RgbaUnorm => DxgiFormat::BC1_UNORM,
        PixelFormat::Bc1RgbaUnormSrgb => DxgiFormat::BC1_UNORM_SRGB,
        PixelFormat::Bc2Unorm => DxgiFormat::BC2_UNORM,
        PixelFormat::Bc3Unorm => DxgiFormat::BC3_UNORM,
        PixelFormat::Bc3UnormSrgb => DxgiFormat::BC3_UNORM_SRGB,
        PixelFormat::Bc4Unorm => DxgiFormat::BC4_UNORM,
        PixelFormat::Bc5Unorm => DxgiFormat::BC5_UNORM,
        PixelFormat::Bc7Unorm => DxgiFormat::BC7_UNORM,
        PixelFormat::Bc7UnormSrgb => DxgiFormat::BC7_UNORM_SRGB,
        PixelFormat::D16Unorm => DxgiFormat::D16_UNORM,
        PixelFormat::D24UnormS8Uint => DxgiFormat::D24_UNORM_S8_UINT,
        PixelFormat::D32Float => DxgiFormat::D32_FLOAT,
        PixelFormat::D32FloatS8Uint => DxgiFormat::D32_FLOAT_S8X24_UINT,
    }
}

/// The storage format of a texture: depth textures that are also sampled
/// use the typeless face.
pub fn storage_format(desc: &TextureDescriptor) -> DxgiFormat {
    let usage = if desc.format.is_depth() && desc.usage.contains(TextureUsage::SAMPLED) {
        FormatUsage::ShaderRead
    } else {
        FormatUsage::Attachment
    };
    to_native_format(desc.format, usage)
}

/// The view dimension covering a whole texture.
pub fn view_dimension(desc: &TextureDescriptor) -> ViewDimension {
    let layered = desc.array_size > 1;
    match (desc.texture_type, layered) {
        (TextureType::D1, false) => ViewDimension::Texture1D,
        (TextureType::D1, true) => ViewDimension::Texture1DArray,
        (TextureType::D2, false) => ViewDimension::Texture2D,
        (TextureType::D2, true) => ViewDimension::Texture2DArray,
        (TextureType::D3, _) => ViewDimension::Texture3D,
        (TextureType::Cube, false) => ViewDimension::TextureCube,
        (TextureType::Cube, true) => ViewDimension::TextureCubeArray,
    }
}

/// The view dimension of a render-target or depth-stencil view selecting a
/// single layer. Cube faces are addressed as 2D array slices.
pub fn attachment_view_dimension(desc: &TextureDescriptor) -> ViewDimension {
    match desc.texture_type {
        TextureType::D1 if desc.array_size == 1 => ViewDimension::Texture1D,
        TextureType::D1 => ViewDimension::Texture1DArray,
        TextureType::D2 if desc.array_size == 1 => ViewDimension::Texture2D,
        TextureType::D3 => ViewDimension::Texture3D,
        TextureType::D2 | TextureType::Cube => ViewDimension::Texture2DArray,
    }
}

/// `D3D11_ENCODE_BASIC_FILTER`, or the anisotropic filter when requested.
pub fn encode_filter(desc: &SamplerDescriptor) -> u32 {
    let reduction = if desc.compare.is_some() {
        d3d::FILTER_REDUCTION_TYPE_COMPARISON
    } else {
        d3d::FILTER_REDUCTION_TYPE_STANDARD
    };
    if desc.max_anisotropy > 1 {
        return if desc.compare.is_some() {
            d3d::FILTER_COMPARISON_ANISOTROPIC
        } else {
            d3d::FILTER_ANISOTROPIC
        };
    }
    let ty = |mode: FilterMode| match mode {
        FilterMode::Nearest => d3d::FILTER_TYPE_POINT,
        FilterMode::Linear => d3d::FILTER_TYPE_LINEAR,
    };
    (ty(desc.min_filter) << 4) | (ty(desc.mag_filter) << 2) | ty(desc.mip_filter) | (reduction << 7)
}

impl IntoD3d11<u32> for PrimitiveTopology {
    fn into_d3d11(self) -> u32 {
        match self {
            PrimitiveTopology::PointList => d3d::PRIMITIVE_TOPOLOGY_POINTLIST,
            PrimitiveTopology::LineList => d3d::PRIMITIVE_TOPOLOGY_LINELIST,
            PrimitiveTopology::LineStrip => d3d::PRIMITIVE_TOPOLOGY_LINESTRIP,
            PrimitiveTopology::TriangleList => d3d::PRIMITIVE_TOPOLOGY_TRIANGLELIST,
            PrimitiveTopology::TriangleStrip => d3d::PRIMITIVE_TOPOLOGY_TRIANGLESTRIP,
        }
    }
}

impl IntoD3d11<DxgiFormat> for IndexFormat {
    fn into_d3d11(self) -> DxgiFormat {
        match self {
            IndexFormat::Uint16 => DxgiFormat::R16_UINT,
            IndexFormat::Uint32 => DxgiFormat::R32_UINT,
        }
    }
}

impl IntoD3d11<DxgiFormat> for VertexFormat {
    fn into_d3d11(self) -> DxgiFormat {
        match self {
            VertexFormat::Float32 => DxgiFormat::R32_FLOAT,
            VertexFormat::Float32x2 => DxgiFormat::R32G32_FLOAT,
            VertexFormat::Float32x3 => DxgiFormat::R32G32B32_FLOAT,
            VertexFormat::Float32x4 => DxgiFormat::R32G32B32A32_FLOAT,
            VertexFormat::Uint32 => DxgiFormat::R32_UINT,
            VertexFormat::Uint32x2 => DxgiFormat::R32G32_UINT,
            VertexFormat::Uint32x3 => DxgiFormat::R32G32B32_UINT,
            VertexFormat::Uint32x4 => DxgiFormat::R32G32B32A32_UINT,
            VertexFormat::Sint32 => DxgiFormat::R32_SINT,
            VertexFormat::Sint32x2 => DxgiFormat::R32G32_SINT,
            VertexFormat::Sint32x3 => DxgiFormat::R32G32B32_SINT,
            VertexFormat::Sint32x4 => DxgiFormat::R32G32B32A32_SINT,
            VertexFormat::Float16x2 => DxgiFormat::R16G16_FLOAT,
            VertexFormat::Float16x4 => DxgiFormat::R16G16B16A16_FLOAT,
            VertexFormat::Unorm8x4 => DxgiFormat::R8G8B8A8_UNORM,
            VertexFormat::Uint8x4 => DxgiFormat::R8G8B8A8_UINT,
            VertexFormat::Snorm16x2 => DxgiFormat::R16G16_SNORM,
        }
    }
}

impl IntoD3d11<u32> for CompareFunction {
    fn into_d3d11(self) -> u32 {
        match self {
            CompareFunction::Never => d3d::COMPARISON_NEVER,
            CompareFunction::Less => d3d::COMPARISON_LESS,
            CompareFunction::Equal => d3d::COMPARISON_EQUAL,
            CompareFunction::LessEqual => d3d::COMPARISON_LESS_EQUAL,
            CompareFunction::Greater => d3d::COMPARISON_GREATER,
            CompareFunction::NotEqual => d3d::COMPARISON_NOT_EQUAL,
            CompareFunction::GreaterEqual => d3d::COMPARISON_GREATER_EQUAL,
            CompareFunction::Always => d3d::COMPARISON_ALWAYS,
        }
    }
}

impl IntoD3d11<u32> for StencilOperation {
    fn into_d3d11(self) -> u32 {
        match self {
            StencilOperation::Keep => d3d::STENCIL_OP_KEEP,
            StencilOperation::Zero => d3d::STENCIL_OP_ZERO,
            StencilOperation::Replace => d3d::STENCIL_OP_REPLACE,
            StencilOperation::Invert => d3d::STENCIL_OP_INVERT,
            StencilOperation::IncrementClamp => d3d::STENCIL_OP_INCR_SAT,
            StencilOperation::DecrementClamp => d3d::STENCIL_OP_DECR_SAT,
            StencilOperation::IncrementWrap => d3d::STENCIL_OP_INCR,
            StencilOperation::DecrementWrap => d3d::STENCIL_OP_DECR,
        }
    }
}

impl IntoD3d11<u32> for BlendFactor {
    fn into_d3d11(self) -> u32 {
        match self {
            BlendFactor::Zero => d3d::BLEND_ZERO,
            BlendFactor::One => d3d::BLEND_ONE,
            BlendFactor::SrcColor => d3d::BLEND_SRC_COLOR,
            BlendFactor::OneMinusSrcColor => d3d::BLEND_INV_SRC_COLOR,
            BlendFactor::SrcAlpha => d3d::BLEND_SRC_ALPHA,
            BlendFactor::OneMinusSrcAlpha => d3d::BLEND_INV_SRC_ALPHA,
            BlendFactor::DstColor => d3d::BLEND_DEST_COLOR,
            BlendFactor::OneMinusDstColor => d3d::BLEND_INV_DEST_COLOR,
            BlendFactor::DstAlpha => d3d::BLEND_DEST_ALPHA,
            BlendFactor::OneMinusDstAlpha => d3d::BLEND_INV_DEST_ALPHA,
            BlendFactor::SrcAlphaSaturated => d3d::BLEND_SRC_ALPHA_SAT,
            BlendFactor::Constant => d3d::BLEND_BLEND_FACTOR,
            BlendFactor::OneMinusConstant => d3d::BLEND_INV_BLEND_FACTOR,
        }
    }
}

impl IntoD3d11<u32> for BlendOperation {
    fn into_d3d11(self) -> u32 {
        match self {
            BlendOperation::Add => d3d::BLEND_OP_ADD,
            BlendOperation::Subtract => d3d::BLEND_OP_SUBTRACT,
            BlendOperation::ReverseSubtract => d3d::BLEND_OP_REV_SUBTRACT,
            BlendOperation::Min => d3d::BLEND_OP_MIN,
            BlendOperation::Max => d3d::BLEND_OP_MAX,
        }
    }
}

impl IntoD3d11<u32> for AddressMode {
    fn into_d3d11(self) -> u32 {
        match self {
            AddressMode::Repeat => d3d::TEXTURE_ADDRESS_WRAP,
            AddressMode::MirrorRepeat => d3d::TEXTURE_ADDRESS_MIRROR,
            AddressMode::ClampToEdge => d3d::TEXTURE_ADDRESS_CLAMP,
            AddressMode::ClampToBorder => d3d::TEXTURE_ADDRESS_BORDER,
        }
    }
}

impl IntoD3d11<u8> for ColorWrites {
    fn into_d3d11(self) -> u8 {
        let mut mask = 0;
        if self.contains(ColorWrites::RED) {
            mask |= d3d::COLOR_WRITE_ENABLE_RED;
        }
        if self.contains(ColorWrites::GREEN) {
            mask |= d3d::COLOR_WRITE_ENABLE_GREEN;
        }
        if self.contains(ColorWrites::BLUE) {
            mask |= d3d::COLOR_WRITE_ENABLE_BLUE;
        }
        if self.contains(ColorWrites::ALPHA) {
            mask |= d3d::COLOR_WRITE_ENABLE_ALPHA;
        }
        mask
    }
}

impl IntoD3d11<BlendStateDesc> for &BlendDescriptor {
    fn into_d3d11(self) -> BlendStateDesc {
        BlendStateDesc {
            blend_enable: self.enabled,
            src_blend: self.color.src_factor.into_d3d11(),
            dest_blend: self.color.dst_factor.into_d3d11(),
            blend_op: self.color.operation.into_d3d11(),
            src_blend_alpha: self.alpha.src_factor.into_d3d11(),
            dest_blend_alpha: self.alpha.dst_factor.into_d3d11(),
            blend_op_alpha: self.alpha.operation.into_d3d11(),
            render_target_write_mask: self.write_mask.into_d3d11(),
        }
    }
}

impl IntoD3d11<StencilOpDesc> for StencilFaceState {
    fn into_d3d11(self) -> StencilOpDesc {
        StencilOpDesc {
            stencil_fail_op: self.fail_op.into_d3d11(),
            stencil_depth_fail_op: self.depth_fail_op.into_d3d11(),
            stencil_pass_op: self.pass_op.into_d3d11(),
            stencil_func: self.compare.into_d3d11(),
        }
    }
}

impl IntoD3d11<DepthStencilStateDesc> for &DepthStencilDescriptor {
    fn into_d3d11(self) -> DepthStencilStateDesc {
        DepthStencilStateDesc {
            depth_enable: self.depth_test_enabled,
            depth_write_mask: if self.depth_write_enabled {
                d3d::DEPTH_WRITE_MASK_ALL
            } else {
                d3d::DEPTH_WRITE_MASK_ZERO
            },
            depth_func: self.depth_compare.into_d3d11(),
            stencil_enable: self.stencil_enabled,
            stencil_read_mask: self.stencil_read_mask,
            stencil_write_mask: self.stencil_write_mask,
            front_face: self.front.into_d3d11(),
            back_face: self.back.into_d3d11(),
        }
    }
}

impl IntoD3d11<RasterizerStateDesc> for &RasterizerDescriptor {
    fn into_d3d11(self) -> RasterizerStateDesc {
        RasterizerStateDesc {
            fill_mode: match self.fill_mode {
                FillMode::Solid => d3d::FILL_SOLID,
                FillMode::Wireframe => d3d::FILL_WIREFRAME,
            },
            cull_mode: match self.cull_mode {
                CullMode::None => d3d::CULL_NONE,
                CullMode::Front => d3d::CULL_FRONT,
                CullMode::Back => d3d::CULL_BACK,
            },
            front_counter_clockwise: self.front_face == FrontFace::Ccw,
            depth_bias: self.depth_bias,
            depth_bias_clamp: self.depth_bias_clamp,
            slope_scaled_depth_bias: self.depth_bias_slope_scale,
            depth_clip_enable: self.depth_clip_enabled,
            scissor_enable: self.scissor_enabled,
        }
    }
}

impl IntoD3d11<SamplerStateDesc> for &SamplerDescriptor {
    fn into_d3d11(self) -> SamplerStateDesc {
        SamplerStateDesc {
            filter: encode_filter(self),
            address_u: self.address_u.into_d3d11(),
            address_v: self.address_v.into_d3d11(),
            address_w: self.address_w.into_d3d11(),
            mip_lod_bias: self.mip_lod_bias,
            max_anisotropy: self.max_anisotropy.max(1) as u32,
            comparison_func: self
                .compare
                .map_or(d3d::COMPARISON_NEVER, |compare| compare.into_d3d11()),
            border_color: match self.border_color {
                BorderColor::TransparentBlack => [0.0, 0.0, 0.0, 0.0],
                BorderColor::OpaqueBlack => [0.0, 0.0, 0.0, 1.0],
                BorderColor::OpaqueWhite => [1.0, 1.0, 1.0, 1.0],
            },
            min_lod: self.lod_min_clamp,
            max_lod: self.lod_max_clamp,
        }
    }
}

/// The HLSL profile for a stage at shader model 5.0.
pub fn shader_profile(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vs_5_0",
        ShaderStage::Geometry => "gs_5_0",
        ShaderStage::Fragment => "ps_5_0",
        ShaderStage::Compute => "cs_5_0",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats_have_two_faces() {
        assert_eq!(
            to_native_format(PixelFormat::D24UnormS8Uint, FormatUsage::Attachment),
            DxgiFormat::D24_UNORM_S8_UINT
        );
        assert_eq!(
            to_native_format(PixelFormat::D24UnormS8Uint, FormatUsage::ShaderRead),
            DxgiFormat::R24G8_TYPELESS
        );
        assert_eq!(
            shader_view_format(PixelFormat::D24UnormS8Uint),
            DxgiFormat::R24_UNORM_X8_TYPELESS
        );

        for format in PixelFormat::ALL {
            let read = to_native_format(format, FormatUsage::ShaderRead);
            assert!(!read.is_depth_target(), "{format:?} read face must be sampleable");
            assert_ne!(read, DxgiFormat::UNKNOWN);
            assert_ne!(to_native_format(format, FormatUsage::Attachment), DxgiFormat::UNKNOWN);
            if !format.is_depth() {
                assert_eq!(read, to_native_format(format, FormatUsage::Attachment));
            }
        }
    }

    #[test]
    fn sampled_depth_textures_use_the_typeless_face() {
        let mut desc = TextureDescriptor::new_2d(64, 64, PixelFormat::D32Float);
        desc.usage = TextureUsage::DEPTH_STENCIL;
        assert_eq!(storage_format(&desc), DxgiFormat::D32_FLOAT);
        desc.usage = TextureUsage::DEPTH_STENCIL | TextureUsage::SAMPLED;
        assert_eq!(storage_format(&desc), DxgiFormat::R32_TYPELESS);
    }

    #[test]
    fn filters_encode_like_the_header_macro() {
        let mut desc = SamplerDescriptor::default();
        desc.min_filter = FilterMode::Linear;
        desc.mag_filter = FilterMode::Linear;
        desc.mip_filter = FilterMode::Linear;
        desc.max_anisotropy = 1;
        // D3D11_FILTER_MIN_MAG_MIP_LINEAR
        assert_eq!(encode_filter(&desc), 0x15);

        desc.compare = Some(CompareFunction::LessEqual);
        // D3D11_FILTER_COMPARISON_MIN_MAG_MIP_LINEAR
        assert_eq!(encode_filter(&desc), 0x95);

        desc.max_anisotropy = 8;
        assert_eq!(encode_filter(&desc), d3d::FILTER_COMPARISON_ANISOTROPIC);
    }
}
