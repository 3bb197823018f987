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

//! Conversions from the neutral descriptors to GL enumerants.

use super::api::{consts as gl, GLenum};
use tessera_core::renderer::api::*;

/// A local extension trait to convert our types into GL enumerants.
/// This keeps an idiomatic `.into_gl()` syntax next to the other backends.
pub trait IntoGl<T> {
    /// Consumes self and converts it into its GL counterpart.
    fn into_gl(self) -> T;
}

/// The three enumerants GL needs to allocate and fill a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlFormat {
    /// Sized internal format passed to `glTexStorage*`.
    pub internal: GLenum,
    /// Client pixel format for `glTexSubImage*`, `0` for compressed formats.
    pub format: GLenum,
    /// Client component type for `glTexSubImage*`, `0` for compressed formats.
    pub ty: GLenum,
}

impl GlFormat {
    const fn new(internal: GLenum, format: GLenum, ty: GLenum) -> Self {
        Self { internal, format, ty }
    }

    const fn compressed(internal: GLenum) -> Self {
        Self::new(internal, 0, 0)
    }
}

/// GL has a single face per format: depth textures are sampled directly, so
/// both intents map to the same sized format.
pub fn to_native_format(format: PixelFormat, _usage: FormatUsage) -> GlFormat {
    match format {
        PixelFormat::R8Unorm => GlFormat::new(gl::R8, gl::RED, gl::UNSIGNED_BYTE),
        PixelFormat::R8G8Unorm => GlFormat::new(gl::RG8, gl::RG, gl::UNSIGNED_BYTE),
        PixelFormat::R8G8B8A8Unorm => GlFormat::new(gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE),
        PixelFormat::R8G8B8A8UnormSrgb => {
            GlFormat::new(gl::SRGB8_ALPHA8, gl::RGBA, gl::UNSIGNED_BYTE)
        }
        PixelFormat::B8G8R8A8Unorm => GlFormat::new(gl::RGBA8, gl::BGRA, gl::UNSIGNED_BYTE),
        PixelFormat::B8G8R8A8UnormSrgb => {
            GlFormat::new(gl::SRGB8_ALPHA8, gl::BGRA, gl::UNSIGNED_BYTE)
        }
        PixelFormat::R16Float => GlFormat::new(gl::R16F, gl::RED, gl::HALF_FLOAT),
        PixelFormat::R16G16Float => GlFormat::new(gl::RG16F, gl::RG, gl::HALF_FLOAT),
        PixelFormat::R16G16B16A16Float => GlFormat::new(gl::RGBA16F, gl::RGBA, gl::HALF_FLOAT),
        PixelFormat::R32Float => GlFormat::new(gl::R32F, gl::RED, gl::FLOAT),
        PixelFormat::R32Uint => GlFormat::new(gl::R32UI, gl::RED_INTEGER, gl::UNSIGNED_INT),
        PixelFormat::R32G32Float => GlFormat::new(gl::RG32F, gl::RG, gl::FLOAT),
        PixelFormat::R32G32B32Float => GlFormat::new(gl::RGB32F, gl::RGB, gl::FLOAT),
        PixelFormat::R32G32B32A32Float => GlFormat::new(gl::RGBA32F, gl::RGBA, gl::FLOAT),
        PixelFormat::R10G10B10A2Unorm => {
            GlFormat::new(gl::RGB10_A2, gl::RGBA, gl::UNSIGNED_INT_2_10_10_10_REV)
        }
        PixelFormat::R11G11B10Float => {
            GlFormat::new(gl::R11F_G11F_B10F, gl::RGB, gl::UNSIGNED_INT_10F_11F_11F_REV)
        }
        PixelFormat::Bc1RgbaUnorm => GlFormat::compressed(gl::COMPRESSED_RGBA_S3TC_DXT1_EXT),
        PixelFormat::Bc1RgbaUnormSrgb => {
            GlFormat::compressed(gl::COMPRESSED_SRGB_ALPHA_S3TC_DXT1_EXT)
        }
        PixelFormat::Bc2Unorm => GlFormat::compressed(gl::COMPRESSED_RGBA_S3TC_DXT3_EXT),
        PixelFormat::Bc3Unorm => GlFormat::compressed(gl::COMPRESSED_RGBA_S3TC_DXT5_EXT),
        PixelFormat::Bc3UnormSrgb => GlFormat::compressed(gl::COMPRESSED_SRGB_ALPHA_S3TC_DXT5_EXT),
        PixelFormat::Bc4Unorm => GlFormat::compressed(gl::COMPRESSED_RED_RGTC1),
        PixelFormat::Bc5Unorm => GlFormat::compressed(gl::COMPRESSED_RG_RGTC2),
        PixelFormat::Bc7Unorm => GlFormat::compressed(gl::COMPRESSED_RGBA_BPTC_UNORM),
        PixelFormat::Bc7UnormSrgb => GlFormat::compressed(gl::COMPRESSED_SRGB_ALPHA_BPTC_UNORM),
        PixelFormat::D16Unorm => {
            GlFormat::new(gl::DEPTH_COMPONENT16, gl::DEPTH_COMPONENT, gl::UNSIGNED_SHORT)
        }
        PixelFormat::D24UnormS8Uint => {
            GlFormat::new(gl::DEPTH24_STENCIL8, gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8)
        }
        PixelFormat::D32Float => GlFormat::new(gl::DEPTH_COMPONENT32F, gl::DEPTH_COMPONENT, gl::FLOAT),
        PixelFormat::D32FloatS8Uint => GlFormat::new(
            gl::DEPTH32F_STENCIL8,
            gl::DEPTH_STENCIL,
            gl::FLOAT_32_UNSIGNED_INT_24_8_REV,
        ),
    }
}

/// The bind target of a texture.
pub fn texture_target(desc: &TextureDescriptor) -> GLenum {
    let layered = desc.array_size > 1;
    match (desc.texture_type, layered) {
        (TextureType::D1, false) => gl::TEXTURE_1D,
        (TextureType::D1, true) => gl::TEXTURE_1D_ARRAY,
        (TextureType::D2, false) => gl::TEXTURE_2D,
        (TextureType::D2, true) => gl::TEXTURE_2D_ARRAY,
        (TextureType::D3, _) => gl::TEXTURE_3D,
        (TextureType::Cube, false) => gl::TEXTURE_CUBE_MAP,
        (TextureType::Cube, true) => gl::TEXTURE_CUBE_MAP_ARRAY,
    }
}

/// Where one array layer of a texture is addressed by `glTexSubImage*`:
/// the target to use and the coordinate that selects the layer.
pub fn layer_upload_target(desc: &TextureDescriptor, layer: u32) -> (GLenum, Origin) {
    match texture_target(desc) {
        gl::TEXTURE_1D_ARRAY => (gl::TEXTURE_1D_ARRAY, Origin::Y(layer)),
        gl::TEXTURE_2D_ARRAY | gl::TEXTURE_CUBE_MAP_ARRAY => (texture_target(desc), Origin::Z(layer)),
        gl::TEXTURE_CUBE_MAP => (gl::TEXTURE_CUBE_MAP_POSITIVE_X + layer, Origin::None),
        target => (target, Origin::None),
    }
}

/// The coordinate a layer index is folded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The target itself selects the layer.
    None,
    /// Layers are rows of a 1D array.
    Y(u32),
    /// Layers are slices of a 2D or cube array.
    Z(u32),
}

impl IntoGl<GLenum> for PrimitiveTopology {
    fn into_gl(self) -> GLenum {
        match self {
            PrimitiveTopology::PointList => gl::POINTS,
            PrimitiveTopology::LineList => gl::LINES,
            PrimitiveTopology::LineStrip => gl::LINE_STRIP,
            PrimitiveTopology::TriangleList => gl::TRIANGLES,
            PrimitiveTopology::TriangleStrip => gl::TRIANGLE_STRIP,
        }
    }
}

impl IntoGl<GLenum> for IndexFormat {
    fn into_gl(self) -> GLenum {
        match self {
            IndexFormat::Uint16 => gl::UNSIGNED_SHORT,
            IndexFormat::Uint32 => gl::UNSIGNED_INT,
        }
    }
}

impl IntoGl<GLenum> for CompareFunction {
    fn into_gl(self) -> GLenum {
        match self {
            CompareFunction::Never => gl::NEVER,
            CompareFunction::Less => gl::LESS,
            CompareFunction::Equal => gl::EQUAL,
            CompareFunction::LessEqual => gl::LEQUAL,
            CompareFunction::Greater => gl::GREATER,
            CompareFunction::NotEqual => gl::NOTEQUAL,
            CompareFunction::GreaterEqual => gl::GEQUAL,
            CompareFunction::Always => gl::ALWAYS,
        }
    }
}

impl IntoGl<GLenum> for StencilOperation {
    fn into_gl(self) -> GLenum {
        match self {
            StencilOperation::Keep => gl::KEEP,
            StencilOperation::Zero => gl::ZERO,
            StencilOperation::Replace => gl::REPLACE,
            StencilOperation::Invert => gl::INVERT,
            StencilOperation::IncrementClamp => gl::INCR,
            StencilOperation::DecrementClamp => gl::DECR,
            StencilOperation::IncrementWrap => gl::INCR_WRAP,
            StencilOperation::DecrementWrap => gl::DECR_WRAP,
        }
    }
}

impl IntoGl<GLenum> for BlendFactor {
    fn into_gl(self) -> GLenum {
        match self {
            BlendFactor::Zero => gl::ZERO,
            BlendFactor::One => gl::ONE,
            BlendFactor::SrcColor => gl::SRC_COLOR,
            BlendFactor::OneMinusSrcColor => gl::ONE_MINUS_SRC_COLOR,
            BlendFactor::SrcAlpha => gl::SRC_ALPHA,
            BlendFactor::OneMinusSrcAlpha => gl::ONE_MINUS_SRC_ALPHA,
            BlendFactor::DstColor => gl::DST_COLOR,
            BlendFactor::OneMinusDstColor => gl::ONE_MINUS_DST_COLOR,
            BlendFactor::DstAlpha => gl::DST_ALPHA,
            BlendFactor::OneMinusDstAlpha => gl::ONE_MINUS_DST_ALPHA,
            BlendFactor::SrcAlphaSaturated => gl::SRC_ALPHA_SATURATE,
            BlendFactor::Constant => gl::CONSTANT_COLOR,
            BlendFactor::OneMinusConstant => gl::ONE_MINUS_CONSTANT_COLOR,
        }
    }
}

impl IntoGl<GLenum> for BlendOperation {
    fn into_gl(self) -> GLenum {
        match self {
            BlendOperation::Add => gl::FUNC_ADD,
            BlendOperation::Subtract => gl::FUNC_SUBTRACT,
            BlendOperation::ReverseSubtract => gl::FUNC_REVERSE_SUBTRACT,
            BlendOperation::Min => gl::MIN,
            BlendOperation::Max => gl::MAX,
        }
    }
}

impl IntoGl<GLenum> for FrontFace {
    fn into_gl(self) -> GLenum {
        match self {
            FrontFace::Ccw => gl::CCW,
            FrontFace::Cw => gl::CW,
        }
    }
}

impl IntoGl<GLenum> for FillMode {
    fn into_gl(self) -> GLenum {
        match self {
            FillMode::Solid => gl::FILL,
            FillMode::Wireframe => gl::LINE,
        }
    }
}

/// `None` when culling is disabled.
impl IntoGl<Option<GLenum>> for CullMode {
    fn into_gl(self) -> Option<GLenum> {
        match self {
            CullMode::None => None,
            CullMode::Front => Some(gl::FRONT),
            CullMode::Back => Some(gl::BACK),
        }
    }
}

impl IntoGl<GLenum> for AddressMode {
    fn into_gl(self) -> GLenum {
        match self {
            AddressMode::Repeat => gl::REPEAT,
            AddressMode::MirrorRepeat => gl::MIRRORED_REPEAT,
            AddressMode::ClampToEdge => gl::CLAMP_TO_EDGE,
            AddressMode::ClampToBorder => gl::CLAMP_TO_BORDER,
        }
    }
}

impl IntoGl<GLenum> for ShaderStage {
    fn into_gl(self) -> GLenum {
        match self {
            ShaderStage::Vertex => gl::VERTEX_SHADER,
            ShaderStage::Geometry => gl::GEOMETRY_SHADER,
            ShaderStage::Fragment => gl::FRAGMENT_SHADER,
            ShaderStage::Compute => gl::COMPUTE_SHADER,
        }
    }
}

impl IntoGl<[f32; 4]> for BorderColor {
    fn into_gl(self) -> [f32; 4] {
        match self {
            BorderColor::TransparentBlack => [0.0; 4],
            BorderColor::OpaqueBlack => [0.0, 0.0, 0.0, 1.0],
            BorderColor::OpaqueWhite => [1.0; 4],
        }
    }
}

/// The minification filter combines the texel and mip filters.
pub fn min_filter(min: FilterMode, mip: FilterMode) -> GLenum {
    match (min, mip) {
        (FilterMode::Nearest, FilterMode::Nearest) => gl::NEAREST_MIPMAP_NEAREST,
        (FilterMode::Linear, FilterMode::Nearest) => gl::LINEAR_MIPMAP_NEAREST,
        (FilterMode::Nearest, FilterMode::Linear) => gl::NEAREST_MIPMAP_LINEAR,
        (FilterMode::Linear, FilterMode::Linear) => gl::LINEAR_MIPMAP_LINEAR,
    }
}

/// The magnification filter.
pub fn mag_filter(mag: FilterMode) -> GLenum {
    match mag {
        FilterMode::Nearest => gl::NEAREST,
        FilterMode::Linear => gl::LINEAR,
    }
}

/// How a vertex attribute is described to `glVertexAttrib*Pointer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlVertexFormat {
    /// Component count.
    pub size: u32,
    /// Component type.
    pub ty: GLenum,
    /// Fixed-point data is normalized to `[0, 1]` or `[-1, 1]`.
    pub normalized: bool,
    /// Integer attributes go through `glVertexAttribIPointer`.
    pub integer: bool,
}

impl IntoGl<GlVertexFormat> for VertexFormat {
    fn into_gl(self) -> GlVertexFormat {
        let ty = match self {
            VertexFormat::Float16x2 | VertexFormat::Float16x4 => gl::HALF_FLOAT,
            VertexFormat::Unorm8x4 | VertexFormat::Uint8x4 => gl::UNSIGNED_BYTE,
            VertexFormat::Snorm16x2 => gl::SHORT,
            other => match other.scalar_type() {
                ScalarType::Float => gl::FLOAT,
                ScalarType::Sint => gl::INT,
                ScalarType::Uint => gl::UNSIGNED_INT,
            },
        };
        GlVertexFormat {
            size: self.components(),
            ty,
            normalized: self.is_normalized(),
            integer: self.scalar_type() != ScalarType::Float,
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
                "{format:?} must map identically for both intents"
            );
        }
        assert_eq!(
            to_native_format(PixelFormat::D24UnormS8Uint, FormatUsage::ShaderRead).internal,
            gl::DEPTH24_STENCIL8
        );
    }

    #[test]
    fn compressed_formats_have_no_client_format() {
        let bc1 = to_native_format(PixelFormat::Bc1RgbaUnorm, FormatUsage::ShaderRead);
        assert_eq!((bc1.format, bc1.ty), (0, 0));
        assert_eq!(bc1.internal, gl::COMPRESSED_RGBA_S3TC_DXT1_EXT);
    }

    #[test]
    fn cube_faces_upload_through_face_targets() {
        let mut desc = TextureDescriptor::new_2d(4, 4, PixelFormat::R8G8B8A8Unorm);
        desc.texture_type = TextureType::Cube;
        assert_eq!(
            layer_upload_target(&desc, 3),
            (gl::TEXTURE_CUBE_MAP_POSITIVE_X + 3, Origin::None)
        );
        desc.array_size = 2;
        assert_eq!(layer_upload_target(&desc, 9), (gl::TEXTURE_CUBE_MAP_ARRAY, Origin::Z(9)));
    }

    #[test]
    fn integer_attributes_use_the_integer_path() {
        let uint: GlVertexFormat = VertexFormat::Uint32x2.into_gl();
        assert!(uint.integer);
        assert_eq!((uint.size, uint.ty), (2, gl::UNSIGNED_INT));
        let unorm: GlVertexFormat = VertexFormat::Unorm8x4.into_gl();
        assert!(unorm.normalized && !unorm.integer);
    }
}
