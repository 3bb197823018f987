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

//! Small enums shared by the pipeline state descriptors and draw calls.

/// Defines how a sequence of vertices is assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Every vertex is a point.
    PointList,
    /// Every two vertices form a line.
    LineList,
    /// Consecutive vertices form a connected line.
    LineStrip,
    /// Every three vertices form a triangle.
    #[default]
    TriangleList,
    /// Each vertex after the first two forms a triangle with its two predecessors.
    TriangleStrip,
}

impl PrimitiveTopology {
    /// Number of triangles produced by `vertex_count` vertices.
    /// Point and line topologies produce none.
    pub fn triangle_count(self, vertex_count: u32) -> u64 {
        match self {
            PrimitiveTopology::TriangleList => (vertex_count / 3) as u64,
            PrimitiveTopology::TriangleStrip => vertex_count.saturating_sub(2) as u64,
            _ => 0,
        }
    }
}

/// Width of the elements in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit unsigned indices.
    Uint16,
    /// 32-bit unsigned indices.
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub const fn size_bytes(self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// A comparison function used by depth/stencil tests and comparison samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if the new value is less than the existing value.
    Less,
    /// Passes if the values are equal.
    Equal,
    /// Passes if the new value is less than or equal to the existing value.
    LessEqual,
    /// Passes if the new value is greater than the existing value.
    Greater,
    /// Passes if the values differ.
    NotEqual,
    /// Passes if the new value is greater than or equal to the existing value.
    GreaterEqual,
    /// Always passes.
    Always,
}

/// The operation performed on the stencil buffer after a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOperation {
    /// Keeps the current value.
    Keep,
    /// Sets the value to 0.
    Zero,
    /// Replaces the value with the stencil reference.
    Replace,
    /// Bitwise inverts the value.
    Invert,
    /// Increments, clamping to the maximum.
    IncrementClamp,
    /// Decrements, clamping to 0.
    DecrementClamp,
    /// Increments, wrapping to 0.
    IncrementWrap,
    /// Decrements, wrapping to the maximum.
    DecrementWrap,
}

/// A multiplier applied to a source or destination color in blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// `0.0`
    Zero,
    /// `1.0`
    One,
    /// Source color.
    SrcColor,
    /// `1.0 - source color`.
    OneMinusSrcColor,
    /// Source alpha.
    SrcAlpha,
    /// `1.0 - source alpha`.
    OneMinusSrcAlpha,
    /// Destination color.
    DstColor,
    /// `1.0 - destination color`.
    OneMinusDstColor,
    /// Destination alpha.
    DstAlpha,
    /// `1.0 - destination alpha`.
    OneMinusDstAlpha,
    /// `min(source alpha, 1.0 - destination alpha)`.
    SrcAlphaSaturated,
    /// The constant blend color.
    Constant,
    /// `1.0 - constant blend color`.
    OneMinusConstant,
}

/// The operation combining the weighted source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    /// `src + dst`
    Add,
    /// `src - dst`
    Subtract,
    /// `dst - src`
    ReverseSubtract,
    /// `min(src, dst)`
    Min,
    /// `max(src, dst)`
    Max,
}

/// Which faces are culled during rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// No culling.
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    Back,
}

/// Winding order of front-facing triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    /// Counter-clockwise.
    Ccw,
    /// Clockwise.
    Cw,
}

/// How polygons are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    /// Filled triangles.
    Solid,
    /// Triangle edges only.
    Wireframe,
}

/// How texture coordinates outside `[0, 1]` are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Tile the texture.
    Repeat,
    /// Tile the texture, mirroring every other tile.
    MirrorRepeat,
    /// Clamp to the edge texel.
    ClampToEdge,
    /// Use the border color.
    ClampToBorder,
}

/// Texel filtering used for minification, magnification or between mips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Linear interpolation.
    Linear,
}

/// The color returned for [`AddressMode::ClampToBorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderColor {
    /// `(0, 0, 0, 0)`
    TransparentBlack,
    /// `(0, 0, 0, 1)`
    OpaqueBlack,
    /// `(1, 1, 1, 1)`
    OpaqueWhite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_count_per_topology() {
        assert_eq!(PrimitiveTopology::TriangleList.triangle_count(3), 1);
        assert_eq!(PrimitiveTopology::TriangleList.triangle_count(7), 2);
        assert_eq!(PrimitiveTopology::TriangleStrip.triangle_count(5), 3);
        assert_eq!(PrimitiveTopology::TriangleStrip.triangle_count(1), 0);
        assert_eq!(PrimitiveTopology::LineList.triangle_count(6), 0);
    }
}
