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

//! Immutable fixed-function state objects and their descriptions.
//!
//! Equality of every description is structural. Float fields compare by bit
//! pattern so that the relation stays reflexive and descriptions can key
//! hash maps.

use crate::renderer::api::common::ResourceId;
use crate::renderer::api::enums::{
    AddressMode, BlendFactor, BlendOperation, BorderColor, CompareFunction, CullMode, FillMode,
    FilterMode, FrontFace, StencilOperation,
};
use crate::renderer::api::native::NativeHandle;
use crate::renderer::error::RenderError;
use crate::tessera_bitflags;
use std::hash::{Hash, Hasher};

tessera_bitflags! {
    /// Which color channels are written to the render target.
    pub struct ColorWrites: u32 {
        /// Red channel.
        const RED = 1 << 0;
        /// Green channel.
        const GREEN = 1 << 1;
        /// Blue channel.
        const BLUE = 1 << 2;
        /// Alpha channel.
        const ALPHA = 1 << 3;
        /// All channels.
        const ALL = 0b1111;
    }
}

/// Source factor, destination factor and operation of one blend equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    /// Factor applied to the fragment output.
    pub src_factor: BlendFactor,
    /// Factor applied to the render target value.
    pub dst_factor: BlendFactor,
    /// Combining operation.
    pub operation: BlendOperation,
}

impl BlendComponent {
    /// `src * 1 + dst * 0`.
    pub const REPLACE: Self = Self {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::Zero,
        operation: BlendOperation::Add,
    };

    /// Standard non-premultiplied alpha blending.
    pub const ALPHA_BLENDING: Self = Self {
        src_factor: BlendFactor::SrcAlpha,
        dst_factor: BlendFactor::OneMinusSrcAlpha,
        operation: BlendOperation::Add,
    };
}

/// Output-merger blending for every color attachment.
#[derive(Debug, Clone, Copy)]
pub struct BlendDescriptor {
    /// Enables blending; when off the fragment replaces the target.
    pub enabled: bool,
    /// Color channel equation.
    pub color: BlendComponent,
    /// Alpha channel equation.
    pub alpha: BlendComponent,
    /// Written channels.
    pub write_mask: ColorWrites,
    /// Constant used by [`BlendFactor::Constant`].
    pub constant: [f32; 4],
}

impl Default for BlendDescriptor {
    fn default() -> Self {
        Self {
            enabled: false,
            color: BlendComponent::REPLACE,
            alpha: BlendComponent::REPLACE,
            write_mask: ColorWrites::ALL,
            constant: [1.0; 4],
        }
    }
}

impl BlendDescriptor {
    /// Alpha blending on color, additive alpha.
    pub fn alpha_blending() -> Self {
        Self {
            enabled: true,
            color: BlendComponent::ALPHA_BLENDING,
            alpha: BlendComponent {
                src_factor: BlendFactor::One,
                dst_factor: BlendFactor::OneMinusSrcAlpha,
                operation: BlendOperation::Add,
            },
            ..Self::default()
        }
    }
}

impl PartialEq for BlendDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.enabled == other.enabled
            && self.color == other.color
            && self.alpha == other.alpha
            && self.write_mask == other.write_mask
            && self.constant.map(f32::to_bits) == other.constant.map(f32::to_bits)
    }
}

impl Eq for BlendDescriptor {}

impl Hash for BlendDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.enabled.hash(state);
        self.color.hash(state);
        self.alpha.hash(state);
        self.write_mask.hash(state);
        self.constant.map(f32::to_bits).hash(state);
    }
}

/// Stencil test configuration of one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFaceState {
    /// Comparison against the reference value.
    pub compare: CompareFunction,
    /// Operation when the stencil test fails.
    pub fail_op: StencilOperation,
    /// Operation when the stencil test passes but the depth test fails.
    pub depth_fail_op: StencilOperation,
    /// Operation when both tests pass.
    pub pass_op: StencilOperation,
}

impl StencilFaceState {
    /// A face that always passes and keeps the stored value.
    pub const IGNORE: Self = Self {
        compare: CompareFunction::Always,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op: StencilOperation::Keep,
    };
}

/// Depth and stencil test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilDescriptor {
    /// Enables the depth test.
    pub depth_test_enabled: bool,
    /// Enables depth writes.
    pub depth_write_enabled: bool,
    /// The depth comparison.
    pub depth_compare: CompareFunction,
    /// Enables the stencil test.
    pub stencil_enabled: bool,
    /// Mask applied when reading the stencil buffer.
    pub stencil_read_mask: u8,
    /// Mask applied when writing the stencil buffer.
    pub stencil_write_mask: u8,
    /// Front face stencil state.
    pub front: StencilFaceState,
    /// Back face stencil state.
    pub back: StencilFaceState,
}

impl Default for DepthStencilDescriptor {
    fn default() -> Self {
        Self {
            depth_test_enabled: true,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil_enabled: false,
            stencil_read_mask: 0xff,
            stencil_write_mask: 0xff,
            front: StencilFaceState::IGNORE,
            back: StencilFaceState::IGNORE,
        }
    }
}

impl DepthStencilDescriptor {
    /// Depth test and writes disabled.
    pub fn disabled() -> Self {
        Self {
            depth_test_enabled: false,
            depth_write_enabled: false,
            depth_compare: CompareFunction::Always,
            ..Self::default()
        }
    }
}

/// Rasterizer configuration.
#[derive(Debug, Clone, Copy)]
pub struct RasterizerDescriptor {
    /// Polygon fill mode.
    pub fill_mode: FillMode,
    /// Culled faces.
    pub cull_mode: CullMode,
    /// Front-facing winding.
    pub front_face: FrontFace,
    /// Constant depth bias, in depth-buffer units.
    pub depth_bias: i32,
    /// Slope-scaled depth bias.
    pub depth_bias_slope_scale: f32,
    /// Maximum absolute bias, `0.0` for none.
    pub depth_bias_clamp: f32,
    /// Clips fragments outside the depth range.
    pub depth_clip_enabled: bool,
    /// Enables the scissor test.
    pub scissor_enabled: bool,
}

impl Default for RasterizerDescriptor {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_face: FrontFace::Ccw,
            depth_bias: 0,
            depth_bias_slope_scale: 0.0,
            depth_bias_clamp: 0.0,
            depth_clip_enabled: true,
            scissor_enabled: false,
        }
    }
}

impl RasterizerDescriptor {
    /// Returns `true` if any depth bias term is non-zero.
    pub fn has_depth_bias(&self) -> bool {
        self.depth_bias != 0 || self.depth_bias_slope_scale != 0.0
    }
}

impl PartialEq for RasterizerDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.fill_mode == other.fill_mode
            && self.cull_mode == other.cull_mode
            && self.front_face == other.front_face
            && self.depth_bias == other.depth_bias
            && self.depth_bias_slope_scale.to_bits() == other.depth_bias_slope_scale.to_bits()
            && self.depth_bias_clamp.to_bits() == other.depth_bias_clamp.to_bits()
            && self.depth_clip_enabled == other.depth_clip_enabled
            && self.scissor_enabled == other.scissor_enabled
    }
}

impl Eq for RasterizerDescriptor {}

impl Hash for RasterizerDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fill_mode.hash(state);
        self.cull_mode.hash(state);
        self.front_face.hash(state);
        self.depth_bias.hash(state);
        self.depth_bias_slope_scale.to_bits().hash(state);
        self.depth_bias_clamp.to_bits().hash(state);
        self.depth_clip_enabled.hash(state);
        self.scissor_enabled.hash(state);
    }
}

/// Texture sampling configuration.
#[derive(Debug, Clone, Copy)]
pub struct SamplerDescriptor {
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Filter between mip levels.
    pub mip_filter: FilterMode,
    /// Addressing along U.
    pub address_u: AddressMode,
    /// Addressing along V.
    pub address_v: AddressMode,
    /// Addressing along W.
    pub address_w: AddressMode,
    /// Bias added to the computed mip level.
    pub mip_lod_bias: f32,
    /// Lowest accessible mip level.
    pub lod_min_clamp: f32,
    /// Highest accessible mip level.
    pub lod_max_clamp: f32,
    /// Maximum anisotropy; `1` disables anisotropic filtering.
    pub max_anisotropy: u16,
    /// Turns the sampler into a comparison sampler.
    pub compare: Option<CompareFunction>,
    /// Color returned by [`AddressMode::ClampToBorder`].
    pub border_color: BorderColor,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mip_filter: FilterMode::Linear,
            address_u: AddressMode::Repeat,
            address_v: AddressMode::Repeat,
            address_w: AddressMode::Repeat,
            mip_lod_bias: 0.0,
            lod_min_clamp: 0.0,
            lod_max_clamp: 1000.0,
            max_anisotropy: 1,
            compare: None,
            border_color: BorderColor::TransparentBlack,
        }
    }
}

impl SamplerDescriptor {
    /// Highest anisotropy level accepted by every backend.
    pub const MAX_ANISOTROPY: u16 = 16;

    /// Checks the anisotropy and LOD ranges.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.max_anisotropy == 0 || self.max_anisotropy > Self::MAX_ANISOTROPY {
            return Err(RenderError::config(format!(
                "max anisotropy {} is outside 1..={}",
                self.max_anisotropy,
                Self::MAX_ANISOTROPY
            )));
        }
        if self.lod_min_clamp.is_nan()
            || self.lod_max_clamp.is_nan()
            || self.lod_min_clamp > self.lod_max_clamp
        {
            return Err(RenderError::config(format!(
                "LOD range {}..{} is empty",
                self.lod_min_clamp, self.lod_max_clamp
            )));
        }
        Ok(())
    }
}

impl PartialEq for SamplerDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.min_filter == other.min_filter
            && self.mag_filter == other.mag_filter
            && self.mip_filter == other.mip_filter
            && self.address_u == other.address_u
            && self.address_v == other.address_v
            && self.address_w == other.address_w
            && self.mip_lod_bias.to_bits() == other.mip_lod_bias.to_bits()
            && self.lod_min_clamp.to_bits() == other.lod_min_clamp.to_bits()
            && self.lod_max_clamp.to_bits() == other.lod_max_clamp.to_bits()
            && self.max_anisotropy == other.max_anisotropy
            && self.compare == other.compare
            && self.border_color == other.border_color
    }
}

impl Eq for SamplerDescriptor {}

impl Hash for SamplerDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.min_filter.hash(state);
        self.mag_filter.hash(state);
        self.mip_filter.hash(state);
        self.address_u.hash(state);
        self.address_v.hash(state);
        self.address_w.hash(state);
        self.mip_lod_bias.to_bits().hash(state);
        self.lod_min_clamp.to_bits().hash(state);
        self.lod_max_clamp.to_bits().hash(state);
        self.max_anisotropy.hash(state);
        self.compare.hash(state);
        self.border_color.hash(state);
    }
}

/// An immutable state object: a description plus its native object.
///
/// Two state objects are equal when their descriptions are, regardless of
/// which native objects back them.
#[derive(Debug)]
pub struct StateObject<D> {
    id: ResourceId,
    desc: D,
    native: Option<NativeHandle>,
}

impl<D> StateObject<D> {
    /// Wraps a created native state object. Backends that apply state
    /// field by field pass their null handle.
    pub fn new(id: ResourceId, desc: D, native: NativeHandle) -> Self {
        Self {
            id,
            desc,
            native: Some(native),
        }
    }

    /// The device-unique identity.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The immutable description.
    pub fn desc(&self) -> &D {
        &self.desc
    }

    /// The native object, or `None` once disposed.
    pub fn native(&self) -> Option<NativeHandle> {
        self.native
    }

    /// Takes the native object out, leaving the state object disposed.
    pub fn take_native(&mut self) -> Option<NativeHandle> {
        self.native.take()
    }

    /// Returns `true` until the state object is disposed.
    pub fn is_alive(&self) -> bool {
        self.native.is_some()
    }
}

impl<D: PartialEq> PartialEq for StateObject<D> {
    fn eq(&self, other: &Self) -> bool {
        self.desc == other.desc
    }
}

/// Blend state object.
pub type BlendState = StateObject<BlendDescriptor>;
/// Depth/stencil state object.
pub type DepthStencilState = StateObject<DepthStencilDescriptor>;
/// Rasterizer state object.
pub type RasterizerState = StateObject<RasterizerDescriptor>;
/// Sampler state object.
pub type SamplerState = StateObject<SamplerDescriptor>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn state_objects_compare_by_description_only() {
        let a = RasterizerState::new(
            ResourceId(1),
            RasterizerDescriptor::default(),
            NativeHandle::D3d11(0x100),
        );
        let b = RasterizerState::new(
            ResourceId(2),
            RasterizerDescriptor::default(),
            NativeHandle::D3d11(0x200),
        );
        assert_eq!(a, b, "native identity must not affect equality");

        let c = RasterizerState::new(
            ResourceId(3),
            RasterizerDescriptor {
                cull_mode: CullMode::None,
                ..RasterizerDescriptor::default()
            },
            NativeHandle::D3d11(0x100),
        );
        assert_ne!(a, c);
    }

    #[test]
    fn float_fields_hash_consistently() {
        let a = SamplerDescriptor {
            mip_lod_bias: 0.5,
            ..SamplerDescriptor::default()
        };
        let b = a;
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let nan = RasterizerDescriptor {
            depth_bias_clamp: f32::NAN,
            ..RasterizerDescriptor::default()
        };
        assert_eq!(nan, nan, "bitwise comparison keeps equality reflexive");
    }

    #[test]
    fn blend_presets_differ() {
        assert_ne!(BlendDescriptor::default(), BlendDescriptor::alpha_blending());
        assert_eq!(
            hash_of(&BlendDescriptor::default()),
            hash_of(&BlendDescriptor::default())
        );
    }

    #[test]
    fn take_native_happens_once() {
        let mut state = SamplerState::new(
            ResourceId(9),
            SamplerDescriptor::default(),
            NativeHandle::Gl(4),
        );
        assert_eq!(state.take_native(), Some(NativeHandle::Gl(4)));
        assert_eq!(state.take_native(), None);
        assert!(!state.is_alive());
    }

    #[test]
    fn sampler_validation_rejects_bad_ranges() {
        assert!(SamplerDescriptor::default().validate().is_ok());
        let anisotropic = SamplerDescriptor {
            max_anisotropy: 32,
            ..SamplerDescriptor::default()
        };
        assert!(anisotropic.validate().unwrap_err().is_configuration());
        let inverted = SamplerDescriptor {
            lod_min_clamp: 4.0,
            lod_max_clamp: 1.0,
            ..SamplerDescriptor::default()
        };
        assert!(inverted.validate().is_err());
    }
}
