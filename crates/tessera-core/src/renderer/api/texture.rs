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

//! Texture descriptors and the caller-owned texture resource.

use crate::math::Extent3D;
use crate::renderer::api::common::ResourceId;
use crate::renderer::api::format::{calculate_mip_levels, PixelFormat};
use crate::renderer::api::native::TextureNative;
use crate::renderer::error::RenderError;
use crate::tessera_bitflags;

/// Number of faces of one cube map.
pub const CUBE_FACE_COUNT: u32 = 6;

/// The dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    /// One-dimensional texture (height and depth are 1).
    D1,
    /// Two-dimensional texture (depth is 1).
    D2,
    /// Volume texture.
    D3,
    /// Cube map; each array slice owns six square faces.
    Cube,
}

tessera_bitflags! {
    /// Describes how a texture will be used.
    pub struct TextureUsage: u32 {
        /// Sampled from shaders.
        const SAMPLED = 1 << 0;
        /// Bound as a color attachment.
        const RENDER_TARGET = 1 << 1;
        /// Bound as the depth/stencil attachment.
        const DEPTH_STENCIL = 1 << 2;
        /// Read and written as a storage image.
        const STORAGE = 1 << 3;
    }
}

/// A description of a texture to create.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    /// A debug label.
    pub label: Option<String>,
    /// The dimensionality.
    pub texture_type: TextureType,
    /// Width of mip level 0.
    pub width: u32,
    /// Height of mip level 0.
    pub height: u32,
    /// Depth of mip level 0.
    pub depth: u32,
    /// Number of array slices (cube maps count whole cubes). Must be at least 1.
    pub array_size: u32,
    /// Number of mip levels. `0` requests the full chain.
    pub mip_levels: u32,
    /// The texel format.
    pub format: PixelFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// A sampled 2D texture with a single mip and slice.
    pub fn new_2d(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            label: None,
            texture_type: TextureType::D2,
            width,
            height,
            depth: 1,
            array_size: 1,
            mip_levels: 1,
            format,
            usage: TextureUsage::SAMPLED,
        }
    }

    /// The size of mip level 0.
    pub fn extent(&self) -> Extent3D {
        Extent3D::new(self.width, self.height, self.depth)
    }

    /// Mip count after resolving `0` to the full chain.
    pub fn resolved_mip_levels(&self) -> u32 {
        if self.mip_levels == 0 {
            calculate_mip_levels(self.width, self.height, self.depth)
        } else {
            self.mip_levels
        }
    }

    /// Number of addressable array layers, counting cube faces individually.
    /// Saturates on descriptors that [`validate`](Self::validate) rejects.
    pub fn layer_count(&self) -> u32 {
        self.checked_layer_count().unwrap_or(u32::MAX)
    }

    /// Number of subresources (`layer_count * mip_levels`).
    /// Saturates on descriptors that [`validate`](Self::validate) rejects.
    pub fn subresource_count(&self) -> u32 {
        self.checked_subresource_count().unwrap_or(u32::MAX)
    }

    fn checked_layer_count(&self) -> Option<u32> {
        match self.texture_type {
            TextureType::Cube => self.array_size.checked_mul(CUBE_FACE_COUNT),
            _ => Some(self.array_size),
        }
    }

    fn checked_subresource_count(&self) -> Option<u32> {
        self.checked_layer_count()?
            .checked_mul(self.resolved_mip_levels())
    }

    /// Checks the descriptor and returns a copy with `mip_levels` resolved.
    pub fn validate(&self) -> Result<TextureDescriptor, RenderError> {
        if self.array_size < 1 {
            return Err(RenderError::config(format!(
                "texture array size must be at least 1, got {}",
                self.array_size
            )));
        }
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(RenderError::config(format!(
                "texture extent {}x{}x{} has a zero dimension",
                self.width, self.height, self.depth
            )));
        }
        match self.texture_type {
            TextureType::D1 if self.height != 1 || self.depth != 1 => {
                return Err(RenderError::config("1D textures must have height and depth 1"));
            }
            TextureType::D2 if self.depth != 1 => {
                return Err(RenderError::config("2D textures must have depth 1"));
            }
            TextureType::Cube if self.width != self.height || self.depth != 1 => {
                return Err(RenderError::config(
                    "cube map faces must be square with depth 1",
                ));
            }
            TextureType::D3 if self.format.is_depth() => {
                return Err(RenderError::config("depth formats cannot be used for 3D textures"));
            }
            _ => {}
        }
        let full_chain = calculate_mip_levels(self.width, self.height, self.depth);
        if self.mip_levels > full_chain {
            return Err(RenderError::config(format!(
                "{} mip levels requested but the full chain of a {}x{}x{} texture is {}",
                self.mip_levels, self.width, self.height, self.depth, full_chain
            )));
        }
        if self.checked_subresource_count().is_none() {
            return Err(RenderError::config(format!(
                "{:?} texture with {} slices and {} mip levels has too many subresources",
                self.texture_type,
                self.array_size,
                self.resolved_mip_levels()
            )));
        }
        if self.usage.contains(TextureUsage::DEPTH_STENCIL) && !self.format.is_depth() {
            return Err(RenderError::config(format!(
                "{:?} cannot be used as a depth/stencil attachment",
                self.format
            )));
        }
        if self.usage.contains(TextureUsage::RENDER_TARGET) && self.format.is_depth() {
            return Err(RenderError::config(format!(
                "depth format {:?} cannot be used as a color attachment",
                self.format
            )));
        }
        if self.usage.is_empty() {
            return Err(RenderError::config("texture usage must not be empty"));
        }

        let mut resolved = self.clone();
        resolved.mip_levels = full_chain.min(self.resolved_mip_levels());
        Ok(resolved)
    }
}

/// A texture owned by the caller that created it.
#[derive(Debug)]
pub struct Texture {
    id: ResourceId,
    desc: TextureDescriptor,
    native: Option<TextureNative>,
}

impl Texture {
    /// Wraps a freshly created native texture. `desc` must be resolved.
    pub fn new(id: ResourceId, desc: TextureDescriptor, native: TextureNative) -> Self {
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

    /// The resolved description (mip count never 0).
    pub fn desc(&self) -> &TextureDescriptor {
        &self.desc
    }

    /// The native objects, or `None` once disposed.
    pub fn native(&self) -> Option<&TextureNative> {
        self.native.as_ref()
    }

    /// Takes the native objects out, leaving the texture disposed.
    pub fn take_native(&mut self) -> Option<TextureNative> {
        self.native.take()
    }

    /// Returns `true` until the texture is disposed.
    pub fn is_alive(&self) -> bool {
        self.native.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mip_levels_resolve_to_full_chain() {
        let mut desc = TextureDescriptor::new_2d(256, 128, PixelFormat::R8G8B8A8Unorm);
        desc.mip_levels = 0;
        let resolved = desc.validate().unwrap();
        assert_eq!(resolved.mip_levels, 9);
    }

    #[test]
    fn zero_array_size_is_rejected() {
        let mut desc = TextureDescriptor::new_2d(4, 4, PixelFormat::R8G8B8A8Unorm);
        desc.array_size = 0;
        assert!(desc.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn cube_maps_count_six_layers_per_slice() {
        let desc = TextureDescriptor {
            texture_type: TextureType::Cube,
            array_size: 2,
            mip_levels: 0,
            ..TextureDescriptor::new_2d(64, 64, PixelFormat::R8G8B8A8Unorm)
        };
        assert_eq!(desc.layer_count(), 12);
        assert_eq!(desc.subresource_count(), 12 * 7);
    }

    #[test]
    fn oversized_arrays_are_rejected_instead_of_overflowing() {
        let cube = TextureDescriptor {
            texture_type: TextureType::Cube,
            array_size: u32::MAX / 4,
            ..TextureDescriptor::new_2d(64, 64, PixelFormat::R8G8B8A8Unorm)
        };
        assert!(cube.validate().unwrap_err().is_configuration());
        assert_eq!(cube.layer_count(), u32::MAX);

        let mut mipped = TextureDescriptor::new_2d(64, 64, PixelFormat::R8G8B8A8Unorm);
        mipped.array_size = u32::MAX / 2;
        mipped.mip_levels = 0;
        assert!(mipped.validate().unwrap_err().is_configuration());

        let mut single = mipped.clone();
        single.mip_levels = 1;
        assert!(single.validate().is_ok());
    }

    #[test]
    fn non_square_cube_is_rejected() {
        let desc = TextureDescriptor {
            texture_type: TextureType::Cube,
            ..TextureDescriptor::new_2d(64, 32, PixelFormat::R8G8B8A8Unorm)
        };
        assert!(desc.validate().is_err());
    }

    #[test]
    fn depth_usage_requires_depth_format() {
        let desc = TextureDescriptor {
            usage: TextureUsage::DEPTH_STENCIL,
            ..TextureDescriptor::new_2d(64, 64, PixelFormat::R8G8B8A8Unorm)
        };
        assert!(desc.validate().is_err());
    }
}
