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

//! Subresource addressing: mapping (mip, layer) pairs to linear indices,
//! validating partial updates and walking the initial-data layout of a texture.

use crate::math::{Extent3D, Origin3D};
use crate::renderer::api::format::{
    calculate_pitch, calculate_region_size, is_sub_block_upload, BLOCK_DIMENSION,
};
use crate::renderer::api::texture::{TextureDescriptor, CUBE_FACE_COUNT};
use crate::renderer::error::RenderError;

/// Linear index of a subresource: `mip + layer * total_mip_levels`.
///
/// `total_mip_levels` must be the resolved count fixed at creation.
pub const fn subresource_index(mip_level: u32, array_layer: u32, total_mip_levels: u32) -> u32 {
    mip_level + array_layer * total_mip_levels
}

/// A face of a cube map, in the native face order.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX = 0,
    NegativeX = 1,
    PositiveY = 2,
    NegativeY = 3,
    PositiveZ = 4,
    NegativeZ = 5,
}

impl CubeFace {
    /// The six faces in order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];
}

/// Synthetic array layer of a face inside an array of cube maps.
pub const fn cube_face_layer(array_index: u32, face: CubeFace) -> u32 {
    array_index * CUBE_FACE_COUNT + face as u32
}

/// A box inside one subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRegion {
    /// Target mip level.
    pub mip_level: u32,
    /// Target array layer (cube faces count individually).
    pub array_layer: u32,
    /// Corner of the box.
    pub origin: Origin3D,
    /// Size of the box.
    pub size: Extent3D,
}

impl TextureRegion {
    /// The whole of mip `mip_level`, layer `array_layer`.
    pub fn whole(desc: &TextureDescriptor, mip_level: u32, array_layer: u32) -> Self {
        Self {
            mip_level,
            array_layer,
            origin: Origin3D::ZERO,
            size: desc.extent().mip_level_size(mip_level),
        }
    }

    /// Validates the region against a resolved texture description and the
    /// supplied data length.
    pub fn validate(&self, desc: &TextureDescriptor, data_len: usize) -> Result<(), RenderError> {
        if self.mip_level >= desc.mip_levels {
            return Err(RenderError::config(format!(
                "mip level {} is outside a {} level texture",
                self.mip_level, desc.mip_levels
            )));
        }
        if self.array_layer >= desc.layer_count() {
            return Err(RenderError::config(format!(
                "array layer {} is outside a {} layer texture",
                self.array_layer,
                desc.layer_count()
            )));
        }
        if self.size.volume() == 0 {
            return Err(RenderError::config("update region is empty"));
        }

        let mip = desc.extent().mip_level_size(self.mip_level);
        let fits = |origin: u32, size: u32, limit: u32| {
            origin.checked_add(size).is_some_and(|end| end <= limit)
        };
        if !fits(self.origin.x, self.size.width, mip.width)
            || !fits(self.origin.y, self.size.height, mip.height)
            || !fits(self.origin.z, self.size.depth, mip.depth)
        {
            return Err(RenderError::config(format!(
                "region {:?}+{:?} exceeds mip {} of size {:?}",
                self.origin, self.size, self.mip_level, mip
            )));
        }
        if desc.format.is_compressed()
            && (self.origin.x % BLOCK_DIMENSION != 0 || self.origin.y % BLOCK_DIMENSION != 0)
        {
            return Err(RenderError::config(
                "compressed regions must start on a 4x4 block boundary",
            ));
        }

        let expected = calculate_region_size(desc.format, self.size);
        if data_len as u64 != expected {
            return Err(RenderError::config(format!(
                "region needs exactly {expected} bytes but {data_len} were supplied"
            )));
        }
        Ok(())
    }

    /// Linear subresource index of the region inside `desc`.
    pub fn subresource(&self, desc: &TextureDescriptor) -> u32 {
        subresource_index(self.mip_level, self.array_layer, desc.mip_levels)
    }
}

/// One subresource's slice of a texture's contiguous initial data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceUpload {
    /// Mip level.
    pub mip_level: u32,
    /// Array layer, including synthesized cube faces.
    pub array_layer: u32,
    /// Linear subresource index.
    pub index: u32,
    /// Size of the mip level.
    pub extent: Extent3D,
    /// Byte offset in the source buffer.
    pub offset: usize,
    /// Byte length in the source buffer.
    pub len: usize,
    /// Row pitch of the source data.
    pub row_pitch: u32,
    /// Depth-slice pitch of the source data.
    pub slice_pitch: u64,
    /// The upload is smaller than one compression block and must be skipped.
    pub skip: bool,
}

impl SubresourceUpload {
    /// The bytes of this subresource inside the full initial data.
    pub fn bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.offset..self.offset + self.len]
    }

    /// The region covering the whole subresource.
    pub fn region(&self) -> TextureRegion {
        TextureRegion {
            mip_level: self.mip_level,
            array_layer: self.array_layer,
            origin: Origin3D::ZERO,
            size: self.extent,
        }
    }
}

/// Lays out a resolved texture's initial data: array layers (cube faces
/// included) in the outer loop, mip levels in the inner loop, each mip
/// halving the previous size, read from one buffer at a running offset.
pub fn initial_data_layout(desc: &TextureDescriptor) -> Vec<SubresourceUpload> {
    let base = desc.extent();
    let mut uploads = Vec::with_capacity(desc.subresource_count() as usize);
    let mut offset = 0usize;

    for layer in 0..desc.layer_count() {
        for mip in 0..desc.mip_levels {
            let extent = base.mip_level_size(mip);
            let row_pitch = calculate_pitch(desc.format, extent.width).row_pitch;
            let len = calculate_region_size(desc.format, extent) as usize;
            uploads.push(SubresourceUpload {
                mip_level: mip,
                array_layer: layer,
                index: subresource_index(mip, layer, desc.mip_levels),
                extent,
                offset,
                len,
                row_pitch,
                slice_pitch: len as u64 / extent.depth as u64,
                skip: is_sub_block_upload(desc.format, extent.width, extent.height),
            });
            offset += len;
        }
    }
    uploads
}

/// Total byte length of a texture's initial data.
pub fn initial_data_size(desc: &TextureDescriptor) -> usize {
    initial_data_layout(desc).iter().map(|u| u.len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::format::PixelFormat;
    use crate::renderer::api::texture::TextureType;

    #[test]
    fn index_is_mip_plus_layer_times_mips() {
        assert_eq!(subresource_index(0, 0, 4), 0);
        assert_eq!(subresource_index(3, 0, 4), 3);
        assert_eq!(subresource_index(0, 1, 4), 4);
        assert_eq!(subresource_index(3, 1, 4), 7);
    }

    #[test]
    fn index_is_injective_over_valid_range() {
        let mut seen = std::collections::HashSet::new();
        for layer in 0..6 {
            for mip in 0..5 {
                assert!(seen.insert(subresource_index(mip, layer, 5)));
            }
        }
        assert_eq!(seen.len(), 30);
    }

    #[test]
    fn cube_faces_are_synthetic_layers() {
        assert_eq!(cube_face_layer(0, CubeFace::PositiveX), 0);
        assert_eq!(cube_face_layer(0, CubeFace::NegativeZ), 5);
        assert_eq!(cube_face_layer(2, CubeFace::PositiveY), 14);
    }

    #[test]
    fn whole_region_of_small_rgba_texture_needs_64_bytes() {
        let desc = TextureDescriptor::new_2d(4, 4, PixelFormat::R8G8B8A8Unorm);
        let region = TextureRegion::whole(&desc, 0, 0);
        assert!(region.validate(&desc, 64).is_ok());
        assert!(region.validate(&desc, 63).unwrap_err().is_configuration());
        assert!(region.validate(&desc, 65).is_err());
    }

    #[test]
    fn region_must_fit_inside_the_mip() {
        let desc = TextureDescriptor {
            mip_levels: 2,
            ..TextureDescriptor::new_2d(8, 8, PixelFormat::R8Unorm)
        };
        let region = TextureRegion {
            mip_level: 1,
            array_layer: 0,
            origin: Origin3D::new(2, 0, 0),
            size: Extent3D::new(4, 1, 1),
        };
        assert!(region.validate(&desc, 4).is_err());
        let region = TextureRegion {
            origin: Origin3D::new(0, 0, 0),
            ..region
        };
        assert!(region.validate(&desc, 4).is_ok());
    }

    #[test]
    fn initial_layout_walks_layers_then_mips() {
        let desc = TextureDescriptor {
            texture_type: TextureType::Cube,
            mip_levels: 3,
            ..TextureDescriptor::new_2d(4, 4, PixelFormat::R8G8B8A8Unorm)
        };
        let layout = initial_data_layout(&desc);
        assert_eq!(layout.len(), 18);
        assert_eq!((layout[0].array_layer, layout[0].mip_level), (0, 0));
        assert_eq!((layout[2].array_layer, layout[2].mip_level), (0, 2));
        assert_eq!((layout[3].array_layer, layout[3].mip_level), (1, 0));
        assert_eq!(layout[1].offset, 64);
        assert_eq!(layout[2].offset, 64 + 16);
        assert_eq!(layout[3].offset, 64 + 16 + 4);
        assert_eq!(layout[17].index, subresource_index(2, 5, 3));
        assert_eq!(initial_data_size(&desc), 6 * (64 + 16 + 4));
    }

    #[test]
    fn compressed_tail_mips_are_skipped_but_still_advance() {
        let desc = TextureDescriptor {
            mip_levels: 0,
            ..TextureDescriptor::new_2d(8, 8, PixelFormat::Bc1RgbaUnorm)
        }
        .validate()
        .unwrap();
        let layout = initial_data_layout(&desc);
        assert_eq!(layout.len(), 4);
        assert_eq!(
            layout.iter().map(|u| u.skip).collect::<Vec<_>>(),
            vec![false, false, true, true]
        );
        assert_eq!(layout[1].offset, 32);
        assert_eq!(layout[2].offset, 40);
        assert_eq!(layout[3].offset, 48);
    }
}
