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

//! The neutral pixel format catalog and the pitch/mip arithmetic built on it.
//!
//! Native format tables live with each backend (their `conversions` modules);
//! this module only knows sizes and block layout, which are the same on every
//! API.

use crate::math::Extent3D;
use serde::{Deserialize, Serialize};

/// A texel format understood by every backend.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    R8Unorm,
    R8G8Unorm,
    R8G8B8A8Unorm,
    R8G8B8A8UnormSrgb,
    B8G8R8A8Unorm,
    B8G8R8A8UnormSrgb,
    R16Float,
    R16G16Float,
    R16G16B16A16Float,
    R32Float,
    R32Uint,
    R32G32Float,
    R32G32B32Float,
    R32G32B32A32Float,
    R10G10B10A2Unorm,
    R11G11B10Float,
    Bc1RgbaUnorm,
    Bc1RgbaUnormSrgb,
    Bc2Unorm,
    Bc3Unorm,
    Bc3UnormSrgb,
    Bc4Unorm,
    Bc5Unorm,
    Bc7Unorm,
    Bc7UnormSrgb,
    D16Unorm,
    D24UnormS8Uint,
    D32Float,
    D32FloatS8Uint,
}

/// Why a native format is requested. Depth formats resolve to a different
/// native face depending on the intent; every other format ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatUsage {
    /// Storage or views bound as a render/depth target.
    Attachment,
    /// Storage that is also sampled from a shader.
    ShaderRead,
}

/// Row pitch of one texel row (or one row of 4x4 blocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pitch {
    /// Bytes between the starts of two consecutive rows.
    pub row_pitch: u32,
    /// Bits per texel, averaged over a block for compressed formats.
    pub bits_per_pixel: u32,
}

/// Edge length of a compression block in texels.
pub const BLOCK_DIMENSION: u32 = 4;

impl PixelFormat {
    /// Every format in the catalog.
    pub const ALL: [PixelFormat; 29] = [
        PixelFormat::R8Unorm,
        PixelFormat::R8G8Unorm,
        PixelFormat::R8G8B8A8Unorm,
        PixelFormat::R8G8B8A8UnormSrgb,
        PixelFormat::B8G8R8A8Unorm,
        PixelFormat::B8G8R8A8UnormSrgb,
        PixelFormat::R16Float,
        PixelFormat::R16G16Float,
        PixelFormat::R16G16B16A16Float,
        PixelFormat::R32Float,
        PixelFormat::R32Uint,
        PixelFormat::R32G32Float,
        PixelFormat::R32G32B32Float,
        PixelFormat::R32G32B32A32Float,
        PixelFormat::R10G10B10A2Unorm,
        PixelFormat::R11G11B10Float,
        PixelFormat::Bc1RgbaUnorm,
        PixelFormat::Bc1RgbaUnormSrgb,
        PixelFormat::Bc2Unorm,
        PixelFormat::Bc3Unorm,
        PixelFormat::Bc3UnormSrgb,
        PixelFormat::Bc4Unorm,
        PixelFormat::Bc5Unorm,
        PixelFormat::Bc7Unorm,
        PixelFormat::Bc7UnormSrgb,
        PixelFormat::D16Unorm,
        PixelFormat::D24UnormS8Uint,
        PixelFormat::D32Float,
        PixelFormat::D32FloatS8Uint,
    ];

    /// Bits per texel. For block-compressed formats this is the block size
    /// divided by the 16 texels it covers.
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Bc1RgbaUnorm | PixelFormat::Bc1RgbaUnormSrgb | PixelFormat::Bc4Unorm => 4,
            PixelFormat::R8Unorm
            | PixelFormat::Bc2Unorm
            | PixelFormat::Bc3Unorm
            | PixelFormat::Bc3UnormSrgb
            | PixelFormat::Bc5Unorm
            | PixelFormat::Bc7Unorm
            | PixelFormat::Bc7UnormSrgb => 8,
            PixelFormat::R8G8Unorm | PixelFormat::R16Float | PixelFormat::D16Unorm => 16,
            PixelFormat::R8G8B8A8Unorm
            | PixelFormat::R8G8B8A8UnormSrgb
            | PixelFormat::B8G8R8A8Unorm
            | PixelFormat::B8G8R8A8UnormSrgb
            | PixelFormat::R16G16Float
            | PixelFormat::R32Float
            | PixelFormat::R32Uint
            | PixelFormat::R10G10B10A2Unorm
            | PixelFormat::R11G11B10Float
            | PixelFormat::D24UnormS8Uint
            | PixelFormat::D32Float => 32,
            PixelFormat::R16G16B16A16Float
            | PixelFormat::R32G32Float
            | PixelFormat::D32FloatS8Uint => 64,
            PixelFormat::R32G32B32Float => 96,
            PixelFormat::R32G32B32A32Float => 128,
        }
    }

    /// Byte size of one 4x4 block, or `None` for uncompressed formats.
    pub const fn block_size(self) -> Option<u32> {
        match self {
            PixelFormat::Bc1RgbaUnorm | PixelFormat::Bc1RgbaUnormSrgb | PixelFormat::Bc4Unorm => {
                Some(8)
            }
            PixelFormat::Bc2Unorm
            | PixelFormat::Bc3Unorm
            | PixelFormat::Bc3UnormSrgb
            | PixelFormat::Bc5Unorm
            | PixelFormat::Bc7Unorm
            | PixelFormat::Bc7UnormSrgb => Some(16),
            _ => None,
        }
    }

    /// Returns `true` for block-compressed formats.
    pub const fn is_compressed(self) -> bool {
        self.block_size().is_some()
    }

    /// Returns `true` for depth and depth/stencil formats.
    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            PixelFormat::D16Unorm
                | PixelFormat::D24UnormS8Uint
                | PixelFormat::D32Float
                | PixelFormat::D32FloatS8Uint
        )
    }

    /// Returns `true` if the format carries a stencil aspect.
    pub const fn has_stencil(self) -> bool {
        matches!(self, PixelFormat::D24UnormS8Uint | PixelFormat::D32FloatS8Uint)
    }

    /// Returns `true` for sRGB-encoded color formats.
    pub const fn is_srgb(self) -> bool {
        matches!(
            self,
            PixelFormat::R8G8B8A8UnormSrgb
                | PixelFormat::B8G8R8A8UnormSrgb
                | PixelFormat::Bc1RgbaUnormSrgb
                | PixelFormat::Bc3UnormSrgb
                | PixelFormat::Bc7UnormSrgb
        )
    }
}

/// Computes the row pitch of `width` texels.
///
/// Block-compressed formats count whole 4x4 blocks (at least one); other
/// formats use `ceil(width * bits_per_pixel / 8)`.
pub fn calculate_pitch(format: PixelFormat, width: u32) -> Pitch {
    let bits_per_pixel = format.bits_per_pixel();
    let row_pitch = match format.block_size() {
        Some(block_size) => width.div_ceil(BLOCK_DIMENSION).max(1) * block_size,
        None => (width as u64 * bits_per_pixel as u64).div_ceil(8) as u32,
    };
    Pitch {
        row_pitch,
        bits_per_pixel,
    }
}

/// Number of texel rows (or block rows) making up `height`.
pub fn calculate_row_count(format: PixelFormat, height: u32) -> u32 {
    if format.is_compressed() {
        height.div_ceil(BLOCK_DIMENSION).max(1)
    } else {
        height
    }
}

/// Bytes between two depth slices of a `width x height` region.
pub fn calculate_slice_pitch(format: PixelFormat, width: u32, height: u32) -> u64 {
    calculate_pitch(format, width).row_pitch as u64 * calculate_row_count(format, height) as u64
}

/// Bytes occupied by a tightly packed region of the given size.
pub fn calculate_region_size(format: PixelFormat, extent: Extent3D) -> u64 {
    calculate_slice_pitch(format, extent.width, extent.height) * extent.depth as u64
}

/// Length of the full mip chain for the given base size:
/// `floor(log2(max(width, height, depth))) + 1`.
pub fn calculate_mip_levels(width: u32, height: u32, depth: u32) -> u32 {
    let largest = width.max(height).max(depth).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Returns `true` if an upload of `width x height` texels is smaller than a
/// single compression block. Such uploads are skipped.
pub fn is_sub_block_upload(format: PixelFormat, width: u32, height: u32) -> bool {
    match format.block_size() {
        Some(block_size) => {
            let bits = width as u64 * height as u64 * format.bits_per_pixel() as u64;
            bits.div_ceil(8) < block_size as u64
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_levels_follow_largest_dimension() {
        assert_eq!(calculate_mip_levels(256, 256, 1), 9);
        assert_eq!(calculate_mip_levels(1, 1, 1), 1);
        assert_eq!(calculate_mip_levels(300, 1, 1), 9);
        assert_eq!(calculate_mip_levels(1, 1, 64), 7);
    }

    #[test]
    fn uncompressed_pitch_rounds_up_to_bytes() {
        assert_eq!(calculate_pitch(PixelFormat::R8G8B8A8Unorm, 4).row_pitch, 16);
        assert_eq!(calculate_pitch(PixelFormat::R32G32B32Float, 3).row_pitch, 36);
        assert_eq!(calculate_pitch(PixelFormat::R8Unorm, 5).row_pitch, 5);
    }

    #[test]
    fn compressed_pitch_counts_whole_blocks() {
        assert_eq!(calculate_pitch(PixelFormat::Bc1RgbaUnorm, 8).row_pitch, 16);
        assert_eq!(calculate_pitch(PixelFormat::Bc1RgbaUnorm, 5).row_pitch, 16);
        assert_eq!(calculate_pitch(PixelFormat::Bc3Unorm, 1).row_pitch, 16);
        assert_eq!(
            calculate_region_size(PixelFormat::Bc7Unorm, Extent3D::new(8, 8, 1)),
            64
        );
    }

    #[test]
    fn every_format_has_positive_pitch() {
        for format in PixelFormat::ALL {
            let pitch = calculate_pitch(format, 1);
            assert!(pitch.row_pitch > 0, "{format:?} produced an empty row");
            assert!(pitch.bits_per_pixel > 0);
        }
    }

    #[test]
    fn sub_block_uploads_are_detected() {
        assert!(is_sub_block_upload(PixelFormat::Bc1RgbaUnorm, 2, 2));
        assert!(!is_sub_block_upload(PixelFormat::Bc1RgbaUnorm, 4, 4));
        assert!(is_sub_block_upload(PixelFormat::Bc3Unorm, 2, 4));
        assert!(!is_sub_block_upload(PixelFormat::R8Unorm, 1, 1));
    }
}
