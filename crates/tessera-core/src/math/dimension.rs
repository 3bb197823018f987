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

//! Provides structs for representing extents (sizes) and origins (offsets) in 2D and 3D.
//!
//! These types describe the dimensions of textures, swapchains and the
//! regions within them. They use integer (`u32`) components, making them
//! suitable for pixel-based coordinates and sizes.

use serde::{Deserialize, Serialize};

/// A two-dimensional extent, typically representing width and height.
///
/// This is commonly used for swapchain and framebuffer sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either component is zero.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A three-dimensional extent, representing width, height, and depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
    /// The depth component of the extent (1 for anything but volume textures).
    pub depth: u32,
}

impl Extent3D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// The largest of the three components.
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height).max(self.depth)
    }

    /// Size of the given mip level: every component halves per level,
    /// rounding down, and never drops below 1.
    pub fn mip_level_size(&self, level: u32) -> Self {
        let shrink = |v: u32| v.checked_shr(level).unwrap_or(0).max(1);
        Self {
            width: shrink(self.width),
            height: shrink(self.height),
            depth: shrink(self.depth),
        }
    }

    /// Total number of texels covered by this extent.
    pub fn volume(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }

    /// Drops the depth component.
    pub const fn to_2d(&self) -> Extent2D {
        Extent2D {
            width: self.width,
            height: self.height,
        }
    }
}

/// A three-dimensional origin, representing an (x, y, z) offset.
///
/// This is often used to specify the corner of a 3D box inside a texture
/// subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Origin3D {
    /// The x-coordinate of the origin.
    pub x: u32,
    /// The y-coordinate of the origin.
    pub y: u32,
    /// The z-coordinate of the origin.
    pub z: u32,
}

impl Origin3D {
    /// The origin at `(0, 0, 0)`.
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    /// Creates a new origin.
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_level_size_halves_with_floor_of_one() {
        let base = Extent3D::new(300, 17, 1);
        assert_eq!(base.mip_level_size(0), base);
        assert_eq!(base.mip_level_size(1), Extent3D::new(150, 8, 1));
        assert_eq!(base.mip_level_size(5), Extent3D::new(9, 1, 1));
        assert_eq!(base.mip_level_size(40), Extent3D::new(1, 1, 1));
    }

    #[test]
    fn empty_extent_detection() {
        assert!(Extent2D::new(0, 720).is_empty());
        assert!(!Extent2D::new(1280, 720).is_empty());
    }
}
