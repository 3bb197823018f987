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

//! Types shared by every part of the device contract: backend selection,
//! resource identity, construction options and per-frame values.

use crate::math::Extent2D;
use crate::renderer::api::format::PixelFormat;
use raw_window_handle::{
    HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
    WebDisplayHandle, WebWindowHandle,
};
use serde::{Deserialize, Serialize};

/// The native API family a device drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendType {
    /// Immediate, bind-to-edit API with a global state machine.
    OpenGl,
    /// Deferred-context API with reference-counted native objects.
    Direct3D11,
    /// Explicit API with manual GPU synchronization.
    Vulkan,
}

/// Device-unique identity of a created resource.
///
/// Identifiers are never reused by a device, so they can key caches that
/// outlive the resource they were taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

/// Hands out monotonically increasing [`ResourceId`]s.
#[derive(Debug, Default)]
pub struct ResourceIdAllocator {
    next: u64,
}

impl ResourceIdAllocator {
    /// Returns a fresh identifier.
    pub fn allocate(&mut self) -> ResourceId {
        self.next += 1;
        ResourceId(self.next)
    }
}

/// The presentable surface a device renders into.
///
/// Acquiring the handles is the windowing layer's job; the device only
/// forwards them to the native driver when it creates its swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle {
    /// The raw window handle.
    pub window: RawWindowHandle,
    /// The raw display handle.
    pub display: RawDisplayHandle,
}

impl SurfaceHandle {
    /// Wraps already-extracted raw handles.
    pub fn new(window: RawWindowHandle, display: RawDisplayHandle) -> Self {
        Self { window, display }
    }

    /// Extracts the raw handles from a window object.
    pub fn from_window<W: HasWindowHandle + HasDisplayHandle>(
        window: &W,
    ) -> Result<Self, HandleError> {
        Ok(Self {
            window: window.window_handle()?.as_raw(),
            display: window.display_handle()?.as_raw(),
        })
    }

    /// A surface identified only by a canvas id. Useful for headless drivers.
    pub fn web_canvas(id: u32) -> Self {
        Self {
            window: RawWindowHandle::Web(WebWindowHandle::new(id)),
            display: RawDisplayHandle::Web(WebDisplayHandle::new()),
        }
    }
}

/// Options fixed at device construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceOptions {
    /// Enables native validation (debug output, debug layer, validation layers).
    pub debug: bool,
    /// Format of the swapchain color images.
    pub color_format: PixelFormat,
    /// Format of the back-buffer depth/stencil surface, if any.
    pub depth_stencil_format: Option<PixelFormat>,
    /// Requested number of swapchain images.
    pub swapchain_image_count: u32,
    /// Filters redundant `set_*` calls through the pipeline state cache.
    pub state_cache: bool,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            debug: false,
            color_format: PixelFormat::B8G8R8A8UnormSrgb,
            depth_stencil_format: Some(PixelFormat::D24UnormS8Uint),
            swapchain_image_count: 3,
            state_cache: true,
        }
    }
}

/// Size and format of the presentable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainState {
    /// Current size in pixels.
    pub extent: Extent2D,
    /// Number of images in the presentation queue.
    pub image_count: u32,
    /// Color format of the images.
    pub color_format: PixelFormat,
    /// Format of the back-buffer depth/stencil surface.
    pub depth_stencil_format: Option<PixelFormat>,
}

/// Values written by [`GraphicsDevice::clear`]. `None` leaves the aspect untouched.
///
/// [`GraphicsDevice::clear`]: crate::renderer::traits::GraphicsDevice::clear
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearValues {
    /// RGBA clear color applied to every color attachment.
    pub color: Option<[f32; 4]>,
    /// Depth clear value.
    pub depth: Option<f32>,
    /// Stencil clear value.
    pub stencil: Option<u8>,
}

impl ClearValues {
    /// Clears color only.
    pub fn color(rgba: [f32; 4]) -> Self {
        Self {
            color: Some(rgba),
            ..Self::default()
        }
    }

    /// Adds a depth clear.
    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Adds a stencil clear.
    pub fn with_stencil(mut self, stencil: u8) -> Self {
        self.stencil = Some(stencil);
        self
    }

    /// Returns `true` if nothing would be cleared.
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.depth.is_none() && self.stencil.is_none()
    }
}

/// A legacy loose uniform value, addressed by name on the current shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// A single float.
    Float(f32),
    /// A single signed integer (also used for sampler units).
    Int(i32),
}
