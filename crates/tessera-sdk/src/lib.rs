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

//! The public-facing entry point of Tessera.
//!
//! Applications pick a native driver, hand over the surface they render into
//! and receive a boxed [`GraphicsDevice`]. Everything after construction goes
//! through that trait, so the rest of the application never names a backend.

pub mod config;

use std::fmt;
use std::sync::Arc;
use tessera_core::math::Extent2D;
use tessera_core::renderer::{
    BackendType, DeviceOptions, GraphicsDevice, RenderResult, ShaderCompiler, SurfaceHandle,
};
use tessera_infra::graphics::d3d11::D3d11Api;
use tessera_infra::graphics::gl::GlApi;
use tessera_infra::graphics::vulkan::VulkanApi;
use tessera_infra::{D3d11Device, GlDevice, VulkanDevice};

pub use self::config::DeviceConfig;

pub mod prelude {
    pub use crate::config::DeviceConfig;
    pub use crate::{create_device, NativeDriver};
    pub use tessera_core::renderer::shader::{
        ReflectedAttribute, ReflectedBlock, ReflectedTexture, ShaderReflection, SPIRV_MAGIC,
    };
    #[cfg(feature = "null")]
    pub use tessera_infra::graphics::null::NullCompiler;
    pub use tessera_core::math::{Extent2D, Extent3D, Origin3D};
    pub use tessera_core::renderer::{
        BackendType, BlendDescriptor, BlendState, Buffer, BufferDescriptor, BufferKind,
        ClearValues, DepthStencilDescriptor, DepthStencilState, DeviceOptions, DeviceStats,
        Framebuffer, FramebufferAttachment, GraphicsDevice, IndexFormat, InputLayout,
        PixelFormat, PrimitiveTopology, RasterizerDescriptor, RasterizerState, RenderError,
        RenderResult, SamplerDescriptor, SamplerState, Shader, ShaderCompiler, ShaderStage,
        ShaderStageDescriptor, SurfaceHandle, Texture, TextureDescriptor, TextureRegion,
        TextureUsage, UniformValue, VertexAttribute, VertexFormat,
    };
}

/// The native driver a device is built on.
///
/// Each variant carries the loaded entry points of one API family; the
/// variant alone decides which backend [`create_device`] builds.
pub enum NativeDriver {
    /// An OpenGL 4.x context provider.
    Gl(Box<dyn GlApi>),
    /// A Direct3D 11 device and DXGI factory.
    D3d11(Box<dyn D3d11Api>),
    /// A Vulkan 1.1 loader.
    Vulkan(Box<dyn VulkanApi>),
}

impl NativeDriver {
    /// The backend family this driver selects.
    pub fn backend(&self) -> BackendType {
        match self {
            Self::Gl(_) => BackendType::OpenGl,
            Self::D3d11(_) => BackendType::Direct3D11,
            Self::Vulkan(_) => BackendType::Vulkan,
        }
    }

    /// The headless reference driver of `backend`.
    #[cfg(feature = "null")]
    pub fn null(backend: BackendType) -> Self {
        use tessera_infra::graphics::null::{NullD3d11, NullGl, NullVulkan};
        match backend {
            BackendType::OpenGl => Self::Gl(Box::new(NullGl::new())),
            BackendType::Direct3D11 => Self::D3d11(Box::new(NullD3d11::new())),
            BackendType::Vulkan => Self::Vulkan(Box::new(NullVulkan::new())),
        }
    }
}

impl fmt::Debug for NativeDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gl(api) => f.debug_tuple("Gl").field(api).finish(),
            Self::D3d11(api) => f.debug_tuple("D3d11").field(api).finish(),
            Self::Vulkan(api) => f.debug_tuple("Vulkan").field(api).finish(),
        }
    }
}

/// Creates a device for `driver` rendering into `surface`.
///
/// ## Arguments
/// * `driver` - The native entry points; the variant selects the backend.
/// * `surface` - The window the swapchain presents to.
/// * `initial_size` - The back-buffer size in pixels.
/// * `options` - Construction options shared by every backend.
/// * `compiler` - The cross-compiler used to turn SPIR-V into native shaders.
///
/// ## Errors
/// Invalid options are a `Configuration` error; a failing native call while
/// building the context or swapchain is a `Device` error. Nothing created
/// before the failure is leaked.
pub fn create_device(
    driver: NativeDriver,
    surface: SurfaceHandle,
    initial_size: Extent2D,
    options: DeviceOptions,
    compiler: Arc<dyn ShaderCompiler>,
) -> RenderResult<Box<dyn GraphicsDevice>> {
    log::info!(
        "Creating {:?} device ({}x{})",
        driver.backend(),
        initial_size.width,
        initial_size.height
    );
    let device: Box<dyn GraphicsDevice> = match driver {
        NativeDriver::Gl(api) => Box::new(GlDevice::new(
            api,
            &surface,
            initial_size,
            options,
            compiler,
        )?),
        NativeDriver::D3d11(api) => Box::new(D3d11Device::new(
            api,
            &surface,
            initial_size,
            options,
            compiler,
        )?),
        NativeDriver::Vulkan(api) => Box::new(VulkanDevice::new(
            api,
            &surface,
            initial_size,
            options,
            compiler,
        )?),
    };
    Ok(device)
}
