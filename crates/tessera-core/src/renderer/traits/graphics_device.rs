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

use crate::math::Extent2D;
use crate::renderer::api::*;
use crate::renderer::error::RenderResult;
use std::any::Any;
use std::fmt::Debug;

/// The command and resource contract every backend implements.
///
/// A device is single-threaded: every method takes `&mut self` and returns
/// once the work has been recorded or executed. Resources are owned by the
/// caller; the device only creates them and releases their native objects
/// when asked to. Passing a resource created by another backend, or one that
/// has already been disposed, is a [`Configuration`] error.
///
/// [`Configuration`]: crate::renderer::RenderError::Configuration
pub trait GraphicsDevice: Debug {
    /// The backend family of this device.
    fn backend(&self) -> BackendType;

    /// The current presentable surface.
    fn swapchain(&self) -> SwapchainState;

    /// Draw and frame statistics since creation.
    fn stats(&self) -> DeviceStats;

    /// Number of live resources per kind.
    fn live_resources(&self) -> ResourceCounters;

    /// Creates a buffer, optionally filled with `data`.
    /// ## Arguments
    /// * `desc` - The buffer description. `desc.size` must be non-zero.
    /// * `data` - Initial contents. Must be exactly `desc.size` bytes long.
    /// ## Errors
    /// * `Configuration` - If the size or data length is invalid.
    /// * `Device` - If the native allocation fails.
    fn create_buffer(&mut self, desc: &BufferDescriptor, data: Option<&[u8]>)
        -> RenderResult<Buffer>;

    /// Creates a texture. `desc.mip_levels == 0` requests the full chain.
    ///
    /// Initial data, when given, holds every subresource back to back, array
    /// layers (cube faces included) outermost and mip levels innermost.
    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> RenderResult<Texture>;

    /// Translates, compiles and links a set of stages into one bindable shader.
    /// ## Errors
    /// * `Shader(Translation)` - If the cross-compiler rejects a stage.
    /// * `Shader(NativeCompilation)` - If the native compiler or linker rejects the result.
    fn create_shader(
        &mut self,
        stages: &[ShaderStageDescriptor<'_>],
        specialization: &[SpecializationConstant],
    ) -> RenderResult<Shader>;

    /// Creates an input layout. Attribute `i` feeds shader input location `i`.
    fn create_input_layout(&mut self, attributes: &[VertexAttribute]) -> RenderResult<InputLayout>;

    /// Creates an immutable blend state.
    fn create_blend_state(&mut self, desc: &BlendDescriptor) -> RenderResult<BlendState>;

    /// Creates an immutable depth/stencil state.
    fn create_depth_stencil_state(
        &mut self,
        desc: &DepthStencilDescriptor,
    ) -> RenderResult<DepthStencilState>;

    /// Creates an immutable rasterizer state.
    fn create_rasterizer_state(
        &mut self,
        desc: &RasterizerDescriptor,
    ) -> RenderResult<RasterizerState>;

    /// Creates an immutable sampler.
    fn create_sampler_state(&mut self, desc: &SamplerDescriptor) -> RenderResult<SamplerState>;

    /// Creates an offscreen framebuffer. At most one attachment may have a depth format.
    fn create_framebuffer(
        &mut self,
        attachments: &[FramebufferAttachment<'_>],
    ) -> RenderResult<Framebuffer>;

    /// Writes `data` into `buffer` at byte `offset`.
    fn update_buffer(&mut self, buffer: &Buffer, offset: u64, data: &[u8]) -> RenderResult<()>;

    /// Maps a dynamic buffer for writing. Previous contents are discarded.
    ///
    /// The mapping stays valid until the matching [`unmap_buffer`](Self::unmap_buffer).
    fn map_buffer(&mut self, buffer: &Buffer) -> RenderResult<MappedResource>;

    /// Ends a mapping started by [`map_buffer`](Self::map_buffer).
    fn unmap_buffer(&mut self, buffer: &Buffer) -> RenderResult<()>;

    /// Replaces one box of one subresource. `data` must match the box exactly.
    fn update_texture(
        &mut self,
        texture: &Texture,
        region: &TextureRegion,
        data: &[u8],
    ) -> RenderResult<()>;

    /// Releases a buffer. Later calls are no-ops.
    fn dispose_buffer(&mut self, buffer: &mut Buffer);
    /// Releases a texture. Later calls are no-ops.
    fn dispose_texture(&mut self, texture: &mut Texture);
    /// Releases a shader. Later calls are no-ops.
    fn dispose_shader(&mut self, shader: &mut Shader);
    /// Releases an input layout. Later calls are no-ops.
    fn dispose_input_layout(&mut self, layout: &mut InputLayout);
    /// Releases a blend state. Later calls are no-ops.
    fn dispose_blend_state(&mut self, state: &mut BlendState);
    /// Releases a depth/stencil state. Later calls are no-ops.
    fn dispose_depth_stencil_state(&mut self, state: &mut DepthStencilState);
    /// Releases a rasterizer state. Later calls are no-ops.
    fn dispose_rasterizer_state(&mut self, state: &mut RasterizerState);
    /// Releases a sampler. Later calls are no-ops.
    fn dispose_sampler_state(&mut self, state: &mut SamplerState);
    /// Releases a framebuffer. Later calls are no-ops.
    fn dispose_framebuffer(&mut self, framebuffer: &mut Framebuffer);

    /// Binds every stage of `shader` at once.
    fn set_shader(&mut self, shader: &Shader) -> RenderResult<()>;

    /// Binds `buffer` to vertex slot `slot`, read through `layout`.
    fn set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: &Buffer,
        stride: u32,
        layout: &InputLayout,
    ) -> RenderResult<()>;

    /// Binds the index buffer used by indexed draws.
    fn set_index_buffer(&mut self, buffer: &Buffer, format: IndexFormat) -> RenderResult<()>;

    /// Binds a uniform (or storage) buffer to binding `slot`.
    fn set_uniform_buffer(&mut self, slot: u32, buffer: &Buffer) -> RenderResult<()>;

    /// Binds a texture together with its sampler to binding `slot`.
    fn set_texture(
        &mut self,
        slot: u32,
        texture: &Texture,
        sampler: &SamplerState,
    ) -> RenderResult<()>;

    /// Binds a rasterizer state.
    fn set_rasterizer_state(&mut self, state: &RasterizerState) -> RenderResult<()>;

    /// Binds a blend state.
    fn set_blend_state(&mut self, state: &BlendState) -> RenderResult<()>;

    /// Binds a depth/stencil state. `None` uses a stencil reference of 0.
    fn set_depth_stencil_state(
        &mut self,
        state: &DepthStencilState,
        stencil_ref: Option<u32>,
    ) -> RenderResult<()>;

    /// Selects how vertices are assembled into primitives.
    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> RenderResult<()>;

    /// Redirects rendering to `framebuffer`, or back to the swapchain with `None`.
    fn set_framebuffer(&mut self, framebuffer: Option<&Framebuffer>) -> RenderResult<()>;

    /// Sets a loose uniform on the bound shader by name.
    /// ## Errors
    /// * `Unsupported` - On backends without named loose uniforms.
    fn set_uniform_value(&mut self, name: &str, value: UniformValue) -> RenderResult<()>;

    /// Draws `vertex_count` vertices starting at `start_vertex`.
    fn draw(&mut self, vertex_count: u32, start_vertex: u32) -> RenderResult<()>;

    /// Draws `index_count` indices from the bound index buffer.
    fn draw_indexed(
        &mut self,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) -> RenderResult<()>;

    /// Draws `instance_count` instances of the first `index_count` indices.
    fn draw_indexed_instanced(&mut self, index_count: u32, instance_count: u32)
        -> RenderResult<()>;

    /// Runs the bound compute shader over an `x * y * z` grid of work groups.
    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> RenderResult<()>;

    /// Clears the attachments of the bound framebuffer.
    fn clear(&mut self, values: ClearValues) -> RenderResult<()>;

    /// Presents the back buffer. `swap_interval` 0 disables vsync.
    fn present(&mut self, swap_interval: u32) -> RenderResult<()>;

    /// Recreates the back buffer at `size`. An empty size is ignored.
    fn resize_swapchain(&mut self, size: Extent2D) -> RenderResult<()>;

    /// Blocks until previously submitted work has been handed to the GPU.
    fn flush(&mut self) -> RenderResult<()>;

    /// Enables downcasting to the concrete device type.
    fn as_any(&self) -> &dyn Any;
}
