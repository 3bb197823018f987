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

#![allow(dead_code)]

use anyhow::Result;
use std::sync::Arc;
use tessera_core::math::Extent2D;
use tessera_core::renderer::shader::{
    ReflectedAttribute, ReflectedBlock, ReflectedTexture, ShaderReflection, SPIRV_MAGIC,
};
use tessera_core::renderer::*;
use tessera_infra::graphics::null::{NullCompiler, NullD3d11, NullGl, NullVulkan};
use tessera_infra::{D3d11Device, GlDevice, VulkanDevice};

/// Back-buffer size used by every test device.
pub const SURFACE_SIZE: Extent2D = Extent2D::new(64, 48);

/// Binding of sampled textures in the explicit backend's descriptor set.
pub const VULKAN_TEXTURE_BINDING: u32 = 16;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A minimal module: magic, version 1.0, generator, bound and schema.
pub fn spirv_module() -> Vec<u8> {
    [SPIRV_MAGIC, 0x0001_0000, 0, 16, 0]
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect()
}

/// A compiler whose vertex stage reads a 64-byte `camera` block and whose
/// fragment stage samples `albedo` at `texture_binding`.
pub fn compiler(texture_binding: u32) -> NullCompiler {
    NullCompiler::new()
        .with_reflection(
            ShaderStage::Vertex,
            ShaderReflection {
                ubos: vec![ReflectedBlock {
                    name: "camera".to_string(),
                    type_id: "_12".to_string(),
                    block_size: 64,
                    set: 0,
                    binding: 0,
                }],
                inputs: vec![ReflectedAttribute {
                    name: "position".to_string(),
                    ty: "vec3".to_string(),
                    location: 0,
                }],
                ..Default::default()
            },
        )
        .with_reflection(
            ShaderStage::Fragment,
            ShaderReflection {
                textures: vec![ReflectedTexture {
                    name: "albedo".to_string(),
                    ty: "sampler2D".to_string(),
                    set: 0,
                    binding: texture_binding,
                }],
                ..Default::default()
            },
        )
}

pub fn options(state_cache: bool) -> DeviceOptions {
    DeviceOptions {
        state_cache,
        ..DeviceOptions::default()
    }
}

pub fn gl_device(options: DeviceOptions, compiler: NullCompiler) -> Result<GlDevice> {
    init_logging();
    Ok(GlDevice::new(
        Box::new(NullGl::new()),
        &SurfaceHandle::web_canvas(1),
        SURFACE_SIZE,
        options,
        Arc::new(compiler),
    )?)
}

pub fn d3d11_device(options: DeviceOptions, compiler: NullCompiler) -> Result<D3d11Device> {
    init_logging();
    Ok(D3d11Device::new(
        Box::new(NullD3d11::new()),
        &SurfaceHandle::web_canvas(1),
        SURFACE_SIZE,
        options,
        Arc::new(compiler),
    )?)
}

pub fn vulkan_device(options: DeviceOptions, compiler: NullCompiler) -> Result<VulkanDevice> {
    init_logging();
    Ok(VulkanDevice::new(
        Box::new(NullVulkan::new()),
        &SurfaceHandle::web_canvas(1),
        SURFACE_SIZE,
        options,
        Arc::new(compiler),
    )?)
}

pub fn gl_driver(device: &GlDevice) -> &NullGl {
    device
        .api()
        .as_any()
        .downcast_ref::<NullGl>()
        .expect("device runs on the null GL driver")
}

pub fn d3d11_driver(device: &D3d11Device) -> &NullD3d11 {
    device
        .api()
        .as_any()
        .downcast_ref::<NullD3d11>()
        .expect("device runs on the null D3D11 driver")
}

pub fn vulkan_driver(device: &VulkanDevice) -> &NullVulkan {
    device
        .api()
        .as_any()
        .downcast_ref::<NullVulkan>()
        .expect("device runs on the null Vulkan driver")
}

/// One triangle with everything a textured draw needs.
pub struct Scene {
    pub shader: Shader,
    pub vertices: Buffer,
    pub indices: Buffer,
    pub camera: Buffer,
    pub layout: InputLayout,
    pub texture: Texture,
    pub sampler: SamplerState,
    pub blend: BlendState,
    pub opaque: BlendState,
    pub depth: DepthStencilState,
    pub rasterizer: RasterizerState,
}

impl Scene {
    pub fn create(device: &mut dyn GraphicsDevice) -> Result<Self> {
        let module = spirv_module();
        let shader = device.create_shader(
            &[
                ShaderStageDescriptor {
                    stage: ShaderStage::Vertex,
                    bytecode: &module,
                    entry_point: "main",
                },
                ShaderStageDescriptor {
                    stage: ShaderStage::Fragment,
                    bytecode: &module,
                    entry_point: "main",
                },
            ],
            &[],
        )?;

        let positions: [f32; 9] = [-0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.0, 0.5, 0.0];
        let vertices = device.create_buffer(
            &BufferDescriptor::new(BufferKind::Vertex, 36),
            Some(bytemuck::cast_slice(&positions)),
        )?;
        let triangle: [u16; 4] = [0, 1, 2, 0];
        let indices = device.create_buffer(
            &BufferDescriptor::new(BufferKind::Index, 8),
            Some(bytemuck::cast_slice(&triangle)),
        )?;
        let camera = device.create_buffer(&BufferDescriptor::new(BufferKind::Uniform, 64).dynamic(), None)?;
        let layout = device.create_input_layout(&[VertexAttribute::new(VertexFormat::Float32x3, 0)])?;

        let texels = [0xffu8; 4 * 4 * 4];
        let texture = device.create_texture(
            &TextureDescriptor::new_2d(4, 4, PixelFormat::R8G8B8A8Unorm),
            Some(&texels),
        )?;
        let sampler = device.create_sampler_state(&SamplerDescriptor::default())?;
        let blend = device.create_blend_state(&BlendDescriptor::alpha_blending())?;
        let opaque = device.create_blend_state(&BlendDescriptor::default())?;
        let depth = device.create_depth_stencil_state(&DepthStencilDescriptor::default())?;
        let rasterizer = device.create_rasterizer_state(&RasterizerDescriptor::default())?;

        Ok(Self {
            shader,
            vertices,
            indices,
            camera,
            layout,
            texture,
            sampler,
            blend,
            opaque,
            depth,
            rasterizer,
        })
    }

    /// Binds the full pipeline state.
    pub fn bind(&self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        device.set_shader(&self.shader)?;
        device.set_vertex_buffer(0, &self.vertices, 12, &self.layout)?;
        device.set_index_buffer(&self.indices, IndexFormat::Uint16)?;
        device.set_uniform_buffer(0, &self.camera)?;
        device.set_texture(0, &self.texture, &self.sampler)?;
        device.set_rasterizer_state(&self.rasterizer)?;
        device.set_blend_state(&self.opaque)?;
        device.set_depth_stencil_state(&self.depth, None)?;
        device.set_primitive_topology(PrimitiveTopology::TriangleList)
    }

    /// A fixed command stream with plenty of redundant binds: two frames of
    /// three draws each, rebinding the same state before every draw.
    pub fn record_frames(&self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        for _ in 0..2 {
            device.clear(ClearValues::color([0.1, 0.2, 0.3, 1.0]).with_depth(1.0))?;
            self.bind(device)?;
            device.draw(3, 0)?;

            self.bind(device)?;
            device.set_blend_state(&self.blend)?;
            device.draw_indexed(3, 0, 0)?;

            self.bind(device)?;
            device.set_depth_stencil_state(&self.depth, Some(0))?;
            device.draw_indexed_instanced(3, 4)?;
            device.present(1)?;
        }
        Ok(())
    }

    pub fn dispose(mut self, device: &mut dyn GraphicsDevice) {
        device.dispose_shader(&mut self.shader);
        device.dispose_buffer(&mut self.vertices);
        device.dispose_buffer(&mut self.indices);
        device.dispose_buffer(&mut self.camera);
        device.dispose_input_layout(&mut self.layout);
        device.dispose_texture(&mut self.texture);
        device.dispose_sampler_state(&mut self.sampler);
        device.dispose_blend_state(&mut self.blend);
        device.dispose_blend_state(&mut self.opaque);
        device.dispose_depth_stencil_state(&mut self.depth);
        device.dispose_rasterizer_state(&mut self.rasterizer);
    }
}
