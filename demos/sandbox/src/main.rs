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

// Tessera Sandbox
// Renders a spinning triangle for a few frames on a headless driver and
// logs the device statistics.
//
// Usage: sandbox [config.ron]

use std::mem;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tessera_sdk::prelude::*;

const FRAMES: u32 = 8;
const DEFAULT_CONFIG: &str = "demos/sandbox/sandbox.ron";

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
}

impl Vertex {
    fn attributes() -> [VertexAttribute; 2] {
        [
            // location 0: position
            VertexAttribute::new(VertexFormat::Float32x3, 0),
            // location 1: color
            VertexAttribute::new(VertexFormat::Float32x3, mem::size_of::<[f32; 3]>() as u32),
        ]
    }
}

const VERTICES: &[Vertex] = &[
    Vertex {
        position: [0.0, 0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        position: [-0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        color: [0.0, 0.0, 1.0],
    },
];

const INDICES: &[u16] = &[0, 1, 2, 0];

/// Column-major rotation about Z.
fn rotation(angle: f32) -> [f32; 16] {
    let (sin, cos) = angle.sin_cos();
    [
        cos, sin, 0.0, 0.0, //
        -sin, cos, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

/// The reference compiler, told what the triangle shader declares.
fn compiler() -> NullCompiler {
    let attribute = |name: &str, location| ReflectedAttribute {
        name: name.to_string(),
        ty: "vec3".to_string(),
        location,
    };
    NullCompiler::new().with_reflection(
        ShaderStage::Vertex,
        ShaderReflection {
            ubos: vec![ReflectedBlock {
                name: "transform".to_string(),
                type_id: "_10".to_string(),
                block_size: 64,
                set: 0,
                binding: 0,
            }],
            inputs: vec![attribute("position", 0), attribute("color", 1)],
            ..Default::default()
        },
    )
}

/// Stands in for the SPIR-V an offline compiler would produce.
fn spirv_module() -> Vec<u8> {
    let words: [u32; 5] = [SPIRV_MAGIC, 0x0001_0000, 0, 16, 0];
    bytemuck::cast_slice(&words).to_vec()
}

struct Triangle {
    shader: Shader,
    vertices: Buffer,
    indices: Buffer,
    transform: Buffer,
    layout: InputLayout,
    rasterizer: RasterizerState,
    depth: DepthStencilState,
}

impl Triangle {
    fn new(device: &mut dyn GraphicsDevice) -> Result<Self> {
        let module = spirv_module();
        let shader = device
            .create_shader(
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
            )
            .context("Failed to create the triangle shader")?;

        let vertex_bytes: &[u8] = bytemuck::cast_slice(VERTICES);
        let vertices = device.create_buffer(
            &BufferDescriptor::new(BufferKind::Vertex, vertex_bytes.len() as u64),
            Some(vertex_bytes),
        )?;
        let index_bytes: &[u8] = bytemuck::cast_slice(INDICES);
        let indices = device.create_buffer(
            &BufferDescriptor::new(BufferKind::Index, index_bytes.len() as u64),
            Some(index_bytes),
        )?;
        let transform = device.create_buffer(
            &BufferDescriptor::new(BufferKind::Uniform, mem::size_of::<[f32; 16]>() as u64).dynamic(),
            None,
        )?;
        let layout = device.create_input_layout(&Vertex::attributes())?;
        let rasterizer = device.create_rasterizer_state(&RasterizerDescriptor::default())?;
        let depth = device.create_depth_stencil_state(&DepthStencilDescriptor::default())?;

        Ok(Self {
            shader,
            vertices,
            indices,
            transform,
            layout,
            rasterizer,
            depth,
        })
    }

    fn render(&self, device: &mut dyn GraphicsDevice, frame: u32) -> Result<()> {
        let matrix = rotation(frame as f32 * 0.1);
        let mut mapped = device.map_buffer(&self.transform)?;
        // SAFETY: the buffer stays mapped until the unmap below.
        unsafe { mapped.write(0, bytemuck::cast_slice(&matrix))? };
        device.unmap_buffer(&self.transform)?;

        device.clear(ClearValues::color([0.1, 0.1, 0.15, 1.0]).with_depth(1.0))?;
        device.set_shader(&self.shader)?;
        device.set_vertex_buffer(0, &self.vertices, mem::size_of::<Vertex>() as u32, &self.layout)?;
        device.set_index_buffer(&self.indices, IndexFormat::Uint16)?;
        device.set_uniform_buffer(0, &self.transform)?;
        device.set_rasterizer_state(&self.rasterizer)?;
        device.set_depth_stencil_state(&self.depth, None)?;
        device.set_primitive_topology(PrimitiveTopology::TriangleList)?;
        device.draw_indexed(3, 0, 0)?;
        device.present(1)?;
        Ok(())
    }

    fn dispose(mut self, device: &mut dyn GraphicsDevice) {
        device.dispose_shader(&mut self.shader);
        device.dispose_buffer(&mut self.vertices);
        device.dispose_buffer(&mut self.indices);
        device.dispose_buffer(&mut self.transform);
        device.dispose_input_layout(&mut self.layout);
        device.dispose_rasterizer_state(&mut self.rasterizer);
        device.dispose_depth_stencil_state(&mut self.depth);
    }
}

fn load_config() -> Result<DeviceConfig> {
    match std::env::args().nth(1) {
        Some(path) => DeviceConfig::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => DeviceConfig::load(DEFAULT_CONFIG),
        None => DeviceConfig::default().with_env_overrides(),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    log::info!("Sandbox configuration: {config:?}");

    let mut device = create_device(
        NativeDriver::null(config.backend),
        SurfaceHandle::web_canvas(1),
        config.extent(),
        config.options.clone(),
        Arc::new(compiler()),
    )
    .with_context(|| format!("Failed to create the {:?} device", config.backend))?;

    let triangle = Triangle::new(device.as_mut())?;
    for frame in 0..FRAMES {
        if frame == FRAMES / 2 {
            let half = Extent2D::new(config.width / 2, config.height / 2);
            device.resize_swapchain(half)?;
        }
        triangle.render(device.as_mut(), frame)?;
    }
    device.flush()?;

    let stats = device.stats();
    log::info!(
        "{:?}: {} frames, {} draws, {} triangles, {} redundant state calls skipped",
        device.backend(),
        stats.frames,
        stats.draw_calls,
        stats.triangles,
        stats.redundant_state_skips
    );

    triangle.dispose(device.as_mut());
    log::info!("Live resources after dispose: {}", device.live_resources().total());
    Ok(())
}
