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

mod common;

use anyhow::Result;
use common::*;
use tessera_core::math::Extent2D;
use tessera_core::renderer::api::*;
use tessera_core::renderer::GraphicsDevice;
use tessera_infra::graphics::d3d11::HResult;
use tessera_infra::graphics::gl::consts as gl;
use tessera_infra::graphics::vulkan::VkResult;
use tessera_infra::{D3d11Device, GlDevice, VulkanDevice};

/// Runs the same frames on two devices and returns their stats.
fn run_both<D: GraphicsDevice>(
    cached: &mut D,
    uncached: &mut D,
) -> Result<(tessera_core::renderer::DeviceStats, tessera_core::renderer::DeviceStats)> {
    for device in [&mut *cached, &mut *uncached] {
        let scene = Scene::create(device)?;
        scene.record_frames(device)?;
        scene.dispose(device);
    }
    Ok((cached.stats(), uncached.stats()))
}

#[test]
fn test_gl_draw_state_is_identical_with_and_without_cache() -> Result<()> {
    let mut cached = gl_device(options(true), compiler(0))?;
    let mut uncached = gl_device(options(false), compiler(0))?;
    let (with_cache, without_cache) = run_both(&mut cached, &mut uncached)?;

    let expected = gl_driver(&uncached).ledger().draws();
    assert_eq!(expected.len(), 6);
    assert_eq!(gl_driver(&cached).ledger().draws(), expected);

    assert!(with_cache.redundant_state_skips > 0);
    assert_eq!(without_cache.redundant_state_skips, 0);
    assert_eq!(with_cache.draw_calls, without_cache.draw_calls);
    // Skipped binds never reach the driver.
    assert!(
        gl_driver(&cached).ledger().call_count("glUseProgram")
            < gl_driver(&uncached).ledger().call_count("glUseProgram")
    );
    Ok(())
}

#[test]
fn test_d3d11_draw_state_is_identical_with_and_without_cache() -> Result<()> {
    let mut cached = d3d11_device(options(true), compiler(0))?;
    let mut uncached = d3d11_device(options(false), compiler(0))?;
    let (with_cache, without_cache) = run_both(&mut cached, &mut uncached)?;

    let expected = d3d11_driver(&uncached).ledger().draws();
    assert_eq!(expected.len(), 6);
    assert_eq!(d3d11_driver(&cached).ledger().draws(), expected);
    assert!(with_cache.redundant_state_skips > 0);
    assert_eq!(without_cache.redundant_state_skips, 0);
    Ok(())
}

#[test]
fn test_vulkan_draw_state_is_identical_with_and_without_cache() -> Result<()> {
    let mut cached = vulkan_device(options(true), compiler(VULKAN_TEXTURE_BINDING))?;
    let mut uncached = vulkan_device(options(false), compiler(VULKAN_TEXTURE_BINDING))?;
    let (with_cache, without_cache) = run_both(&mut cached, &mut uncached)?;

    let expected = vulkan_driver(&uncached).ledger().draws();
    assert_eq!(expected.len(), 6);
    assert_eq!(vulkan_driver(&cached).ledger().draws(), expected);
    assert!(with_cache.redundant_state_skips > 0);
    assert_eq!(without_cache.redundant_state_skips, 0);

    // Pipelines are cached by state either way.
    assert_eq!(cached.pipeline_count(), uncached.pipeline_count());
    assert_eq!(vulkan_driver(&cached).validation_errors(), 0);
    assert_eq!(vulkan_driver(&uncached).validation_errors(), 0);
    Ok(())
}

/// A second vertex stream plus an offscreen target, on top of the scene.
struct Streams {
    colors: Buffer,
    /// Location 0 read from slot 1.
    from_second_slot: InputLayout,
    /// Location 0 from slot 0, location 1 from slot 1.
    interleaved: InputLayout,
    color: Texture,
    depth: Texture,
    framebuffer: Framebuffer,
}

impl Streams {
    fn create(device: &mut dyn GraphicsDevice) -> Result<Self> {
        let colors: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let colors = device.create_buffer(
            &BufferDescriptor::new(BufferKind::Vertex, 36),
            Some(bytemuck::cast_slice(&colors)),
        )?;
        let from_second_slot = device.create_input_layout(&[VertexAttribute {
            buffer_slot: 1,
            ..VertexAttribute::new(VertexFormat::Float32x3, 0)
        }])?;
        let interleaved = device.create_input_layout(&[
            VertexAttribute::new(VertexFormat::Float32x3, 0),
            VertexAttribute {
                buffer_slot: 1,
                ..VertexAttribute::new(VertexFormat::Float32x3, 0)
            },
        ])?;

        let mut color_desc = TextureDescriptor::new_2d(16, 16, PixelFormat::R8G8B8A8Unorm);
        color_desc.usage = TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED;
        let mut depth_desc = TextureDescriptor::new_2d(16, 16, PixelFormat::D32Float);
        depth_desc.usage = TextureUsage::DEPTH_STENCIL;
        let color = device.create_texture(&color_desc, None)?;
        let depth = device.create_texture(&depth_desc, None)?;
        let framebuffer = device.create_framebuffer(&[
            FramebufferAttachment::new(&color),
            FramebufferAttachment::new(&depth),
        ])?;
        Ok(Self {
            colors,
            from_second_slot,
            interleaved,
            color,
            depth,
            framebuffer,
        })
    }

    fn dispose(mut self, device: &mut dyn GraphicsDevice) {
        device.dispose_framebuffer(&mut self.framebuffer);
        device.dispose_texture(&mut self.color);
        device.dispose_texture(&mut self.depth);
        device.dispose_input_layout(&mut self.interleaved);
        device.dispose_input_layout(&mut self.from_second_slot);
        device.dispose_buffer(&mut self.colors);
    }
}

/// Draws through several slots and layouts, switching targets and resizing
/// in between. `fail` arms a driver failure, runs the call it breaks and
/// recovers with one more draw.
fn record_streams<D: GraphicsDevice>(
    device: &mut D,
    fail: fn(&mut D, &Scene, &Streams) -> Result<()>,
) -> Result<()> {
    let scene = Scene::create(device)?;
    let streams = Streams::create(device)?;

    device.clear(ClearValues::color([0.0; 4]).with_depth(1.0))?;
    scene.bind(device)?;
    device.draw(3, 0)?;
    // Location 0 now reads the second slot.
    device.set_vertex_buffer(1, &streams.colors, 12, &streams.from_second_slot)?;
    device.draw(3, 0)?;
    scene.bind(device)?;
    device.draw(3, 0)?;

    fail(device, &scene, &streams)?;

    device.set_vertex_buffer(0, &scene.vertices, 12, &streams.interleaved)?;
    device.set_vertex_buffer(1, &streams.colors, 12, &streams.interleaved)?;
    device.draw_indexed(3, 0, 0)?;
    scene.bind(device)?;
    device.set_vertex_buffer(1, &streams.colors, 12, &streams.interleaved)?;
    device.draw(3, 0)?;

    device.set_framebuffer(Some(&streams.framebuffer))?;
    device.clear(ClearValues::color([0.0; 4]).with_depth(1.0))?;
    scene.bind(device)?;
    device.draw(3, 0)?;
    device.set_framebuffer(None)?;
    scene.bind(device)?;
    device.draw(3, 0)?;
    device.present(1)?;

    device.resize_swapchain(Extent2D::new(32, 24))?;
    scene.bind(device)?;
    device.set_vertex_buffer(1, &streams.colors, 12, &streams.from_second_slot)?;
    device.draw(3, 0)?;
    scene.bind(device)?;
    device.draw(3, 0)?;
    device.present(1)?;

    streams.dispose(device);
    scene.dispose(device);
    Ok(())
}

/// Draws recorded by `record_streams`.
const STREAM_DRAWS: usize = 10;

fn debug_options(state_cache: bool) -> DeviceOptions {
    DeviceOptions {
        debug: true,
        ..options(state_cache)
    }
}

fn gl_rejected_attribute(device: &mut GlDevice, scene: &Scene, streams: &Streams) -> Result<()> {
    gl_driver(device)
        .failures()
        .arm("glVertexAttribPointer", gl::INVALID_VALUE);
    assert!(device
        .set_vertex_buffer(0, &streams.colors, 12, &scene.layout)
        .is_err());
    // The failed bind must not be remembered as applied.
    device.set_vertex_buffer(0, &streams.colors, 12, &scene.layout)?;
    device.draw(3, 0)?;
    Ok(())
}

fn d3d11_failed_present(device: &mut D3d11Device, scene: &Scene, _: &Streams) -> Result<()> {
    d3d11_driver(device).failures().arm("Present", HResult::E_FAIL);
    assert!(device.present(1).is_err());
    scene.bind(device)?;
    device.draw(3, 0)?;
    Ok(())
}

fn vulkan_failed_pipeline(device: &mut VulkanDevice, scene: &Scene, _: &Streams) -> Result<()> {
    vulkan_driver(device)
        .failures()
        .arm("vkCreateGraphicsPipelines", VkResult::ERROR_OUT_OF_HOST_MEMORY);
    scene.bind(device)?;
    device.set_primitive_topology(PrimitiveTopology::LineList)?;
    assert!(device.draw(2, 0).is_err());
    device.draw(2, 0)?;
    Ok(())
}

#[test]
fn test_gl_streams_match_with_and_without_cache() -> Result<()> {
    let mut cached = gl_device(debug_options(true), compiler(0))?;
    let mut uncached = gl_device(debug_options(false), compiler(0))?;
    record_streams(&mut cached, gl_rejected_attribute)?;
    record_streams(&mut uncached, gl_rejected_attribute)?;

    let expected = gl_driver(&uncached).ledger().draws();
    assert_eq!(expected.len(), STREAM_DRAWS);
    let draws = gl_driver(&cached).ledger().draws();
    assert_eq!(draws, expected);
    // Rebinding the scene repoints location 0 at its own buffer.
    assert_eq!(draws[2].get("attrib 0"), draws[0].get("attrib 0"));
    assert_ne!(draws[1].get("attrib 0"), draws[0].get("attrib 0"));
    assert!(cached.stats().redundant_state_skips > 0);
    Ok(())
}

#[test]
fn test_d3d11_streams_match_with_and_without_cache() -> Result<()> {
    let mut cached = d3d11_device(options(true), compiler(0))?;
    let mut uncached = d3d11_device(options(false), compiler(0))?;
    record_streams(&mut cached, d3d11_failed_present)?;
    record_streams(&mut uncached, d3d11_failed_present)?;

    let expected = d3d11_driver(&uncached).ledger().draws();
    assert_eq!(expected.len(), STREAM_DRAWS);
    assert_eq!(d3d11_driver(&cached).ledger().draws(), expected);
    assert!(cached.stats().redundant_state_skips > 0);
    Ok(())
}

#[test]
fn test_vulkan_streams_match_with_and_without_cache() -> Result<()> {
    let mut cached = vulkan_device(options(true), compiler(VULKAN_TEXTURE_BINDING))?;
    let mut uncached = vulkan_device(options(false), compiler(VULKAN_TEXTURE_BINDING))?;
    record_streams(&mut cached, vulkan_failed_pipeline)?;
    record_streams(&mut uncached, vulkan_failed_pipeline)?;

    let expected = vulkan_driver(&uncached).ledger().draws();
    assert_eq!(expected.len(), STREAM_DRAWS);
    assert_eq!(vulkan_driver(&cached).ledger().draws(), expected);
    assert_eq!(cached.pipeline_count(), uncached.pipeline_count());
    assert!(cached.stats().redundant_state_skips > 0);
    Ok(())
}
