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
use tessera_core::renderer::{GraphicsDevice, RenderError};
use tessera_infra::graphics::null::NullCompiler;
use tessera_infra::graphics::vulkan::{FramePhase, VkResult};

fn device_error(err: RenderError) -> tessera_core::renderer::DeviceError {
    match err {
        RenderError::Device(err) => err,
        other => panic!("expected a device error, got {other:?}"),
    }
}

#[test]
fn test_device_creation_acquires_the_first_image() -> Result<()> {
    let device = vulkan_device(options(true), NullCompiler::new())?;
    let driver = vulkan_driver(&device);

    assert_eq!(device.backend(), BackendType::Vulkan);
    assert_eq!(device.frame_phase(), FramePhase::ImageAcquired);
    assert_eq!(driver.validation_enabled(), Some(false));
    assert_eq!(driver.ledger().call_count("vkAcquireNextImageKHR"), 1);
    assert_eq!(device.live_resources().total(), 0);
    Ok(())
}

#[test]
fn test_frames_follow_the_sync_protocol() -> Result<()> {
    let mut device = vulkan_device(options(true), compiler(VULKAN_TEXTURE_BINDING))?;
    let scene = Scene::create(&mut device)?;
    scene.record_frames(&mut device)?;

    assert_eq!(device.frame_phase(), FramePhase::ImageAcquired);
    let stats = device.stats();
    assert_eq!(stats.frames, 2);
    assert_eq!(stats.draw_calls, 6);
    // One triangle, one triangle, then four instances of one triangle.
    assert_eq!(stats.triangles, 2 * (1 + 1 + 4));

    let driver = vulkan_driver(&device);
    assert_eq!(driver.presents(), 2);
    assert_eq!(driver.validation_errors(), 0);
    scene.dispose(&mut device);
    assert_eq!(device.live_resources().total(), 0);
    Ok(())
}

#[test]
fn test_empty_frames_are_presented() -> Result<()> {
    let mut device = vulkan_device(options(false), NullCompiler::new())?;
    device.present(1)?;
    device.present(0)?;

    assert_eq!(device.stats().frames, 2);
    assert_eq!(device.frame_phase(), FramePhase::ImageAcquired);
    let driver = vulkan_driver(&device);
    assert_eq!(driver.presents(), 2);
    assert_eq!(driver.validation_errors(), 0);
    Ok(())
}

#[test]
fn test_lost_submit_is_terminal() -> Result<()> {
    let mut device = vulkan_device(options(false), NullCompiler::new())?;
    vulkan_driver(&device)
        .failures()
        .arm("vkQueueSubmit", VkResult::ERROR_DEVICE_LOST);

    let err = device_error(device.present(1).unwrap_err());
    assert_eq!(err.operation, "vkQueueSubmit");
    assert_eq!(err.status, -4);
    assert_eq!(device.frame_phase(), FramePhase::Lost);
    assert_eq!(device.stats().frames, 0);

    let err = device_error(device.draw(3, 0).unwrap_err());
    assert_eq!(err.status, -4);
    let err = device_error(
        device
            .create_buffer(&BufferDescriptor::new(BufferKind::Vertex, 16), None)
            .unwrap_err(),
    );
    assert_eq!(err.operation, "vkCreateBuffer");
    assert_eq!(err.status, -4);
    assert!(device.present(1).is_err());
    assert_eq!(device.frame_phase(), FramePhase::Lost);
    Ok(())
}

#[test]
fn test_any_present_failure_loses_the_device() -> Result<()> {
    let mut device = vulkan_device(options(false), NullCompiler::new())?;
    vulkan_driver(&device)
        .failures()
        .arm("vkQueuePresentKHR", VkResult::ERROR_OUT_OF_DATE_KHR);

    let err = device_error(device.present(1).unwrap_err());
    assert_eq!(err.operation, "vkQueuePresentKHR");
    assert_eq!(err.status, i64::from(VkResult::ERROR_OUT_OF_DATE_KHR.0));
    assert_eq!(device.frame_phase(), FramePhase::Lost);
    assert!(device.resize_swapchain(Extent2D::new(32, 32)).is_err());
    Ok(())
}

#[test]
fn test_flush_failures_outside_the_frame_are_not_fatal() -> Result<()> {
    let mut device = vulkan_device(options(false), NullCompiler::new())?;
    vulkan_driver(&device)
        .failures()
        .arm("vkDeviceWaitIdle", VkResult::ERROR_OUT_OF_HOST_MEMORY);

    let err = device_error(device.flush().unwrap_err());
    assert_eq!(err.status, i64::from(VkResult::ERROR_OUT_OF_HOST_MEMORY.0));
    assert_ne!(device.frame_phase(), FramePhase::Lost);
    device.flush()?;
    device.present(1)?;
    Ok(())
}

#[test]
fn test_static_buffers_upload_through_staging() -> Result<()> {
    let mut device = vulkan_device(options(false), NullCompiler::new())?;
    let data: Vec<u8> = (0u8..32).collect();
    let mut buffer = device.create_buffer(&BufferDescriptor::new(BufferKind::Vertex, 32), Some(&data))?;
    let handle = buffer.native().unwrap().buffer.raw();

    assert_eq!(vulkan_driver(&device).buffer_contents(handle), Some(&data[..]));
    device.update_buffer(&buffer, 8, &[0xaa; 4])?;
    assert_eq!(
        &vulkan_driver(&device).buffer_contents(handle).unwrap()[8..12],
        &[0xaa; 4]
    );

    device.dispose_buffer(&mut buffer);
    device.dispose_buffer(&mut buffer);
    assert_eq!(device.live_resources().buffers, 0);
    assert_eq!(vulkan_driver(&device).validation_errors(), 0);
    Ok(())
}

#[test]
fn test_full_mip_chain_is_uploaded() -> Result<()> {
    let mut device = vulkan_device(options(false), NullCompiler::new())?;
    let mut desc = TextureDescriptor::new_2d(4, 4, PixelFormat::R8G8B8A8Unorm);
    desc.mip_levels = 0;
    let data = vec![0x40u8; initial_data_size(&desc)];

    let mut texture = device.create_texture(&desc, Some(&data))?;
    assert_eq!(texture.desc().mip_levels, 3);
    assert_eq!(vulkan_driver(&device).uploaded_bytes(), 84);

    device.dispose_texture(&mut texture);
    assert_eq!(device.live_resources().textures, 0);
    assert_eq!(vulkan_driver(&device).validation_errors(), 0);
    Ok(())
}

#[test]
fn test_resize_restarts_the_frame() -> Result<()> {
    let mut device = vulkan_device(options(true), compiler(VULKAN_TEXTURE_BINDING))?;
    let scene = Scene::create(&mut device)?;
    scene.bind(&mut device)?;
    device.draw(3, 0)?;

    device.resize_swapchain(Extent2D::new(32, 16))?;
    assert_eq!(device.frame_phase(), FramePhase::ImageAcquired);
    assert_eq!(device.swapchain().extent, Extent2D::new(32, 16));

    scene.bind(&mut device)?;
    device.draw(3, 0)?;
    device.present(1)?;
    assert_eq!(vulkan_driver(&device).validation_errors(), 0);
    scene.dispose(&mut device);
    Ok(())
}

#[test]
fn test_loose_uniforms_are_unsupported() -> Result<()> {
    let mut device = vulkan_device(options(false), NullCompiler::new())?;
    let err = device
        .set_uniform_value("u_time", UniformValue::Float(1.0))
        .unwrap_err();
    assert!(matches!(
        err,
        RenderError::Unsupported {
            backend: BackendType::Vulkan,
            ..
        }
    ));
    Ok(())
}

#[test]
fn test_offscreen_framebuffer_draws_validate() -> Result<()> {
    let mut device = vulkan_device(options(true), compiler(VULKAN_TEXTURE_BINDING))?;
    let scene = Scene::create(&mut device)?;

    let mut color_desc = TextureDescriptor::new_2d(16, 16, PixelFormat::R8G8B8A8Unorm);
    color_desc.usage = TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED;
    let mut depth_desc = TextureDescriptor::new_2d(16, 16, PixelFormat::D32Float);
    depth_desc.usage = TextureUsage::DEPTH_STENCIL;
    let mut color = device.create_texture(&color_desc, None)?;
    let mut depth = device.create_texture(&depth_desc, None)?;
    let mut framebuffer = device.create_framebuffer(&[
        FramebufferAttachment::new(&color),
        FramebufferAttachment::new(&depth),
    ])?;

    device.set_framebuffer(Some(&framebuffer))?;
    device.clear(ClearValues::color([0.0; 4]).with_depth(1.0))?;
    scene.bind(&mut device)?;
    device.draw(3, 0)?;
    device.set_framebuffer(None)?;
    scene.bind(&mut device)?;
    device.draw(3, 0)?;
    device.present(1)?;

    assert_eq!(device.stats().draw_calls, 2);
    assert_eq!(vulkan_driver(&device).validation_errors(), 0);
    device.dispose_framebuffer(&mut framebuffer);
    device.dispose_texture(&mut color);
    device.dispose_texture(&mut depth);
    scene.dispose(&mut device);
    assert_eq!(device.live_resources().total(), 0);
    Ok(())
}

#[test]
fn test_updates_while_recording_run_after_earlier_draws() -> Result<()> {
    let mut device = vulkan_device(options(true), compiler(VULKAN_TEXTURE_BINDING))?;
    let scene = Scene::create(&mut device)?;
    let handle = scene.vertices.native().unwrap().buffer.raw();
    let before = vulkan_driver(&device).executed().len();

    scene.bind(&mut device)?;
    device.draw(3, 0)?;
    device.update_buffer(&scene.vertices, 0, &[0; 12])?;
    assert_eq!(device.frame_phase(), FramePhase::Recording);
    // Nothing runs before the frame is submitted.
    assert_eq!(vulkan_driver(&device).executed().len(), before);

    scene.bind(&mut device)?;
    device.draw(3, 0)?;
    device.present(1)?;

    let driver = vulkan_driver(&device);
    let expected = vec![
        "Draw(3, 1, 0, 0)".to_string(),
        format!("CopyBuffer({handle:#x})"),
        "Draw(3, 1, 0, 0)".to_string(),
    ];
    assert_eq!(&driver.executed()[before..], expected.as_slice());
    assert_eq!(&driver.buffer_contents(handle).unwrap()[..12], &[0; 12]);
    assert_eq!(driver.validation_errors(), 0);

    scene.dispose(&mut device);
    assert_eq!(device.live_resources().total(), 0);
    Ok(())
}

#[test]
fn test_texture_updates_while_recording_are_recorded_into_the_frame() -> Result<()> {
    let mut device = vulkan_device(options(false), compiler(VULKAN_TEXTURE_BINDING))?;
    let scene = Scene::create(&mut device)?;
    let uploaded = vulkan_driver(&device).uploaded_bytes();

    scene.bind(&mut device)?;
    device.draw(3, 0)?;
    let region = TextureRegion::whole(scene.texture.desc(), 0, 0);
    device.update_texture(&scene.texture, &region, &[0x20; 64])?;
    assert_eq!(vulkan_driver(&device).uploaded_bytes(), uploaded);

    device.present(1)?;
    assert_eq!(vulkan_driver(&device).uploaded_bytes(), uploaded + 64);
    assert_eq!(vulkan_driver(&device).validation_errors(), 0);
    scene.dispose(&mut device);
    Ok(())
}

#[test]
fn test_resize_submits_updates_recorded_into_the_abandoned_frame() -> Result<()> {
    let mut device = vulkan_device(options(true), compiler(VULKAN_TEXTURE_BINDING))?;
    let scene = Scene::create(&mut device)?;
    let handle = scene.vertices.native().unwrap().buffer.raw();

    scene.bind(&mut device)?;
    device.draw(3, 0)?;
    device.update_buffer(&scene.vertices, 0, &[7; 12])?;
    device.resize_swapchain(Extent2D::new(32, 16))?;

    assert_eq!(device.frame_phase(), FramePhase::ImageAcquired);
    let driver = vulkan_driver(&device);
    assert_eq!(&driver.buffer_contents(handle).unwrap()[..12], &[7; 12]);
    assert_eq!(driver.validation_errors(), 0);

    scene.bind(&mut device)?;
    device.draw(3, 0)?;
    device.present(1)?;
    assert_eq!(vulkan_driver(&device).validation_errors(), 0);
    scene.dispose(&mut device);
    Ok(())
}

#[test]
fn test_only_samplers_release_native_objects() -> Result<()> {
    let mut device = vulkan_device(options(false), NullCompiler::new())?;
    let mut blend = device.create_blend_state(&BlendDescriptor::alpha_blending())?;
    let mut depth = device.create_depth_stencil_state(&DepthStencilDescriptor::default())?;
    let mut rasterizer = device.create_rasterizer_state(&RasterizerDescriptor::default())?;
    let mut sampler = device.create_sampler_state(&SamplerDescriptor::default())?;
    let live = vulkan_driver(&device).ledger().live_objects();

    device.dispose_blend_state(&mut blend);
    device.dispose_depth_stencil_state(&mut depth);
    device.dispose_rasterizer_state(&mut rasterizer);
    assert_eq!(vulkan_driver(&device).ledger().call_count("vkDestroySampler"), 0);
    assert_eq!(vulkan_driver(&device).ledger().live_objects(), live);

    device.dispose_sampler_state(&mut sampler);
    device.dispose_sampler_state(&mut sampler);
    let driver = vulkan_driver(&device);
    assert_eq!(driver.ledger().call_count("vkDestroySampler"), 1);
    assert_eq!(driver.ledger().live_objects(), live - 1);
    assert_eq!(device.live_resources().total(), 0);
    Ok(())
}
