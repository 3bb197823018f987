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
use tessera_core::renderer::{GraphicsDevice, RenderError, ShaderError};
use tessera_infra::graphics::gl::consts as gl;
use tessera_infra::graphics::null::NullCompiler;

fn program_name(shader: &Shader) -> u32 {
    shader
        .native()
        .and_then(|native| native.program)
        .map(|handle| handle.raw() as u32)
        .expect("linked shader has a program")
}

#[test]
fn test_device_creation_configures_the_context() -> Result<()> {
    let device = gl_device(options(true), NullCompiler::new())?;
    let driver = gl_driver(&device);

    let context = driver.context().expect("context was created");
    assert_eq!(context.color_format, PixelFormat::B8G8R8A8UnormSrgb);
    assert_eq!(context.depth_stencil_format, Some(PixelFormat::D24UnormS8Uint));
    assert_eq!(device.backend(), BackendType::OpenGl);
    assert_eq!(device.swapchain().extent, SURFACE_SIZE);
    // Only the shared vertex array exists.
    assert_eq!(driver.ledger().live_objects(), 1);
    assert_eq!(device.live_resources().total(), 0);
    Ok(())
}

#[test]
fn test_invalid_construction_is_rejected() {
    init_logging();
    let err = gl_device(
        DeviceOptions {
            swapchain_image_count: 0,
            ..DeviceOptions::default()
        },
        NullCompiler::new(),
    )
    .unwrap_err();
    let err = err.downcast::<RenderError>().unwrap();
    assert!(err.is_configuration());
}

#[test]
fn test_buffer_contents_follow_updates_and_mapping() -> Result<()> {
    let mut device = gl_device(options(true), NullCompiler::new())?;
    let initial: [f32; 4] = [1.0, 2.0, 3.0, 4.0];
    let mut buffer = device.create_buffer(
        &BufferDescriptor::new(BufferKind::Vertex, 16).dynamic(),
        Some(bytemuck::cast_slice(&initial)),
    )?;
    let name = buffer.native().unwrap().buffer.raw() as u32;
    assert_eq!(
        gl_driver(&device).buffer_contents(name),
        Some(bytemuck::cast_slice::<f32, u8>(&initial))
    );

    device.update_buffer(&buffer, 4, &[9, 9, 9, 9])?;
    assert_eq!(&gl_driver(&device).buffer_contents(name).unwrap()[4..8], &[9, 9, 9, 9]);

    let replacement = [7u8; 16];
    let mapped = device.map_buffer(&buffer)?;
    assert_eq!(mapped.len(), 16);
    // SAFETY: the mapping is 16 writable bytes until `unmap_buffer`.
    unsafe { std::ptr::copy_nonoverlapping(replacement.as_ptr(), mapped.as_ptr(), 16) };
    let err = device.update_buffer(&buffer, 0, &[0]).unwrap_err();
    assert!(err.is_configuration(), "mapped buffers cannot be updated");
    device.unmap_buffer(&buffer)?;
    assert_eq!(gl_driver(&device).buffer_contents(name), Some(&replacement[..]));

    device.dispose_buffer(&mut buffer);
    assert_eq!(gl_driver(&device).ledger().live_count("buffer"), 0);
    Ok(())
}

#[test]
fn test_failed_allocation_releases_the_name() -> Result<()> {
    let mut device = gl_device(options(true), NullCompiler::new())?;
    gl_driver(&device).failures().arm("glBufferData", gl::OUT_OF_MEMORY);

    let err = device
        .create_buffer(&BufferDescriptor::new(BufferKind::Uniform, 256), None)
        .unwrap_err();
    match err {
        RenderError::Device(err) => {
            assert_eq!(err.operation, "glBufferData");
            assert_eq!(err.status, i64::from(gl::OUT_OF_MEMORY));
        }
        other => panic!("expected a device error, got {other:?}"),
    }
    assert_eq!(gl_driver(&device).ledger().live_count("buffer"), 0);
    assert_eq!(device.live_resources().buffers, 0);
    Ok(())
}

#[test]
fn test_full_mip_chain_upload_and_region_update() -> Result<()> {
    let mut device = gl_device(options(true), NullCompiler::new())?;
    let mut desc = TextureDescriptor::new_2d(4, 4, PixelFormat::R8G8B8A8Unorm);
    desc.mip_levels = 0;
    let data = vec![0x80u8; initial_data_size(&desc)];
    assert_eq!(data.len(), 64 + 16 + 4);

    let mut texture = device.create_texture(&desc, Some(&data))?;
    assert_eq!(texture.desc().mip_levels, 3);
    assert_eq!(gl_driver(&device).uploaded_bytes(), 84);

    let region = TextureRegion::whole(texture.desc(), 0, 0);
    device.update_texture(&texture, &region, &[0u8; 64])?;
    assert_eq!(gl_driver(&device).uploaded_bytes(), 84 + 64);

    let err = device.update_texture(&texture, &region, &[0u8; 63]).unwrap_err();
    assert!(err.is_configuration());

    device.dispose_texture(&mut texture);
    device.dispose_texture(&mut texture);
    assert_eq!(device.live_resources().textures, 0);
    assert_eq!(gl_driver(&device).ledger().live_count("texture"), 0);
    Ok(())
}

#[test]
fn test_empty_texture_array_is_rejected_before_any_native_call() -> Result<()> {
    let mut device = gl_device(options(true), NullCompiler::new())?;
    let mut desc = TextureDescriptor::new_2d(8, 8, PixelFormat::R8G8B8A8Unorm);
    desc.array_size = 0;

    let err = device.create_texture(&desc, None).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(gl_driver(&device).ledger().call_count("glGenTextures"), 0);
    Ok(())
}

#[test]
fn test_two_depth_attachments_are_rejected() -> Result<()> {
    let mut device = gl_device(options(true), NullCompiler::new())?;
    let mut desc = TextureDescriptor::new_2d(16, 16, PixelFormat::D24UnormS8Uint);
    desc.usage = TextureUsage::DEPTH_STENCIL;
    let first = device.create_texture(&desc, None)?;
    let second = device.create_texture(&desc, None)?;

    let err = device
        .create_framebuffer(&[FramebufferAttachment::new(&first), FramebufferAttachment::new(&second)])
        .unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(gl_driver(&device).ledger().call_count("glGenFramebuffers"), 0);
    assert_eq!(device.live_resources().framebuffers, 0);
    Ok(())
}

#[test]
fn test_offscreen_framebuffer_redirects_draws() -> Result<()> {
    let mut device = gl_device(options(true), compiler(0))?;
    let scene = Scene::create(&mut device)?;

    let mut color_desc = TextureDescriptor::new_2d(16, 16, PixelFormat::R8G8B8A8Unorm);
    color_desc.usage = TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED;
    let mut depth_desc = TextureDescriptor::new_2d(16, 16, PixelFormat::D32Float);
    depth_desc.usage = TextureUsage::DEPTH_STENCIL;
    let mut color = device.create_texture(&color_desc, None)?;
    let mut depth = device.create_texture(&depth_desc, None)?;
    let mut framebuffer = device.create_framebuffer(&[
        FramebufferAttachment::new(&depth),
        FramebufferAttachment::new(&color),
    ])?;
    assert_eq!(framebuffer.layout().colors.len(), 1);
    assert_eq!(framebuffer.extent(), Extent2D::new(16, 16));

    device.set_framebuffer(Some(&framebuffer))?;
    device.clear(ClearValues::color([0.0; 4]).with_depth(1.0))?;
    scene.bind(&mut device)?;
    device.draw(3, 0)?;
    device.set_framebuffer(None)?;
    device.draw(3, 0)?;

    let draws = gl_driver(&device).ledger().draws();
    assert_eq!(draws.len(), 2);
    assert_ne!(draws[0].get("framebuffer"), draws[1].get("framebuffer"));

    device.dispose_framebuffer(&mut framebuffer);
    device.dispose_texture(&mut color);
    device.dispose_texture(&mut depth);
    scene.dispose(&mut device);
    assert_eq!(device.live_resources().total(), 0);
    Ok(())
}

#[test]
fn test_shader_blocks_and_loose_uniforms() -> Result<()> {
    let mut device = gl_device(options(true), compiler(3).with_uniform("u_time", "float"))?;
    let scene = Scene::create(&mut device)?;
    let program = program_name(&scene.shader);

    assert_eq!(gl_driver(&device).block_binding(program, "camera"), Some(0));
    assert_eq!(gl_driver(&device).uniform_value(program, "albedo"), Some("3"));

    let err = device
        .set_uniform_value("u_time", UniformValue::Float(0.5))
        .unwrap_err();
    assert!(err.is_configuration(), "no shader is bound yet");

    device.set_shader(&scene.shader)?;
    device.set_uniform_value("u_time", UniformValue::Float(0.5))?;
    assert_eq!(gl_driver(&device).uniform_value(program, "u_time"), Some("0.5"));
    // Unknown names are only logged.
    device.set_uniform_value("u_missing", UniformValue::Int(1))?;
    scene.dispose(&mut device);
    Ok(())
}

#[test]
fn test_native_compile_errors_carry_the_stage() -> Result<()> {
    let mut device = gl_device(
        options(true),
        NullCompiler::new().emitting_invalid(ShaderStage::Fragment),
    )?;
    let module = spirv_module();
    let err = device
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
        .unwrap_err();
    assert!(matches!(
        err,
        RenderError::Shader(ShaderError::NativeCompilation {
            stage: ShaderStage::Fragment,
            ..
        })
    ));
    let ledger = gl_driver(&device).ledger();
    assert_eq!(ledger.live_count("shader"), 0);
    assert_eq!(ledger.live_count("program"), 0);
    assert_eq!(device.live_resources().shaders, 0);
    Ok(())
}

#[test]
fn test_translation_errors_skip_native_compilation() -> Result<()> {
    let mut device = gl_device(options(true), NullCompiler::new())?;
    let module = spirv_module();
    let err = device
        .create_shader(
            &[ShaderStageDescriptor {
                stage: ShaderStage::Vertex,
                bytecode: &module[..12],
                entry_point: "main",
            }],
            &[],
        )
        .unwrap_err();
    assert!(matches!(err, RenderError::Shader(ShaderError::Translation { .. })));
    assert_eq!(gl_driver(&device).ledger().call_count("glCreateShader"), 0);
    Ok(())
}

#[test]
fn test_draws_need_a_shader_and_update_stats() -> Result<()> {
    let mut device = gl_device(options(true), compiler(0))?;
    let err = device.draw(3, 0).unwrap_err();
    assert!(err.is_configuration());

    let scene = Scene::create(&mut device)?;
    scene.bind(&mut device)?;
    device.draw(3, 0)?;
    let stats = device.stats();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.triangles, 1);

    device.draw_indexed_instanced(3, 4)?;
    assert_eq!(device.stats().triangles, 5);

    device.present(1)?;
    assert_eq!(device.stats().frames, 1);
    assert_eq!(gl_driver(&device).ledger().bound()["swap interval"], "1");

    let err = device.dispatch(1, 1, 1).unwrap_err();
    assert!(err.is_configuration(), "graphics shader cannot dispatch");
    scene.dispose(&mut device);
    Ok(())
}

#[test]
fn test_failed_present_is_reported() -> Result<()> {
    let mut device = gl_device(options(true), NullCompiler::new())?;
    gl_driver(&device).failures().arm("SwapBuffers", gl::INVALID_OPERATION);

    let err = device.present(1).unwrap_err();
    assert!(matches!(err, RenderError::Device(ref e) if e.operation == "SwapBuffers"));
    assert_eq!(device.stats().frames, 0);
    device.present(1)?;
    assert_eq!(device.stats().frames, 1);
    Ok(())
}

#[test]
fn test_resize_updates_the_surface() -> Result<()> {
    let mut device = gl_device(options(true), NullCompiler::new())?;
    device.resize_swapchain(Extent2D::new(128, 32))?;
    assert_eq!(device.swapchain().extent, Extent2D::new(128, 32));
    assert_eq!(gl_driver(&device).surface_size(), Some(Extent2D::new(128, 32)));

    // Empty sizes are ignored.
    device.resize_swapchain(Extent2D::new(0, 32))?;
    assert_eq!(device.swapchain().extent, Extent2D::new(128, 32));
    Ok(())
}
