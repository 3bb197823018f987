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
use tessera_core::math::{Extent2D, Extent3D, Origin3D};
use tessera_core::renderer::api::*;
use tessera_core::renderer::{GraphicsDevice, RenderError, ShaderError};
use tessera_infra::graphics::d3d11::HResult;
use tessera_infra::graphics::null::NullCompiler;

#[test]
fn test_device_creation_builds_the_back_buffer() -> Result<()> {
    let device = d3d11_device(options(true), NullCompiler::new())?;
    let driver = d3d11_driver(&device);

    assert_eq!(driver.debug_layer(), Some(true));
    assert_eq!(device.backend(), BackendType::Direct3D11);
    assert_eq!(driver.ledger().live_count("back buffer"), 1);
    assert!(driver.ledger().bound().contains_key("render targets"));
    assert!(driver.ledger().bound().contains_key("depth stencil view"));
    Ok(())
}

#[test]
fn test_constant_buffers_must_be_16_byte_multiples() -> Result<()> {
    let mut device = d3d11_device(options(false), NullCompiler::new())?;
    let err = device
        .create_buffer(&BufferDescriptor::new(BufferKind::Uniform, 20), None)
        .unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(d3d11_driver(&device).ledger().call_count("CreateBuffer"), 0);

    let mut buffer = device.create_buffer(&BufferDescriptor::new(BufferKind::Uniform, 32), None)?;
    device.dispose_buffer(&mut buffer);
    device.dispose_buffer(&mut buffer);
    assert_eq!(device.live_resources().buffers, 0);
    Ok(())
}

#[test]
fn test_dynamic_storage_buffers_are_unsupported() -> Result<()> {
    let mut device = d3d11_device(options(false), NullCompiler::new())?;
    let err = device
        .create_buffer(&BufferDescriptor::new(BufferKind::Storage, 64).dynamic(), None)
        .unwrap_err();
    assert!(matches!(
        err,
        RenderError::Unsupported {
            backend: BackendType::Direct3D11,
            ..
        }
    ));
    Ok(())
}

#[test]
fn test_mapped_writes_reach_the_buffer() -> Result<()> {
    let mut device = d3d11_device(options(false), NullCompiler::new())?;
    let buffer = device.create_buffer(&BufferDescriptor::new(BufferKind::Uniform, 64).dynamic(), None)?;
    let handle = buffer.native().unwrap().buffer.raw();

    let matrix: [f32; 16] = std::array::from_fn(|i| i as f32);
    let bytes: &[u8] = bytemuck::cast_slice(&matrix);
    let mapped = device.map_buffer(&buffer)?;
    assert_eq!(mapped.len(), bytes.len());
    // SAFETY: the mapping covers the whole 64-byte buffer until `unmap_buffer`.
    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.as_ptr(), bytes.len()) };
    device.unmap_buffer(&buffer)?;

    assert_eq!(d3d11_driver(&device).buffer_contents(handle), Some(bytes));
    Ok(())
}

#[test]
fn test_partial_updates_of_static_constant_buffers_keep_the_rest() -> Result<()> {
    let mut device = d3d11_device(options(false), NullCompiler::new())?;
    let mut buffer =
        device.create_buffer(&BufferDescriptor::new(BufferKind::Uniform, 32), Some(&[1; 32]))?;
    let handle = buffer.native().unwrap().buffer.raw();
    let uploads = d3d11_driver(&device).ledger().call_count("UpdateSubresource");

    device.update_buffer(&buffer, 16, &[9; 8])?;
    device.update_buffer(&buffer, 4, &[5; 4])?;

    let mut expected = [1u8; 32];
    expected[4..8].fill(5);
    expected[16..24].fill(9);
    assert_eq!(d3d11_driver(&device).buffer_contents(handle), Some(&expected[..]));
    assert_eq!(
        d3d11_driver(&device).ledger().call_count("UpdateSubresource"),
        uploads + 2
    );

    device.dispose_buffer(&mut buffer);
    assert_eq!(device.live_resources().buffers, 0);
    Ok(())
}

#[test]
fn test_cube_map_initial_data_covers_every_face_and_mip() -> Result<()> {
    let mut device = d3d11_device(options(false), NullCompiler::new())?;
    let mut desc = TextureDescriptor::new_2d(4, 4, PixelFormat::R8G8B8A8Unorm);
    desc.texture_type = TextureType::Cube;
    desc.mip_levels = 0;
    assert_eq!(desc.subresource_count(), 18);

    let data = vec![0u8; initial_data_size(&desc)];
    assert_eq!(data.len(), 6 * 84);
    let texture = device.create_texture(&desc, Some(&data))?;
    assert_eq!(d3d11_driver(&device).uploaded_bytes(), 6 * 84);

    let region = TextureRegion {
        mip_level: 1,
        array_layer: cube_face_layer(0, CubeFace::NegativeY),
        origin: Origin3D::ZERO,
        size: Extent3D::new(2, 2, 1),
    };
    assert_eq!(region.subresource(texture.desc()), 1 + 3 * 3);
    device.update_texture(&texture, &region, &[0xff; 16])?;
    assert_eq!(d3d11_driver(&device).uploaded_bytes(), 6 * 84 + 16);
    Ok(())
}

#[test]
fn test_placeholder_shaders_are_shared_by_signature() -> Result<()> {
    let mut device = d3d11_device(options(false), NullCompiler::new())?;
    let position = [VertexAttribute::new(VertexFormat::Float32x3, 0)];
    let with_uv = [
        VertexAttribute::new(VertexFormat::Float32x3, 0),
        VertexAttribute::new(VertexFormat::Float32x2, 12),
    ];

    let mut a = device.create_input_layout(&position)?;
    let mut b = device.create_input_layout(&position)?;
    assert_eq!(device.placeholder_shader_count(), 1);
    let mut c = device.create_input_layout(&with_uv)?;
    assert_eq!(device.placeholder_shader_count(), 2);
    assert_eq!(d3d11_driver(&device).ledger().call_count("D3DCompile"), 2);

    for layout in [&mut a, &mut b, &mut c] {
        device.dispose_input_layout(layout);
    }
    assert_eq!(device.live_resources().input_layouts, 0);
    Ok(())
}

#[test]
fn test_draws_see_bindings_on_every_stage() -> Result<()> {
    let mut device = d3d11_device(options(true), compiler(0))?;
    let err = device.draw(3, 0).unwrap_err();
    assert!(err.is_configuration());

    let scene = Scene::create(&mut device)?;
    scene.bind(&mut device)?;
    device.draw(3, 0)?;
    assert_eq!(device.stats().draw_calls, 1);
    assert_eq!(device.stats().triangles, 1);

    let draw = &d3d11_driver(&device).ledger().draws()[0];
    for key in [
        "Vertex shader",
        "Fragment shader",
        "Vertex constant buffer 0",
        "Fragment shader resource 0",
        "input layout",
        "render targets",
    ] {
        assert!(draw.contains_key(key), "draw is missing {key}");
    }

    device.present(1)?;
    let driver = d3d11_driver(&device);
    assert_eq!(driver.presents(), 1);
    // The flip-model present unbinds the back buffer; the device binds it again.
    assert!(driver.ledger().bound().contains_key("render targets"));
    scene.dispose(&mut device);
    assert_eq!(device.live_resources().total(), 0);
    Ok(())
}

#[test]
fn test_native_compile_errors_carry_the_stage() -> Result<()> {
    let mut device = d3d11_device(
        options(false),
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
    match err {
        RenderError::Shader(ShaderError::NativeCompilation { stage, diagnostics }) => {
            assert_eq!(stage, ShaderStage::Fragment);
            assert!(diagnostics.contains("X1503"));
        }
        other => panic!("expected a native compilation error, got {other:?}"),
    }
    assert_eq!(device.live_resources().shaders, 0);
    Ok(())
}

#[test]
fn test_removed_device_fails_present() -> Result<()> {
    let mut device = d3d11_device(options(false), NullCompiler::new())?;
    d3d11_driver(&device)
        .failures()
        .arm("Present", HResult::DXGI_ERROR_DEVICE_REMOVED);

    match device.present(1).unwrap_err() {
        RenderError::Device(err) => {
            assert_eq!(err.operation, "IDXGISwapChain::Present");
            assert_eq!(err.status, HResult::DXGI_ERROR_DEVICE_REMOVED.0 as u32 as i64);
        }
        other => panic!("expected a device error, got {other:?}"),
    }
    assert_eq!(device.stats().frames, 0);
    Ok(())
}

#[test]
fn test_resize_recreates_the_back_buffer() -> Result<()> {
    let mut device = d3d11_device(options(false), compiler(0))?;
    let scene = Scene::create(&mut device)?;

    device.resize_swapchain(Extent2D::new(100, 50))?;
    assert_eq!(device.swapchain().extent, Extent2D::new(100, 50));
    let driver = d3d11_driver(&device);
    assert_eq!(driver.ledger().call_count("ResizeBuffers"), 1);
    assert_eq!(driver.ledger().live_count("back buffer"), 1);
    assert_eq!(driver.ledger().bound()["viewport"], "(100.0, 50.0)");

    scene.bind(&mut device)?;
    device.draw(3, 0)?;
    device.present(0)?;
    scene.dispose(&mut device);
    Ok(())
}
