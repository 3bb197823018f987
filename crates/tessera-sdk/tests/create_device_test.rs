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

use std::sync::Arc;
use tessera_infra::graphics::null::NullCompiler;
use tessera_sdk::prelude::*;

const SIZE: Extent2D = Extent2D::new(320, 240);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn build(backend: BackendType, options: DeviceOptions) -> RenderResult<Box<dyn GraphicsDevice>> {
    init_logging();
    create_device(
        NativeDriver::null(backend),
        SurfaceHandle::web_canvas(7),
        SIZE,
        options,
        Arc::new(NullCompiler::new()),
    )
}

#[test]
fn test_driver_variant_selects_the_backend() {
    for backend in [BackendType::OpenGl, BackendType::Direct3D11, BackendType::Vulkan] {
        assert_eq!(NativeDriver::null(backend).backend(), backend);
        let device = build(backend, DeviceOptions::default()).unwrap();
        assert_eq!(device.backend(), backend);
        assert_eq!(device.swapchain().extent, SIZE);
        assert_eq!(device.live_resources().total(), 0);
    }
}

#[test]
fn test_invalid_options_fail_on_every_backend() {
    let options = DeviceOptions {
        swapchain_image_count: 0,
        ..DeviceOptions::default()
    };
    for backend in [BackendType::OpenGl, BackendType::Direct3D11, BackendType::Vulkan] {
        let err = build(backend, options.clone()).unwrap_err();
        assert!(err.is_configuration(), "{backend:?}: {err}");
    }
}

#[test]
fn test_resource_lifecycle_through_the_trait_object() {
    for backend in [BackendType::OpenGl, BackendType::Direct3D11, BackendType::Vulkan] {
        let mut device = build(backend, DeviceOptions::default()).unwrap();
        let mut texture = device
            .create_texture(&TextureDescriptor::new_2d(4, 4, PixelFormat::R8G8B8A8Unorm), None)
            .unwrap();
        let region = TextureRegion::whole(texture.desc(), 0, 0);
        device.update_texture(&texture, &region, &[0u8; 64]).unwrap();
        assert_eq!(device.live_resources().textures, 1);

        device.dispose_texture(&mut texture);
        device.dispose_texture(&mut texture);
        assert_eq!(device.live_resources().textures, 0, "{backend:?}");

        device.clear(ClearValues::color([0.0, 0.0, 0.0, 1.0])).unwrap();
        device.present(1).unwrap();
        assert_eq!(device.stats().frames, 1);
    }
}

#[test]
fn test_config_drives_construction() {
    let config = DeviceConfig::from_ron_str(
        "(backend: Direct3D11, width: 200, height: 100, options: (state_cache: false))",
    )
    .unwrap();
    init_logging();
    let device = create_device(
        NativeDriver::null(config.backend),
        SurfaceHandle::web_canvas(1),
        config.extent(),
        config.options.clone(),
        Arc::new(NullCompiler::new()),
    )
    .unwrap();
    assert_eq!(device.backend(), BackendType::Direct3D11);
    assert_eq!(device.swapchain().extent, Extent2D::new(200, 100));
}
