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

//! # Tessera Infra
//!
//! Concrete implementations of the `tessera-core` device contract, one per
//! native API family. Each backend talks to its native API through a driver
//! trait (`GlApi`, `D3d11Api`, `VulkanApi`) so the device logic is independent
//! of how the native entry points are loaded.

#![warn(missing_docs)]

pub mod graphics;

pub use graphics::d3d11::D3d11Device;
pub use graphics::gl::GlDevice;
pub use graphics::vulkan::VulkanDevice;
