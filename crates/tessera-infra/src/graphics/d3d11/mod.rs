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

//! The deferred-state backend, built on Direct3D 11 and DXGI.
//!
//! Pipeline state is baked into immutable state objects at creation time.
//! Shaders are translated to HLSL shader model 5.0 and compiled per stage;
//! input layouts are validated against placeholder vertex shaders generated
//! from the attribute list.

mod api;
pub mod conversions;
mod device;
pub mod placeholder;

pub use self::api::{
    consts, BlendStateDesc, BufferDesc, ComPtr, D3d11Api, D3d11Box, DepthStencilStateDesc,
    DxgiFormat, HResult, InputElementDesc, MapType, RasterizerStateDesc, ResourceDimension,
    SamplerStateDesc, StencilOpDesc, SwapChainDesc, TextureDesc, ViewDesc, ViewDimension,
};
pub use self::device::D3d11Device;
