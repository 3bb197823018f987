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

//! The Direct3D 11 driver seam.
//!
//! [`D3d11Api`] covers the `ID3D11Device`, `ID3D11DeviceContext` and
//! `IDXGISwapChain` methods the device uses. COM interface pointers cross the
//! seam as opaque [`ComPtr`] values and are handed back through
//! [`release`](D3d11Api::release) exactly once. Descriptor structs keep the
//! native field names and are documented by the D3D11 headers.

#![allow(missing_docs)]

use std::any::Any;
use std::fmt::{self, Debug};
use std::ptr::NonNull;
use tessera_core::renderer::api::{ShaderStage, SurfaceHandle};
use tessera_core::renderer::DeviceError;

/// An opaque COM interface pointer. `0` is the null pointer.
pub type ComPtr = u64;

/// A Windows `HRESULT`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

impl HResult {
    /// Success.
    pub const S_OK: Self = Self(0);
    /// Unspecified failure.
    pub const E_FAIL: Self = Self(0x8000_4005_u32 as i32);
    /// An argument was rejected.
    pub const E_INVALIDARG: Self = Self(0x8007_0057_u32 as i32);
    /// The allocation failed.
    pub const E_OUTOFMEMORY: Self = Self(0x8007_000E_u32 as i32);
    /// The call is invalid in the current state.
    pub const DXGI_ERROR_INVALID_CALL: Self = Self(0x887A_0001_u32 as i32);
    /// The GPU was removed or reset.
    pub const DXGI_ERROR_DEVICE_REMOVED: Self = Self(0x887A_0005_u32 as i32);

    /// `SUCCEEDED(hr)`.
    pub fn is_ok(self) -> bool {
        self.0 >= 0
    }

    /// The symbolic name of the code.
    pub fn name(self) -> &'static str {
        match self {
            Self::S_OK => "S_OK",
            Self::E_FAIL => "E_FAIL",
            Self::E_INVALIDARG => "E_INVALIDARG",
            Self::E_OUTOFMEMORY => "E_OUTOFMEMORY",
            Self::DXGI_ERROR_INVALID_CALL => "DXGI_ERROR_INVALID_CALL",
            Self::DXGI_ERROR_DEVICE_REMOVED => "DXGI_ERROR_DEVICE_REMOVED",
            _ => "unknown HRESULT",
        }
    }

    /// Wraps the code into a device error for `operation`.
    pub fn into_device_error(self, operation: &'static str) -> DeviceError {
        DeviceError::new(operation, self.0 as u32 as i64, self.name())
    }
}

impl Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#010x})", self.name(), self.0 as u32)
    }
}

/// A `DXGI_FORMAT` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DxgiFormat(pub u32);

#[allow(missing_docs)]
impl DxgiFormat {
    pub const UNKNOWN: Self = Self(0);
    pub const R32G32B32A32_FLOAT: Self = Self(2);
    pub const R32G32B32A32_UINT: Self = Self(3);
    pub const R32G32B32A32_SINT: Self = Self(4);
    pub const R32G32B32_FLOAT: Self = Self(6);
    pub const R32G32B32_UINT: Self = Self(7);
    pub const R32G32B32_SINT: Self = Self(8);
    pub const R16G16B16A16_FLOAT: Self = Self(10);
    pub const R32G32_FLOAT: Self = Self(16);
    pub const R32G32_UINT: Self = Self(17);
    pub const R32G32_SINT: Self = Self(18);
    pub const R32G8X24_TYPELESS: Self = Self(19);
    pub const D32_FLOAT_S8X24_UINT: Self = Self(20);
    pub const R32_FLOAT_X8X24_TYPELESS: Self = Self(21);
    pub const R10G10B10A2_UNORM: Self = Self(24);
    pub const R11G11B10_FLOAT: Self = Self(26);
    pub const R8G8B8A8_UNORM: Self = Self(28);
    pub const R8G8B8A8_UNORM_SRGB: Self = Self(29);
    pub const R8G8B8A8_UINT: Self = Self(30);
    pub const R16G16_FLOAT: Self = Self(34);
    pub const R16G16_SNORM: Self = Self(37);
    pub const R32_TYPELESS: Self = Self(39);
    pub const D32_FLOAT: Self = Self(40);
    pub const R32_FLOAT: Self = Self(41);
    pub const R32_UINT: Self = Self(42);
    pub const R32_SINT: Self = Self(43);
    pub const R24G8_TYPELESS: Self = Self(44);
    pub const D24_UNORM_S8_UINT: Self = Self(45);
    pub const R24_UNORM_X8_TYPELESS: Self = Self(46);
    pub const R8G8_UNORM: Self = Self(49);
    pub const R16_TYPELESS: Self = Self(53);
    pub const R16_FLOAT: Self = Self(54);
    pub const D16_UNORM: Self = Self(55);
    pub const R16_UNORM: Self = Self(56);
    pub const R16_UINT: Self = Self(57);
    pub const R8_UNORM: Self = Self(61);
    pub const BC1_UNORM: Self = Self(71);
    pub const BC1_UNORM_SRGB: Self = Self(72);
    pub const BC2_UNORM: Self = Self(74);
    pub const BC3_UNORM: Self = Self(77);
    pub const BC3_UNORM_SRGB: Self = Self(78);
    pub const BC4_UNORM: Self = Self(80);
    pub const BC5_UNORM: Self = Self(83);
    pub const B8G8R8A8_UNORM: Self = Self(87);
    pub const B8G8R8A8_UNORM_SRGB: Self = Self(91);
    pub const BC7_UNORM: Self = Self(98);
    pub const BC7_UNORM_SRGB: Self = Self(99);

    /// Strict depth/stencil formats that may only back a depth-stencil view.
    pub fn is_depth_target(self) -> bool {
        matches!(
            self,
            Self::D16_UNORM | Self::D24_UNORM_S8_UINT | Self::D32_FLOAT | Self::D32_FLOAT_S8X24_UINT
        )
    }
}

/// The D3D11 enumerants and flag bits used by the backend.
#[allow(missing_docs)]
pub mod consts {
    // D3D11_BIND_FLAG
    pub const BIND_VERTEX_BUFFER: u32 = 0x1;
    pub const BIND_INDEX_BUFFER: u32 = 0x2;
    pub const BIND_CONSTANT_BUFFER: u32 = 0x4;
    pub const BIND_SHADER_RESOURCE: u32 = 0x8;
    pub const BIND_RENDER_TARGET: u32 = 0x20;
    pub const BIND_DEPTH_STENCIL: u32 = 0x40;
    pub const BIND_UNORDERED_ACCESS: u32 = 0x80;

    // D3D11_USAGE
    pub const USAGE_DEFAULT: u32 = 0;
    pub const USAGE_DYNAMIC: u32 = 2;

    pub const CPU_ACCESS_WRITE: u32 = 0x10000;

    // D3D11_RESOURCE_MISC_FLAG
    pub const RESOURCE_MISC_TEXTURECUBE: u32 = 0x4;
    pub const RESOURCE_MISC_BUFFER_ALLOW_RAW_VIEWS: u32 = 0x20;

    // D3D11_PRIMITIVE_TOPOLOGY
    pub const PRIMITIVE_TOPOLOGY_POINTLIST: u32 = 1;
    pub const PRIMITIVE_TOPOLOGY_LINELIST: u32 = 2;
    pub const PRIMITIVE_TOPOLOGY_LINESTRIP: u32 = 3;
    pub const PRIMITIVE_TOPOLOGY_TRIANGLELIST: u32 = 4;
    pub const PRIMITIVE_TOPOLOGY_TRIANGLESTRIP: u32 = 5;

    // D3D11_BLEND
    pub const BLEND_ZERO: u32 = 1;
    pub const BLEND_ONE: u32 = 2;
    pub const BLEND_SRC_COLOR: u32 = 3;
    pub const BLEND_INV_SRC_COLOR: u32 = 4;
    pub const BLEND_SRC_ALPHA: u32 = 5;
    pub const BLEND_INV_SRC_ALPHA: u32 = 6;
    pub const BLEND_DEST_ALPHA: u32 = 7;
    pub const BLEND_INV_DEST_ALPHA: u32 = 8;
    pub const BLEND_DEST_COLOR: u32 = 9;
    pub const BLEND_INV_DEST_COLOR: u32 = 10;
    pub const BLEND_SRC_ALPHA_SAT: u32 = 11;
    pub const BLEND_BLEND_FACTOR: u32 = 14;
    pub const BLEND_INV_BLEND_FACTOR: u32 = 15;

    // D3D11_BLEND_OP
    pub const BLEND_OP_ADD: u32 = 1;
    pub const BLEND_OP_SUBTRACT: u32 = 2;
    pub const BLEND_OP_REV_SUBTRACT: u32 = 3;
    pub const BLEND_OP_MIN: u32 = 4;
    pub const BLEND_OP_MAX: u32 = 5;

    // D3D11_COMPARISON_FUNC
    pub const COMPARISON_NEVER: u32 = 1;
    pub const COMPARISON_LESS: u32 = 2;
    pub const COMPARISON_EQUAL: u32 = 3;
    pub const COMPARISON_LESS_EQUAL: u32 = 4;
    pub const COMPARISON_GREATER: u32 = 5;
    pub const COMPARISON_NOT_EQUAL: u32 = 6;
    pub const COMPARISON_GREATER_EQUAL: u32 = 7;
    pub const COMPARISON_ALWAYS: u32 = 8;

    // D3D11_STENCIL_OP
    pub const STENCIL_OP_KEEP: u32 = 1;
    pub const STENCIL_OP_ZERO: u32 = 2;
    pub const STENCIL_OP_REPLACE: u32 = 3;
    pub const STENCIL_OP_INCR_SAT: u32 = 4;
    pub const STENCIL_OP_DECR_SAT: u32 = 5;
    pub const STENCIL_OP_INVERT: u32 = 6;
    pub const STENCIL_OP_INCR: u32 = 7;
    pub const STENCIL_OP_DECR: u32 = 8;

    // D3D11_DEPTH_WRITE_MASK
    pub const DEPTH_WRITE_MASK_ZERO: u32 = 0;
    pub const DEPTH_WRITE_MASK_ALL: u32 = 1;

    // D3D11_FILL_MODE / D3D11_CULL_MODE
    pub const FILL_WIREFRAME: u32 = 2;
    pub const FILL_SOLID: u32 = 3;
    pub const CULL_NONE: u32 = 1;
    pub const CULL_FRONT: u32 = 2;
    pub const CULL_BACK: u32 = 3;

    // D3D11_TEXTURE_ADDRESS_MODE
    pub const TEXTURE_ADDRESS_WRAP: u32 = 1;
    pub const TEXTURE_ADDRESS_MIRROR: u32 = 2;
    pub const TEXTURE_ADDRESS_CLAMP: u32 = 3;
    pub const TEXTURE_ADDRESS_BORDER: u32 = 4;

    // D3D11_FILTER building blocks
    pub const FILTER_TYPE_POINT: u32 = 0;
    pub const FILTER_TYPE_LINEAR: u32 = 1;
    pub const FILTER_REDUCTION_TYPE_STANDARD: u32 = 0;
    pub const FILTER_REDUCTION_TYPE_COMPARISON: u32 = 1;
    pub const FILTER_ANISOTROPIC: u32 = 0x55;
    pub const FILTER_COMPARISON_ANISOTROPIC: u32 = 0xD5;

    // D3D11_CLEAR_FLAG
    pub const CLEAR_DEPTH: u32 = 0x1;
    pub const CLEAR_STENCIL: u32 = 0x2;

    // D3D11_COLOR_WRITE_ENABLE
    pub const COLOR_WRITE_ENABLE_RED: u8 = 1;
    pub const COLOR_WRITE_ENABLE_GREEN: u8 = 2;
    pub const COLOR_WRITE_ENABLE_BLUE: u8 = 4;
    pub const COLOR_WRITE_ENABLE_ALPHA: u8 = 8;

    /// `D3D11_COMMONSHADER_CONSTANT_BUFFER_API_SLOT_COUNT`.
    pub const CONSTANT_BUFFER_SLOT_COUNT: u32 = 14;
    /// `D3D11_COMMONSHADER_INPUT_RESOURCE_SLOT_COUNT`.
    pub const INPUT_RESOURCE_SLOT_COUNT: u32 = 128;
    /// `D3D11_COMMONSHADER_SAMPLER_SLOT_COUNT`.
    pub const SAMPLER_SLOT_COUNT: u32 = 16;
    /// `D3D11_IA_VERTEX_INPUT_RESOURCE_SLOT_COUNT`.
    pub const VERTEX_INPUT_SLOT_COUNT: u32 = 32;
    /// `D3D11_SIMULTANEOUS_RENDER_TARGET_COUNT`.
    pub const RENDER_TARGET_SLOT_COUNT: u32 = 8;
}

/// `D3D11_BUFFER_DESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub byte_width: u32,
    pub usage: u32,
    pub bind_flags: u32,
    pub cpu_access_flags: u32,
    pub misc_flags: u32,
}

/// Which `ID3D11Texture*` interface a texture is created through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceDimension {
    Texture1D,
    Texture2D,
    Texture3D,
}

/// `D3D11_TEXTURE{1D,2D,3D}_DESC` folded into one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub dimension: ResourceDimension,
    pub width: u32,
    pub height: u32,
    /// Depth of a 3D texture, `1` otherwise.
    pub depth: u32,
    /// Array slices of a 1D/2D texture (six per cube), `1` for 3D.
    pub array_size: u32,
    pub mip_levels: u32,
    pub format: DxgiFormat,
    pub usage: u32,
    pub bind_flags: u32,
    pub misc_flags: u32,
}

/// The `ViewDimension` of a shader-resource, render-target or depth-stencil view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDimension {
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
}

/// The union of the view descriptions, reduced to the fields the device sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewDesc {
    pub format: DxgiFormat,
    pub dimension: ViewDimension,
    /// `MostDetailedMip` for shader views, `MipSlice` for target views.
    pub first_mip: u32,
    pub mip_levels: u32,
    pub first_array_slice: u32,
    pub array_size: u32,
}

/// `D3D11_BOX`, in texels (bytes for buffers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct D3d11Box {
    pub left: u32,
    pub top: u32,
    pub front: u32,
    pub right: u32,
    pub bottom: u32,
    pub back: u32,
}

/// `D3D11_INPUT_ELEMENT_DESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputElementDesc {
    pub semantic_name: &'static str,
    pub semantic_index: u32,
    pub format: DxgiFormat,
    pub input_slot: u32,
    pub aligned_byte_offset: u32,
    pub per_instance: bool,
    pub instance_data_step_rate: u32,
}

/// `D3D11_RENDER_TARGET_BLEND_DESC`, applied to every render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendStateDesc {
    pub blend_enable: bool,
    pub src_blend: u32,
    pub dest_blend: u32,
    pub blend_op: u32,
    pub src_blend_alpha: u32,
    pub dest_blend_alpha: u32,
    pub blend_op_alpha: u32,
    pub render_target_write_mask: u8,
}

/// `D3D11_DEPTH_STENCILOP_DESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilOpDesc {
    pub stencil_fail_op: u32,
    pub stencil_depth_fail_op: u32,
    pub stencil_pass_op: u32,
    pub stencil_func: u32,
}

/// `D3D11_DEPTH_STENCIL_DESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilStateDesc {
    pub depth_enable: bool,
    pub depth_write_mask: u32,
    pub depth_func: u32,
    pub stencil_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front_face: StencilOpDesc,
    pub back_face: StencilOpDesc,
}

/// `D3D11_RASTERIZER_DESC`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerStateDesc {
    pub fill_mode: u32,
    pub cull_mode: u32,
    pub front_counter_clockwise: bool,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip_enable: bool,
    pub scissor_enable: bool,
}

/// `D3D11_SAMPLER_DESC`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerStateDesc {
    pub filter: u32,
    pub address_u: u32,
    pub address_v: u32,
    pub address_w: u32,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison_func: u32,
    pub border_color: [f32; 4],
    pub min_lod: f32,
    pub max_lod: f32,
}

/// `DXGI_SWAP_CHAIN_DESC1`, reduced to what the device chooses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub format: DxgiFormat,
    pub buffer_count: u32,
}

/// `D3D11_MAP` values the device maps with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapType {
    /// Previous contents are discarded.
    WriteDiscard = 4,
    /// The caller promises not to touch bytes in use by the GPU.
    WriteNoOverwrite = 5,
}

/// The D3D11 entry points used by [`D3d11Device`](super::D3d11Device).
///
/// Creation methods return the new interface pointer with a reference count
/// of one. Context methods mirror `ID3D11DeviceContext` and cannot fail.
#[allow(missing_docs)]
pub trait D3d11Api: Debug {
    fn as_any(&self) -> &dyn Any;

    // Device and swap chain
    fn create_device(&mut self, debug: bool) -> Result<(), HResult>;
    fn create_swap_chain(
        &mut self,
        surface: &SurfaceHandle,
        desc: &SwapChainDesc,
    ) -> Result<ComPtr, HResult>;
    fn get_back_buffer(&mut self, swap_chain: ComPtr) -> Result<ComPtr, HResult>;
    fn resize_buffers(
        &mut self,
        swap_chain: ComPtr,
        width: u32,
        height: u32,
        format: DxgiFormat,
    ) -> Result<(), HResult>;
    fn present(&mut self, swap_chain: ComPtr, sync_interval: u32) -> Result<(), HResult>;

    // Resource creation
    fn create_buffer(&mut self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<ComPtr, HResult>;
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<ComPtr, HResult>;
    fn create_shader_resource_view(&mut self, resource: ComPtr, desc: &ViewDesc) -> Result<ComPtr, HResult>;
    fn create_render_target_view(&mut self, resource: ComPtr, desc: Option<&ViewDesc>) -> Result<ComPtr, HResult>;
    fn create_depth_stencil_view(&mut self, resource: ComPtr, desc: &ViewDesc) -> Result<ComPtr, HResult>;
    /// `D3DCompile`: returns the bytecode blob or the error blob as text.
    fn compile(&mut self, source: &str, entry_point: &str, profile: &str) -> Result<Vec<u8>, String>;
    fn create_shader(&mut self, stage: ShaderStage, bytecode: &[u8]) -> Result<ComPtr, HResult>;
    fn create_input_layout(
        &mut self,
        elements: &[InputElementDesc],
        vertex_shader_bytecode: &[u8],
    ) -> Result<ComPtr, HResult>;
    fn create_blend_state(&mut self, desc: &BlendStateDesc) -> Result<ComPtr, HResult>;
    fn create_depth_stencil_state(&mut self, desc: &DepthStencilStateDesc) -> Result<ComPtr, HResult>;
    fn create_rasterizer_state(&mut self, desc: &RasterizerStateDesc) -> Result<ComPtr, HResult>;
    fn create_sampler_state(&mut self, desc: &SamplerStateDesc) -> Result<ComPtr, HResult>;
    /// `IUnknown::Release`.
    fn release(&mut self, object: ComPtr);

    // Context
    fn update_subresource(
        &mut self,
        resource: ComPtr,
        subresource: u32,
        dst_box: Option<&D3d11Box>,
        data: &[u8],
        row_pitch: u32,
        depth_pitch: u32,
    );
    fn map(&mut self, resource: ComPtr, map_type: MapType) -> Result<NonNull<u8>, HResult>;
    fn unmap(&mut self, resource: ComPtr);
    fn ia_set_input_layout(&mut self, layout: ComPtr);
    fn ia_set_vertex_buffer(&mut self, slot: u32, buffer: ComPtr, stride: u32, offset: u32);
    fn ia_set_index_buffer(&mut self, buffer: ComPtr, format: DxgiFormat, offset: u32);
    fn ia_set_primitive_topology(&mut self, topology: u32);
    /// `VSSetShader`, `GSSetShader`, `PSSetShader` or `CSSetShader`.
    fn set_shader(&mut self, stage: ShaderStage, shader: ComPtr);
    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: ComPtr);
    fn set_shader_resource(&mut self, stage: ShaderStage, slot: u32, view: ComPtr);
    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: ComPtr);
    fn rs_set_state(&mut self, state: ComPtr);
    fn rs_set_viewport(&mut self, width: f32, height: f32);
    fn om_set_blend_state(&mut self, state: ComPtr, blend_factor: [f32; 4], sample_mask: u32);
    fn om_set_depth_stencil_state(&mut self, state: ComPtr, stencil_ref: u32);
    fn om_set_render_targets(&mut self, render_targets: &[ComPtr], depth_stencil: Option<ComPtr>);
    fn clear_render_target_view(&mut self, view: ComPtr, color: [f32; 4]);
    fn clear_depth_stencil_view(&mut self, view: ComPtr, flags: u32, depth: f32, stencil: u8);
    fn draw(&mut self, vertex_count: u32, start_vertex: u32);
    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32);
    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    );
    fn dispatch(&mut self, x: u32, y: u32, z: u32);
    fn flush(&mut self);
}
