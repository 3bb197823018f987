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

use super::{Failures, Ledger};
use crate::graphics::d3d11::{
    consts as d3d, BlendStateDesc, BufferDesc, ComPtr, D3d11Api, D3d11Box,
    DepthStencilStateDesc, DxgiFormat, HResult, InputElementDesc, MapType, RasterizerStateDesc,
    ResourceDimension, SamplerStateDesc, SwapChainDesc, TextureDesc, ViewDesc,
};
use std::any::Any;
use std::collections::HashMap;
use std::ptr::NonNull;
use tessera_core::renderer::api::{ShaderStage, SurfaceHandle};

/// What a live interface pointer refers to.
#[derive(Debug)]
enum Object {
    SwapChain(SwapChainDesc),
    BackBuffer,
    Buffer { desc: BufferDesc, data: Vec<u8>, mapped: bool },
    Texture(TextureDesc),
    View { resource: ComPtr },
    Shader(ShaderStage),
    InputLayout,
    /// Immutable state objects keep their description for snapshots.
    State(String),
}

/// An in-memory `ID3D11Device` and immediate context.
///
/// Creation calls validate their descriptions the way the debug layer does
/// and fail with `E_INVALIDARG` where it would. Buffers keep their bytes so
/// mapped writes and `UpdateSubresource` calls can be read back.
#[derive(Debug, Default)]
pub struct NullD3d11 {
    ledger: Ledger,
    failures: Failures<HResult>,
    device: Option<bool>,
    objects: HashMap<ComPtr, Object>,
    uploaded_bytes: u64,
    presents: u64,
}

impl NullD3d11 {
    /// A driver with no device created yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects, calls and bound state.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Failures to inject, keyed by entry point name.
    pub fn failures(&self) -> &Failures<HResult> {
        &self.failures
    }

    /// Whether the device was created with the debug layer, once created.
    pub fn debug_layer(&self) -> Option<bool> {
        self.device
    }

    /// The contents of a buffer.
    pub fn buffer_contents(&self, buffer: ComPtr) -> Option<&[u8]> {
        match self.objects.get(&buffer) {
            Some(Object::Buffer { data, .. }) => Some(data),
            _ => None,
        }
    }

    /// The current description of a swap chain.
    pub fn swap_chain_desc(&self, swap_chain: ComPtr) -> Option<&SwapChainDesc> {
        match self.objects.get(&swap_chain) {
            Some(Object::SwapChain(desc)) => Some(desc),
            _ => None,
        }
    }

    /// Total bytes written into textures by `UpdateSubresource`.
    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes
    }

    /// Number of successful presents.
    pub fn presents(&self) -> u64 {
        self.presents
    }

    fn enter(&mut self, entry_point: &'static str) -> Result<(), HResult> {
        self.ledger.call(entry_point);
        if let Some(code) = self.failures.take(entry_point) {
            return Err(code);
        }
        if self.device.is_none() && entry_point != "D3D11CreateDevice" {
            log::error!("null d3d11: {entry_point} called before the device exists");
            return Err(HResult::DXGI_ERROR_INVALID_CALL);
        }
        Ok(())
    }

    fn insert(&mut self, kind: &'static str, object: Object) -> ComPtr {
        let handle = self.ledger.create(kind);
        self.objects.insert(handle, object);
        handle
    }

    fn invalid(&self, entry_point: &str, reason: &str) -> HResult {
        log::error!("null d3d11: {entry_point}: {reason}");
        HResult::E_INVALIDARG
    }

    fn texture(&self, resource: ComPtr) -> Option<&TextureDesc> {
        match self.objects.get(&resource) {
            Some(Object::Texture(desc)) => Some(desc),
            _ => None,
        }
    }

    fn check_view(&self, entry_point: &str, resource: ComPtr, desc: &ViewDesc, bind: u32) -> Result<(), HResult> {
        let texture = self
            .texture(resource)
            .ok_or_else(|| self.invalid(entry_point, "resource is not a texture"))?;
        if texture.bind_flags & bind == 0 {
            return Err(self.invalid(entry_point, "resource lacks the matching bind flag"));
        }
        if desc.first_mip + desc.mip_levels.max(1) > texture.mip_levels {
            return Err(self.invalid(entry_point, "mip range exceeds the resource"));
        }
        Ok(())
    }

    fn state(&mut self, entry_point: &'static str, kind: &'static str, desc: String) -> Result<ComPtr, HResult> {
        self.enter(entry_point)?;
        Ok(self.insert(kind, Object::State(desc)))
    }

    /// Describes a bound object for a snapshot: state objects by content,
    /// everything else by handle.
    fn describe(&self, object: ComPtr) -> String {
        match self.objects.get(&object) {
            Some(Object::State(desc)) => desc.clone(),
            _ => format!("{object:#x}"),
        }
    }

    fn bind_slot(&mut self, key: String, object: ComPtr) {
        if object == 0 {
            self.ledger.unbind(&key);
        } else {
            self.ledger.bind(key, object);
        }
    }

    fn record_draw(&mut self, entry_point: &'static str, args: String) {
        self.ledger.call(entry_point);
        if self.ledger.bound_value("Vertex shader").is_none() {
            log::error!("null d3d11: {entry_point} without a vertex shader");
        }
        self.ledger.snapshot(&[("draw", args)]);
    }
}

impl D3d11Api for NullD3d11 {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_device(&mut self, debug: bool) -> Result<(), HResult> {
        self.enter("D3D11CreateDevice")?;
        self.device = Some(debug);
        Ok(())
    }

    fn create_swap_chain(&mut self, _surface: &SurfaceHandle, desc: &SwapChainDesc) -> Result<ComPtr, HResult> {
        self.enter("CreateSwapChainForHwnd")?;
        if desc.buffer_count < 2 {
            return Err(self.invalid("CreateSwapChainForHwnd", "flip model needs two buffers"));
        }
        Ok(self.insert("swap chain", Object::SwapChain(*desc)))
    }

    fn get_back_buffer(&mut self, swap_chain: ComPtr) -> Result<ComPtr, HResult> {
        self.enter("GetBuffer")?;
        if self.swap_chain_desc(swap_chain).is_none() {
            return Err(self.invalid("GetBuffer", "not a swap chain"));
        }
        Ok(self.insert("back buffer", Object::BackBuffer))
    }

    fn resize_buffers(&mut self, swap_chain: ComPtr, width: u32, height: u32, format: DxgiFormat) -> Result<(), HResult> {
        self.enter("ResizeBuffers")?;
        if self.ledger.live_count("back buffer") > 0 {
            log::error!("null d3d11: ResizeBuffers with outstanding back buffer references");
            return Err(HResult::DXGI_ERROR_INVALID_CALL);
        }
        match self.objects.get_mut(&swap_chain) {
            Some(Object::SwapChain(desc)) => {
                desc.width = width;
                desc.height = height;
                if format != DxgiFormat::UNKNOWN {
                    desc.format = format;
                }
                Ok(())
            }
            _ => Err(self.invalid("ResizeBuffers", "not a swap chain")),
        }
    }

    fn present(&mut self, swap_chain: ComPtr, sync_interval: u32) -> Result<(), HResult> {
        self.enter("Present")?;
        if self.swap_chain_desc(swap_chain).is_none() {
            return Err(self.invalid("Present", "not a swap chain"));
        }
        if sync_interval > 4 {
            return Err(self.invalid("Present", "sync interval above 4"));
        }
        self.presents += 1;
        // Flip-model presents unbind the back buffer.
        self.ledger.unbind("render targets");
        self.ledger.unbind("depth stencil view");
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<ComPtr, HResult> {
        self.enter("CreateBuffer")?;
        if desc.byte_width == 0 {
            return Err(self.invalid("CreateBuffer", "zero-sized buffer"));
        }
        if desc.bind_flags & d3d::BIND_CONSTANT_BUFFER != 0 && desc.byte_width % 16 != 0 {
            return Err(self.invalid("CreateBuffer", "constant buffer size is not a multiple of 16"));
        }
        if desc.usage == d3d::USAGE_DYNAMIC && desc.cpu_access_flags & d3d::CPU_ACCESS_WRITE == 0 {
            return Err(self.invalid("CreateBuffer", "dynamic buffer without CPU write access"));
        }
        let mut data = vec![0; desc.byte_width as usize];
        if let Some(initial) = initial_data {
            let len = initial.len().min(data.len());
            data[..len].copy_from_slice(&initial[..len]);
        }
        let buffer = Object::Buffer {
            desc: *desc,
            data,
            mapped: false,
        };
        Ok(self.insert("buffer", buffer))
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<ComPtr, HResult> {
        self.enter("CreateTexture")?;
        if desc.width == 0 || desc.height == 0 || desc.depth == 0 || desc.array_size == 0 {
            return Err(self.invalid("CreateTexture", "empty extent"));
        }
        if desc.mip_levels == 0 {
            return Err(self.invalid("CreateTexture", "zero mip levels"));
        }
        if desc.format.is_depth_target() && desc.bind_flags & d3d::BIND_SHADER_RESOURCE != 0 {
            return Err(self.invalid("CreateTexture", "strict depth format with BIND_SHADER_RESOURCE"));
        }
        if desc.misc_flags & d3d::RESOURCE_MISC_TEXTURECUBE != 0 && desc.array_size % 6 != 0 {
            return Err(self.invalid("CreateTexture", "cube texture with a partial face set"));
        }
        Ok(self.insert("texture", Object::Texture(*desc)))
    }

    fn create_shader_resource_view(&mut self, resource: ComPtr, desc: &ViewDesc) -> Result<ComPtr, HResult> {
        self.enter("CreateShaderResourceView")?;
        if desc.format.is_depth_target() {
            return Err(self.invalid("CreateShaderResourceView", "depth format in a shader view"));
        }
        self.check_view("CreateShaderResourceView", resource, desc, d3d::BIND_SHADER_RESOURCE)?;
        Ok(self.insert("shader resource view", Object::View { resource }))
    }

    fn create_render_target_view(&mut self, resource: ComPtr, desc: Option<&ViewDesc>) -> Result<ComPtr, HResult> {
        self.enter("CreateRenderTargetView")?;
        match (self.objects.get(&resource), desc) {
            (Some(Object::BackBuffer), _) => {}
            (Some(Object::Texture(_)), Some(desc)) => {
                if desc.format.is_depth_target() {
                    return Err(self.invalid("CreateRenderTargetView", "depth format in a render target view"));
                }
                self.check_view("CreateRenderTargetView", resource, desc, d3d::BIND_RENDER_TARGET)?;
            }
            _ => return Err(self.invalid("CreateRenderTargetView", "unknown resource")),
        }
        Ok(self.insert("render target view", Object::View { resource }))
    }

    fn create_depth_stencil_view(&mut self, resource: ComPtr, desc: &ViewDesc) -> Result<ComPtr, HResult> {
        self.enter("CreateDepthStencilView")?;
        if !desc.format.is_depth_target() {
            return Err(self.invalid("CreateDepthStencilView", "color format in a depth-stencil view"));
        }
        self.check_view("CreateDepthStencilView", resource, desc, d3d::BIND_DEPTH_STENCIL)?;
        Ok(self.insert("depth stencil view", Object::View { resource }))
    }

    fn compile(&mut self, source: &str, entry_point: &str, profile: &str) -> Result<Vec<u8>, String> {
        self.ledger.call("D3DCompile");
        if let Some(line) = source.lines().find(|line| line.trim_start().starts_with("#error")) {
            return Err(format!("error X1503: {}", line.trim()));
        }
        if !source.contains(entry_point) {
            return Err(format!("error X3501: '{entry_point}': entrypoint not found ({profile})"));
        }
        Ok(source.as_bytes().to_vec())
    }

    fn create_shader(&mut self, stage: ShaderStage, bytecode: &[u8]) -> Result<ComPtr, HResult> {
        self.enter("CreateShader")?;
        if bytecode.is_empty() {
            return Err(self.invalid("CreateShader", "empty bytecode"));
        }
        Ok(self.insert("shader", Object::Shader(stage)))
    }

    fn create_input_layout(&mut self, elements: &[InputElementDesc], vertex_shader_bytecode: &[u8]) -> Result<ComPtr, HResult> {
        self.enter("CreateInputLayout")?;
        let signature = String::from_utf8_lossy(vertex_shader_bytecode);
        for element in elements {
            let semantic = format!("{}{}", element.semantic_name, element.semantic_index);
            if !signature.contains(&semantic) {
                return Err(self.invalid("CreateInputLayout", &format!("{semantic} missing from the shader signature")));
            }
            if element.input_slot >= d3d::VERTEX_INPUT_SLOT_COUNT {
                return Err(self.invalid("CreateInputLayout", "input slot out of range"));
            }
        }
        Ok(self.insert("input layout", Object::InputLayout))
    }

    fn create_blend_state(&mut self, desc: &BlendStateDesc) -> Result<ComPtr, HResult> {
        self.state("CreateBlendState", "blend state", format!("{desc:?}"))
    }

    fn create_depth_stencil_state(&mut self, desc: &DepthStencilStateDesc) -> Result<ComPtr, HResult> {
        self.state("CreateDepthStencilState", "depth stencil state", format!("{desc:?}"))
    }

    fn create_rasterizer_state(&mut self, desc: &RasterizerStateDesc) -> Result<ComPtr, HResult> {
        self.state("CreateRasterizerState", "rasterizer state", format!("{desc:?}"))
    }

    fn create_sampler_state(&mut self, desc: &SamplerStateDesc) -> Result<ComPtr, HResult> {
        if desc.max_anisotropy > 16 {
            self.ledger.call("CreateSamplerState");
            return Err(self.invalid("CreateSamplerState", "anisotropy above 16"));
        }
        self.state("CreateSamplerState", "sampler state", format!("{desc:?}"))
    }

    fn release(&mut self, object: ComPtr) {
        self.ledger.call("Release");
        if object == 0 {
            return;
        }
        if let Some(Object::View { resource }) = self.objects.get(&object) {
            if !self.objects.contains_key(resource) {
                log::error!("null d3d11: view {object:#x} outlived its resource");
            }
        }
        self.objects.remove(&object);
        self.ledger.destroy(object);
    }

    fn update_subresource(&mut self, resource: ComPtr, subresource: u32, dst_box: Option<&D3d11Box>, data: &[u8], _row_pitch: u32, _depth_pitch: u32) {
        self.ledger.call("UpdateSubresource");
        match self.objects.get_mut(&resource) {
            Some(Object::Buffer { desc, data: contents, .. }) => {
                if dst_box.is_some() && desc.bind_flags & d3d::BIND_CONSTANT_BUFFER != 0 {
                    // Feature level 11.0 drops partial constant buffer updates.
                    log::error!("null d3d11: UpdateSubresource with a box on constant buffer {resource:#x}");
                    return;
                }
                let start = dst_box.map_or(0, |b| b.left as usize);
                let end = dst_box.map_or(contents.len(), |b| b.right as usize);
                if start > end || end > contents.len() {
                    log::error!("null d3d11: UpdateSubresource box outside buffer {resource:#x}");
                    return;
                }
                let len = data.len().min(end - start);
                contents[start..start + len].copy_from_slice(&data[..len]);
            }
            Some(Object::Texture(desc)) => {
                let subresources = match desc.dimension {
                    ResourceDimension::Texture3D => desc.mip_levels,
                    _ => desc.mip_levels * desc.array_size,
                };
                if subresource >= subresources {
                    log::error!("null d3d11: subresource {subresource} out of range for texture {resource:#x}");
                    return;
                }
                self.uploaded_bytes += data.len() as u64;
            }
            _ => log::error!("null d3d11: UpdateSubresource on unknown resource {resource:#x}"),
        }
    }

    fn map(&mut self, resource: ComPtr, map_type: MapType) -> Result<NonNull<u8>, HResult> {
        self.enter("Map")?;
        match self.objects.get_mut(&resource) {
            Some(Object::Buffer { desc, data, mapped }) => {
                if desc.usage != d3d::USAGE_DYNAMIC {
                    log::error!("null d3d11: Map of a non-dynamic buffer");
                    return Err(HResult::E_INVALIDARG);
                }
                if *mapped {
                    return Err(HResult::E_INVALIDARG);
                }
                if map_type == MapType::WriteDiscard {
                    data.fill(0);
                }
                *mapped = true;
                NonNull::new(data.as_mut_ptr()).ok_or(HResult::E_FAIL)
            }
            _ => Err(HResult::E_INVALIDARG),
        }
    }

    fn unmap(&mut self, resource: ComPtr) {
        self.ledger.call("Unmap");
        match self.objects.get_mut(&resource) {
            Some(Object::Buffer { mapped, .. }) if *mapped => *mapped = false,
            _ => log::error!("null d3d11: Unmap of {resource:#x} which is not mapped"),
        }
    }

    fn ia_set_input_layout(&mut self, layout: ComPtr) {
        self.ledger.call("IASetInputLayout");
        self.bind_slot("input layout".to_string(), layout);
    }

    fn ia_set_vertex_buffer(&mut self, slot: u32, buffer: ComPtr, stride: u32, offset: u32) {
        self.ledger.call("IASetVertexBuffers");
        self.ledger.bind(format!("vertex buffer {slot}"), (buffer, stride, offset));
    }

    fn ia_set_index_buffer(&mut self, buffer: ComPtr, format: DxgiFormat, offset: u32) {
        self.ledger.call("IASetIndexBuffer");
        self.ledger.bind("index buffer", (buffer, format, offset));
    }

    fn ia_set_primitive_topology(&mut self, topology: u32) {
        self.ledger.call("IASetPrimitiveTopology");
        self.ledger.bind("topology", topology);
    }

    fn set_shader(&mut self, stage: ShaderStage, shader: ComPtr) {
        self.ledger.call("SetShader");
        if let Some(Object::Shader(created)) = self.objects.get(&shader) {
            if *created != stage {
                log::error!("null d3d11: {created:?} shader bound to the {stage:?} stage");
            }
        }
        self.bind_slot(format!("{stage:?} shader"), shader);
    }

    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: ComPtr) {
        self.ledger.call("SetConstantBuffers");
        self.bind_slot(format!("{stage:?} constant buffer {slot}"), buffer);
    }

    fn set_shader_resource(&mut self, stage: ShaderStage, slot: u32, view: ComPtr) {
        self.ledger.call("SetShaderResources");
        self.bind_slot(format!("{stage:?} shader resource {slot}"), view);
    }

    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: ComPtr) {
        self.ledger.call("SetSamplers");
        let description = self.describe(sampler);
        self.ledger.bind(format!("{stage:?} sampler {slot}"), description);
    }

    fn rs_set_state(&mut self, state: ComPtr) {
        self.ledger.call("RSSetState");
        let description = self.describe(state);
        self.ledger.bind("rasterizer", description);
    }

    fn rs_set_viewport(&mut self, width: f32, height: f32) {
        self.ledger.call("RSSetViewports");
        self.ledger.bind("viewport", (width, height));
    }

    fn om_set_blend_state(&mut self, state: ComPtr, blend_factor: [f32; 4], sample_mask: u32) {
        self.ledger.call("OMSetBlendState");
        let description = self.describe(state);
        self.ledger.bind("blend", (description, blend_factor, sample_mask));
    }

    fn om_set_depth_stencil_state(&mut self, state: ComPtr, stencil_ref: u32) {
        self.ledger.call("OMSetDepthStencilState");
        let description = self.describe(state);
        self.ledger.bind("depth stencil", (description, stencil_ref));
    }

    fn om_set_render_targets(&mut self, render_targets: &[ComPtr], depth_stencil: Option<ComPtr>) {
        self.ledger.call("OMSetRenderTargets");
        if render_targets.len() > d3d::RENDER_TARGET_SLOT_COUNT as usize {
            log::error!("null d3d11: more than eight render targets bound");
        }
        self.ledger.bind("render targets", render_targets);
        match depth_stencil {
            Some(view) => self.ledger.bind("depth stencil view", view),
            None => self.ledger.unbind("depth stencil view"),
        }
    }

    fn clear_render_target_view(&mut self, view: ComPtr, color: [f32; 4]) {
        self.ledger.call("ClearRenderTargetView");
        self.ledger.bind(format!("clear {view:#x}"), color);
    }

    fn clear_depth_stencil_view(&mut self, view: ComPtr, flags: u32, depth: f32, stencil: u8) {
        self.ledger.call("ClearDepthStencilView");
        self.ledger.bind(format!("clear {view:#x}"), (flags, depth, stencil));
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) {
        self.record_draw("Draw", format!("Draw({vertex_count}, {start_vertex})"));
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        self.record_draw(
            "DrawIndexed",
            format!("DrawIndexed({index_count}, {start_index}, {base_vertex})"),
        );
    }

    fn draw_indexed_instanced(&mut self, index_count: u32, instance_count: u32, start_index: u32, base_vertex: i32, start_instance: u32) {
        self.record_draw(
            "DrawIndexedInstanced",
            format!(
                "DrawIndexedInstanced({index_count}, {instance_count}, {start_index}, {base_vertex}, {start_instance})"
            ),
        );
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.ledger.call("Dispatch");
        if self.ledger.bound_value("Compute shader").is_none() {
            log::error!("null d3d11: Dispatch without a compute shader");
        }
        self.ledger.snapshot(&[("draw", format!("Dispatch({x}, {y}, {z})"))]);
    }

    fn flush(&mut self) {
        self.ledger.call("Flush");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> NullD3d11 {
        let mut api = NullD3d11::new();
        api.create_device(true).unwrap();
        api
    }

    fn dynamic_buffer(size: u32) -> BufferDesc {
        BufferDesc {
            byte_width: size,
            usage: d3d::USAGE_DYNAMIC,
            bind_flags: d3d::BIND_VERTEX_BUFFER,
            cpu_access_flags: d3d::CPU_ACCESS_WRITE,
            misc_flags: 0,
        }
    }

    #[test]
    fn calls_before_device_creation_fail() {
        let mut api = NullD3d11::new();
        let err = api.create_buffer(&dynamic_buffer(16), None).unwrap_err();
        assert_eq!(err, HResult::DXGI_ERROR_INVALID_CALL);
    }

    #[test]
    fn strict_depth_formats_cannot_be_sampled() {
        let mut api = device();
        let desc = TextureDesc {
            dimension: ResourceDimension::Texture2D,
            width: 4,
            height: 4,
            depth: 1,
            array_size: 1,
            mip_levels: 1,
            format: DxgiFormat::D32_FLOAT,
            usage: d3d::USAGE_DEFAULT,
            bind_flags: d3d::BIND_DEPTH_STENCIL | d3d::BIND_SHADER_RESOURCE,
            misc_flags: 0,
        };
        assert_eq!(api.create_texture(&desc), Err(HResult::E_INVALIDARG));

        let typeless = TextureDesc {
            format: DxgiFormat::R32_TYPELESS,
            ..desc
        };
        assert!(api.create_texture(&typeless).is_ok());
    }

    #[test]
    fn mapped_writes_reach_the_buffer() {
        let mut api = device();
        let buffer = api.create_buffer(&dynamic_buffer(4), Some(&[9; 4])).unwrap();
        let ptr = api.map(buffer, MapType::WriteDiscard).unwrap();
        unsafe { ptr.as_ptr().add(1).write(7) };
        api.unmap(buffer);
        assert_eq!(api.buffer_contents(buffer), Some(&[0, 7, 0, 0][..]));
    }

    #[test]
    fn resize_requires_released_back_buffers() {
        let mut api = device();
        let swap_chain = api
            .create_swap_chain(
                &SurfaceHandle::web_canvas(1),
                &SwapChainDesc {
                    width: 8,
                    height: 8,
                    format: DxgiFormat::B8G8R8A8_UNORM,
                    buffer_count: 2,
                },
            )
            .unwrap();
        let back_buffer = api.get_back_buffer(swap_chain).unwrap();
        assert_eq!(
            api.resize_buffers(swap_chain, 16, 16, DxgiFormat::UNKNOWN),
            Err(HResult::DXGI_ERROR_INVALID_CALL)
        );
        api.release(back_buffer);
        api.resize_buffers(swap_chain, 16, 16, DxgiFormat::UNKNOWN).unwrap();
        assert_eq!(api.swap_chain_desc(swap_chain).unwrap().width, 16);
    }
}
