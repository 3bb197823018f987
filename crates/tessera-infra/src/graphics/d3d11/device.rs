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

use super::api::{
    consts as d3d, BufferDesc, ComPtr, D3d11Api, D3d11Box, DxgiFormat, InputElementDesc,
    MapType, ResourceDimension, SwapChainDesc, TextureDesc, ViewDesc, ViewDimension,
};
use super::conversions::{self, IntoD3d11};
use super::placeholder::{self, PlaceholderCache};
use crate::graphics::common::{alive, check_initial_data, DeviceState};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_core::math::Extent2D;
use tessera_core::renderer::api::*;
use tessera_core::renderer::shader::ShaderBridge;
use tessera_core::renderer::state_cache::VertexBinding;
use tessera_core::renderer::{
    GraphicsDevice, RenderError, RenderResult, ShaderCode, ShaderCompiler, ShaderError,
    TargetLanguage,
};

/// Every stage a shader object or a binding can target.
const ALL_STAGES: [ShaderStage; 4] = [
    ShaderStage::Vertex,
    ShaderStage::Geometry,
    ShaderStage::Fragment,
    ShaderStage::Compute,
];

/// The swap chain's current buffer and the views rendered through it.
#[derive(Debug)]
struct BackBuffer {
    texture: ComPtr,
    view: ComPtr,
    /// Depth texture and its depth-stencil view.
    depth: Option<(ComPtr, ComPtr)>,
}

/// The views bound to the output merger.
#[derive(Debug, Clone, PartialEq)]
struct RenderTarget {
    colors: Vec<ComPtr>,
    depth_stencil: Option<ComPtr>,
    extent: Extent2D,
    framebuffer: Option<ResourceId>,
}

/// The Direct3D 11 implementation of [`GraphicsDevice`].
///
/// State lives in immutable state objects created up front; `set_*` calls
/// only bind them. Constant buffers, shader resources and samplers are bound
/// to every shader stage at the same slot.
#[derive(Debug)]
pub struct D3d11Device {
    api: Box<dyn D3d11Api>,
    state: DeviceState,
    bridge: ShaderBridge,
    placeholders: PlaceholderCache,
    swap_chain: ComPtr,
    back_buffer: Option<BackBuffer>,
    target: RenderTarget,
    shader: Option<ResourceId>,
    compute_bound: bool,
    index_format: Option<IndexFormat>,
    /// Contents of the static constant buffers. Feature level 11.0 cannot
    /// update part of a constant buffer, so partial updates are applied here
    /// and the whole buffer is uploaded.
    constant_contents: HashMap<ResourceId, Vec<u8>>,
}

fn release_back_buffer(api: &mut dyn D3d11Api, back_buffer: BackBuffer) {
    if let Some((texture, view)) = back_buffer.depth {
        api.release(view);
        api.release(texture);
    }
    api.release(back_buffer.view);
    api.release(back_buffer.texture);
}

/// Acquires buffer 0 of the swap chain and builds its views, plus a depth
/// buffer of the same size when a depth format is configured.
fn acquire_back_buffer(
    api: &mut dyn D3d11Api,
    swap_chain: ComPtr,
    extent: Extent2D,
    depth_format: Option<PixelFormat>,
) -> RenderResult<BackBuffer> {
    let texture = api
        .get_back_buffer(swap_chain)
        .map_err(|hr| hr.into_device_error("IDXGISwapChain::GetBuffer"))?;
    let view = match api.create_render_target_view(texture, None) {
        Ok(view) => view,
        Err(hr) => {
            api.release(texture);
            return Err(hr.into_device_error("CreateRenderTargetView").into());
        }
    };
    let mut back_buffer = BackBuffer {
        texture,
        view,
        depth: None,
    };

    if let Some(format) = depth_format {
        let native_format = conversions::to_native_format(format, FormatUsage::Attachment);
        let desc = TextureDesc {
            dimension: ResourceDimension::Texture2D,
            width: extent.width,
            height: extent.height,
            depth: 1,
            array_size: 1,
            mip_levels: 1,
            format: native_format,
            usage: d3d::USAGE_DEFAULT,
            bind_flags: d3d::BIND_DEPTH_STENCIL,
            misc_flags: 0,
        };
        let depth_texture = match api.create_texture(&desc) {
            Ok(texture) => texture,
            Err(hr) => {
                release_back_buffer(api, back_buffer);
                return Err(hr.into_device_error("CreateTexture2D").into());
            }
        };
        let view_desc = ViewDesc {
            format: native_format,
            dimension: ViewDimension::Texture2D,
            first_mip: 0,
            mip_levels: 1,
            first_array_slice: 0,
            array_size: 1,
        };
        match api.create_depth_stencil_view(depth_texture, &view_desc) {
            Ok(view) => back_buffer.depth = Some((depth_texture, view)),
            Err(hr) => {
                api.release(depth_texture);
                release_back_buffer(api, back_buffer);
                return Err(hr.into_device_error("CreateDepthStencilView").into());
            }
        }
    }
    Ok(back_buffer)
}

impl D3d11Device {
    /// Creates the device, a flip-model swap chain on `surface` and its
    /// back-buffer views.
    pub fn new(
        mut api: Box<dyn D3d11Api>,
        surface: &SurfaceHandle,
        initial_size: Extent2D,
        options: DeviceOptions,
        compiler: Arc<dyn ShaderCompiler>,
    ) -> RenderResult<Self> {
        let state = DeviceState::new(BackendType::Direct3D11, initial_size, options.clone())?;

        api.create_device(options.debug)
            .map_err(|hr| hr.into_device_error("D3D11CreateDevice"))?;
        let swap_chain_desc = SwapChainDesc {
            width: initial_size.width,
            height: initial_size.height,
            format: conversions::to_native_format(options.color_format, FormatUsage::Attachment),
            buffer_count: options.swapchain_image_count,
        };
        let swap_chain = api
            .create_swap_chain(surface, &swap_chain_desc)
            .map_err(|hr| hr.into_device_error("CreateSwapChainForHwnd"))?;
        let back_buffer = match acquire_back_buffer(
            api.as_mut(),
            swap_chain,
            initial_size,
            options.depth_stencil_format,
        ) {
            Ok(back_buffer) => back_buffer,
            Err(err) => {
                api.release(swap_chain);
                return Err(err);
            }
        };

        let mut device = Self {
            api,
            state,
            bridge: ShaderBridge::new(compiler, TargetLanguage::Hlsl { shader_model: 50 }),
            placeholders: PlaceholderCache::default(),
            swap_chain,
            back_buffer: Some(back_buffer),
            target: RenderTarget {
                colors: Vec::new(),
                depth_stencil: None,
                extent: initial_size,
                framebuffer: None,
            },
            shader: None,
            compute_bound: false,
            index_format: None,
            constant_contents: HashMap::new(),
        };
        device.bind_target(device.back_buffer_target());

        log::info!(
            "D3d11Device: Created device ({}x{}, {} buffers, debug: {}, state cache: {})",
            initial_size.width,
            initial_size.height,
            options.swapchain_image_count,
            options.debug,
            options.state_cache
        );
        Ok(device)
    }

    /// The native driver this device talks to.
    pub fn api(&self) -> &dyn D3d11Api {
        self.api.as_ref()
    }

    /// Number of placeholder vertex shaders compiled for input layouts.
    pub fn placeholder_shader_count(&self) -> usize {
        self.placeholders.len()
    }

    fn com(&self, handle: NativeHandle) -> RenderResult<ComPtr> {
        self.state.raw(handle)
    }

    fn owns(&self, handle: NativeHandle) -> bool {
        if handle.backend() == BackendType::Direct3D11 {
            true
        } else {
            log::warn!("D3d11Device: Ignored dispose of a {:?} resource", handle.backend());
            false
        }
    }

    fn release_all(&mut self, objects: impl IntoIterator<Item = ComPtr>) {
        for object in objects {
            self.api.release(object);
        }
    }

    fn require_graphics(&self) -> RenderResult<()> {
        match self.shader {
            Some(_) if !self.compute_bound => Ok(()),
            Some(_) => Err(RenderError::config(
                "a compute shader is bound; draws need a graphics shader",
            )),
            None => Err(RenderError::config("no shader is bound")),
        }
    }

    fn back_buffer_target(&self) -> RenderTarget {
        let (colors, depth_stencil) = match &self.back_buffer {
            Some(back_buffer) => (
                vec![back_buffer.view],
                back_buffer.depth.map(|(_, view)| view),
            ),
            None => (Vec::new(), None),
        };
        RenderTarget {
            colors,
            depth_stencil,
            extent: self.state.swapchain.extent,
            framebuffer: None,
        }
    }

    fn bind_target(&mut self, target: RenderTarget) {
        self.api
            .om_set_render_targets(&target.colors, target.depth_stencil);
        self.api
            .rs_set_viewport(target.extent.width as f32, target.extent.height as f32);
        self.target = target;
    }

    fn dispose_state<D>(&mut self, state: &mut StateObject<D>) {
        if let Some(handle) = state.native() {
            if !self.owns(handle) {
                return;
            }
        }
        if let Some(handle) = state.take_native() {
            self.api.release(handle.raw());
            self.state.release(ResourceKind::StateObject);
        }
    }

    fn check_slot(slot: u32, limit: u32, what: &str) -> RenderResult<()> {
        if slot >= limit {
            return Err(RenderError::config(format!(
                "{what} slot {slot} exceeds the limit of {limit}"
            )));
        }
        Ok(())
    }
}

impl GraphicsDevice for D3d11Device {
    fn backend(&self) -> BackendType {
        BackendType::Direct3D11
    }

    fn swapchain(&self) -> SwapchainState {
        self.state.swapchain
    }

    fn stats(&self) -> DeviceStats {
        self.state.stats()
    }

    fn live_resources(&self) -> ResourceCounters {
        self.state.counters()
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDescriptor,
        data: Option<&[u8]>,
    ) -> RenderResult<Buffer> {
        desc.validate(data)?;
        let byte_width = u32::try_from(desc.size)
            .map_err(|_| RenderError::config(format!("buffer size {} exceeds 4 GiB", desc.size)))?;
        if desc.kind == BufferKind::Uniform && byte_width % 16 != 0 {
            return Err(RenderError::config(format!(
                "constant buffer size {byte_width} is not a multiple of 16"
            )));
        }
        if desc.kind == BufferKind::Storage && desc.dynamic {
            return Err(RenderError::unsupported(
                BackendType::Direct3D11,
                "dynamic storage buffers",
            ));
        }

        let (bind_flags, misc_flags) = match desc.kind {
            BufferKind::Vertex => (d3d::BIND_VERTEX_BUFFER, 0),
            BufferKind::Index => (d3d::BIND_INDEX_BUFFER, 0),
            BufferKind::Uniform => (d3d::BIND_CONSTANT_BUFFER, 0),
            BufferKind::Storage => (
                d3d::BIND_SHADER_RESOURCE | d3d::BIND_UNORDERED_ACCESS,
                d3d::RESOURCE_MISC_BUFFER_ALLOW_RAW_VIEWS,
            ),
        };
        let (usage, cpu_access_flags) = if desc.dynamic {
            (d3d::USAGE_DYNAMIC, d3d::CPU_ACCESS_WRITE)
        } else {
            (d3d::USAGE_DEFAULT, 0)
        };
        let native_desc = BufferDesc {
            byte_width,
            usage,
            bind_flags,
            cpu_access_flags,
            misc_flags,
        };
        let buffer = self
            .api
            .create_buffer(&native_desc, data)
            .map_err(|hr| hr.into_device_error("CreateBuffer"))?;

        let id = self.state.register(ResourceKind::Buffer);
        if desc.kind == BufferKind::Uniform && !desc.dynamic {
            let contents = data.map_or_else(|| vec![0; desc.size as usize], <[u8]>::to_vec);
            self.constant_contents.insert(id, contents);
        }
        log::debug!(
            "D3d11Device: Created {:?} buffer {id:?} ({} bytes, dynamic: {})",
            desc.kind,
            desc.size,
            desc.dynamic
        );
        Ok(Buffer::new(
            id,
            desc.clone(),
            BufferNative {
                buffer: NativeHandle::D3d11(buffer),
                memory: None,
            },
        ))
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> RenderResult<Texture> {
        let desc = desc.validate()?;
        check_initial_data(&desc, data)?;

        let (dimension, depth, array_size) = match desc.texture_type {
            TextureType::D1 => (ResourceDimension::Texture1D, 1, desc.layer_count()),
            TextureType::D2 | TextureType::Cube => {
                (ResourceDimension::Texture2D, 1, desc.layer_count())
            }
            TextureType::D3 => (ResourceDimension::Texture3D, desc.depth, 1),
        };
        let mut bind_flags = 0;
        if desc.usage.contains(TextureUsage::SAMPLED) {
            bind_flags |= d3d::BIND_SHADER_RESOURCE;
        }
        if desc.usage.contains(TextureUsage::RENDER_TARGET) {
            bind_flags |= d3d::BIND_RENDER_TARGET;
        }
        if desc.usage.contains(TextureUsage::DEPTH_STENCIL) {
            bind_flags |= d3d::BIND_DEPTH_STENCIL;
        }
        if desc.usage.contains(TextureUsage::STORAGE) {
            bind_flags |= d3d::BIND_UNORDERED_ACCESS;
        }
        let misc_flags = if desc.texture_type == TextureType::Cube {
            d3d::RESOURCE_MISC_TEXTURECUBE
        } else {
            0
        };
        let native_desc = TextureDesc {
            dimension,
            width: desc.width,
            height: desc.height,
            depth,
            array_size,
            mip_levels: desc.mip_levels,
            format: conversions::storage_format(&desc),
            usage: d3d::USAGE_DEFAULT,
            bind_flags,
            misc_flags,
        };
        let texture = self
            .api
            .create_texture(&native_desc)
            .map_err(|hr| hr.into_device_error("CreateTexture"))?;

        if let Some(data) = data {
            for upload in initial_data_layout(&desc) {
                if upload.skip {
                    log::debug!(
                        "D3d11Device: Skipped sub-block upload of mip {} layer {}",
                        upload.mip_level,
                        upload.array_layer
                    );
                    continue;
                }
                self.api.update_subresource(
                    texture,
                    upload.index,
                    None,
                    upload.bytes(data),
                    upload.row_pitch,
                    upload.slice_pitch as u32,
                );
            }
        }

        let shader_view = if desc.usage.contains(TextureUsage::SAMPLED) {
            let view_desc = ViewDesc {
                format: conversions::shader_view_format(desc.format),
                dimension: conversions::view_dimension(&desc),
                first_mip: 0,
                mip_levels: desc.mip_levels,
                first_array_slice: 0,
                array_size: desc.array_size,
            };
            match self.api.create_shader_resource_view(texture, &view_desc) {
                Ok(view) => Some(NativeHandle::D3d11(view)),
                Err(hr) => {
                    self.api.release(texture);
                    return Err(hr.into_device_error("CreateShaderResourceView").into());
                }
            }
        } else {
            None
        };

        let id = self.state.register(ResourceKind::Texture);
        log::debug!(
            "D3d11Device: Created {:?} texture {id:?} ({}x{}x{}, {} mips, {:?} as {:?})",
            desc.texture_type,
            desc.width,
            desc.height,
            desc.depth,
            desc.mip_levels,
            desc.format,
            native_desc.format
        );
        Ok(Texture::new(
            id,
            desc,
            TextureNative {
                storage: NativeHandle::D3d11(texture),
                shader_view,
                memory: None,
            },
        ))
    }

    fn create_shader(
        &mut self,
        stages: &[ShaderStageDescriptor<'_>],
        specialization: &[SpecializationConstant],
    ) -> RenderResult<Shader> {
        validate_stages(stages)?;
        let bridged = stages
            .iter()
            .map(|stage| self.bridge.translate(stage, specialization))
            .collect::<Result<Vec<_>, _>>()?;

        let mut created: Vec<(ShaderStage, ComPtr)> = Vec::with_capacity(bridged.len());
        for stage in &bridged {
            let stage_kind = stage.info.stage;
            let ShaderCode::Source(source) = &stage.code else {
                self.release_all(created.iter().map(|&(_, object)| object));
                return Err(RenderError::config("the D3D11 backend needs HLSL source"));
            };
            let bytecode = match self.api.compile(
                source,
                &stage.info.entry_point,
                conversions::shader_profile(stage_kind),
            ) {
                Ok(bytecode) => bytecode,
                Err(diagnostics) => {
                    self.release_all(created.iter().map(|&(_, object)| object));
                    return Err(ShaderError::NativeCompilation {
                        stage: stage_kind,
                        diagnostics,
                    }
                    .into());
                }
            };
            match self.api.create_shader(stage_kind, &bytecode) {
                Ok(object) => created.push((stage_kind, object)),
                Err(hr) => {
                    self.release_all(created.iter().map(|&(_, object)| object));
                    return Err(hr.into_device_error("CreateShader").into());
                }
            }
        }

        let id = self.state.register(ResourceKind::Shader);
        log::debug!("D3d11Device: Created shader {id:?} ({} stages)", created.len());
        Ok(Shader::new(
            id,
            bridged.into_iter().map(|stage| stage.info).collect(),
            specialization.to_vec(),
            ShaderNative {
                program: None,
                set_layout: None,
                stages: created
                    .into_iter()
                    .map(|(stage, object)| (stage, NativeHandle::D3d11(object)))
                    .collect(),
            },
        ))
    }

    fn create_input_layout(&mut self, attributes: &[VertexAttribute]) -> RenderResult<InputLayout> {
        validate_attributes(attributes)?;
        for attribute in attributes {
            Self::check_slot(attribute.buffer_slot, d3d::VERTEX_INPUT_SLOT_COUNT, "vertex buffer")?;
        }

        let elements: Vec<InputElementDesc> = attributes
            .iter()
            .enumerate()
            .map(|(location, attribute)| {
                let per_instance = attribute.rate == VertexInputRate::Instance;
                InputElementDesc {
                    semantic_name: "TEXCOORD",
                    semantic_index: location as u32,
                    format: attribute.format.into_d3d11(),
                    input_slot: attribute.buffer_slot,
                    aligned_byte_offset: attribute.offset,
                    per_instance,
                    instance_data_step_rate: u32::from(per_instance),
                }
            })
            .collect();

        let api = self.api.as_mut();
        let bytecode = self
            .placeholders
            .get_or_compile(placeholder::signature(attributes), |source| {
                api.compile(source, "main", conversions::shader_profile(ShaderStage::Vertex))
            })
            .map_err(|diagnostics| ShaderError::NativeCompilation {
                stage: ShaderStage::Vertex,
                diagnostics,
            })?;
        let layout = self
            .api
            .create_input_layout(&elements, bytecode)
            .map_err(|hr| hr.into_device_error("CreateInputLayout"))?;

        let id = self.state.register(ResourceKind::InputLayout);
        log::debug!("D3d11Device: Created input layout {id:?} ({} elements)", elements.len());
        Ok(InputLayout::new(id, attributes.to_vec(), NativeHandle::D3d11(layout)))
    }

    fn create_blend_state(&mut self, desc: &BlendDescriptor) -> RenderResult<BlendState> {
        let state = self
            .api
            .create_blend_state(&desc.into_d3d11())
            .map_err(|hr| hr.into_device_error("CreateBlendState"))?;
        let id = self.state.register(ResourceKind::StateObject);
        Ok(BlendState::new(id, *desc, NativeHandle::D3d11(state)))
    }

    fn create_depth_stencil_state(
        &mut self,
        desc: &DepthStencilDescriptor,
    ) -> RenderResult<DepthStencilState> {
        let state = self
            .api
            .create_depth_stencil_state(&desc.into_d3d11())
            .map_err(|hr| hr.into_device_error("CreateDepthStencilState"))?;
        let id = self.state.register(ResourceKind::StateObject);
        Ok(DepthStencilState::new(id, *desc, NativeHandle::D3d11(state)))
    }

    fn create_rasterizer_state(
        &mut self,
        desc: &RasterizerDescriptor,
    ) -> RenderResult<RasterizerState> {
        let state = self
            .api
            .create_rasterizer_state(&desc.into_d3d11())
            .map_err(|hr| hr.into_device_error("CreateRasterizerState"))?;
        let id = self.state.register(ResourceKind::StateObject);
        Ok(RasterizerState::new(id, *desc, NativeHandle::D3d11(state)))
    }

    fn create_sampler_state(&mut self, desc: &SamplerDescriptor) -> RenderResult<SamplerState> {
        desc.validate()?;
        let state = self
            .api
            .create_sampler_state(&desc.into_d3d11())
            .map_err(|hr| hr.into_device_error("CreateSamplerState"))?;
        let id = self.state.register(ResourceKind::StateObject);
        Ok(SamplerState::new(id, *desc, NativeHandle::D3d11(state)))
    }

    fn create_framebuffer(
        &mut self,
        attachments: &[FramebufferAttachment<'_>],
    ) -> RenderResult<Framebuffer> {
        let layout = FramebufferLayout::plan(attachments)?;
        // Colors first, in order, then the depth attachment.
        let ordered = attachments
            .iter()
            .filter(|a| !a.texture.desc().format.is_depth())
            .chain(attachments.iter().filter(|a| a.texture.desc().format.is_depth()));
        let mut resolved = Vec::with_capacity(attachments.len());
        for attachment in ordered {
            let native = alive(attachment.texture.native(), "texture", attachment.texture.id())?;
            resolved.push((self.com(native.storage)?, attachment));
        }

        let mut views = Vec::with_capacity(resolved.len());
        for (resource, attachment) in resolved {
            let desc = attachment.texture.desc();
            let is_depth = desc.format.is_depth();
            let view_desc = ViewDesc {
                format: conversions::to_native_format(desc.format, FormatUsage::Attachment),
                dimension: conversions::attachment_view_dimension(desc),
                first_mip: attachment.mip_level,
                mip_levels: 1,
                first_array_slice: attachment.array_layer,
                array_size: 1,
            };
            let view = if is_depth {
                self.api
                    .create_depth_stencil_view(resource, &view_desc)
                    .map_err(|hr| hr.into_device_error("CreateDepthStencilView"))
            } else {
                self.api
                    .create_render_target_view(resource, Some(&view_desc))
                    .map_err(|hr| hr.into_device_error("CreateRenderTargetView"))
            };
            match view {
                Ok(view) => views.push(view),
                Err(err) => {
                    self.release_all(views);
                    return Err(err.into());
                }
            }
        }

        let id = self.state.register(ResourceKind::Framebuffer);
        log::debug!(
            "D3d11Device: Created framebuffer {id:?} ({} color, depth: {})",
            layout.colors.len(),
            layout.depth_stencil.is_some()
        );
        Ok(Framebuffer::new(
            id,
            layout,
            FramebufferNative {
                views: views.into_iter().map(NativeHandle::D3d11).collect(),
                ..FramebufferNative::default()
            },
        ))
    }

    fn update_buffer(&mut self, buffer: &Buffer, offset: u64, data: &[u8]) -> RenderResult<()> {
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let resource = self.com(native.buffer)?;
        let desc = buffer.desc();
        desc.validate_range(offset, data.len())?;
        if self.state.is_mapped(buffer.id()) {
            return Err(RenderError::config(format!(
                "buffer {:?} is mapped and cannot be updated",
                buffer.id()
            )));
        }

        let whole = offset == 0 && data.len() as u64 == desc.size;
        if desc.dynamic {
            let map_type = if whole {
                MapType::WriteDiscard
            } else {
                MapType::WriteNoOverwrite
            };
            let ptr = self
                .api
                .map(resource, map_type)
                .map_err(|hr| hr.into_device_error("Map"))?;
            // SAFETY: the mapping spans the whole buffer and
            // `offset + data.len() <= size` was validated above.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    data.as_ptr(),
                    ptr.as_ptr().add(offset as usize),
                    data.len(),
                );
            }
            self.api.unmap(resource);
        } else if let Some(contents) = self.constant_contents.get_mut(&buffer.id()) {
            let start = offset as usize;
            contents[start..start + data.len()].copy_from_slice(data);
            self.api.update_subresource(resource, 0, None, contents, 0, 0);
        } else {
            let dst_box = D3d11Box {
                left: offset as u32,
                top: 0,
                front: 0,
                right: (offset + data.len() as u64) as u32,
                bottom: 1,
                back: 1,
            };
            let dst_box = (!whole).then_some(&dst_box);
            self.api
                .update_subresource(resource, 0, dst_box, data, 0, 0);
        }
        Ok(())
    }

    fn map_buffer(&mut self, buffer: &Buffer) -> RenderResult<MappedResource> {
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let resource = self.com(native.buffer)?;
        self.state.begin_map(buffer)?;

        match self.api.map(resource, MapType::WriteDiscard) {
            // SAFETY: a successful `Map` returns a writable pointer to the whole
            // buffer that stays valid until `Unmap`, which only `unmap_buffer`
            // and `dispose_buffer` issue.
            Ok(ptr) => Ok(unsafe { MappedResource::new(ptr, buffer.desc().size as usize) }),
            Err(hr) => {
                self.state.end_map(buffer.id());
                Err(hr.into_device_error("Map").into())
            }
        }
    }

    fn unmap_buffer(&mut self, buffer: &Buffer) -> RenderResult<()> {
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let resource = self.com(native.buffer)?;
        if !self.state.end_map(buffer.id()) {
            log::warn!("D3d11Device: Ignored unmap of buffer {:?}, it is not mapped", buffer.id());
            return Ok(());
        }
        self.api.unmap(resource);
        Ok(())
    }

    fn update_texture(
        &mut self,
        texture: &Texture,
        region: &TextureRegion,
        data: &[u8],
    ) -> RenderResult<()> {
        let native = alive(texture.native(), "texture", texture.id())?;
        let resource = self.com(native.storage)?;
        let desc = texture.desc();
        region.validate(desc, data.len())?;
        if is_sub_block_upload(desc.format, region.size.width, region.size.height) {
            log::debug!("D3d11Device: Skipped sub-block update of texture {:?}", texture.id());
            return Ok(());
        }

        let row_pitch = calculate_pitch(desc.format, region.size.width).row_pitch;
        let depth_pitch = calculate_slice_pitch(desc.format, region.size.width, region.size.height);
        let dst_box = D3d11Box {
            left: region.origin.x,
            top: region.origin.y,
            front: region.origin.z,
            right: region.origin.x + region.size.width,
            bottom: region.origin.y + region.size.height,
            back: region.origin.z + region.size.depth,
        };
        self.api.update_subresource(
            resource,
            region.subresource(desc),
            Some(&dst_box),
            data,
            row_pitch,
            depth_pitch as u32,
        );
        Ok(())
    }

    fn dispose_buffer(&mut self, buffer: &mut Buffer) {
        if let Some(native) = buffer.native() {
            if !self.owns(native.buffer) {
                return;
            }
        }
        let Some(native) = buffer.take_native() else {
            return;
        };
        let resource = native.buffer.raw();
        if self.state.end_map(buffer.id()) {
            self.api.unmap(resource);
        }
        self.api.release(resource);
        self.constant_contents.remove(&buffer.id());
        self.state.release(ResourceKind::Buffer);
        log::debug!("D3d11Device: Destroyed buffer with ID: {:?}", buffer.id());
    }

    fn dispose_texture(&mut self, texture: &mut Texture) {
        if let Some(native) = texture.native() {
            if !self.owns(native.storage) {
                return;
            }
        }
        let Some(native) = texture.take_native() else {
            return;
        };
        if let Some(view) = native.shader_view {
            self.api.release(view.raw());
        }
        self.api.release(native.storage.raw());
        self.state.release(ResourceKind::Texture);
        log::debug!("D3d11Device: Destroyed texture with ID: {:?}", texture.id());
    }

    fn dispose_shader(&mut self, shader: &mut Shader) {
        let Some(native) = shader.take_native() else {
            return;
        };
        if self.shader == Some(shader.id()) {
            self.shader = None;
            self.compute_bound = false;
        }
        self.release_all(native.stages.iter().map(|(_, object)| object.raw()));
        self.state.release(ResourceKind::Shader);
        log::debug!("D3d11Device: Destroyed shader with ID: {:?}", shader.id());
    }

    fn dispose_input_layout(&mut self, layout: &mut InputLayout) {
        if let Some(handle) = layout.native() {
            if !self.owns(handle) {
                return;
            }
        }
        if let Some(handle) = layout.take_native() {
            self.api.release(handle.raw());
            self.state.release(ResourceKind::InputLayout);
        }
    }

    fn dispose_blend_state(&mut self, state: &mut BlendState) {
        self.dispose_state(state);
    }

    fn dispose_depth_stencil_state(&mut self, state: &mut DepthStencilState) {
        self.dispose_state(state);
    }

    fn dispose_rasterizer_state(&mut self, state: &mut RasterizerState) {
        self.dispose_state(state);
    }

    fn dispose_sampler_state(&mut self, state: &mut SamplerState) {
        self.dispose_state(state);
    }

    fn dispose_framebuffer(&mut self, framebuffer: &mut Framebuffer) {
        let Some(native) = framebuffer.take_native() else {
            return;
        };
        if self.target.framebuffer == Some(framebuffer.id()) {
            self.bind_target(self.back_buffer_target());
        }
        self.release_all(native.views.iter().map(|view| view.raw()));
        self.state.release(ResourceKind::Framebuffer);
        log::debug!("D3d11Device: Destroyed framebuffer with ID: {:?}", framebuffer.id());
    }

    fn set_shader(&mut self, shader: &Shader) -> RenderResult<()> {
        let native = alive(shader.native(), "shader", shader.id())?;
        let mut objects = [0; ALL_STAGES.len()];
        for (object, stage) in objects.iter_mut().zip(ALL_STAGES) {
            if let Some(handle) = native.stage(stage) {
                *object = self.com(handle)?;
            }
        }
        if self.state.cache.set_shader(shader.id()) {
            for (stage, object) in ALL_STAGES.into_iter().zip(objects) {
                self.api.set_shader(stage, object);
            }
        }
        self.shader = Some(shader.id());
        self.compute_bound = shader.is_compute();
        Ok(())
    }

    fn set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: &Buffer,
        stride: u32,
        layout: &InputLayout,
    ) -> RenderResult<()> {
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let resource = self.com(native.buffer)?;
        let layout_handle = alive(layout.native(), "input layout", layout.id())?;
        let input_layout = self.com(layout_handle)?;
        if buffer.desc().kind != BufferKind::Vertex {
            return Err(RenderError::config(format!(
                "{:?} buffer bound as a vertex buffer",
                buffer.desc().kind
            )));
        }
        Self::check_slot(slot, d3d::VERTEX_INPUT_SLOT_COUNT, "vertex buffer")?;

        // The input layout is shared by all slots, so it follows the latest call.
        self.api.ia_set_input_layout(input_layout);
        let binding = VertexBinding {
            buffer: buffer.id(),
            stride,
            layout: layout.id(),
        };
        if self.state.cache.set_vertex_buffer(slot, binding) {
            self.api.ia_set_vertex_buffer(slot, resource, stride, 0);
        }
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: &Buffer, format: IndexFormat) -> RenderResult<()> {
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let resource = self.com(native.buffer)?;
        if buffer.desc().kind != BufferKind::Index {
            return Err(RenderError::config(format!(
                "{:?} buffer bound as an index buffer",
                buffer.desc().kind
            )));
        }
        self.api.ia_set_index_buffer(resource, format.into_d3d11(), 0);
        self.index_format = Some(format);
        Ok(())
    }

    fn set_uniform_buffer(&mut self, slot: u32, buffer: &Buffer) -> RenderResult<()> {
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let resource = self.com(native.buffer)?;
        match buffer.desc().kind {
            BufferKind::Uniform => {}
            BufferKind::Storage => {
                return Err(RenderError::unsupported(
                    BackendType::Direct3D11,
                    "storage buffer binding",
                ))
            }
            kind => {
                return Err(RenderError::config(format!(
                    "{kind:?} buffer bound as a uniform buffer"
                )))
            }
        }
        Self::check_slot(slot, d3d::CONSTANT_BUFFER_SLOT_COUNT, "constant buffer")?;
        for stage in ALL_STAGES {
            self.api.set_constant_buffer(stage, slot, resource);
        }
        Ok(())
    }

    fn set_texture(
        &mut self,
        slot: u32,
        texture: &Texture,
        sampler: &SamplerState,
    ) -> RenderResult<()> {
        let native = alive(texture.native(), "texture", texture.id())?;
        let view = native.shader_view.ok_or_else(|| {
            RenderError::config(format!(
                "texture {:?} was not created with SAMPLED usage",
                texture.id()
            ))
        })?;
        let view = self.com(view)?;
        let sampler_handle = alive(sampler.native(), "sampler", sampler.id())?;
        let sampler_state = self.com(sampler_handle)?;
        Self::check_slot(slot, d3d::SAMPLER_SLOT_COUNT, "sampler")?;
        Self::check_slot(slot, d3d::INPUT_RESOURCE_SLOT_COUNT, "shader resource")?;

        for stage in ALL_STAGES {
            self.api.set_shader_resource(stage, slot, view);
            self.api.set_sampler(stage, slot, sampler_state);
        }
        Ok(())
    }

    fn set_rasterizer_state(&mut self, state: &RasterizerState) -> RenderResult<()> {
        let handle = alive(state.native(), "rasterizer state", state.id())?;
        let object = self.com(handle)?;
        if self.state.cache.set_rasterizer(state.desc()) {
            self.api.rs_set_state(object);
        }
        Ok(())
    }

    fn set_blend_state(&mut self, state: &BlendState) -> RenderResult<()> {
        let handle = alive(state.native(), "blend state", state.id())?;
        let object = self.com(handle)?;
        if self.state.cache.set_blend(state.desc()) {
            self.api
                .om_set_blend_state(object, state.desc().constant, u32::MAX);
        }
        Ok(())
    }

    fn set_depth_stencil_state(
        &mut self,
        state: &DepthStencilState,
        stencil_ref: Option<u32>,
    ) -> RenderResult<()> {
        let handle = alive(state.native(), "depth/stencil state", state.id())?;
        let object = self.com(handle)?;
        let reference = stencil_ref.unwrap_or(0);
        if self.state.cache.set_depth_stencil(state.desc(), reference) {
            self.api.om_set_depth_stencil_state(object, reference);
        }
        Ok(())
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> RenderResult<()> {
        if self.state.cache.set_topology(topology) {
            self.api.ia_set_primitive_topology(topology.into_d3d11());
        }
        self.state.topology = topology;
        Ok(())
    }

    fn set_framebuffer(&mut self, framebuffer: Option<&Framebuffer>) -> RenderResult<()> {
        let target = match framebuffer {
            Some(framebuffer) => {
                let native = alive(framebuffer.native(), "framebuffer", framebuffer.id())?;
                let views = native
                    .views
                    .iter()
                    .map(|&view| self.com(view))
                    .collect::<RenderResult<Vec<_>>>()?;
                let color_count = framebuffer.layout().colors.len();
                RenderTarget {
                    colors: views[..color_count].to_vec(),
                    depth_stencil: views.get(color_count).copied(),
                    extent: framebuffer.extent(),
                    framebuffer: Some(framebuffer.id()),
                }
            }
            None => self.back_buffer_target(),
        };
        self.bind_target(target);
        Ok(())
    }

    fn set_uniform_value(&mut self, _name: &str, _value: UniformValue) -> RenderResult<()> {
        Err(RenderError::unsupported(
            BackendType::Direct3D11,
            "set_uniform_value",
        ))
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) -> RenderResult<()> {
        self.require_graphics()?;
        self.api.draw(vertex_count, start_vertex);
        self.state.record_draw(vertex_count, 1);
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) -> RenderResult<()> {
        self.require_graphics()?;
        if self.index_format.is_none() {
            return Err(RenderError::config("no index buffer is bound"));
        }
        self.api.draw_indexed(index_count, start_index, base_vertex);
        self.state.record_draw(index_count, 1);
        Ok(())
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
    ) -> RenderResult<()> {
        self.require_graphics()?;
        if self.index_format.is_none() {
            return Err(RenderError::config("no index buffer is bound"));
        }
        self.api
            .draw_indexed_instanced(index_count, instance_count, 0, 0, 0);
        self.state.record_draw(index_count, instance_count);
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> RenderResult<()> {
        if !self.compute_bound {
            return Err(RenderError::config("dispatch needs a bound compute shader"));
        }
        self.api.dispatch(x, y, z);
        self.state.record_dispatch();
        Ok(())
    }

    fn clear(&mut self, values: ClearValues) -> RenderResult<()> {
        if let Some(color) = values.color {
            for &view in &self.target.colors {
                self.api.clear_render_target_view(view, color);
            }
        }
        let mut flags = 0;
        if values.depth.is_some() {
            flags |= d3d::CLEAR_DEPTH;
        }
        if values.stencil.is_some() {
            flags |= d3d::CLEAR_STENCIL;
        }
        if let Some(view) = self.target.depth_stencil.filter(|_| flags != 0) {
            self.api.clear_depth_stencil_view(
                view,
                flags,
                values.depth.unwrap_or(1.0),
                values.stencil.unwrap_or(0),
            );
        }
        Ok(())
    }

    fn present(&mut self, swap_interval: u32) -> RenderResult<()> {
        let result = self.api.present(self.swap_chain, swap_interval);
        self.state.cache.invalidate_all();
        result.map_err(|hr| hr.into_device_error("IDXGISwapChain::Present"))?;
        // Flip-model presents unbind the back buffer from the output merger.
        self.bind_target(self.target.clone());
        self.state.record_frame();
        Ok(())
    }

    fn resize_swapchain(&mut self, size: Extent2D) -> RenderResult<()> {
        if size.is_empty() {
            log::warn!(
                "D3d11Device: Ignored resize to {}x{}",
                size.width,
                size.height
            );
            return Ok(());
        }

        let on_back_buffer = self.target.framebuffer.is_none();
        self.api.om_set_render_targets(&[], None);
        if let Some(back_buffer) = self.back_buffer.take() {
            release_back_buffer(self.api.as_mut(), back_buffer);
        }
        self.state.cache.invalidate_all();
        self.api
            .resize_buffers(self.swap_chain, size.width, size.height, DxgiFormat::UNKNOWN)
            .map_err(|hr| hr.into_device_error("IDXGISwapChain::ResizeBuffers"))?;
        let back_buffer = acquire_back_buffer(
            self.api.as_mut(),
            self.swap_chain,
            size,
            self.state.swapchain.depth_stencil_format,
        )?;
        self.back_buffer = Some(back_buffer);
        self.state.swapchain.extent = size;

        let target = if on_back_buffer {
            self.back_buffer_target()
        } else {
            self.target.clone()
        };
        self.bind_target(target);
        log::info!("D3d11Device: Resized swapchain to {}x{}", size.width, size.height);
        Ok(())
    }

    fn flush(&mut self) -> RenderResult<()> {
        self.api.flush();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for D3d11Device {
    fn drop(&mut self) {
        self.api.om_set_render_targets(&[], None);
        if let Some(back_buffer) = self.back_buffer.take() {
            release_back_buffer(self.api.as_mut(), back_buffer);
        }
        self.api.release(self.swap_chain);
        log::debug!("D3d11Device: Released swap chain and device");
    }
}

#[cfg(test)]
mod tests {
    use super::super::api::HResult;
    use super::*;

    #[test]
    fn slot_limits_are_exclusive() {
        assert!(D3d11Device::check_slot(13, d3d::CONSTANT_BUFFER_SLOT_COUNT, "constant buffer").is_ok());
        let err = D3d11Device::check_slot(14, d3d::CONSTANT_BUFFER_SLOT_COUNT, "constant buffer")
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn hresult_failures_become_device_errors() {
        let err: RenderError = HResult::E_INVALIDARG.into_device_error("CreateBuffer").into();
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("CreateBuffer"));
    }
}
