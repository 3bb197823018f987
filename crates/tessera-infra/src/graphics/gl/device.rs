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

use super::api::{consts as gl, GLenum, GLuint, GlApi, GlContextConfig, GlError};
use super::conversions::{
    self, layer_upload_target, texture_target, GlFormat, GlVertexFormat, IntoGl, Origin,
};
use crate::graphics::common::{alive, check_initial_data, DeviceState};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_core::math::{Extent2D, Extent3D, Origin3D};
use tessera_core::renderer::api::*;
use tessera_core::renderer::shader::ShaderBridge;
use tessera_core::renderer::state_cache::VertexBinding;
use tessera_core::renderer::{
    DeviceError, GraphicsDevice, RenderError, RenderResult, ShaderCode, ShaderCompiler, ShaderError,
    StateSlots, TargetLanguage,
};

/// Texture unit used while creating and updating textures, so uploads never
/// disturb the bindings made through `set_texture`.
const SCRATCH_TEXTURE_UNIT: u32 = 31;

/// The framebuffer draws currently go to.
#[derive(Debug, Clone, Copy)]
struct RenderTarget {
    framebuffer: GLuint,
    extent: Extent2D,
}

/// The OpenGL implementation of [`GraphicsDevice`].
///
/// GL is an immediate, bind-to-edit API: every `set_*` call is forwarded to
/// the context right away and state lives in the context until changed. A
/// single vertex array object is created with the device and stays bound, so
/// `set_vertex_buffer` and `set_index_buffer` edit its attribute and element
/// bindings directly.
#[derive(Debug)]
pub struct GlDevice {
    api: Box<dyn GlApi>,
    state: DeviceState,
    bridge: ShaderBridge,
    vao: GLuint,
    target: RenderTarget,
    program: Option<GLuint>,
    compute_bound: bool,
    mode: GLenum,
    index_format: Option<IndexFormat>,
    /// Vertex-buffer slot that last wrote each attribute location.
    attribute_slots: BTreeMap<u32, u32>,
}

impl GlDevice {
    /// Creates a context on `surface` and the device around it.
    pub fn new(
        mut api: Box<dyn GlApi>,
        surface: &SurfaceHandle,
        initial_size: Extent2D,
        options: DeviceOptions,
        compiler: Arc<dyn ShaderCompiler>,
    ) -> RenderResult<Self> {
        let state = DeviceState::new(BackendType::OpenGl, initial_size, options.clone())?;

        let config = GlContextConfig {
            color_format: options.color_format,
            depth_stencil_format: options.depth_stencil_format,
            debug: options.debug,
        };
        api.create_context(surface, &config)
            .map_err(|message| DeviceError::new("create_context", -1, message))?;
        if options.debug {
            api.enable(gl::DEBUG_OUTPUT);
        }
        if options.color_format.is_srgb() {
            api.enable(gl::FRAMEBUFFER_SRGB);
        }

        let vao = api.gen_vertex_array();
        if vao == 0 {
            let code = api.get_error();
            return Err(GlError(code).into_device_error("glGenVertexArrays").into());
        }
        api.bind_vertex_array(vao);
        api.viewport(0, 0, initial_size.width, initial_size.height);

        let mut device = Self {
            api,
            state,
            bridge: ShaderBridge::new(
                compiler,
                TargetLanguage::Glsl {
                    version: 450,
                    es: false,
                },
            ),
            vao,
            target: RenderTarget {
                framebuffer: 0,
                extent: initial_size,
            },
            program: None,
            compute_bound: false,
            mode: PrimitiveTopology::default().into_gl(),
            index_format: None,
            attribute_slots: BTreeMap::new(),
        };
        device.check("create_context")?;

        log::info!(
            "GlDevice: Created device ({}x{}, debug: {}, state cache: {})",
            initial_size.width,
            initial_size.height,
            options.debug,
            options.state_cache
        );
        Ok(device)
    }

    /// The native driver this device talks to.
    pub fn api(&self) -> &dyn GlApi {
        self.api.as_ref()
    }

    /// Polls `glGetError` and converts a pending error.
    fn check(&mut self, operation: &'static str) -> RenderResult<()> {
        match self.api.get_error() {
            gl::NO_ERROR => Ok(()),
            code => Err(GlError(code).into_device_error(operation).into()),
        }
    }

    /// Like [`check`](Self::check), but only in debug mode. Used after binds
    /// and draws, which are too frequent to poll otherwise.
    fn debug_check(&mut self, operation: &'static str) -> RenderResult<()> {
        if self.state.options.debug {
            self.check(operation)
        } else {
            Ok(())
        }
    }

    /// The error for an object-creating call that returned name `0`.
    fn creation_failed(&mut self, operation: &'static str) -> RenderError {
        let code = match self.api.get_error() {
            gl::NO_ERROR => gl::OUT_OF_MEMORY,
            code => code,
        };
        GlError(code).into_device_error(operation).into()
    }

    fn name(&self, handle: NativeHandle) -> RenderResult<GLuint> {
        let raw = self.state.raw(handle)?;
        GLuint::try_from(raw)
            .map_err(|_| RenderError::config(format!("{raw:#x} is not a GL object name")))
    }

    fn owns(&self, handle: NativeHandle) -> bool {
        if handle.backend() == BackendType::OpenGl {
            true
        } else {
            log::warn!("GlDevice: Ignored dispose of a {:?} resource", handle.backend());
            false
        }
    }

    fn require_graphics(&self) -> RenderResult<()> {
        match self.program {
            Some(_) if !self.compute_bound => Ok(()),
            Some(_) => Err(RenderError::config(
                "a compute shader is bound; draws need a graphics shader",
            )),
            None => Err(RenderError::config("no shader is bound")),
        }
    }

    fn upload(
        &mut self,
        desc: &TextureDescriptor,
        format: GlFormat,
        region: &TextureRegion,
        data: &[u8],
    ) {
        let (target, layer) = layer_upload_target(desc, region.array_layer);
        let (origin, size) = match layer {
            Origin::None => (region.origin, region.size),
            Origin::Y(layer) => (
                Origin3D::new(region.origin.x, layer, 0),
                Extent3D::new(region.size.width, 1, 1),
            ),
            Origin::Z(layer) => (
                Origin3D::new(region.origin.x, region.origin.y, layer),
                Extent3D::new(region.size.width, region.size.height, 1),
            ),
        };
        if desc.format.is_compressed() {
            self.api
                .compressed_tex_sub_image(target, region.mip_level, origin, size, format.internal, data);
        } else {
            self.api.tex_sub_image(
                target,
                region.mip_level,
                origin,
                size,
                format.format,
                format.ty,
                data,
            );
        }
    }

    fn attach(
        &mut self,
        point: GLenum,
        attachment: &FramebufferAttachment<'_>,
    ) -> RenderResult<()> {
        let texture = attachment.texture;
        let native = alive(texture.native(), "texture", texture.id())?;
        let name = self.name(native.storage)?;
        let desc = texture.desc();
        match texture_target(desc) {
            gl::TEXTURE_1D | gl::TEXTURE_2D => self.api.framebuffer_texture_2d(
                gl::FRAMEBUFFER,
                point,
                texture_target(desc),
                name,
                attachment.mip_level,
            ),
            gl::TEXTURE_CUBE_MAP => self.api.framebuffer_texture_2d(
                gl::FRAMEBUFFER,
                point,
                gl::TEXTURE_CUBE_MAP_POSITIVE_X + attachment.array_layer,
                name,
                attachment.mip_level,
            ),
            _ => self.api.framebuffer_texture_layer(
                gl::FRAMEBUFFER,
                point,
                name,
                attachment.mip_level,
                attachment.array_layer,
            ),
        }
        Ok(())
    }

    fn bind_target(&mut self, target: RenderTarget) {
        self.api.bind_framebuffer(gl::FRAMEBUFFER, target.framebuffer);
        self.api
            .viewport(0, 0, target.extent.width, target.extent.height);
        self.target = target;
    }

    fn dispose_state<D>(&mut self, state: &mut StateObject<D>) {
        if let Some(handle) = state.native() {
            if !self.owns(handle) {
                return;
            }
        }
        if state.take_native().is_some() {
            self.state.release(ResourceKind::StateObject);
        }
    }
}

impl GraphicsDevice for GlDevice {
    fn backend(&self) -> BackendType {
        BackendType::OpenGl
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
        let size = usize::try_from(desc.size)
            .map_err(|_| RenderError::config(format!("buffer size {} overflows usize", desc.size)))?;

        let name = self.api.gen_buffer();
        if name == 0 {
            return Err(self.creation_failed("glGenBuffers"));
        }
        let usage = if desc.dynamic {
            gl::DYNAMIC_DRAW
        } else {
            gl::STATIC_DRAW
        };
        self.api.bind_buffer(gl::COPY_WRITE_BUFFER, name);
        self.api.buffer_data(gl::COPY_WRITE_BUFFER, size, data, usage);
        self.api.bind_buffer(gl::COPY_WRITE_BUFFER, 0);
        if let Err(err) = self.check("glBufferData") {
            self.api.delete_buffer(name);
            return Err(err);
        }

        let id = self.state.register(ResourceKind::Buffer);
        log::debug!(
            "GlDevice: Created {:?} buffer {id:?} ({} bytes, dynamic: {})",
            desc.kind,
            desc.size,
            desc.dynamic
        );
        Ok(Buffer::new(
            id,
            desc.clone(),
            BufferNative {
                buffer: NativeHandle::Gl(name),
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

        let format = conversions::to_native_format(desc.format, FormatUsage::ShaderRead);
        let target = texture_target(&desc);
        let storage_size = match target {
            gl::TEXTURE_1D_ARRAY => Extent3D::new(desc.width, desc.layer_count(), 1),
            gl::TEXTURE_2D_ARRAY | gl::TEXTURE_CUBE_MAP_ARRAY => {
                Extent3D::new(desc.width, desc.height, desc.layer_count())
            }
            _ => desc.extent(),
        };

        let name = self.api.gen_texture();
        if name == 0 {
            return Err(self.creation_failed("glGenTextures"));
        }
        self.api.active_texture(gl::TEXTURE0 + SCRATCH_TEXTURE_UNIT);
        self.api.bind_texture(target, name);
        self.api
            .tex_storage(target, desc.mip_levels, format.internal, storage_size);

        if let Some(data) = data {
            for upload in initial_data_layout(&desc) {
                if upload.skip {
                    log::debug!(
                        "GlDevice: Skipped sub-block upload of mip {} layer {}",
                        upload.mip_level,
                        upload.array_layer
                    );
                    continue;
                }
                self.upload(&desc, format, &upload.region(), upload.bytes(data));
            }
        }
        self.api.bind_texture(target, 0);
        if let Err(err) = self.check("glTexStorage") {
            self.api.delete_texture(name);
            return Err(err);
        }

        let id = self.state.register(ResourceKind::Texture);
        log::debug!(
            "GlDevice: Created {:?} texture {id:?} ({}x{}x{}, {} mips, {:?})",
            desc.texture_type,
            desc.width,
            desc.height,
            desc.depth,
            desc.mip_levels,
            desc.format
        );
        Ok(Texture::new(
            id,
            desc,
            TextureNative {
                storage: NativeHandle::Gl(name),
                shader_view: None,
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

        let mut objects: Vec<GLuint> = Vec::with_capacity(bridged.len());
        let cleanup = |api: &mut dyn GlApi, objects: &[GLuint]| {
            for &object in objects {
                api.delete_shader(object);
            }
        };

        for stage in &bridged {
            let ShaderCode::Source(source) = &stage.code else {
                cleanup(self.api.as_mut(), &objects);
                return Err(RenderError::config("the GL backend needs GLSL source"));
            };
            let object = self.api.create_shader(stage.info.stage.into_gl());
            if object == 0 {
                cleanup(self.api.as_mut(), &objects);
                return Err(self.creation_failed("glCreateShader"));
            }
            objects.push(object);
            self.api.shader_source(object, source);
            self.api.compile_shader(object);
            if !self.api.get_shader_compile_status(object) {
                let diagnostics = self.api.get_shader_info_log(object);
                cleanup(self.api.as_mut(), &objects);
                return Err(ShaderError::NativeCompilation {
                    stage: stage.info.stage,
                    diagnostics,
                }
                .into());
            }
        }

        let program = self.api.create_program();
        if program == 0 {
            cleanup(self.api.as_mut(), &objects);
            return Err(self.creation_failed("glCreateProgram"));
        }
        for &object in &objects {
            self.api.attach_shader(program, object);
        }
        self.api.link_program(program);
        let linked = self.api.get_program_link_status(program);
        for &object in &objects {
            self.api.detach_shader(program, object);
        }
        cleanup(self.api.as_mut(), &objects);
        if !linked {
            let diagnostics = self.api.get_program_info_log(program);
            self.api.delete_program(program);
            let stage = match stages[0].stage {
                ShaderStage::Compute => ShaderStage::Compute,
                _ => ShaderStage::Vertex,
            };
            return Err(ShaderError::NativeCompilation {
                stage,
                diagnostics,
            }
            .into());
        }

        // Blocks and samplers are assigned the bindings recorded in reflection.
        self.api.use_program(program);
        for stage in &bridged {
            let reflection = &stage.info.reflection;
            for block in &reflection.ubos {
                let name = reflection
                    .block_type(block)
                    .map_or(block.name.as_str(), |ty| ty.name.as_str());
                if let Some(index) = self.api.get_uniform_block_index(program, name) {
                    self.api.uniform_block_binding(program, index, block.binding);
                }
            }
            for texture in &reflection.textures {
                if let Some(location) = self.api.get_uniform_location(program, &texture.name) {
                    self.api.uniform_1i(location, texture.binding as i32);
                }
            }
        }
        self.api.use_program(self.program.unwrap_or(0));
        self.state.cache.invalidate(StateSlots::SHADER);
        if let Err(err) = self.check("glLinkProgram") {
            self.api.delete_program(program);
            return Err(err);
        }

        let id = self.state.register(ResourceKind::Shader);
        log::debug!("GlDevice: Created shader {id:?} with program {program} ({} stages)", bridged.len());
        Ok(Shader::new(
            id,
            bridged.into_iter().map(|stage| stage.info).collect(),
            specialization.to_vec(),
            ShaderNative {
                program: Some(NativeHandle::Gl(program)),
                set_layout: None,
                stages: Vec::new(),
            },
        ))
    }

    fn create_input_layout(&mut self, attributes: &[VertexAttribute]) -> RenderResult<InputLayout> {
        validate_attributes(attributes)?;
        let id = self.state.register(ResourceKind::InputLayout);
        Ok(InputLayout::new(id, attributes.to_vec(), NativeHandle::Gl(0)))
    }

    fn create_blend_state(&mut self, desc: &BlendDescriptor) -> RenderResult<BlendState> {
        let id = self.state.register(ResourceKind::StateObject);
        Ok(BlendState::new(id, *desc, NativeHandle::Gl(0)))
    }

    fn create_depth_stencil_state(
        &mut self,
        desc: &DepthStencilDescriptor,
    ) -> RenderResult<DepthStencilState> {
        let id = self.state.register(ResourceKind::StateObject);
        Ok(DepthStencilState::new(id, *desc, NativeHandle::Gl(0)))
    }

    fn create_rasterizer_state(
        &mut self,
        desc: &RasterizerDescriptor,
    ) -> RenderResult<RasterizerState> {
        let id = self.state.register(ResourceKind::StateObject);
        Ok(RasterizerState::new(id, *desc, NativeHandle::Gl(0)))
    }

    fn create_sampler_state(&mut self, desc: &SamplerDescriptor) -> RenderResult<SamplerState> {
        desc.validate()?;
        let sampler = self.api.gen_sampler();
        if sampler == 0 {
            return Err(self.creation_failed("glGenSamplers"));
        }
        let api = self.api.as_mut();
        api.sampler_parameter_i(
            sampler,
            gl::TEXTURE_MIN_FILTER,
            conversions::min_filter(desc.min_filter, desc.mip_filter) as i32,
        );
        api.sampler_parameter_i(
            sampler,
            gl::TEXTURE_MAG_FILTER,
            conversions::mag_filter(desc.mag_filter) as i32,
        );
        api.sampler_parameter_i(sampler, gl::TEXTURE_WRAP_S, desc.address_u.into_gl() as i32);
        api.sampler_parameter_i(sampler, gl::TEXTURE_WRAP_T, desc.address_v.into_gl() as i32);
        api.sampler_parameter_i(sampler, gl::TEXTURE_WRAP_R, desc.address_w.into_gl() as i32);
        api.sampler_parameter_f(sampler, gl::TEXTURE_MIN_LOD, desc.lod_min_clamp);
        api.sampler_parameter_f(sampler, gl::TEXTURE_MAX_LOD, desc.lod_max_clamp);
        api.sampler_parameter_f(sampler, gl::TEXTURE_LOD_BIAS, desc.mip_lod_bias);
        if desc.max_anisotropy > 1 {
            api.sampler_parameter_f(sampler, gl::TEXTURE_MAX_ANISOTROPY, desc.max_anisotropy as f32);
        }
        if let Some(compare) = desc.compare {
            api.sampler_parameter_i(sampler, gl::TEXTURE_COMPARE_MODE, gl::COMPARE_REF_TO_TEXTURE as i32);
            api.sampler_parameter_i(sampler, gl::TEXTURE_COMPARE_FUNC, compare.into_gl() as i32);
        }
        api.sampler_parameter_fv(sampler, gl::TEXTURE_BORDER_COLOR, desc.border_color.into_gl());
        if let Err(err) = self.check("glSamplerParameter") {
            self.api.delete_sampler(sampler);
            return Err(err);
        }

        let id = self.state.register(ResourceKind::StateObject);
        Ok(SamplerState::new(id, *desc, NativeHandle::Gl(sampler)))
    }

    fn create_framebuffer(
        &mut self,
        attachments: &[FramebufferAttachment<'_>],
    ) -> RenderResult<Framebuffer> {
        let layout = FramebufferLayout::plan(attachments)?;
        for attachment in attachments {
            let native = alive(attachment.texture.native(), "texture", attachment.texture.id())?;
            self.name(native.storage)?;
        }

        let fbo = self.api.gen_framebuffer();
        if fbo == 0 {
            return Err(self.creation_failed("glGenFramebuffers"));
        }
        self.api.bind_framebuffer(gl::FRAMEBUFFER, fbo);
        let mut draw_buffers = Vec::with_capacity(layout.colors.len());
        for attachment in attachments {
            let format = attachment.texture.desc().format;
            let point = if format.is_depth() {
                if format.has_stencil() {
                    gl::DEPTH_STENCIL_ATTACHMENT
                } else {
                    gl::DEPTH_ATTACHMENT
                }
            } else {
                let point = gl::COLOR_ATTACHMENT0 + draw_buffers.len() as u32;
                draw_buffers.push(point);
                point
            };
            self.attach(point, attachment)?;
        }
        self.api.draw_buffers(&draw_buffers);
        let status = self.api.check_framebuffer_status(gl::FRAMEBUFFER);
        self.api.bind_framebuffer(gl::FRAMEBUFFER, self.target.framebuffer);

        if status != gl::FRAMEBUFFER_COMPLETE {
            self.api.delete_framebuffer(fbo);
            return Err(DeviceError::new(
                "glCheckFramebufferStatus",
                status as i64,
                "framebuffer is incomplete",
            )
            .into());
        }
        if let Err(err) = self.check("glFramebufferTexture") {
            self.api.delete_framebuffer(fbo);
            return Err(err);
        }

        let id = self.state.register(ResourceKind::Framebuffer);
        log::debug!(
            "GlDevice: Created framebuffer {id:?} ({} color, depth: {})",
            layout.colors.len(),
            layout.depth_stencil.is_some()
        );
        Ok(Framebuffer::new(
            id,
            layout,
            FramebufferNative {
                framebuffer: Some(NativeHandle::Gl(fbo)),
                render_pass: None,
                views: Vec::new(),
            },
        ))
    }

    fn update_buffer(&mut self, buffer: &Buffer, offset: u64, data: &[u8]) -> RenderResult<()> {
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let name = self.name(native.buffer)?;
        buffer.desc().validate_range(offset, data.len())?;
        if self.state.is_mapped(buffer.id()) {
            return Err(RenderError::config(format!(
                "buffer {:?} is mapped and cannot be updated",
                buffer.id()
            )));
        }

        self.api.bind_buffer(gl::COPY_WRITE_BUFFER, name);
        self.api
            .buffer_sub_data(gl::COPY_WRITE_BUFFER, offset as usize, data);
        self.api.bind_buffer(gl::COPY_WRITE_BUFFER, 0);
        self.check("glBufferSubData")
    }

    fn map_buffer(&mut self, buffer: &Buffer) -> RenderResult<MappedResource> {
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let name = self.name(native.buffer)?;
        self.state.begin_map(buffer)?;

        let len = buffer.desc().size as usize;
        self.api.bind_buffer(gl::COPY_WRITE_BUFFER, name);
        let ptr = self.api.map_buffer_range(
            gl::COPY_WRITE_BUFFER,
            0,
            len,
            gl::MAP_WRITE_BIT | gl::MAP_INVALIDATE_BUFFER_BIT,
        );
        self.api.bind_buffer(gl::COPY_WRITE_BUFFER, 0);

        match ptr {
            // SAFETY: the driver returned a writable mapping of `len` bytes that
            // stays valid until `glUnmapBuffer`, which only `unmap_buffer` issues.
            Some(ptr) => Ok(unsafe { MappedResource::new(ptr, len) }),
            None => {
                self.state.end_map(buffer.id());
                Err(self.creation_failed("glMapBufferRange"))
            }
        }
    }

    fn unmap_buffer(&mut self, buffer: &Buffer) -> RenderResult<()> {
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let name = self.name(native.buffer)?;
        if !self.state.end_map(buffer.id()) {
            log::warn!("GlDevice: Ignored unmap of buffer {:?}, it is not mapped", buffer.id());
            return Ok(());
        }

        self.api.bind_buffer(gl::COPY_WRITE_BUFFER, name);
        let intact = self.api.unmap_buffer(gl::COPY_WRITE_BUFFER);
        self.api.bind_buffer(gl::COPY_WRITE_BUFFER, 0);
        if !intact {
            return Err(DeviceError::new(
                "glUnmapBuffer",
                0,
                "buffer contents were corrupted while mapped",
            )
            .into());
        }
        self.check("glUnmapBuffer")
    }

    fn update_texture(
        &mut self,
        texture: &Texture,
        region: &TextureRegion,
        data: &[u8],
    ) -> RenderResult<()> {
        let native = alive(texture.native(), "texture", texture.id())?;
        let name = self.name(native.storage)?;
        let desc = texture.desc();
        region.validate(desc, data.len())?;
        if is_sub_block_upload(desc.format, region.size.width, region.size.height) {
            log::debug!("GlDevice: Skipped sub-block update of texture {:?}", texture.id());
            return Ok(());
        }

        let format = conversions::to_native_format(desc.format, FormatUsage::ShaderRead);
        let target = texture_target(desc);
        self.api.active_texture(gl::TEXTURE0 + SCRATCH_TEXTURE_UNIT);
        self.api.bind_texture(target, name);
        self.upload(desc, format, region, data);
        self.api.bind_texture(target, 0);
        self.check("glTexSubImage")
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
        let name = native.buffer.raw() as GLuint;
        if self.state.end_map(buffer.id()) {
            self.api.bind_buffer(gl::COPY_WRITE_BUFFER, name);
            self.api.unmap_buffer(gl::COPY_WRITE_BUFFER);
            self.api.bind_buffer(gl::COPY_WRITE_BUFFER, 0);
        }
        self.api.delete_buffer(name);
        self.state.release(ResourceKind::Buffer);
        log::debug!("GlDevice: Destroyed buffer with ID: {:?}", buffer.id());
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
        self.api.delete_texture(native.storage.raw() as GLuint);
        self.state.release(ResourceKind::Texture);
        log::debug!("GlDevice: Destroyed texture with ID: {:?}", texture.id());
    }

    fn dispose_shader(&mut self, shader: &mut Shader) {
        let Some(native) = shader.take_native() else {
            return;
        };
        if let Some(program) = native.program {
            let program = program.raw() as GLuint;
            if self.program == Some(program) {
                self.program = None;
                self.compute_bound = false;
            }
            self.api.delete_program(program);
        }
        self.state.release(ResourceKind::Shader);
        log::debug!("GlDevice: Destroyed shader with ID: {:?}", shader.id());
    }

    fn dispose_input_layout(&mut self, layout: &mut InputLayout) {
        if layout.take_native().is_some() {
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
        if let Some(handle) = state.native() {
            if !self.owns(handle) {
                return;
            }
        }
        if let Some(handle) = state.take_native() {
            self.api.delete_sampler(handle.raw() as GLuint);
            self.state.release(ResourceKind::StateObject);
        }
    }

    fn dispose_framebuffer(&mut self, framebuffer: &mut Framebuffer) {
        let Some(native) = framebuffer.take_native() else {
            return;
        };
        if let Some(handle) = native.framebuffer {
            let fbo = handle.raw() as GLuint;
            if self.target.framebuffer == fbo {
                self.bind_target(RenderTarget {
                    framebuffer: 0,
                    extent: self.state.swapchain.extent,
                });
            }
            self.api.delete_framebuffer(fbo);
        }
        self.state.release(ResourceKind::Framebuffer);
        log::debug!("GlDevice: Destroyed framebuffer with ID: {:?}", framebuffer.id());
    }

    fn set_shader(&mut self, shader: &Shader) -> RenderResult<()> {
        let native = alive(shader.native(), "shader", shader.id())?;
        let program = match native.program {
            Some(handle) => self.name(handle)?,
            None => return Err(RenderError::config("shader has no linked program")),
        };
        if self.state.cache.set_shader(shader.id()) {
            self.api.use_program(program);
            if let Err(err) = self.debug_check("glUseProgram") {
                self.state.cache.invalidate(StateSlots::SHADER);
                return Err(err);
            }
        }
        self.program = Some(program);
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
        let name = self.name(native.buffer)?;
        alive(layout.native(), "input layout", layout.id())?;
        if buffer.desc().kind != BufferKind::Vertex {
            return Err(RenderError::config(format!(
                "{:?} buffer bound as a vertex buffer",
                buffer.desc().kind
            )));
        }

        let binding = VertexBinding {
            buffer: buffer.id(),
            stride,
            layout: layout.id(),
        };
        if !self.state.cache.set_vertex_buffer(slot, binding) {
            return Ok(());
        }

        self.api.bind_buffer(gl::ARRAY_BUFFER, name);
        for (location, attribute) in layout.attributes().iter().enumerate() {
            if attribute.buffer_slot != slot {
                continue;
            }
            let location = location as u32;
            let format: GlVertexFormat = attribute.format.into_gl();
            self.api.enable_vertex_attrib_array(location);
            if format.integer {
                self.api.vertex_attrib_i_pointer(
                    location,
                    format.size,
                    format.ty,
                    stride,
                    attribute.offset,
                );
            } else {
                self.api.vertex_attrib_pointer(
                    location,
                    format.size,
                    format.ty,
                    format.normalized,
                    stride,
                    attribute.offset,
                );
            }
            let divisor = match attribute.rate {
                VertexInputRate::Vertex => 0,
                VertexInputRate::Instance => 1,
            };
            self.api.vertex_attrib_divisor(location, divisor);

            // Attribute pointers live per location, so a slot whose location
            // was just repointed no longer matches its cached binding.
            if let Some(previous) = self.attribute_slots.insert(location, slot) {
                if previous != slot {
                    self.state.cache.forget_vertex_buffer(previous);
                }
            }
        }
        if let Err(err) = self.debug_check("glVertexAttribPointer") {
            self.state.cache.invalidate(StateSlots::VERTEX_BUFFERS);
            return Err(err);
        }
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: &Buffer, format: IndexFormat) -> RenderResult<()> {
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let name = self.name(native.buffer)?;
        if buffer.desc().kind != BufferKind::Index {
            return Err(RenderError::config(format!(
                "{:?} buffer bound as an index buffer",
                buffer.desc().kind
            )));
        }
        self.api.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, name);
        self.index_format = Some(format);
        self.debug_check("glBindBuffer")
    }

    fn set_uniform_buffer(&mut self, slot: u32, buffer: &Buffer) -> RenderResult<()> {
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let name = self.name(native.buffer)?;
        let target = match buffer.desc().kind {
            BufferKind::Uniform => gl::UNIFORM_BUFFER,
            BufferKind::Storage => gl::SHADER_STORAGE_BUFFER,
            kind => {
                return Err(RenderError::config(format!(
                    "{kind:?} buffer bound as a uniform buffer"
                )))
            }
        };
        self.api.bind_buffer_base(target, slot, name);
        self.debug_check("glBindBufferBase")
    }

    fn set_texture(
        &mut self,
        slot: u32,
        texture: &Texture,
        sampler: &SamplerState,
    ) -> RenderResult<()> {
        let native = alive(texture.native(), "texture", texture.id())?;
        let name = self.name(native.storage)?;
        let sampler_handle = alive(sampler.native(), "sampler", sampler.id())?;
        let sampler_name = self.name(sampler_handle)?;

        self.api.active_texture(gl::TEXTURE0 + slot);
        self.api.bind_texture(texture_target(texture.desc()), name);
        self.api.bind_sampler(slot, sampler_name);
        self.debug_check("glBindTexture")
    }

    fn set_rasterizer_state(&mut self, state: &RasterizerState) -> RenderResult<()> {
        alive(state.native(), "rasterizer state", state.id())?;
        let desc = *state.desc();
        if !self.state.cache.set_rasterizer(&desc) {
            return Ok(());
        }

        let api = self.api.as_mut();
        match desc.cull_mode.into_gl() {
            Some(face) => {
                api.enable(gl::CULL_FACE);
                api.cull_face(face);
            }
            None => api.disable(gl::CULL_FACE),
        }
        api.front_face(desc.front_face.into_gl());
        api.polygon_mode(gl::FRONT_AND_BACK, desc.fill_mode.into_gl());
        if desc.has_depth_bias() {
            api.enable(gl::POLYGON_OFFSET_FILL);
            api.polygon_offset(desc.depth_bias_slope_scale, desc.depth_bias as f32);
        } else {
            api.disable(gl::POLYGON_OFFSET_FILL);
        }
        if desc.depth_clip_enabled {
            api.disable(gl::DEPTH_CLAMP);
        } else {
            api.enable(gl::DEPTH_CLAMP);
        }
        if desc.scissor_enabled {
            api.enable(gl::SCISSOR_TEST);
        } else {
            api.disable(gl::SCISSOR_TEST);
        }
        if let Err(err) = self.debug_check("set_rasterizer_state") {
            self.state.cache.invalidate(StateSlots::RASTERIZER);
            return Err(err);
        }
        Ok(())
    }

    fn set_blend_state(&mut self, state: &BlendState) -> RenderResult<()> {
        alive(state.native(), "blend state", state.id())?;
        let desc = *state.desc();
        if !self.state.cache.set_blend(&desc) {
            return Ok(());
        }

        let api = self.api.as_mut();
        if desc.enabled {
            api.enable(gl::BLEND);
        } else {
            api.disable(gl::BLEND);
        }
        api.blend_func_separate(
            desc.color.src_factor.into_gl(),
            desc.color.dst_factor.into_gl(),
            desc.alpha.src_factor.into_gl(),
            desc.alpha.dst_factor.into_gl(),
        );
        api.blend_equation_separate(desc.color.operation.into_gl(), desc.alpha.operation.into_gl());
        api.blend_color(desc.constant);
        let mask = desc.write_mask;
        api.color_mask(
            mask.contains(ColorWrites::RED),
            mask.contains(ColorWrites::GREEN),
            mask.contains(ColorWrites::BLUE),
            mask.contains(ColorWrites::ALPHA),
        );
        if let Err(err) = self.debug_check("set_blend_state") {
            self.state.cache.invalidate(StateSlots::BLEND);
            return Err(err);
        }
        Ok(())
    }

    fn set_depth_stencil_state(
        &mut self,
        state: &DepthStencilState,
        stencil_ref: Option<u32>,
    ) -> RenderResult<()> {
        alive(state.native(), "depth/stencil state", state.id())?;
        let desc = *state.desc();
        let reference = stencil_ref.unwrap_or(0);
        if !self.state.cache.set_depth_stencil(&desc, reference) {
            return Ok(());
        }

        let api = self.api.as_mut();
        if desc.depth_test_enabled {
            api.enable(gl::DEPTH_TEST);
        } else {
            api.disable(gl::DEPTH_TEST);
        }
        api.depth_func(desc.depth_compare.into_gl());
        api.depth_mask(desc.depth_write_enabled);
        if desc.stencil_enabled {
            api.enable(gl::STENCIL_TEST);
        } else {
            api.disable(gl::STENCIL_TEST);
        }
        for (face, stencil) in [(gl::FRONT, desc.front), (gl::BACK, desc.back)] {
            api.stencil_func_separate(
                face,
                stencil.compare.into_gl(),
                reference as i32,
                desc.stencil_read_mask as u32,
            );
            api.stencil_op_separate(
                face,
                stencil.fail_op.into_gl(),
                stencil.depth_fail_op.into_gl(),
                stencil.pass_op.into_gl(),
            );
        }
        api.stencil_mask(desc.stencil_write_mask as u32);
        if let Err(err) = self.debug_check("set_depth_stencil_state") {
            self.state.cache.invalidate(StateSlots::DEPTH_STENCIL);
            return Err(err);
        }
        Ok(())
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> RenderResult<()> {
        // GL takes the mode with each draw call.
        if self.state.cache.set_topology(topology) {
            self.mode = topology.into_gl();
        }
        self.state.topology = topology;
        Ok(())
    }

    fn set_framebuffer(&mut self, framebuffer: Option<&Framebuffer>) -> RenderResult<()> {
        let target = match framebuffer {
            Some(framebuffer) => {
                let native = alive(framebuffer.native(), "framebuffer", framebuffer.id())?;
                let handle = native
                    .framebuffer
                    .ok_or_else(|| RenderError::config("framebuffer has no GL object"))?;
                RenderTarget {
                    framebuffer: self.name(handle)?,
                    extent: framebuffer.extent(),
                }
            }
            None => RenderTarget {
                framebuffer: 0,
                extent: self.state.swapchain.extent,
            },
        };
        self.bind_target(target);
        self.debug_check("glBindFramebuffer")
    }

    fn set_uniform_value(&mut self, name: &str, value: UniformValue) -> RenderResult<()> {
        let program = self
            .program
            .ok_or_else(|| RenderError::config("no shader is bound"))?;
        let Some(location) = self.api.get_uniform_location(program, name) else {
            log::warn!("GlDevice: Bound program has no active uniform named '{name}'");
            return Ok(());
        };

        self.api.use_program(program);
        match value {
            UniformValue::Float(v) => self.api.uniform_1f(location, v),
            UniformValue::Int(v) => self.api.uniform_1i(location, v),
        }
        self.state.cache.invalidate(StateSlots::SHADER);
        self.debug_check("glUniform")
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) -> RenderResult<()> {
        self.require_graphics()?;
        self.api.draw_arrays(self.mode, start_vertex, vertex_count);
        self.debug_check("glDrawArrays")?;
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
        let format = self
            .index_format
            .ok_or_else(|| RenderError::config("no index buffer is bound"))?;
        let offset = start_index as usize * format.size_bytes() as usize;
        self.api
            .draw_elements_base_vertex(self.mode, index_count, format.into_gl(), offset, base_vertex);
        self.debug_check("glDrawElementsBaseVertex")?;
        self.state.record_draw(index_count, 1);
        Ok(())
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
    ) -> RenderResult<()> {
        self.require_graphics()?;
        let format = self
            .index_format
            .ok_or_else(|| RenderError::config("no index buffer is bound"))?;
        self.api
            .draw_elements_instanced(self.mode, index_count, format.into_gl(), 0, instance_count);
        self.debug_check("glDrawElementsInstanced")?;
        self.state.record_draw(index_count, instance_count);
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> RenderResult<()> {
        if !self.compute_bound {
            return Err(RenderError::config("dispatch needs a bound compute shader"));
        }
        self.api.dispatch_compute(x, y, z);
        self.debug_check("glDispatchCompute")?;
        self.state.record_dispatch();
        Ok(())
    }

    fn clear(&mut self, values: ClearValues) -> RenderResult<()> {
        if values.is_empty() {
            return Ok(());
        }

        let mut mask = 0;
        if let Some(color) = values.color {
            self.api.color_mask(true, true, true, true);
            self.api.clear_color(color);
            mask |= gl::COLOR_BUFFER_BIT;
        }
        if let Some(depth) = values.depth {
            self.api.depth_mask(true);
            self.api.clear_depth(depth);
            mask |= gl::DEPTH_BUFFER_BIT;
        }
        if let Some(stencil) = values.stencil {
            self.api.stencil_mask(0xff);
            self.api.clear_stencil(stencil as i32);
            mask |= gl::STENCIL_BUFFER_BIT;
        }
        self.api.clear(mask);
        // The write masks were forced on above.
        self.state
            .cache
            .invalidate(StateSlots::BLEND | StateSlots::DEPTH_STENCIL);
        self.debug_check("glClear")
    }

    fn present(&mut self, swap_interval: u32) -> RenderResult<()> {
        self.api.swap_buffers(swap_interval);
        self.state.cache.invalidate_all();
        self.check("SwapBuffers")?;
        self.state.record_frame();
        Ok(())
    }

    fn resize_swapchain(&mut self, size: Extent2D) -> RenderResult<()> {
        if size.is_empty() {
            log::warn!(
                "GlDevice: Ignored resize to {}x{}",
                size.width,
                size.height
            );
            return Ok(());
        }
        self.api.resize_surface(size.width, size.height);
        self.state.swapchain.extent = size;
        if self.target.framebuffer == 0 {
            self.bind_target(RenderTarget {
                framebuffer: 0,
                extent: size,
            });
        }
        self.state.cache.invalidate_all();
        log::info!("GlDevice: Resized swapchain to {}x{}", size.width, size.height);
        self.check("resize_surface")
    }

    fn flush(&mut self) -> RenderResult<()> {
        self.api.flush();
        self.check("glFlush")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlDevice {
    fn drop(&mut self) {
        self.api.bind_vertex_array(0);
        self.api.delete_vertex_array(self.vao);
        log::debug!("GlDevice: Released device context");
    }
}

