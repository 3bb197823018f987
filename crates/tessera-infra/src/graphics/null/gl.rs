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
use crate::graphics::gl::{consts as gl, GLenum, GLint, GLuint, GlApi, GlContextConfig};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::ptr::NonNull;
use tessera_core::math::{Extent2D, Extent3D, Origin3D};
use tessera_core::renderer::api::SurfaceHandle;

const FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT: GLenum = 0x8CD7;

#[derive(Debug, Default)]
struct BufferObject {
    data: Vec<u8>,
    mapped: bool,
}

#[derive(Debug, Clone, Copy)]
struct TextureStorage {
    levels: u32,
}

#[derive(Debug)]
struct ShaderObject {
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramObject {
    attached: Vec<GLuint>,
    linked: bool,
    log: String,
    blocks: Vec<String>,
    block_bindings: BTreeMap<u32, u32>,
    uniforms: Vec<String>,
    values: BTreeMap<String, String>,
}

/// Collects the uniform blocks and plain uniforms declared by GLSL source.
fn declared_uniforms(source: &str, blocks: &mut Vec<String>, uniforms: &mut Vec<String>) {
    for line in source.lines() {
        let Some((_, rest)) = line.split_once("uniform ") else {
            continue;
        };
        let mut tokens = rest.split_whitespace();
        let (Some(first), second) = (tokens.next(), tokens.next()) else {
            continue;
        };
        match second {
            None | Some("{") => blocks.push(first.trim_end_matches(';').to_string()),
            Some(name) => uniforms.push(name.trim_end_matches(';').to_string()),
        }
    }
}

fn capability_name(cap: GLenum) -> String {
    let name = match cap {
        gl::BLEND => "GL_BLEND",
        gl::CULL_FACE => "GL_CULL_FACE",
        gl::DEPTH_TEST => "GL_DEPTH_TEST",
        gl::STENCIL_TEST => "GL_STENCIL_TEST",
        gl::SCISSOR_TEST => "GL_SCISSOR_TEST",
        gl::DEPTH_CLAMP => "GL_DEPTH_CLAMP",
        gl::POLYGON_OFFSET_FILL => "GL_POLYGON_OFFSET_FILL",
        gl::FRAMEBUFFER_SRGB => "GL_FRAMEBUFFER_SRGB",
        gl::DEBUG_OUTPUT => "GL_DEBUG_OUTPUT",
        other => return format!("cap {other:#06x}"),
    };
    name.to_string()
}

/// Cube faces are uploaded through their face target but bound as a cube.
fn binding_target(target: GLenum) -> GLenum {
    if (gl::TEXTURE_CUBE_MAP_POSITIVE_X..gl::TEXTURE_CUBE_MAP_POSITIVE_X + 6).contains(&target) {
        gl::TEXTURE_CUBE_MAP
    } else {
        target
    }
}

/// An in-memory GL 4.5 context.
///
/// Buffer contents are stored, so mapped writes and `glBufferSubData` can be
/// inspected. Shader objects compile unless their source contains `#error`,
/// and linking collects the uniforms and blocks the sources declare. Errors
/// are latched like `glGetError`: the first one sticks until read.
#[derive(Debug, Default)]
pub struct NullGl {
    ledger: Ledger,
    failures: Failures<GLenum>,
    context: Option<GlContextConfig>,
    surface_size: Option<Extent2D>,
    error: GLenum,
    buffers: HashMap<GLuint, BufferObject>,
    buffer_bindings: HashMap<GLenum, GLuint>,
    textures: HashMap<GLuint, Option<TextureStorage>>,
    texture_bindings: HashMap<(u32, GLenum), GLuint>,
    active_unit: u32,
    uploaded_bytes: usize,
    shaders: HashMap<GLuint, ShaderObject>,
    programs: HashMap<GLuint, ProgramObject>,
    current_program: GLuint,
    framebuffers: HashMap<GLuint, BTreeMap<GLenum, GLuint>>,
    bound_framebuffer: GLuint,
}

impl NullGl {
    /// A driver with no context yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects, calls and draw snapshots.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Failures to inject, keyed by GL function name (`glBufferData`, ...).
    /// The armed code is raised as the pending `glGetError` value; object
    /// generators also return `0`.
    pub fn failures(&self) -> &Failures<GLenum> {
        &self.failures
    }

    /// The configuration the context was created with.
    pub fn context(&self) -> Option<&GlContextConfig> {
        self.context.as_ref()
    }

    /// The default framebuffer size after the last resize.
    pub fn surface_size(&self) -> Option<Extent2D> {
        self.surface_size
    }

    /// The data store of buffer `name`.
    pub fn buffer_contents(&self, name: GLuint) -> Option<&[u8]> {
        self.buffers.get(&name).map(|buffer| buffer.data.as_slice())
    }

    /// Bytes passed to texture uploads so far.
    pub fn uploaded_bytes(&self) -> usize {
        self.uploaded_bytes
    }

    /// The last value assigned to uniform `name` of `program`.
    pub fn uniform_value(&self, program: GLuint, name: &str) -> Option<&str> {
        self.programs
            .get(&program)?
            .values
            .get(name)
            .map(String::as_str)
    }

    /// The binding point assigned to uniform block `block` of `program`.
    pub fn block_binding(&self, program: GLuint, block: &str) -> Option<u32> {
        let program = self.programs.get(&program)?;
        let index = program.blocks.iter().position(|b| b == block)?;
        program.block_bindings.get(&(index as u32)).copied()
    }

    fn raise(&mut self, code: GLenum) {
        if self.error == gl::NO_ERROR {
            self.error = code;
        }
    }

    /// Records a call and raises its armed failure. Returns `true` when the
    /// call must fail.
    fn enter(&mut self, entry_point: &'static str) -> bool {
        self.ledger.call(entry_point);
        match self.failures.take(entry_point) {
            Some(code) => {
                self.raise(code);
                true
            }
            None => false,
        }
    }

    fn generate(&mut self, entry_point: &'static str, kind: &'static str) -> GLuint {
        if self.enter(entry_point) {
            return 0;
        }
        self.ledger.create(kind) as GLuint
    }

    fn delete(&mut self, name: GLuint) {
        if !self.ledger.destroy(u64::from(name)) {
            self.raise(gl::INVALID_VALUE);
        }
    }

    fn bound_buffer(&mut self, target: GLenum) -> Option<&mut BufferObject> {
        let name = self.buffer_bindings.get(&target).copied().unwrap_or(0);
        self.buffers.get_mut(&name)
    }

    fn bound_texture(&self, target: GLenum) -> GLuint {
        self.texture_bindings
            .get(&(self.active_unit, binding_target(target)))
            .copied()
            .unwrap_or(0)
    }

    fn upload(&mut self, entry_point: &'static str, target: GLenum, level: u32, data: &[u8]) {
        if self.enter(entry_point) {
            return;
        }
        let texture = self.bound_texture(target);
        match self.textures.get(&texture) {
            Some(Some(storage)) if level < storage.levels && !data.is_empty() => {
                self.uploaded_bytes += data.len();
            }
            Some(Some(_)) => self.raise(gl::INVALID_VALUE),
            _ => self.raise(gl::INVALID_OPERATION),
        }
    }

    fn draw(&mut self, entry_point: &'static str, mode: GLenum, indexed: bool, args: String) {
        if self.enter(entry_point) {
            return;
        }
        let linked = self
            .programs
            .get(&self.current_program)
            .is_some_and(|program| program.linked);
        if !linked || (indexed && self.ledger.bound_value("element array buffer").is_none()) {
            self.raise(gl::INVALID_OPERATION);
            return;
        }
        self.ledger
            .snapshot(&[("mode", format!("{mode:#06x}")), ("draw", args)]);
    }
}

impl GlApi for NullGl {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_context(&mut self, _surface: &SurfaceHandle, config: &GlContextConfig) -> Result<(), String> {
        if self.enter("create_context") {
            self.error = gl::NO_ERROR;
            return Err(format!(
                "no pixel format matches {:?} with depth {:?}",
                config.color_format, config.depth_stencil_format
            ));
        }
        self.context = Some(*config);
        Ok(())
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.ledger.call("resize_surface");
        self.surface_size = Some(Extent2D::new(width, height));
    }

    fn swap_buffers(&mut self, interval: u32) {
        if !self.enter("SwapBuffers") {
            self.ledger.bind("swap interval", interval);
        }
    }

    fn get_error(&mut self) -> GLenum {
        std::mem::replace(&mut self.error, gl::NO_ERROR)
    }

    fn flush(&mut self) {
        self.enter("glFlush");
    }

    fn finish(&mut self) {
        self.enter("glFinish");
    }

    fn enable(&mut self, cap: GLenum) {
        self.ledger.call("glEnable");
        self.ledger.bind(capability_name(cap), true);
    }

    fn disable(&mut self, cap: GLenum) {
        self.ledger.call("glDisable");
        self.ledger.bind(capability_name(cap), false);
    }

    fn gen_buffer(&mut self) -> GLuint {
        let name = self.generate("glGenBuffers", "buffer");
        if name != 0 {
            self.buffers.insert(name, BufferObject::default());
        }
        name
    }

    fn delete_buffer(&mut self, buffer: GLuint) {
        self.ledger.call("glDeleteBuffers");
        self.buffers.remove(&buffer);
        self.buffer_bindings.retain(|_, bound| *bound != buffer);
        self.delete(buffer);
    }

    fn bind_buffer(&mut self, target: GLenum, buffer: GLuint) {
        self.ledger.call("glBindBuffer");
        if buffer != 0 && !self.buffers.contains_key(&buffer) {
            self.raise(gl::INVALID_OPERATION);
            return;
        }
        self.buffer_bindings.insert(target, buffer);
        // The element binding is vertex array state and matters to draws.
        if target == gl::ELEMENT_ARRAY_BUFFER {
            if buffer == 0 {
                self.ledger.unbind("element array buffer");
            } else {
                self.ledger.bind("element array buffer", buffer);
            }
        }
    }

    fn bind_buffer_base(&mut self, target: GLenum, index: u32, buffer: GLuint) {
        self.ledger.call("glBindBufferBase");
        let key = if target == gl::UNIFORM_BUFFER {
            format!("uniform buffer {index}")
        } else {
            format!("storage buffer {index}")
        };
        self.ledger.bind(key, buffer);
    }

    fn buffer_data(&mut self, target: GLenum, size: usize, data: Option<&[u8]>, _usage: GLenum) {
        if self.enter("glBufferData") {
            return;
        }
        let Some(buffer) = self.bound_buffer(target) else {
            self.raise(gl::INVALID_OPERATION);
            return;
        };
        buffer.data = match data {
            Some(data) => data.to_vec(),
            None => vec![0; size],
        };
    }

    fn buffer_sub_data(&mut self, target: GLenum, offset: usize, data: &[u8]) {
        if self.enter("glBufferSubData") {
            return;
        }
        let code = match self.bound_buffer(target) {
            None => gl::INVALID_OPERATION,
            Some(buffer) if buffer.mapped => gl::INVALID_OPERATION,
            Some(buffer) => match buffer.data.get_mut(offset..offset + data.len()) {
                Some(range) => {
                    range.copy_from_slice(data);
                    return;
                }
                None => gl::INVALID_VALUE,
            },
        };
        self.raise(code);
    }

    fn map_buffer_range(
        &mut self,
        target: GLenum,
        offset: usize,
        length: usize,
        _access: GLenum,
    ) -> Option<NonNull<u8>> {
        if self.enter("glMapBufferRange") {
            return None;
        }
        let code = match self.bound_buffer(target) {
            None => gl::INVALID_OPERATION,
            Some(buffer) if buffer.mapped => gl::INVALID_OPERATION,
            Some(buffer) if offset + length > buffer.data.len() => gl::INVALID_VALUE,
            Some(buffer) => {
                buffer.mapped = true;
                return NonNull::new(buffer.data[offset..].as_mut_ptr());
            }
        };
        self.raise(code);
        None
    }

    fn unmap_buffer(&mut self, target: GLenum) -> bool {
        let corrupted = self.enter("glUnmapBuffer");
        match self.bound_buffer(target) {
            Some(buffer) if buffer.mapped => {
                buffer.mapped = false;
                !corrupted
            }
            _ => {
                self.raise(gl::INVALID_OPERATION);
                false
            }
        }
    }

    fn gen_texture(&mut self) -> GLuint {
        let name = self.generate("glGenTextures", "texture");
        if name != 0 {
            self.textures.insert(name, None);
        }
        name
    }

    fn delete_texture(&mut self, texture: GLuint) {
        self.ledger.call("glDeleteTextures");
        self.textures.remove(&texture);
        self.texture_bindings.retain(|_, bound| *bound != texture);
        self.delete(texture);
    }

    fn active_texture(&mut self, unit: GLenum) {
        self.ledger.call("glActiveTexture");
        self.active_unit = unit - gl::TEXTURE0;
    }

    fn bind_texture(&mut self, target: GLenum, texture: GLuint) {
        self.ledger.call("glBindTexture");
        if texture != 0 && !self.textures.contains_key(&texture) {
            self.raise(gl::INVALID_OPERATION);
            return;
        }
        let key = format!("texture unit {}", self.active_unit);
        if texture == 0 {
            self.texture_bindings.remove(&(self.active_unit, target));
            self.ledger.unbind(&key);
        } else {
            self.texture_bindings.insert((self.active_unit, target), texture);
            self.ledger.bind(key, (target, texture));
        }
    }

    fn tex_storage(&mut self, target: GLenum, levels: u32, _internal_format: GLenum, size: Extent3D) {
        if self.enter("glTexStorage") {
            return;
        }
        let texture = self.bound_texture(target);
        let code = match self.textures.get_mut(&texture) {
            None => gl::INVALID_OPERATION,
            Some(Some(_)) => gl::INVALID_OPERATION,
            Some(_) if levels == 0 || size.width == 0 || size.height == 0 || size.depth == 0 => {
                gl::INVALID_VALUE
            }
            Some(storage) => {
                *storage = Some(TextureStorage { levels });
                return;
            }
        };
        self.raise(code);
    }

    fn tex_sub_image(
        &mut self,
        target: GLenum,
        level: u32,
        _origin: Origin3D,
        _size: Extent3D,
        _format: GLenum,
        _ty: GLenum,
        data: &[u8],
    ) {
        self.upload("glTexSubImage", target, level, data);
    }

    fn compressed_tex_sub_image(
        &mut self,
        target: GLenum,
        level: u32,
        _origin: Origin3D,
        _size: Extent3D,
        _internal_format: GLenum,
        data: &[u8],
    ) {
        self.upload("glCompressedTexSubImage", target, level, data);
    }

    fn gen_sampler(&mut self) -> GLuint {
        self.generate("glGenSamplers", "sampler")
    }

    fn delete_sampler(&mut self, sampler: GLuint) {
        self.ledger.call("glDeleteSamplers");
        self.delete(sampler);
    }

    fn sampler_parameter_i(&mut self, sampler: GLuint, pname: GLenum, value: GLint) {
        if !self.enter("glSamplerParameter") && self.ledger.kind(u64::from(sampler)) != Some("sampler") {
            self.raise(gl::INVALID_OPERATION);
        }
        log::trace!("NullGl: sampler {sampler} {pname:#06x} = {value}");
    }

    fn sampler_parameter_f(&mut self, sampler: GLuint, pname: GLenum, value: f32) {
        if !self.enter("glSamplerParameter") && self.ledger.kind(u64::from(sampler)) != Some("sampler") {
            self.raise(gl::INVALID_OPERATION);
        }
        log::trace!("NullGl: sampler {sampler} {pname:#06x} = {value}");
    }

    fn sampler_parameter_fv(&mut self, sampler: GLuint, pname: GLenum, value: [f32; 4]) {
        if !self.enter("glSamplerParameter") && self.ledger.kind(u64::from(sampler)) != Some("sampler") {
            self.raise(gl::INVALID_OPERATION);
        }
        log::trace!("NullGl: sampler {sampler} {pname:#06x} = {value:?}");
    }

    fn bind_sampler(&mut self, unit: u32, sampler: GLuint) {
        self.ledger.call("glBindSampler");
        self.ledger.bind(format!("sampler unit {unit}"), sampler);
    }

    fn create_shader(&mut self, _kind: GLenum) -> GLuint {
        let name = self.generate("glCreateShader", "shader");
        if name != 0 {
            self.shaders.insert(
                name,
                ShaderObject {
                    source: String::new(),
                    compiled: false,
                    log: String::new(),
                },
            );
        }
        name
    }

    fn shader_source(&mut self, shader: GLuint, source: &str) {
        self.ledger.call("glShaderSource");
        match self.shaders.get_mut(&shader) {
            Some(object) => object.source = source.to_string(),
            None => self.raise(gl::INVALID_VALUE),
        }
    }

    fn compile_shader(&mut self, shader: GLuint) {
        let fail = self.enter("glCompileShader");
        let Some(object) = self.shaders.get_mut(&shader) else {
            self.raise(gl::INVALID_VALUE);
            return;
        };
        if let Some(line) = object.source.lines().position(|l| l.starts_with("#error")) {
            object.compiled = false;
            object.log = format!("0:{}: error: #error directive", line + 1);
        } else if fail {
            object.compiled = false;
            object.log = "0:1: error: compiler failure".to_string();
        } else {
            object.compiled = true;
            object.log.clear();
        }
    }

    fn get_shader_compile_status(&mut self, shader: GLuint) -> bool {
        self.shaders.get(&shader).is_some_and(|object| object.compiled)
    }

    fn get_shader_info_log(&mut self, shader: GLuint) -> String {
        self.shaders
            .get(&shader)
            .map(|object| object.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: GLuint) {
        self.ledger.call("glDeleteShader");
        self.shaders.remove(&shader);
        self.delete(shader);
    }

    fn create_program(&mut self) -> GLuint {
        let name = self.generate("glCreateProgram", "program");
        if name != 0 {
            self.programs.insert(name, ProgramObject::default());
        }
        name
    }

    fn attach_shader(&mut self, program: GLuint, shader: GLuint) {
        self.ledger.call("glAttachShader");
        match self.programs.get_mut(&program) {
            Some(object) if self.shaders.contains_key(&shader) => object.attached.push(shader),
            _ => self.raise(gl::INVALID_VALUE),
        }
    }

    fn detach_shader(&mut self, program: GLuint, shader: GLuint) {
        self.ledger.call("glDetachShader");
        if let Some(object) = self.programs.get_mut(&program) {
            object.attached.retain(|&attached| attached != shader);
        }
    }

    fn link_program(&mut self, program: GLuint) {
        let fail = self.enter("glLinkProgram");
        let Some(object) = self.programs.get_mut(&program) else {
            self.raise(gl::INVALID_VALUE);
            return;
        };
        object.blocks.clear();
        object.uniforms.clear();
        let mut compiled = !object.attached.is_empty();
        for shader in &object.attached {
            match self.shaders.get(shader) {
                Some(shader) if shader.compiled => {
                    declared_uniforms(&shader.source, &mut object.blocks, &mut object.uniforms)
                }
                _ => compiled = false,
            }
        }
        object.linked = compiled && !fail;
        object.log = if object.linked {
            String::new()
        } else if !compiled {
            "error: attached shaders are missing or not compiled".to_string()
        } else {
            "error: interface mismatch between stages".to_string()
        };
    }

    fn get_program_link_status(&mut self, program: GLuint) -> bool {
        self.programs.get(&program).is_some_and(|object| object.linked)
    }

    fn get_program_info_log(&mut self, program: GLuint) -> String {
        self.programs
            .get(&program)
            .map(|object| object.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: GLuint) {
        self.ledger.call("glDeleteProgram");
        self.programs.remove(&program);
        self.delete(program);
    }

    fn use_program(&mut self, program: GLuint) {
        self.ledger.call("glUseProgram");
        if program != 0 && !self.programs.get(&program).is_some_and(|p| p.linked) {
            self.raise(gl::INVALID_OPERATION);
            return;
        }
        self.current_program = program;
        self.ledger.bind("program", program);
    }

    fn get_uniform_block_index(&mut self, program: GLuint, name: &str) -> Option<u32> {
        let object = self.programs.get(&program)?;
        object
            .blocks
            .iter()
            .position(|block| block == name)
            .map(|index| index as u32)
    }

    fn uniform_block_binding(&mut self, program: GLuint, block: u32, binding: u32) {
        self.ledger.call("glUniformBlockBinding");
        match self.programs.get_mut(&program) {
            Some(object) if (block as usize) < object.blocks.len() => {
                object.block_bindings.insert(block, binding);
            }
            _ => self.raise(gl::INVALID_VALUE),
        }
    }

    fn get_uniform_location(&mut self, program: GLuint, name: &str) -> Option<GLint> {
        let object = self.programs.get(&program)?;
        object
            .uniforms
            .iter()
            .position(|uniform| uniform == name)
            .map(|index| index as GLint)
    }

    fn uniform_1i(&mut self, location: GLint, value: GLint) {
        self.ledger.call("glUniform1i");
        let current = self.current_program;
        match self.programs.get_mut(&current) {
            Some(object) => match object.uniforms.get(location as usize) {
                Some(name) => {
                    object.values.insert(name.clone(), value.to_string());
                }
                None => self.raise(gl::INVALID_OPERATION),
            },
            None => self.raise(gl::INVALID_OPERATION),
        }
    }

    fn uniform_1f(&mut self, location: GLint, value: f32) {
        self.ledger.call("glUniform1f");
        let current = self.current_program;
        match self.programs.get_mut(&current) {
            Some(object) => match object.uniforms.get(location as usize) {
                Some(name) => {
                    object.values.insert(name.clone(), format!("{value:?}"));
                }
                None => self.raise(gl::INVALID_OPERATION),
            },
            None => self.raise(gl::INVALID_OPERATION),
        }
    }

    fn gen_vertex_array(&mut self) -> GLuint {
        self.generate("glGenVertexArrays", "vertex array")
    }

    fn delete_vertex_array(&mut self, vao: GLuint) {
        self.ledger.call("glDeleteVertexArrays");
        self.delete(vao);
    }

    fn bind_vertex_array(&mut self, vao: GLuint) {
        self.ledger.call("glBindVertexArray");
        self.ledger.bind("vertex array", vao);
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.ledger.call("glEnableVertexAttribArray");
        self.ledger.bind(format!("attrib {index} enabled"), true);
    }

    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: u32,
        ty: GLenum,
        normalized: bool,
        stride: u32,
        offset: u32,
    ) {
        if self.enter("glVertexAttribPointer") {
            return;
        }
        match self.buffer_bindings.get(&gl::ARRAY_BUFFER).copied() {
            Some(buffer) if buffer != 0 => self.ledger.bind(
                format!("attrib {index}"),
                (buffer, size, ty, normalized, stride, offset),
            ),
            _ => self.raise(gl::INVALID_OPERATION),
        }
    }

    fn vertex_attrib_i_pointer(
        &mut self,
        index: u32,
        size: u32,
        ty: GLenum,
        stride: u32,
        offset: u32,
    ) {
        if self.enter("glVertexAttribIPointer") {
            return;
        }
        match self.buffer_bindings.get(&gl::ARRAY_BUFFER).copied() {
            Some(buffer) if buffer != 0 => self
                .ledger
                .bind(format!("attrib {index}"), (buffer, size, ty, "integer", stride, offset)),
            _ => self.raise(gl::INVALID_OPERATION),
        }
    }

    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32) {
        self.ledger.call("glVertexAttribDivisor");
        self.ledger.bind(format!("attrib {index} divisor"), divisor);
    }

    fn gen_framebuffer(&mut self) -> GLuint {
        let name = self.generate("glGenFramebuffers", "framebuffer");
        if name != 0 {
            self.framebuffers.insert(name, BTreeMap::new());
        }
        name
    }

    fn delete_framebuffer(&mut self, framebuffer: GLuint) {
        self.ledger.call("glDeleteFramebuffers");
        self.framebuffers.remove(&framebuffer);
        if self.bound_framebuffer == framebuffer {
            self.bound_framebuffer = 0;
            self.ledger.bind("framebuffer", 0);
        }
        self.delete(framebuffer);
    }

    fn bind_framebuffer(&mut self, _target: GLenum, framebuffer: GLuint) {
        self.ledger.call("glBindFramebuffer");
        if framebuffer != 0 && !self.framebuffers.contains_key(&framebuffer) {
            self.raise(gl::INVALID_OPERATION);
            return;
        }
        self.bound_framebuffer = framebuffer;
        self.ledger.bind("framebuffer", framebuffer);
    }

    fn framebuffer_texture_2d(
        &mut self,
        _target: GLenum,
        attachment: GLenum,
        _tex_target: GLenum,
        texture: GLuint,
        _level: u32,
    ) {
        self.ledger.call("glFramebufferTexture2D");
        self.attach(attachment, texture);
    }

    fn framebuffer_texture_layer(
        &mut self,
        _target: GLenum,
        attachment: GLenum,
        texture: GLuint,
        _level: u32,
        _layer: u32,
    ) {
        self.ledger.call("glFramebufferTextureLayer");
        self.attach(attachment, texture);
    }

    fn draw_buffers(&mut self, buffers: &[GLenum]) {
        self.ledger.call("glDrawBuffers");
        self.ledger.bind("draw buffers", buffers);
    }

    fn check_framebuffer_status(&mut self, _target: GLenum) -> GLenum {
        self.ledger.call("glCheckFramebufferStatus");
        if let Some(status) = self.failures.take("glCheckFramebufferStatus") {
            return status;
        }
        match self.framebuffers.get(&self.bound_framebuffer) {
            Some(attachments) if attachments.is_empty() => FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT,
            _ => gl::FRAMEBUFFER_COMPLETE,
        }
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.ledger.call("glViewport");
        self.ledger.bind("viewport", (x, y, width, height));
    }

    fn cull_face(&mut self, mode: GLenum) {
        self.ledger.call("glCullFace");
        self.ledger.bind("cull face", mode);
    }

    fn front_face(&mut self, mode: GLenum) {
        self.ledger.call("glFrontFace");
        self.ledger.bind("front face", mode);
    }

    fn polygon_mode(&mut self, face: GLenum, mode: GLenum) {
        self.ledger.call("glPolygonMode");
        self.ledger.bind("polygon mode", (face, mode));
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.ledger.call("glPolygonOffset");
        self.ledger.bind("polygon offset", (factor, units));
    }

    fn blend_func_separate(&mut self, src_rgb: GLenum, dst_rgb: GLenum, src_alpha: GLenum, dst_alpha: GLenum) {
        self.ledger.call("glBlendFuncSeparate");
        self.ledger
            .bind("blend func", (src_rgb, dst_rgb, src_alpha, dst_alpha));
    }

    fn blend_equation_separate(&mut self, rgb: GLenum, alpha: GLenum) {
        self.ledger.call("glBlendEquationSeparate");
        self.ledger.bind("blend equation", (rgb, alpha));
    }

    fn blend_color(&mut self, color: [f32; 4]) {
        self.ledger.call("glBlendColor");
        self.ledger.bind("blend color", color);
    }

    fn color_mask(&mut self, r: bool, g: bool, b: bool, a: bool) {
        self.ledger.call("glColorMask");
        self.ledger.bind("color mask", (r, g, b, a));
    }

    fn depth_func(&mut self, func: GLenum) {
        self.ledger.call("glDepthFunc");
        self.ledger.bind("depth func", func);
    }

    fn depth_mask(&mut self, write: bool) {
        self.ledger.call("glDepthMask");
        self.ledger.bind("depth mask", write);
    }

    fn stencil_func_separate(&mut self, face: GLenum, func: GLenum, reference: GLint, mask: u32) {
        self.ledger.call("glStencilFuncSeparate");
        self.ledger
            .bind(format!("stencil func {face:#06x}"), (func, reference, mask));
    }

    fn stencil_op_separate(&mut self, face: GLenum, sfail: GLenum, dpfail: GLenum, dppass: GLenum) {
        self.ledger.call("glStencilOpSeparate");
        self.ledger
            .bind(format!("stencil op {face:#06x}"), (sfail, dpfail, dppass));
    }

    fn stencil_mask(&mut self, mask: u32) {
        self.ledger.call("glStencilMask");
        self.ledger.bind("stencil mask", mask);
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        self.ledger.call("glClearColor");
        self.ledger.bind("clear color", color);
    }

    fn clear_depth(&mut self, depth: f32) {
        self.ledger.call("glClearDepth");
        self.ledger.bind("clear depth", depth);
    }

    fn clear_stencil(&mut self, stencil: GLint) {
        self.ledger.call("glClearStencil");
        self.ledger.bind("clear stencil", stencil);
    }

    fn clear(&mut self, mask: GLenum) {
        if !self.enter("glClear") && mask == 0 {
            self.raise(gl::INVALID_VALUE);
        }
    }

    fn draw_arrays(&mut self, mode: GLenum, first: u32, count: u32) {
        self.draw("glDrawArrays", mode, false, format!("arrays first={first} count={count}"));
    }

    fn draw_elements_base_vertex(&mut self, mode: GLenum, count: u32, ty: GLenum, offset: usize, base_vertex: i32) {
        self.draw(
            "glDrawElementsBaseVertex",
            mode,
            true,
            format!("elements count={count} type={ty:#06x} offset={offset} base={base_vertex}"),
        );
    }

    fn draw_elements_instanced(&mut self, mode: GLenum, count: u32, ty: GLenum, offset: usize, instances: u32) {
        self.draw(
            "glDrawElementsInstanced",
            mode,
            true,
            format!("elements count={count} type={ty:#06x} offset={offset} instances={instances}"),
        );
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        if self.enter("glDispatchCompute") {
            return;
        }
        if self.current_program == 0 {
            self.raise(gl::INVALID_OPERATION);
            return;
        }
        self.ledger.snapshot(&[("dispatch", format!("{x}x{y}x{z}"))]);
    }
}

impl NullGl {
    fn attach(&mut self, attachment: GLenum, texture: GLuint) {
        let texture_known = texture == 0 || self.textures.contains_key(&texture);
        match self.framebuffers.get_mut(&self.bound_framebuffer) {
            Some(attachments) if texture_known => {
                if texture == 0 {
                    attachments.remove(&attachment);
                } else {
                    attachments.insert(attachment, texture);
                }
            }
            _ => self.raise(gl::INVALID_OPERATION),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_declarations_are_split_into_blocks_and_values() {
        let source = "#version 450 core\n\
            layout(std140, binding = 1) uniform Camera { vec4 data[4]; } camera;\n\
            layout(binding = 0) uniform sampler2D albedo;\n\
            uniform float u_time;\n\
            void main() {}\n";
        let (mut blocks, mut uniforms) = (Vec::new(), Vec::new());
        declared_uniforms(source, &mut blocks, &mut uniforms);
        assert_eq!(blocks, ["Camera"]);
        assert_eq!(uniforms, ["albedo", "u_time"]);
    }

    #[test]
    fn errors_latch_until_read() {
        let mut gl = NullGl::new();
        gl.failures().arm("glGenBuffers", gl::OUT_OF_MEMORY);
        assert_eq!(gl.gen_buffer(), 0);
        gl.bind_buffer(gl::ARRAY_BUFFER, 99);
        assert_eq!(gl.get_error(), gl::OUT_OF_MEMORY, "first error wins");
        assert_eq!(gl.get_error(), gl::NO_ERROR);
    }

    #[test]
    fn mapped_writes_land_in_the_data_store() {
        let mut gl = NullGl::new();
        let buffer = gl.gen_buffer();
        gl.bind_buffer(gl::COPY_WRITE_BUFFER, buffer);
        gl.buffer_data(gl::COPY_WRITE_BUFFER, 4, None, gl::DYNAMIC_DRAW);
        let ptr = gl
            .map_buffer_range(gl::COPY_WRITE_BUFFER, 0, 4, gl::MAP_WRITE_BIT)
            .unwrap();
        unsafe { std::ptr::copy_nonoverlapping([1u8, 2, 3, 4].as_ptr(), ptr.as_ptr(), 4) };
        assert!(gl.unmap_buffer(gl::COPY_WRITE_BUFFER));
        assert_eq!(gl.buffer_contents(buffer), Some(&[1u8, 2, 3, 4][..]));
        assert!(!gl.unmap_buffer(gl::COPY_WRITE_BUFFER), "unmapping twice fails");
    }
}
