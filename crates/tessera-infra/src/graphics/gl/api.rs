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

//! The OpenGL driver seam.
//!
//! [`GlApi`] mirrors the subset of GL 4.5 entry points the device uses, with
//! the raw `GLenum`/`GLuint` types kept as plain integers. A loader-backed
//! implementation forwards each method to the matching `gl*` function; the
//! null driver in `graphics::null` models the state machine in memory.

use std::any::Any;
use std::fmt::{self, Debug};
use std::ptr::NonNull;
use tessera_core::math::{Extent3D, Origin3D};
use tessera_core::renderer::api::{PixelFormat, SurfaceHandle};
use tessera_core::renderer::DeviceError;

/// A GL enumerant.
pub type GLenum = u32;
/// A GL object name.
pub type GLuint = u32;
/// A signed GL integer.
pub type GLint = i32;

/// The GL enumerants used by the backend.
#[allow(missing_docs)]
pub mod consts {
    use super::GLenum;

    pub const NO_ERROR: GLenum = 0;
    pub const INVALID_ENUM: GLenum = 0x0500;
    pub const INVALID_VALUE: GLenum = 0x0501;
    pub const INVALID_OPERATION: GLenum = 0x0502;
    pub const OUT_OF_MEMORY: GLenum = 0x0505;
    pub const INVALID_FRAMEBUFFER_OPERATION: GLenum = 0x0506;

    pub const POINTS: GLenum = 0x0000;
    pub const LINES: GLenum = 0x0001;
    pub const LINE_STRIP: GLenum = 0x0003;
    pub const TRIANGLES: GLenum = 0x0004;
    pub const TRIANGLE_STRIP: GLenum = 0x0005;

    pub const ARRAY_BUFFER: GLenum = 0x8892;
    pub const ELEMENT_ARRAY_BUFFER: GLenum = 0x8893;
    pub const UNIFORM_BUFFER: GLenum = 0x8A11;
    pub const SHADER_STORAGE_BUFFER: GLenum = 0x90D2;
    pub const COPY_WRITE_BUFFER: GLenum = 0x8F37;
    pub const STATIC_DRAW: GLenum = 0x88E4;
    pub const DYNAMIC_DRAW: GLenum = 0x88E8;
    pub const MAP_WRITE_BIT: GLenum = 0x0002;
    pub const MAP_INVALIDATE_BUFFER_BIT: GLenum = 0x0008;

    pub const TEXTURE_1D: GLenum = 0x0DE0;
    pub const TEXTURE_2D: GLenum = 0x0DE1;
    pub const TEXTURE_3D: GLenum = 0x806F;
    pub const TEXTURE_1D_ARRAY: GLenum = 0x8C18;
    pub const TEXTURE_2D_ARRAY: GLenum = 0x8C1A;
    pub const TEXTURE_CUBE_MAP: GLenum = 0x8513;
    pub const TEXTURE_CUBE_MAP_POSITIVE_X: GLenum = 0x8515;
    pub const TEXTURE_CUBE_MAP_ARRAY: GLenum = 0x9009;
    pub const TEXTURE0: GLenum = 0x84C0;

    pub const TEXTURE_MIN_FILTER: GLenum = 0x2801;
    pub const TEXTURE_MAG_FILTER: GLenum = 0x2800;
    pub const TEXTURE_WRAP_S: GLenum = 0x2802;
    pub const TEXTURE_WRAP_T: GLenum = 0x2803;
    pub const TEXTURE_WRAP_R: GLenum = 0x8072;
    pub const TEXTURE_MIN_LOD: GLenum = 0x813A;
    pub const TEXTURE_MAX_LOD: GLenum = 0x813B;
    pub const TEXTURE_LOD_BIAS: GLenum = 0x8501;
    pub const TEXTURE_MAX_ANISOTROPY: GLenum = 0x84FE;
    pub const TEXTURE_COMPARE_MODE: GLenum = 0x884C;
    pub const TEXTURE_COMPARE_FUNC: GLenum = 0x884D;
    pub const TEXTURE_BORDER_COLOR: GLenum = 0x1004;
    pub const COMPARE_REF_TO_TEXTURE: GLenum = 0x884E;
    pub const NEAREST: GLenum = 0x2600;
    pub const LINEAR: GLenum = 0x2601;
    pub const NEAREST_MIPMAP_NEAREST: GLenum = 0x2700;
    pub const LINEAR_MIPMAP_NEAREST: GLenum = 0x2701;
    pub const NEAREST_MIPMAP_LINEAR: GLenum = 0x2702;
    pub const LINEAR_MIPMAP_LINEAR: GLenum = 0x2703;
    pub const REPEAT: GLenum = 0x2901;
    pub const MIRRORED_REPEAT: GLenum = 0x8370;
    pub const CLAMP_TO_EDGE: GLenum = 0x812F;
    pub const CLAMP_TO_BORDER: GLenum = 0x812D;

    pub const VERTEX_SHADER: GLenum = 0x8B31;
    pub const FRAGMENT_SHADER: GLenum = 0x8B30;
    pub const GEOMETRY_SHADER: GLenum = 0x8DD9;
    pub const COMPUTE_SHADER: GLenum = 0x91B9;

    pub const FRAMEBUFFER: GLenum = 0x8D40;
    pub const FRAMEBUFFER_COMPLETE: GLenum = 0x8CD5;
    pub const COLOR_ATTACHMENT0: GLenum = 0x8CE0;
    pub const DEPTH_ATTACHMENT: GLenum = 0x8D00;
    pub const DEPTH_STENCIL_ATTACHMENT: GLenum = 0x821A;
    pub const BACK_LEFT: GLenum = 0x0402;

    pub const BLEND: GLenum = 0x0BE2;
    pub const CULL_FACE: GLenum = 0x0B44;
    pub const DEPTH_TEST: GLenum = 0x0B71;
    pub const STENCIL_TEST: GLenum = 0x0B90;
    pub const SCISSOR_TEST: GLenum = 0x0C11;
    pub const DEPTH_CLAMP: GLenum = 0x864F;
    pub const POLYGON_OFFSET_FILL: GLenum = 0x8037;
    pub const FRAMEBUFFER_SRGB: GLenum = 0x8DB9;
    pub const DEBUG_OUTPUT: GLenum = 0x92E0;

    pub const FRONT: GLenum = 0x0404;
    pub const BACK: GLenum = 0x0405;
    pub const FRONT_AND_BACK: GLenum = 0x0408;
    pub const CW: GLenum = 0x0900;
    pub const CCW: GLenum = 0x0901;
    pub const FILL: GLenum = 0x1B02;
    pub const LINE: GLenum = 0x1B01;

    pub const NEVER: GLenum = 0x0200;
    pub const LESS: GLenum = 0x0201;
    pub const EQUAL: GLenum = 0x0202;
    pub const LEQUAL: GLenum = 0x0203;
    pub const GREATER: GLenum = 0x0204;
    pub const NOTEQUAL: GLenum = 0x0205;
    pub const GEQUAL: GLenum = 0x0206;
    pub const ALWAYS: GLenum = 0x0207;

    pub const KEEP: GLenum = 0x1E00;
    pub const ZERO: GLenum = 0x0000;
    pub const REPLACE: GLenum = 0x1E01;
    pub const INVERT: GLenum = 0x150A;
    pub const INCR: GLenum = 0x1E02;
    pub const DECR: GLenum = 0x1E03;
    pub const INCR_WRAP: GLenum = 0x8507;
    pub const DECR_WRAP: GLenum = 0x8508;

    pub const ONE: GLenum = 0x0001;
    pub const SRC_COLOR: GLenum = 0x0300;
    pub const ONE_MINUS_SRC_COLOR: GLenum = 0x0301;
    pub const SRC_ALPHA: GLenum = 0x0302;
    pub const ONE_MINUS_SRC_ALPHA: GLenum = 0x0303;
    pub const DST_ALPHA: GLenum = 0x0304;
    pub const ONE_MINUS_DST_ALPHA: GLenum = 0x0305;
    pub const DST_COLOR: GLenum = 0x0306;
    pub const ONE_MINUS_DST_COLOR: GLenum = 0x0307;
    pub const SRC_ALPHA_SATURATE: GLenum = 0x0308;
    pub const CONSTANT_COLOR: GLenum = 0x8001;
    pub const ONE_MINUS_CONSTANT_COLOR: GLenum = 0x8002;
    pub const FUNC_ADD: GLenum = 0x8006;
    pub const FUNC_SUBTRACT: GLenum = 0x800A;
    pub const FUNC_REVERSE_SUBTRACT: GLenum = 0x800B;
    pub const MIN: GLenum = 0x8007;
    pub const MAX: GLenum = 0x8008;

    pub const COLOR_BUFFER_BIT: GLenum = 0x4000;
    pub const DEPTH_BUFFER_BIT: GLenum = 0x0100;
    pub const STENCIL_BUFFER_BIT: GLenum = 0x0400;

    pub const BYTE: GLenum = 0x1400;
    pub const UNSIGNED_BYTE: GLenum = 0x1401;
    pub const SHORT: GLenum = 0x1402;
    pub const UNSIGNED_SHORT: GLenum = 0x1403;
    pub const INT: GLenum = 0x1404;
    pub const UNSIGNED_INT: GLenum = 0x1405;
    pub const FLOAT: GLenum = 0x1406;
    pub const HALF_FLOAT: GLenum = 0x140B;
    pub const UNSIGNED_INT_24_8: GLenum = 0x84FA;
    pub const FLOAT_32_UNSIGNED_INT_24_8_REV: GLenum = 0x8DAD;
    pub const UNSIGNED_INT_2_10_10_10_REV: GLenum = 0x8368;
    pub const UNSIGNED_INT_10F_11F_11F_REV: GLenum = 0x8C3B;

    pub const RED: GLenum = 0x1903;
    pub const RG: GLenum = 0x8227;
    pub const RGB: GLenum = 0x1907;
    pub const RGBA: GLenum = 0x1908;
    pub const BGRA: GLenum = 0x80E1;
    pub const RED_INTEGER: GLenum = 0x8D94;
    pub const DEPTH_COMPONENT: GLenum = 0x1902;
    pub const DEPTH_STENCIL: GLenum = 0x84F9;

    pub const R8: GLenum = 0x8229;
    pub const RG8: GLenum = 0x822B;
    pub const RGBA8: GLenum = 0x8058;
    pub const SRGB8_ALPHA8: GLenum = 0x8C43;
    pub const R16F: GLenum = 0x822D;
    pub const RG16F: GLenum = 0x822F;
    pub const RGBA16F: GLenum = 0x881A;
    pub const R32F: GLenum = 0x822E;
    pub const R32UI: GLenum = 0x8236;
    pub const RG32F: GLenum = 0x8230;
    pub const RGB32F: GLenum = 0x8815;
    pub const RGBA32F: GLenum = 0x8814;
    pub const RGB10_A2: GLenum = 0x8059;
    pub const R11F_G11F_B10F: GLenum = 0x8C3A;
    pub const COMPRESSED_RGBA_S3TC_DXT1_EXT: GLenum = 0x83F1;
    pub const COMPRESSED_SRGB_ALPHA_S3TC_DXT1_EXT: GLenum = 0x8C4D;
    pub const COMPRESSED_RGBA_S3TC_DXT3_EXT: GLenum = 0x83F2;
    pub const COMPRESSED_RGBA_S3TC_DXT5_EXT: GLenum = 0x83F3;
    pub const COMPRESSED_SRGB_ALPHA_S3TC_DXT5_EXT: GLenum = 0x8C4F;
    pub const COMPRESSED_RED_RGTC1: GLenum = 0x8DBB;
    pub const COMPRESSED_RG_RGTC2: GLenum = 0x8DBD;
    pub const COMPRESSED_RGBA_BPTC_UNORM: GLenum = 0x8E8C;
    pub const COMPRESSED_SRGB_ALPHA_BPTC_UNORM: GLenum = 0x8E8D;
    pub const DEPTH_COMPONENT16: GLenum = 0x81A5;
    pub const DEPTH24_STENCIL8: GLenum = 0x88F0;
    pub const DEPTH_COMPONENT32F: GLenum = 0x8CAC;
    pub const DEPTH32F_STENCIL8: GLenum = 0x8CAD;
}

/// A non-zero value returned by `glGetError`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlError(pub GLenum);

impl GlError {
    /// The symbolic name of the error code.
    pub fn name(self) -> &'static str {
        match self.0 {
            consts::INVALID_ENUM => "GL_INVALID_ENUM",
            consts::INVALID_VALUE => "GL_INVALID_VALUE",
            consts::INVALID_OPERATION => "GL_INVALID_OPERATION",
            consts::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
            consts::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
            _ => "unknown GL error",
        }
    }

    /// Wraps the code into a device error for `operation`.
    pub fn into_device_error(self, operation: &'static str) -> DeviceError {
        DeviceError::new(operation, self.0 as i64, self.name())
    }
}

impl Debug for GlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#06x})", self.name(), self.0)
    }
}

/// Pixel formats of the default framebuffer requested at context creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlContextConfig {
    /// Back-buffer color format.
    pub color_format: PixelFormat,
    /// Back-buffer depth/stencil format, if any.
    pub depth_stencil_format: Option<PixelFormat>,
    /// Request a debug context with `GL_KHR_debug` output.
    pub debug: bool,
}

/// The GL entry points used by [`GlDevice`](super::GlDevice).
///
/// Object-creating calls return `0` when the driver could not create the
/// object; the reason is then available from [`get_error`](Self::get_error).
#[allow(missing_docs)]
pub trait GlApi: Debug {
    fn as_any(&self) -> &dyn Any;

    fn create_context(&mut self, surface: &SurfaceHandle, config: &GlContextConfig)
        -> Result<(), String>;
    fn resize_surface(&mut self, width: u32, height: u32);
    fn swap_buffers(&mut self, interval: u32);
    fn get_error(&mut self) -> GLenum;
    fn flush(&mut self);
    fn finish(&mut self);

    fn enable(&mut self, cap: GLenum);
    fn disable(&mut self, cap: GLenum);

    // Buffers
    fn gen_buffer(&mut self) -> GLuint;
    fn delete_buffer(&mut self, buffer: GLuint);
    fn bind_buffer(&mut self, target: GLenum, buffer: GLuint);
    fn bind_buffer_base(&mut self, target: GLenum, index: u32, buffer: GLuint);
    fn buffer_data(&mut self, target: GLenum, size: usize, data: Option<&[u8]>, usage: GLenum);
    fn buffer_sub_data(&mut self, target: GLenum, offset: usize, data: &[u8]);
    fn map_buffer_range(
        &mut self,
        target: GLenum,
        offset: usize,
        length: usize,
        access: GLenum,
    ) -> Option<NonNull<u8>>;
    fn unmap_buffer(&mut self, target: GLenum) -> bool;

    // Textures and samplers
    fn gen_texture(&mut self) -> GLuint;
    fn delete_texture(&mut self, texture: GLuint);
    fn active_texture(&mut self, unit: GLenum);
    fn bind_texture(&mut self, target: GLenum, texture: GLuint);
    fn tex_storage(&mut self, target: GLenum, levels: u32, internal_format: GLenum, size: Extent3D);
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image(
        &mut self,
        target: GLenum,
        level: u32,
        origin: Origin3D,
        size: Extent3D,
        format: GLenum,
        ty: GLenum,
        data: &[u8],
    );
    fn compressed_tex_sub_image(
        &mut self,
        target: GLenum,
        level: u32,
        origin: Origin3D,
        size: Extent3D,
        internal_format: GLenum,
        data: &[u8],
    );
    fn gen_sampler(&mut self) -> GLuint;
    fn delete_sampler(&mut self, sampler: GLuint);
    fn sampler_parameter_i(&mut self, sampler: GLuint, pname: GLenum, value: GLint);
    fn sampler_parameter_f(&mut self, sampler: GLuint, pname: GLenum, value: f32);
    fn sampler_parameter_fv(&mut self, sampler: GLuint, pname: GLenum, value: [f32; 4]);
    fn bind_sampler(&mut self, unit: u32, sampler: GLuint);

    // Shaders and programs
    fn create_shader(&mut self, kind: GLenum) -> GLuint;
    fn shader_source(&mut self, shader: GLuint, source: &str);
    fn compile_shader(&mut self, shader: GLuint);
    fn get_shader_compile_status(&mut self, shader: GLuint) -> bool;
    fn get_shader_info_log(&mut self, shader: GLuint) -> String;
    fn delete_shader(&mut self, shader: GLuint);
    fn create_program(&mut self) -> GLuint;
    fn attach_shader(&mut self, program: GLuint, shader: GLuint);
    fn detach_shader(&mut self, program: GLuint, shader: GLuint);
    fn link_program(&mut self, program: GLuint);
    fn get_program_link_status(&mut self, program: GLuint) -> bool;
    fn get_program_info_log(&mut self, program: GLuint) -> String;
    fn delete_program(&mut self, program: GLuint);
    fn use_program(&mut self, program: GLuint);
    fn get_uniform_block_index(&mut self, program: GLuint, name: &str) -> Option<u32>;
    fn uniform_block_binding(&mut self, program: GLuint, block: u32, binding: u32);
    fn get_uniform_location(&mut self, program: GLuint, name: &str) -> Option<GLint>;
    fn uniform_1i(&mut self, location: GLint, value: GLint);
    fn uniform_1f(&mut self, location: GLint, value: f32);

    // Vertex specification
    fn gen_vertex_array(&mut self) -> GLuint;
    fn delete_vertex_array(&mut self, vao: GLuint);
    fn bind_vertex_array(&mut self, vao: GLuint);
    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: u32,
        ty: GLenum,
        normalized: bool,
        stride: u32,
        offset: u32,
    );
    fn vertex_attrib_i_pointer(&mut self, index: u32, size: u32, ty: GLenum, stride: u32, offset: u32);
    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32);

    // Framebuffers
    fn gen_framebuffer(&mut self) -> GLuint;
    fn delete_framebuffer(&mut self, framebuffer: GLuint);
    fn bind_framebuffer(&mut self, target: GLenum, framebuffer: GLuint);
    fn framebuffer_texture_2d(
        &mut self,
        target: GLenum,
        attachment: GLenum,
        tex_target: GLenum,
        texture: GLuint,
        level: u32,
    );
    fn framebuffer_texture_layer(
        &mut self,
        target: GLenum,
        attachment: GLenum,
        texture: GLuint,
        level: u32,
        layer: u32,
    );
    fn draw_buffers(&mut self, buffers: &[GLenum]);
    fn check_framebuffer_status(&mut self, target: GLenum) -> GLenum;

    // Fixed-function state
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn cull_face(&mut self, mode: GLenum);
    fn front_face(&mut self, mode: GLenum);
    fn polygon_mode(&mut self, face: GLenum, mode: GLenum);
    fn polygon_offset(&mut self, factor: f32, units: f32);
    fn blend_func_separate(&mut self, src_rgb: GLenum, dst_rgb: GLenum, src_alpha: GLenum, dst_alpha: GLenum);
    fn blend_equation_separate(&mut self, rgb: GLenum, alpha: GLenum);
    fn blend_color(&mut self, color: [f32; 4]);
    fn color_mask(&mut self, r: bool, g: bool, b: bool, a: bool);
    fn depth_func(&mut self, func: GLenum);
    fn depth_mask(&mut self, write: bool);
    fn stencil_func_separate(&mut self, face: GLenum, func: GLenum, reference: GLint, mask: u32);
    fn stencil_op_separate(&mut self, face: GLenum, sfail: GLenum, dpfail: GLenum, dppass: GLenum);
    fn stencil_mask(&mut self, mask: u32);

    // Commands
    fn clear_color(&mut self, color: [f32; 4]);
    fn clear_depth(&mut self, depth: f32);
    fn clear_stencil(&mut self, stencil: GLint);
    fn clear(&mut self, mask: GLenum);
    fn draw_arrays(&mut self, mode: GLenum, first: u32, count: u32);
    fn draw_elements_base_vertex(
        &mut self,
        mode: GLenum,
        count: u32,
        ty: GLenum,
        offset: usize,
        base_vertex: i32,
    );
    fn draw_elements_instanced(&mut self, mode: GLenum, count: u32, ty: GLenum, offset: usize, instances: u32);
    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32);
}
