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

//! Native object handles carried by caller-owned resources.
//!
//! A resource stores only its description and the handles below. The handle
//! is tagged with the backend that produced it, so a device can refuse
//! resources created by another device family.

use crate::renderer::api::common::BackendType;
use crate::renderer::api::shader::ShaderStage;

/// One native object, tagged with the backend family that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeHandle {
    /// An object name of the immediate backend. Name `0` means "no object".
    Gl(u32),
    /// A reference-counted interface pointer of the deferred-context backend.
    D3d11(u64),
    /// A handle of the explicit backend.
    Vulkan(u64),
}

impl NativeHandle {
    /// The backend family this handle belongs to.
    pub fn backend(&self) -> BackendType {
        match self {
            NativeHandle::Gl(_) => BackendType::OpenGl,
            NativeHandle::D3d11(_) => BackendType::Direct3D11,
            NativeHandle::Vulkan(_) => BackendType::Vulkan,
        }
    }

    /// The raw value, widened to 64 bits.
    pub fn raw(&self) -> u64 {
        match *self {
            NativeHandle::Gl(name) => name as u64,
            NativeHandle::D3d11(ptr) => ptr,
            NativeHandle::Vulkan(handle) => handle,
        }
    }
}

/// Native objects backing a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferNative {
    /// The buffer object.
    pub buffer: NativeHandle,
    /// Separately allocated memory, for backends with explicit memory binding.
    pub memory: Option<NativeHandle>,
}

/// Native objects backing a texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureNative {
    /// The storage object.
    pub storage: NativeHandle,
    /// A view used when sampling, for backends that separate views from storage.
    pub shader_view: Option<NativeHandle>,
    /// Separately allocated memory, for backends with explicit memory binding.
    pub memory: Option<NativeHandle>,
}

/// Native objects backing a shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderNative {
    /// A linked program (immediate backend) or pipeline layout (explicit backend).
    pub program: Option<NativeHandle>,
    /// The descriptor set layout of the explicit backend.
    pub set_layout: Option<NativeHandle>,
    /// One compiled object per stage, in stage order.
    pub stages: Vec<(ShaderStage, NativeHandle)>,
}

impl ShaderNative {
    /// Returns the stage object for `stage`, if the shader has one.
    pub fn stage(&self, stage: ShaderStage) -> Option<NativeHandle> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, handle)| *handle)
    }
}

/// Native objects backing a framebuffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FramebufferNative {
    /// The framebuffer object, for backends that have one.
    pub framebuffer: Option<NativeHandle>,
    /// The render pass the framebuffer is compatible with (explicit backend).
    pub render_pass: Option<NativeHandle>,
    /// Attachment views owned by the framebuffer: colors first, then depth.
    pub views: Vec<NativeHandle>,
}
