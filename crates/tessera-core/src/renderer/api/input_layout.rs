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

//! Vertex attribute formats and the input layout resource.

use crate::renderer::api::common::ResourceId;
use crate::renderer::api::native::NativeHandle;
use crate::renderer::error::RenderError;

/// The scalar type a vertex attribute is read as in the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// 32-bit float (including normalized integer formats).
    Float,
    /// 32-bit signed integer.
    Sint,
    /// 32-bit unsigned integer.
    Uint,
}

/// The memory format of one vertex attribute.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint32x2,
    Uint32x3,
    Uint32x4,
    Sint32,
    Sint32x2,
    Sint32x3,
    Sint32x4,
    Float16x2,
    Float16x4,
    Unorm8x4,
    Uint8x4,
    Snorm16x2,
}

impl VertexFormat {
    /// Number of components (1 to 4).
    pub const fn components(self) -> u32 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 | VertexFormat::Sint32 => 1,
            VertexFormat::Float32x2
            | VertexFormat::Uint32x2
            | VertexFormat::Sint32x2
            | VertexFormat::Float16x2
            | VertexFormat::Snorm16x2 => 2,
            VertexFormat::Float32x3 | VertexFormat::Uint32x3 | VertexFormat::Sint32x3 => 3,
            VertexFormat::Float32x4
            | VertexFormat::Uint32x4
            | VertexFormat::Sint32x4
            | VertexFormat::Float16x4
            | VertexFormat::Unorm8x4
            | VertexFormat::Uint8x4 => 4,
        }
    }

    /// Size of one attribute in bytes.
    pub const fn size_bytes(self) -> u32 {
        match self {
            VertexFormat::Unorm8x4 | VertexFormat::Uint8x4 => 4,
            VertexFormat::Float16x2 | VertexFormat::Snorm16x2 => 4,
            VertexFormat::Float16x4 => 8,
            other => other.components() * 4,
        }
    }

    /// The scalar type the shader sees.
    pub const fn scalar_type(self) -> ScalarType {
        match self {
            VertexFormat::Uint32
            | VertexFormat::Uint32x2
            | VertexFormat::Uint32x3
            | VertexFormat::Uint32x4
            | VertexFormat::Uint8x4 => ScalarType::Uint,
            VertexFormat::Sint32
            | VertexFormat::Sint32x2
            | VertexFormat::Sint32x3
            | VertexFormat::Sint32x4 => ScalarType::Sint,
            _ => ScalarType::Float,
        }
    }

    /// Returns `true` for integer formats read as normalized floats.
    pub const fn is_normalized(self) -> bool {
        matches!(self, VertexFormat::Unorm8x4 | VertexFormat::Snorm16x2)
    }
}

/// Whether an attribute advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexInputRate {
    /// Advances every vertex.
    #[default]
    Vertex,
    /// Advances every instance.
    Instance,
}

/// One vertex attribute. Its index in the layout is its shader location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// The memory format.
    pub format: VertexFormat,
    /// Byte offset inside one vertex of its buffer.
    pub offset: u32,
    /// The vertex-buffer slot the attribute is read from.
    pub buffer_slot: u32,
    /// Step rate.
    pub rate: VertexInputRate,
}

impl VertexAttribute {
    /// A per-vertex attribute read from slot 0.
    pub const fn new(format: VertexFormat, offset: u32) -> Self {
        Self {
            format,
            offset,
            buffer_slot: 0,
            rate: VertexInputRate::Vertex,
        }
    }
}

/// Maximum number of attributes in one layout.
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;

/// Checks an attribute list before it reaches a backend.
pub fn validate_attributes(attributes: &[VertexAttribute]) -> Result<(), RenderError> {
    if attributes.is_empty() {
        return Err(RenderError::config("an input layout needs at least one attribute"));
    }
    if attributes.len() > MAX_VERTEX_ATTRIBUTES {
        return Err(RenderError::config(format!(
            "{} attributes exceed the limit of {MAX_VERTEX_ATTRIBUTES}",
            attributes.len()
        )));
    }
    for slot in attributes.iter().map(|a| a.buffer_slot) {
        let mut rates = attributes
            .iter()
            .filter(|a| a.buffer_slot == slot)
            .map(|a| a.rate);
        if let Some(first) = rates.next() {
            if rates.any(|rate| rate != first) {
                return Err(RenderError::config(format!(
                    "buffer slot {slot} mixes per-vertex and per-instance attributes"
                )));
            }
        }
    }
    Ok(())
}

/// An ordered attribute list bound together with a vertex buffer. Owned by the caller.
#[derive(Debug)]
pub struct InputLayout {
    id: ResourceId,
    attributes: Vec<VertexAttribute>,
    native: Option<NativeHandle>,
}

impl InputLayout {
    /// Wraps a created layout. Backends without layout objects pass their
    /// null handle (name or handle `0`).
    pub fn new(id: ResourceId, attributes: Vec<VertexAttribute>, native: NativeHandle) -> Self {
        Self {
            id,
            attributes,
            native: Some(native),
        }
    }

    /// The device-unique identity.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The attributes, indexed by shader location.
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// The native layout object, or `None` once disposed.
    pub fn native(&self) -> Option<NativeHandle> {
        self.native
    }

    /// Takes the native object out, leaving the layout disposed.
    pub fn take_native(&mut self) -> Option<NativeHandle> {
        self.native.take()
    }

    /// Returns `true` until the layout is disposed.
    pub fn is_alive(&self) -> bool {
        self.native.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_report_arity_and_type() {
        assert_eq!(VertexFormat::Float32x3.components(), 3);
        assert_eq!(VertexFormat::Float32x3.size_bytes(), 12);
        assert_eq!(VertexFormat::Unorm8x4.size_bytes(), 4);
        assert_eq!(VertexFormat::Unorm8x4.scalar_type(), ScalarType::Float);
        assert_eq!(VertexFormat::Sint32x2.scalar_type(), ScalarType::Sint);
    }

    #[test]
    fn mixed_rates_in_one_slot_are_rejected() {
        let mut instanced = VertexAttribute::new(VertexFormat::Float32x4, 12);
        instanced.rate = VertexInputRate::Instance;
        let attributes = [VertexAttribute::new(VertexFormat::Float32x3, 0), instanced];
        assert!(validate_attributes(&attributes).is_err());

        instanced.buffer_slot = 1;
        let attributes = [VertexAttribute::new(VertexFormat::Float32x3, 0), instanced];
        assert!(validate_attributes(&attributes).is_ok());
    }

    #[test]
    fn native_is_taken_once() {
        let mut layout = InputLayout::new(
            ResourceId(1),
            vec![VertexAttribute::new(VertexFormat::Float32x2, 0)],
            NativeHandle::D3d11(0x10),
        );
        assert_eq!(layout.take_native(), Some(NativeHandle::D3d11(0x10)));
        assert_eq!(layout.take_native(), None);
        assert!(!layout.is_alive());
    }
}
