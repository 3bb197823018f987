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

//! Buffer descriptors, the caller-owned buffer resource and mapped memory.

use crate::renderer::api::common::ResourceId;
use crate::renderer::api::native::BufferNative;
use crate::renderer::error::RenderError;
use std::ptr::NonNull;

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex attribute data.
    Vertex,
    /// Index data.
    Index,
    /// Uniform (constant) block data.
    Uniform,
    /// Shader-writable storage.
    Storage,
}

/// A description of a buffer to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    /// A debug label.
    pub label: Option<String>,
    /// The binding kind.
    pub kind: BufferKind,
    /// Size in bytes. Must be non-zero.
    pub size: u64,
    /// Dynamic buffers are CPU-writable through [`map_buffer`] with discard
    /// semantics; static buffers are only updated through the upload path.
    ///
    /// [`map_buffer`]: crate::renderer::traits::GraphicsDevice::map_buffer
    pub dynamic: bool,
}

impl BufferDescriptor {
    /// A static buffer of the given kind and size.
    pub fn new(kind: BufferKind, size: u64) -> Self {
        Self {
            label: None,
            kind,
            size,
            dynamic: false,
        }
    }

    /// Marks the buffer as dynamic.
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Checks the size and the optional initial data.
    pub fn validate(&self, data: Option<&[u8]>) -> Result<(), RenderError> {
        if self.size == 0 {
            return Err(RenderError::config("buffer size must be greater than zero"));
        }
        if let Some(data) = data {
            if data.len() as u64 != self.size {
                return Err(RenderError::config(format!(
                    "buffer is {} bytes but {} bytes of initial data were supplied",
                    self.size,
                    data.len()
                )));
            }
        }
        Ok(())
    }

    /// Checks that `len` bytes at `offset` fit inside the buffer.
    pub fn validate_range(&self, offset: u64, len: usize) -> Result<(), RenderError> {
        let end = offset.checked_add(len as u64);
        match end {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(RenderError::config(format!(
                "write of {len} bytes at offset {offset} overruns a {} byte buffer",
                self.size
            ))),
        }
    }
}

/// A buffer owned by the caller that created it.
#[derive(Debug)]
pub struct Buffer {
    id: ResourceId,
    desc: BufferDescriptor,
    native: Option<BufferNative>,
}

impl Buffer {
    /// Wraps a freshly created native buffer.
    pub fn new(id: ResourceId, desc: BufferDescriptor, native: BufferNative) -> Self {
        Self {
            id,
            desc,
            native: Some(native),
        }
    }

    /// The device-unique identity.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The creation description.
    pub fn desc(&self) -> &BufferDescriptor {
        &self.desc
    }

    /// The native objects, or `None` once disposed.
    pub fn native(&self) -> Option<&BufferNative> {
        self.native.as_ref()
    }

    /// Takes the native objects out, leaving the buffer disposed.
    pub fn take_native(&mut self) -> Option<BufferNative> {
        self.native.take()
    }

    /// Returns `true` until the buffer is disposed.
    pub fn is_alive(&self) -> bool {
        self.native.is_some()
    }
}

/// CPU-visible memory of a mapped dynamic buffer.
///
/// The pointer is only valid between the `map_buffer` call that produced it
/// and the matching `unmap_buffer`. The previous contents are undefined
/// (write-discard).
#[derive(Debug)]
pub struct MappedResource {
    ptr: NonNull<u8>,
    len: usize,
}

impl MappedResource {
    /// Wraps a pointer returned by a native map call.
    ///
    /// # Safety
    /// `ptr` must be valid for writes of `len` bytes until the resource is unmapped.
    pub unsafe fn new(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Size of the mapped range in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for an empty mapping.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The raw pointer.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Views the mapped memory as a mutable slice.
    ///
    /// # Safety
    /// The buffer must still be mapped, and no other slice over the same
    /// mapping may be alive.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
    }

    /// Copies `data` into the mapping at `offset`.
    ///
    /// # Safety
    /// The buffer must still be mapped.
    pub unsafe fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), RenderError> {
        match offset.checked_add(data.len()) {
            Some(end) if end <= self.len => {
                std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.as_ptr().add(offset), data.len());
                Ok(())
            }
            _ => Err(RenderError::config(format!(
                "write of {} bytes at offset {offset} overruns a {} byte mapping",
                data.len(),
                self.len
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_data_must_match_size() {
        let desc = BufferDescriptor::new(BufferKind::Vertex, 16);
        assert!(desc.validate(Some(&[0u8; 16])).is_ok());
        assert!(desc.validate(Some(&[0u8; 12])).unwrap_err().is_configuration());
        assert!(BufferDescriptor::new(BufferKind::Index, 0).validate(None).is_err());
    }

    #[test]
    fn range_validation_catches_overflow() {
        let desc = BufferDescriptor::new(BufferKind::Uniform, 64);
        assert!(desc.validate_range(48, 16).is_ok());
        assert!(desc.validate_range(49, 16).is_err());
        assert!(desc.validate_range(u64::MAX, 1).is_err());
    }

    #[test]
    fn mapped_write_honours_offset() {
        let mut backing = vec![0u8; 8];
        let ptr = NonNull::new(backing.as_mut_ptr()).unwrap();
        let mut mapped = unsafe { MappedResource::new(ptr, backing.len()) };
        unsafe {
            mapped.write(4, &[1, 2, 3, 4]).unwrap();
            assert!(mapped.write(6, &[9, 9, 9]).is_err());
        }
        assert_eq!(backing, [0, 0, 0, 0, 1, 2, 3, 4]);
    }
}
