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

//! Bookkeeping shared by every backend device: resource ids, live counters,
//! statistics, the state cache and the mapped-buffer set.

use std::collections::HashSet;
use tessera_core::math::Extent2D;
use tessera_core::renderer::api::*;
use tessera_core::renderer::{PipelineStateCache, RenderError, RenderResult};

#[derive(Debug)]
pub(crate) struct DeviceState {
    backend: BackendType,
    ids: ResourceIdAllocator,
    counters: ResourceCounters,
    stats: DeviceStats,
    mapped: HashSet<ResourceId>,
    pub(crate) cache: PipelineStateCache,
    pub(crate) swapchain: SwapchainState,
    pub(crate) options: DeviceOptions,
    pub(crate) topology: PrimitiveTopology,
}

impl DeviceState {
    /// Validates the construction parameters shared by every backend.
    pub(crate) fn new(
        backend: BackendType,
        initial_size: Extent2D,
        options: DeviceOptions,
    ) -> RenderResult<Self> {
        if initial_size.is_empty() {
            return Err(RenderError::config(format!(
                "initial surface size {}x{} has a zero dimension",
                initial_size.width, initial_size.height
            )));
        }
        if options.swapchain_image_count == 0 {
            return Err(RenderError::config("swapchain image count must be at least 1"));
        }
        if options.color_format.is_depth() || options.color_format.is_compressed() {
            return Err(RenderError::config(format!(
                "{:?} cannot be used as a swapchain color format",
                options.color_format
            )));
        }
        if let Some(format) = options.depth_stencil_format {
            if !format.is_depth() {
                return Err(RenderError::config(format!(
                    "{format:?} is not a depth/stencil format"
                )));
            }
        }

        Ok(Self {
            backend,
            ids: ResourceIdAllocator::default(),
            counters: ResourceCounters::default(),
            stats: DeviceStats::default(),
            mapped: HashSet::new(),
            cache: PipelineStateCache::new(options.state_cache),
            swapchain: SwapchainState {
                extent: initial_size,
                image_count: options.swapchain_image_count,
                color_format: options.color_format,
                depth_stencil_format: options.depth_stencil_format,
            },
            options,
            topology: PrimitiveTopology::default(),
        })
    }

    pub(crate) fn backend(&self) -> BackendType {
        self.backend
    }

    /// Hands out a fresh id and counts a live resource of `kind`.
    pub(crate) fn register(&mut self, kind: ResourceKind) -> ResourceId {
        self.counters.created(kind);
        self.ids.allocate()
    }

    pub(crate) fn release(&mut self, kind: ResourceKind) {
        self.counters.released(kind);
    }

    pub(crate) fn counters(&self) -> ResourceCounters {
        self.counters
    }

    pub(crate) fn stats(&self) -> DeviceStats {
        DeviceStats {
            redundant_state_skips: self.cache.skipped(),
            ..self.stats
        }
    }

    pub(crate) fn record_draw(&mut self, vertex_count: u32, instances: u32) {
        let triangles = self.topology.triangle_count(vertex_count) * instances as u64;
        self.stats.record_draw(triangles);
    }

    pub(crate) fn record_dispatch(&mut self) {
        self.stats.dispatches += 1;
    }

    pub(crate) fn record_frame(&mut self) {
        self.stats.frames += 1;
    }

    /// Marks `buffer` as mapped. Mapping twice without an unmap is an error.
    pub(crate) fn begin_map(&mut self, buffer: &Buffer) -> RenderResult<()> {
        if !buffer.desc().dynamic {
            return Err(RenderError::config(format!(
                "buffer {:?} is static and cannot be mapped",
                buffer.id()
            )));
        }
        if !self.mapped.insert(buffer.id()) {
            return Err(RenderError::config(format!(
                "buffer {:?} is already mapped",
                buffer.id()
            )));
        }
        Ok(())
    }

    /// Clears the mapped mark. Returns `false` when the buffer was not mapped.
    pub(crate) fn end_map(&mut self, id: ResourceId) -> bool {
        self.mapped.remove(&id)
    }

    pub(crate) fn is_mapped(&self, id: ResourceId) -> bool {
        self.mapped.contains(&id)
    }

    /// Rejects handles produced by another backend.
    pub(crate) fn raw(&self, handle: NativeHandle) -> RenderResult<u64> {
        if handle.backend() != self.backend {
            return Err(RenderError::config(format!(
                "a {:?} resource cannot be used on a {:?} device",
                handle.backend(),
                self.backend
            )));
        }
        Ok(handle.raw())
    }
}

/// Checks that initial texture data covers exactly the full subresource layout.
pub(crate) fn check_initial_data(
    desc: &TextureDescriptor,
    data: Option<&[u8]>,
) -> RenderResult<()> {
    let Some(data) = data else {
        return Ok(());
    };
    let expected = initial_data_size(desc);
    if data.len() != expected {
        return Err(RenderError::config(format!(
            "texture needs {expected} bytes of initial data but {} were supplied",
            data.len()
        )));
    }
    Ok(())
}

/// Borrows the native payload of a resource, or fails if it was disposed.
pub(crate) fn alive<T>(native: Option<T>, what: &str, id: ResourceId) -> RenderResult<T> {
    native.ok_or_else(|| RenderError::config(format!("{what} {id:?} has been disposed")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_twice_is_rejected() {
        let mut state = DeviceState::new(
            BackendType::OpenGl,
            Extent2D::new(8, 8),
            DeviceOptions::default(),
        )
        .unwrap();
        let id = state.register(ResourceKind::Buffer);
        let buffer = Buffer::new(
            id,
            BufferDescriptor::new(BufferKind::Vertex, 16).dynamic(),
            BufferNative {
                buffer: NativeHandle::Gl(1),
                memory: None,
            },
        );

        state.begin_map(&buffer).unwrap();
        assert!(state.begin_map(&buffer).unwrap_err().is_configuration());
        assert!(state.end_map(id));
        assert!(!state.end_map(id), "second unmap must report nothing mapped");
    }

    #[test]
    fn foreign_handles_are_configuration_errors() {
        let state = DeviceState::new(
            BackendType::Vulkan,
            Extent2D::new(8, 8),
            DeviceOptions::default(),
        )
        .unwrap();
        assert_eq!(state.raw(NativeHandle::Vulkan(7)).unwrap(), 7);
        assert!(state.raw(NativeHandle::Gl(7)).unwrap_err().is_configuration());
    }

    #[test]
    fn construction_rejects_bad_options() {
        let size = Extent2D::new(8, 8);
        assert!(DeviceState::new(BackendType::OpenGl, Extent2D::new(0, 8), DeviceOptions::default()).is_err());
        let options = DeviceOptions {
            depth_stencil_format: Some(PixelFormat::R8G8B8A8Unorm),
            ..DeviceOptions::default()
        };
        assert!(DeviceState::new(BackendType::OpenGl, size, options).is_err());
        let options = DeviceOptions {
            swapchain_image_count: 0,
            ..DeviceOptions::default()
        };
        assert!(DeviceState::new(BackendType::OpenGl, size, options).is_err());
    }
}
