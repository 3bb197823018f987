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

//! The pipeline state cache: remembers the last value forwarded to the
//! backend for each bindable slot and filters out redundant `set_*` calls.
//!
//! Every `set_*` method returns `true` when the caller must forward the value
//! to the native API. Values are compared structurally, so two distinct state
//! objects with equal descriptions count as the same state. When a forward
//! fails the caller must [`invalidate`](PipelineStateCache::invalidate) the
//! slot, since the native state is then unknown.

use crate::renderer::api::common::ResourceId;
use crate::renderer::api::enums::PrimitiveTopology;
use crate::renderer::api::state::{BlendDescriptor, DepthStencilDescriptor, RasterizerDescriptor};
use crate::tessera_bitflags;
use std::collections::BTreeMap;

tessera_bitflags! {
    /// Groups of cached slots, used to invalidate several at once.
    pub struct StateSlots: u32 {
        /// The bound shader.
        const SHADER = 1 << 0;
        /// The rasterizer state.
        const RASTERIZER = 1 << 1;
        /// The blend state.
        const BLEND = 1 << 2;
        /// The depth/stencil state and stencil reference.
        const DEPTH_STENCIL = 1 << 3;
        /// Every vertex-buffer slot.
        const VERTEX_BUFFERS = 1 << 4;
        /// The primitive topology.
        const TOPOLOGY = 1 << 5;
        /// Every slot.
        const ALL = 0b11_1111;
    }
}

/// A vertex buffer bound together with its stride and input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBinding {
    /// The bound buffer.
    pub buffer: ResourceId,
    /// Distance between consecutive vertices in bytes.
    pub stride: u32,
    /// The layout describing the attributes read from the buffer.
    pub layout: ResourceId,
}

#[derive(Debug, Clone, PartialEq)]
enum Slot<T> {
    Unknown,
    Known(T),
}

/// Last-applied state per slot. See the module documentation.
#[derive(Debug)]
pub struct PipelineStateCache {
    enabled: bool,
    shader: Slot<ResourceId>,
    rasterizer: Slot<RasterizerDescriptor>,
    blend: Slot<BlendDescriptor>,
    depth_stencil: Slot<(DepthStencilDescriptor, u32)>,
    vertex_buffers: BTreeMap<u32, VertexBinding>,
    topology: Slot<PrimitiveTopology>,
    skipped: u64,
}

fn apply<T: PartialEq + Clone>(
    enabled: bool,
    slot: &mut Slot<T>,
    value: &T,
    skipped: &mut u64,
    name: &str,
) -> bool {
    if !enabled {
        return true;
    }
    if matches!(slot, Slot::Known(current) if *current == *value) {
        *skipped += 1;
        log::trace!("State cache: skipped redundant {name} change");
        return false;
    }
    *slot = Slot::Known(value.clone());
    true
}

impl PipelineStateCache {
    /// Creates a cache with every slot unknown. A disabled cache forwards everything.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            shader: Slot::Unknown,
            rasterizer: Slot::Unknown,
            blend: Slot::Unknown,
            depth_stencil: Slot::Unknown,
            vertex_buffers: BTreeMap::new(),
            topology: Slot::Unknown,
            skipped: 0,
        }
    }

    /// Returns `true` if redundant calls are filtered.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of calls filtered so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Shader slot.
    pub fn set_shader(&mut self, shader: ResourceId) -> bool {
        apply(self.enabled, &mut self.shader, &shader, &mut self.skipped, "shader")
    }

    /// Rasterizer slot.
    pub fn set_rasterizer(&mut self, desc: &RasterizerDescriptor) -> bool {
        apply(self.enabled, &mut self.rasterizer, desc, &mut self.skipped, "rasterizer")
    }

    /// Blend slot.
    pub fn set_blend(&mut self, desc: &BlendDescriptor) -> bool {
        apply(self.enabled, &mut self.blend, desc, &mut self.skipped, "blend")
    }

    /// Depth/stencil slot, keyed by description and stencil reference.
    pub fn set_depth_stencil(&mut self, desc: &DepthStencilDescriptor, stencil_ref: u32) -> bool {
        apply(
            self.enabled,
            &mut self.depth_stencil,
            &(*desc, stencil_ref),
            &mut self.skipped,
            "depth/stencil",
        )
    }

    /// Vertex-buffer slot `slot`.
    pub fn set_vertex_buffer(&mut self, slot: u32, binding: VertexBinding) -> bool {
        if !self.enabled {
            return true;
        }
        if self.vertex_buffers.get(&slot) == Some(&binding) {
            self.skipped += 1;
            log::trace!("State cache: skipped redundant vertex buffer change on slot {slot}");
            return false;
        }
        self.vertex_buffers.insert(slot, binding);
        true
    }

    /// Forgets the binding cached for vertex-buffer slot `slot` alone, so the
    /// next bind of that slot is forwarded. Backends whose native state is not
    /// keyed by slot call this when a bind through one slot overwrote state
    /// last written through another.
    pub fn forget_vertex_buffer(&mut self, slot: u32) {
        if self.vertex_buffers.remove(&slot).is_some() {
            log::trace!("State cache: forgot vertex buffer slot {slot}");
        }
    }

    /// Topology slot.
    pub fn set_topology(&mut self, topology: PrimitiveTopology) -> bool {
        apply(self.enabled, &mut self.topology, &topology, &mut self.skipped, "topology")
    }

    /// Forgets the cached value of every slot in `slots`.
    pub fn invalidate(&mut self, slots: StateSlots) {
        if slots.contains(StateSlots::SHADER) {
            self.shader = Slot::Unknown;
        }
        if slots.contains(StateSlots::RASTERIZER) {
            self.rasterizer = Slot::Unknown;
        }
        if slots.contains(StateSlots::BLEND) {
            self.blend = Slot::Unknown;
        }
        if slots.contains(StateSlots::DEPTH_STENCIL) {
            self.depth_stencil = Slot::Unknown;
        }
        if slots.contains(StateSlots::VERTEX_BUFFERS) {
            self.vertex_buffers.clear();
        }
        if slots.contains(StateSlots::TOPOLOGY) {
            self.topology = Slot::Unknown;
        }
    }

    /// Forgets every slot.
    pub fn invalidate_all(&mut self) {
        self.invalidate(StateSlots::ALL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::enums::CullMode;

    #[test]
    fn repeated_values_are_forwarded_once() {
        let mut cache = PipelineStateCache::new(true);
        let desc = RasterizerDescriptor::default();
        assert!(cache.set_rasterizer(&desc));
        assert!(!cache.set_rasterizer(&desc));
        assert!(!cache.set_rasterizer(&RasterizerDescriptor::default()));
        assert_eq!(cache.skipped(), 2);

        let culled = RasterizerDescriptor {
            cull_mode: CullMode::None,
            ..desc
        };
        assert!(cache.set_rasterizer(&culled), "a different value must be forwarded");
    }

    #[test]
    fn invalidation_forces_a_forward() {
        let mut cache = PipelineStateCache::new(true);
        assert!(cache.set_topology(PrimitiveTopology::TriangleList));
        assert!(cache.set_shader(ResourceId(4)));
        cache.invalidate(StateSlots::TOPOLOGY);
        assert!(cache.set_topology(PrimitiveTopology::TriangleList));
        assert!(!cache.set_shader(ResourceId(4)), "shader slot was not invalidated");
        cache.invalidate_all();
        assert!(cache.set_shader(ResourceId(4)));
    }

    #[test]
    fn stencil_reference_is_part_of_the_key() {
        let mut cache = PipelineStateCache::new(true);
        let desc = DepthStencilDescriptor::default();
        assert!(cache.set_depth_stencil(&desc, 0));
        assert!(!cache.set_depth_stencil(&desc, 0));
        assert!(cache.set_depth_stencil(&desc, 1));
    }

    #[test]
    fn vertex_slots_are_independent() {
        let mut cache = PipelineStateCache::new(true);
        let binding = VertexBinding {
            buffer: ResourceId(1),
            stride: 12,
            layout: ResourceId(2),
        };
        assert!(cache.set_vertex_buffer(0, binding));
        assert!(cache.set_vertex_buffer(1, binding));
        assert!(!cache.set_vertex_buffer(0, binding));
        assert!(cache.set_vertex_buffer(0, VertexBinding { stride: 16, ..binding }));
    }

    #[test]
    fn forgetting_one_vertex_slot_keeps_the_others() {
        let mut cache = PipelineStateCache::new(true);
        let binding = VertexBinding {
            buffer: ResourceId(1),
            stride: 12,
            layout: ResourceId(2),
        };
        assert!(cache.set_vertex_buffer(0, binding));
        assert!(cache.set_vertex_buffer(1, binding));
        cache.forget_vertex_buffer(0);
        assert!(cache.set_vertex_buffer(0, binding));
        assert!(!cache.set_vertex_buffer(1, binding));
    }

    #[test]
    fn disabled_cache_forwards_everything() {
        let mut cache = PipelineStateCache::new(false);
        assert!(cache.set_blend(&BlendDescriptor::default()));
        assert!(cache.set_blend(&BlendDescriptor::default()));
        assert_eq!(cache.skipped(), 0);
    }
}
