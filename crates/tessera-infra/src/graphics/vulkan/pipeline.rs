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

//! Pipeline objects keyed by the structural state they bake in.
//!
//! The explicit backend has no separately bindable fixed-function state:
//! shader stages, vertex input, rasterizer, blend and depth/stencil state are
//! compiled together with a render pass into one pipeline. The device keeps
//! one pipeline per distinct combination and creates it lazily at the first
//! draw that needs it.

use super::api::{SpecializationInfo, SpecializationMapEntry, VkHandle};
use std::collections::HashMap;
use tessera_core::renderer::api::{
    BlendDescriptor, DepthStencilDescriptor, PrimitiveTopology, RasterizerDescriptor, ResourceId,
    SpecializationConstant,
};

/// Push-descriptor binding of texture slot 0. Uniform-buffer slot `n` uses
/// binding `n`, texture slot `n` uses binding `n + TEXTURE_BINDING_OFFSET`.
pub const TEXTURE_BINDING_OFFSET: u32 = 16;

/// One vertex-buffer slot as seen by a graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexInputKey {
    pub slot: u32,
    pub layout: ResourceId,
    pub stride: u32,
}

/// Everything a graphics pipeline bakes in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphicsKey {
    pub shader: ResourceId,
    /// Sorted by slot.
    pub vertex_inputs: Vec<VertexInputKey>,
    pub topology: PrimitiveTopology,
    pub rasterizer: RasterizerDescriptor,
    pub blend: BlendDescriptor,
    pub depth_stencil: DepthStencilDescriptor,
    pub render_pass: VkHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PipelineKey {
    Graphics(GraphicsKey),
    Compute(ResourceId),
}

impl PipelineKey {
    fn shader(&self) -> ResourceId {
        match self {
            PipelineKey::Graphics(key) => key.shader,
            PipelineKey::Compute(shader) => *shader,
        }
    }

    fn render_pass(&self) -> Option<VkHandle> {
        match self {
            PipelineKey::Graphics(key) => Some(key.render_pass),
            PipelineKey::Compute(_) => None,
        }
    }
}

/// Created pipelines by key.
#[derive(Debug, Default)]
pub struct PipelineCache {
    pipelines: HashMap<PipelineKey, VkHandle>,
}

impl PipelineCache {
    pub fn get(&self, key: &PipelineKey) -> Option<VkHandle> {
        self.pipelines.get(key).copied()
    }

    pub fn insert(&mut self, key: PipelineKey, pipeline: VkHandle) {
        self.pipelines.insert(key, pipeline);
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    fn evict_where(&mut self, mut predicate: impl FnMut(&PipelineKey) -> bool) -> Vec<VkHandle> {
        let mut evicted = Vec::new();
        self.pipelines.retain(|key, pipeline| {
            if predicate(key) {
                evicted.push(*pipeline);
                false
            } else {
                true
            }
        });
        evicted
    }

    /// Removes every pipeline built from `shader` and returns them for destruction.
    pub fn evict_shader(&mut self, shader: ResourceId) -> Vec<VkHandle> {
        self.evict_where(|key| key.shader() == shader)
    }

    /// Removes every pipeline built against `render_pass`.
    pub fn evict_render_pass(&mut self, render_pass: VkHandle) -> Vec<VkHandle> {
        self.evict_where(|key| key.render_pass() == Some(render_pass))
    }

    /// Empties the cache and returns every pipeline.
    pub fn drain(&mut self) -> Vec<VkHandle> {
        self.pipelines.drain().map(|(_, pipeline)| pipeline).collect()
    }
}

/// Packs specialization constants into map entries and a data blob, four
/// bytes per constant in the order given.
pub fn specialization_info(constants: &[SpecializationConstant]) -> SpecializationInfo {
    let mut info = SpecializationInfo::default();
    for constant in constants {
        info.map_entries.push(SpecializationMapEntry {
            constant_id: constant.id,
            offset: info.data.len() as u32,
            size: 4,
        });
        info.data
            .extend_from_slice(&constant.value.to_bits().to_le_bytes());
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::renderer::api::SpecializationValue;

    fn graphics(shader: u64, render_pass: VkHandle) -> PipelineKey {
        PipelineKey::Graphics(GraphicsKey {
            shader: ResourceId(shader),
            vertex_inputs: vec![VertexInputKey {
                slot: 0,
                layout: ResourceId(9),
                stride: 12,
            }],
            topology: PrimitiveTopology::TriangleList,
            rasterizer: RasterizerDescriptor::default(),
            blend: BlendDescriptor::default(),
            depth_stencil: DepthStencilDescriptor::default(),
            render_pass,
        })
    }

    #[test]
    fn equal_state_maps_to_one_pipeline() {
        let mut cache = PipelineCache::default();
        cache.insert(graphics(1, 100), 7);
        assert_eq!(cache.get(&graphics(1, 100)), Some(7));
        assert_eq!(cache.get(&graphics(1, 101)), None);

        let PipelineKey::Graphics(mut key) = graphics(1, 100) else {
            unreachable!()
        };
        key.blend = BlendDescriptor::alpha_blending();
        assert_eq!(cache.get(&PipelineKey::Graphics(key)), None);
    }

    #[test]
    fn eviction_by_shader_and_render_pass() {
        let mut cache = PipelineCache::default();
        cache.insert(graphics(1, 100), 10);
        cache.insert(graphics(1, 200), 11);
        cache.insert(graphics(2, 100), 12);
        cache.insert(PipelineKey::Compute(ResourceId(1)), 13);

        let mut evicted = cache.evict_shader(ResourceId(1));
        evicted.sort_unstable();
        assert_eq!(evicted, vec![10, 11, 13]);
        assert_eq!(cache.evict_render_pass(100), vec![12]);
        assert!(cache.is_empty());
    }

    #[test]
    fn specialization_data_is_four_bytes_per_constant() {
        let info = specialization_info(&[
            SpecializationConstant { id: 4, value: SpecializationValue::Bool(true) },
            SpecializationConstant { id: 1, value: SpecializationValue::Float(1.0) },
        ]);
        assert_eq!(info.map_entries.len(), 2);
        assert_eq!(info.map_entries[1].constant_id, 1);
        assert_eq!(info.map_entries[1].offset, 4);
        assert_eq!(info.data, [1, 0, 0, 0, 0x00, 0x00, 0x80, 0x3f]);
    }
}
