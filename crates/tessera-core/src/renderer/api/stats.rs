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

//! Per-device counters: draw statistics and live resources.

/// Cumulative statistics of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceStats {
    /// Number of presented frames.
    pub frames: u64,
    /// Number of draw calls issued.
    pub draw_calls: u64,
    /// Number of triangles submitted by draw calls.
    pub triangles: u64,
    /// Number of compute dispatches.
    pub dispatches: u64,
    /// Number of `set_*` calls skipped by the state cache.
    pub redundant_state_skips: u64,
}

impl DeviceStats {
    /// Records one draw of `triangles` triangles.
    pub fn record_draw(&mut self, triangles: u64) {
        self.draw_calls += 1;
        self.triangles += triangles;
    }
}

/// The kinds of caller-owned resources a device creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Buffers.
    Buffer,
    /// Textures.
    Texture,
    /// Shaders.
    Shader,
    /// Input layouts.
    InputLayout,
    /// Blend, depth/stencil, rasterizer and sampler states.
    StateObject,
    /// Framebuffers.
    Framebuffer,
}

/// Number of live resources of each kind.
///
/// Create increments and the first dispose decrements; later disposes of the
/// same resource leave the counters alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceCounters {
    /// Live buffers.
    pub buffers: u32,
    /// Live textures.
    pub textures: u32,
    /// Live shaders.
    pub shaders: u32,
    /// Live input layouts.
    pub input_layouts: u32,
    /// Live state objects.
    pub state_objects: u32,
    /// Live framebuffers.
    pub framebuffers: u32,
}

impl ResourceCounters {
    fn slot(&mut self, kind: ResourceKind) -> &mut u32 {
        match kind {
            ResourceKind::Buffer => &mut self.buffers,
            ResourceKind::Texture => &mut self.textures,
            ResourceKind::Shader => &mut self.shaders,
            ResourceKind::InputLayout => &mut self.input_layouts,
            ResourceKind::StateObject => &mut self.state_objects,
            ResourceKind::Framebuffer => &mut self.framebuffers,
        }
    }

    /// Records a creation.
    pub fn created(&mut self, kind: ResourceKind) {
        *self.slot(kind) += 1;
    }

    /// Records a disposal.
    pub fn released(&mut self, kind: ResourceKind) {
        let slot = self.slot(kind);
        *slot = slot.saturating_sub(1);
    }

    /// Sum over every kind.
    pub fn total(&self) -> u32 {
        self.buffers
            + self.textures
            + self.shaders
            + self.input_layouts
            + self.state_objects
            + self.framebuffers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_each_kind() {
        let mut counters = ResourceCounters::default();
        counters.created(ResourceKind::Buffer);
        counters.created(ResourceKind::Texture);
        counters.created(ResourceKind::Texture);
        counters.released(ResourceKind::Texture);
        assert_eq!(counters.buffers, 1);
        assert_eq!(counters.textures, 1);
        assert_eq!(counters.total(), 2);
    }
}
