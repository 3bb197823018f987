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

//! Headless reference drivers.
//!
//! Every driver implements one native seam entirely in memory. Object names
//! come from a counter, live objects are tracked per kind, and the pipeline
//! state visible at each draw is recorded as a [`StateSnapshot`] so two runs
//! of the same command stream can be compared. Entry points can be told to
//! fail once through [`Failures`].
//!
//! Tests reach a driver through the device that owns it:
//!
//! ```ignore
//! let gl = device.api().as_any().downcast_ref::<NullGl>().unwrap();
//! assert_eq!(gl.ledger().live_objects(), 1);
//! ```

mod compiler;
mod d3d11;
mod gl;
mod vulkan;

pub use self::compiler::NullCompiler;
pub use self::d3d11::NullD3d11;
pub use self::gl::NullGl;
pub use self::vulkan::NullVulkan;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

/// Bound pipeline state as one draw sees it, keyed by state name.
pub type StateSnapshot = BTreeMap<String, String>;

/// One-shot failures armed per entry point.
///
/// Arming only needs a shared reference, so tests can arm a failure on a
/// driver that is already owned by a device.
#[derive(Debug)]
pub struct Failures<C> {
    armed: RefCell<HashMap<&'static str, C>>,
}

impl<C> Default for Failures<C> {
    fn default() -> Self {
        Self {
            armed: RefCell::new(HashMap::new()),
        }
    }
}

impl<C: Copy> Failures<C> {
    /// Makes the next call of `entry_point` fail with `code`.
    pub fn arm(&self, entry_point: &'static str, code: C) {
        self.armed.borrow_mut().insert(entry_point, code);
    }

    /// Removes every armed failure.
    pub fn disarm(&self) {
        self.armed.borrow_mut().clear();
    }

    /// Consumes the failure armed for `entry_point`, if any.
    pub(crate) fn take(&self, entry_point: &str) -> Option<C> {
        self.armed.borrow_mut().remove(entry_point)
    }
}

/// Object, call and state bookkeeping shared by the drivers.
#[derive(Debug, Default)]
pub struct Ledger {
    next_handle: u64,
    live: HashMap<u64, &'static str>,
    calls: HashMap<&'static str, usize>,
    bound: StateSnapshot,
    draws: Vec<StateSnapshot>,
}

impl Ledger {
    pub(crate) fn call(&mut self, entry_point: &'static str) {
        *self.calls.entry(entry_point).or_default() += 1;
    }

    /// Hands out a fresh non-zero handle for an object of `kind`.
    pub(crate) fn create(&mut self, kind: &'static str) -> u64 {
        self.next_handle += 1;
        self.live.insert(self.next_handle, kind);
        self.next_handle
    }

    /// Forgets `handle`. Returns `false` for unknown or already destroyed
    /// handles, which the drivers log as a native double free.
    pub(crate) fn destroy(&mut self, handle: u64) -> bool {
        if handle == 0 {
            return true;
        }
        if self.live.remove(&handle).is_some() {
            true
        } else {
            log::error!("null driver: handle {handle:#x} destroyed twice or never created");
            false
        }
    }

    pub(crate) fn kind(&self, handle: u64) -> Option<&'static str> {
        self.live.get(&handle).copied()
    }

    pub(crate) fn bind(&mut self, key: impl Into<String>, value: impl Debug) {
        self.bound.insert(key.into(), format!("{value:?}"));
    }

    pub(crate) fn unbind(&mut self, key: &str) {
        self.bound.remove(key);
    }

    pub(crate) fn bound_value(&self, key: &str) -> Option<&str> {
        self.bound.get(key).map(String::as_str)
    }

    /// Records the bound state plus the draw-specific `extra` entries.
    pub(crate) fn snapshot(&mut self, extra: &[(&str, String)]) {
        let mut snapshot = self.bound.clone();
        for (key, value) in extra {
            snapshot.insert((*key).to_string(), value.clone());
        }
        self.record(snapshot);
    }

    /// Records a snapshot built by the driver itself.
    pub(crate) fn record(&mut self, snapshot: StateSnapshot) {
        self.draws.push(snapshot);
    }

    /// How often `entry_point` was called.
    pub fn call_count(&self, entry_point: &str) -> usize {
        self.calls.get(entry_point).copied().unwrap_or(0)
    }

    /// Number of native objects alive.
    pub fn live_objects(&self) -> usize {
        self.live.len()
    }

    /// Number of native objects of `kind` alive.
    pub fn live_count(&self, kind: &str) -> usize {
        self.live.values().filter(|&&k| k == kind).count()
    }

    /// The state bound right now.
    pub fn bound(&self) -> &StateSnapshot {
        &self.bound
    }

    /// One snapshot per draw or dispatch, in submission order.
    pub fn draws(&self) -> &[StateSnapshot] {
        &self.draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn armed_failures_fire_once() {
        let failures = Failures::default();
        failures.arm("glGenBuffers", 0x0505_u32);
        assert_eq!(failures.take("glGenBuffers"), Some(0x0505));
        assert_eq!(failures.take("glGenBuffers"), None);
    }

    #[test]
    fn ledger_tracks_objects_and_snapshots() {
        let mut ledger = Ledger::default();
        let a = ledger.create("buffer");
        let b = ledger.create("texture");
        assert_ne!(a, b);
        assert_eq!(ledger.live_count("buffer"), 1);

        assert!(ledger.destroy(a));
        assert!(!ledger.destroy(a), "second destroy is reported");
        assert_eq!(ledger.live_objects(), 1);

        ledger.bind("program", 3);
        ledger.snapshot(&[("mode", "TRIANGLES".to_string())]);
        assert_eq!(ledger.draws()[0]["program"], "3");
        assert_eq!(ledger.draws()[0]["mode"], "TRIANGLES");
    }
}
