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

//! The backend-neutral rendering contract.
//!
//! `api` holds the plain data types (descriptors, resources, formats),
//! `traits` the seams implemented by backends and external collaborators,
//! `shader` the cross-compilation bridge and `state_cache` the redundant
//! state filter every device runs its `set_*` calls through.

pub mod api;
pub mod error;
pub mod shader;
pub mod state_cache;
pub mod traits;

pub use self::api::*;
pub use self::error::{DeviceError, RenderError, RenderResult, ShaderError};
pub use self::state_cache::{PipelineStateCache, StateSlots};
pub use self::traits::*;
