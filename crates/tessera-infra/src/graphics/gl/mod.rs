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

//! The immediate-mode backend, built on an OpenGL 4.5 core context.
//!
//! [`GlDevice`] translates every device call into calls on a [`GlApi`], the
//! thin boundary over the loaded GL function table. Production code provides
//! an implementation backed by the platform context; tests use the recording
//! driver in [`crate::graphics::null`].

mod api;
pub mod conversions;
mod device;

pub use self::api::{consts, GLenum, GLint, GLuint, GlApi, GlContextConfig, GlError};
pub use self::device::GlDevice;
