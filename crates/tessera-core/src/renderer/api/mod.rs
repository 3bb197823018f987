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

//! Backend-neutral data types: descriptors, resources and the format algebra.

pub mod buffer;
pub mod common;
pub mod enums;
pub mod format;
pub mod framebuffer;
pub mod input_layout;
pub mod native;
pub mod shader;
pub mod state;
pub mod stats;
pub mod subresource;
pub mod texture;

pub use self::buffer::*;
pub use self::common::*;
pub use self::enums::*;
pub use self::format::*;
pub use self::framebuffer::*;
pub use self::input_layout::*;
pub use self::native::*;
pub use self::shader::*;
pub use self::state::*;
pub use self::stats::*;
pub use self::subresource::*;
pub use self::texture::*;
