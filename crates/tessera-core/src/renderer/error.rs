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

//! Defines the hierarchy of error types for the rendering subsystem.
//!
//! Every fallible device operation returns [`RenderError`]. The variants map
//! one-to-one onto the error classes callers are expected to handle
//! differently: invalid descriptions, shader pipeline failures, missing
//! backend capabilities and native driver failures.

use crate::renderer::api::common::BackendType;
use crate::renderer::api::shader::ShaderStage;
use thiserror::Error;

/// An error raised while turning intermediate shader bytecode into a native
/// shader object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderError {
    /// The cross-compilation bridge could not produce backend source or
    /// reflection for the stage. No native compile was attempted.
    #[error("shader translation failed for {stage:?} entry point '{entry_point}': {diagnostics}")]
    Translation {
        /// The stage being translated.
        stage: ShaderStage,
        /// The entry point requested by the caller.
        entry_point: String,
        /// Diagnostics reported by the bridge or the cross-compiler.
        diagnostics: String,
    },
    /// The backend's native compiler or linker rejected the generated code.
    #[error("native shader compilation failed for {stage:?}: {diagnostics}")]
    NativeCompilation {
        /// The stage that failed, or the vertex stage for link failures.
        stage: ShaderStage,
        /// The native compiler's info log.
        diagnostics: String,
    },
}

/// A failure reported by a native graphics driver call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed with status {status:#x}: {message}")]
pub struct DeviceError {
    /// Name of the native entry point that failed (e.g. `vkQueueSubmit`).
    pub operation: &'static str,
    /// Raw native status code, widened to 64 bits.
    pub status: i64,
    /// Human readable description of the status.
    pub message: String,
}

impl DeviceError {
    /// Creates a new device error.
    pub fn new(operation: &'static str, status: i64, message: impl Into<String>) -> Self {
        Self {
            operation,
            status,
            message: message.into(),
        }
    }
}

/// The top-level error type for every [`GraphicsDevice`] operation.
///
/// [`GraphicsDevice`]: crate::renderer::traits::GraphicsDevice
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The request was invalid and was rejected before any native call.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// A shader could not be translated or compiled.
    #[error(transparent)]
    Shader(#[from] ShaderError),
    /// The backend does not have the requested capability.
    #[error("{operation} is not supported by the {backend:?} backend")]
    Unsupported {
        /// The backend that rejected the call.
        backend: BackendType,
        /// The operation that was requested.
        operation: String,
    },
    /// A native driver call failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl RenderError {
    /// Shorthand for a [`RenderError::Configuration`].
    pub fn config(message: impl Into<String>) -> Self {
        RenderError::Configuration(message.into())
    }

    /// Shorthand for a [`RenderError::Unsupported`].
    pub fn unsupported(backend: BackendType, operation: impl Into<String>) -> Self {
        RenderError::Unsupported {
            backend,
            operation: operation.into(),
        }
    }

    /// Returns `true` for configuration errors.
    pub fn is_configuration(&self) -> bool {
        matches!(self, RenderError::Configuration(_))
    }
}

/// Result alias used throughout the renderer.
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_error_display() {
        let err = ShaderError::Translation {
            stage: ShaderStage::Fragment,
            entry_point: "main".to_string(),
            diagnostics: "unknown opcode".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "shader translation failed for Fragment entry point 'main': unknown opcode"
        );
    }

    #[test]
    fn device_error_wraps_status() {
        let err: RenderError = DeviceError::new("vkQueueSubmit", -4, "device lost").into();
        assert_eq!(
            err.to_string(),
            "vkQueueSubmit failed with status 0xfffffffffffffffc: device lost"
        );
        assert!(!err.is_configuration());
    }

    #[test]
    fn shader_error_converts_transparently() {
        let err: RenderError = ShaderError::NativeCompilation {
            stage: ShaderStage::Vertex,
            diagnostics: "0:1: syntax error".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            RenderError::Shader(ShaderError::NativeCompilation { .. })
        ));
        assert_eq!(
            err.to_string(),
            "native shader compilation failed for Vertex: 0:1: syntax error"
        );
    }
}
