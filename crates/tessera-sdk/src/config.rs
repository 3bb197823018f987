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

//! Device configuration loaded from RON.
//!
//! ```ron
//! (
//!     backend: Vulkan,
//!     width: 1280,
//!     height: 720,
//!     options: (debug: true, state_cache: false),
//! )
//! ```
//!
//! Every field is optional. The `TESSERA_BACKEND` environment variable, when
//! set, replaces the configured backend.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tessera_core::math::Extent2D;
use tessera_core::renderer::{BackendType, DeviceOptions};

/// Environment variable that overrides [`DeviceConfig::backend`].
pub const BACKEND_ENV_VAR: &str = "TESSERA_BACKEND";

/// Everything needed to build a device apart from the native driver itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// The backend family to create.
    pub backend: BackendType,
    /// Initial back-buffer width in pixels.
    pub width: u32,
    /// Initial back-buffer height in pixels.
    pub height: u32,
    /// Options forwarded to the device.
    pub options: DeviceOptions,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::Vulkan,
            width: 1280,
            height: 720,
            options: DeviceOptions::default(),
        }
    }
}

impl DeviceConfig {
    /// Parses a RON document. Environment overrides are not applied.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).context("Failed to parse device configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the RON file at `path`, then applies the
    /// `TESSERA_BACKEND` override.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read device configuration {}", path.display()))?;
        let config = Self::from_ron_str(&source)
            .with_context(|| format!("Invalid device configuration {}", path.display()))?;
        config.with_env_overrides()
    }

    /// Applies the `TESSERA_BACKEND` override, if the variable is set.
    pub fn with_env_overrides(self) -> Result<Self> {
        match std::env::var(BACKEND_ENV_VAR) {
            Ok(value) => self.with_backend_override(Some(&value)),
            Err(std::env::VarError::NotPresent) => Ok(self),
            Err(err) => Err(err).with_context(|| format!("{BACKEND_ENV_VAR} is not valid unicode")),
        }
    }

    /// Replaces the backend with the one named by `value`.
    pub fn with_backend_override(mut self, value: Option<&str>) -> Result<Self> {
        if let Some(value) = value {
            let backend = parse_backend(value)
                .with_context(|| format!("Invalid {BACKEND_ENV_VAR} override"))?;
            if backend != self.backend {
                log::info!("Backend overridden from {:?} to {:?}", self.backend, backend);
            }
            self.backend = backend;
        }
        Ok(self)
    }

    /// The initial back-buffer size.
    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("surface size {}x{} is empty", self.width, self.height);
        }
        if self.options.swapchain_image_count == 0 {
            bail!("swapchain_image_count must be at least 1");
        }
        Ok(())
    }
}

/// Parses a backend name, ignoring case.
///
/// Accepts the [`BackendType`] variant names and the short forms `gl`,
/// `d3d11` and `vk`.
pub fn parse_backend(value: &str) -> Result<BackendType> {
    match value.trim().to_ascii_lowercase().as_str() {
        "gl" | "opengl" => Ok(BackendType::OpenGl),
        "d3d11" | "direct3d11" => Ok(BackendType::Direct3D11),
        "vk" | "vulkan" => Ok(BackendType::Vulkan),
        other => bail!("unknown backend '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::renderer::PixelFormat;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = DeviceConfig::from_ron_str("(backend: OpenGl)").unwrap();
        assert_eq!(config.backend, BackendType::OpenGl);
        assert_eq!(config.extent(), Extent2D::new(1280, 720));
        assert_eq!(config.options, DeviceOptions::default());
    }

    #[test]
    fn test_nested_options_are_parsed() {
        let config = DeviceConfig::from_ron_str(
            "(width: 640, height: 360, options: (debug: true, state_cache: false, \
             depth_stencil_format: Some(D32Float)))",
        )
        .unwrap();
        assert_eq!(config.extent(), Extent2D::new(640, 360));
        assert!(config.options.debug);
        assert!(!config.options.state_cache);
        assert_eq!(config.options.depth_stencil_format, Some(PixelFormat::D32Float));
        assert_eq!(config.options.swapchain_image_count, 3);
    }

    #[test]
    fn test_empty_surface_is_rejected() {
        let err = DeviceConfig::from_ron_str("(width: 0)").unwrap_err();
        assert!(err.to_string().contains("empty"), "unexpected error: {err}");
    }

    #[test]
    fn test_malformed_documents_carry_context() {
        let err = DeviceConfig::from_ron_str("(backend: Metal)").unwrap_err();
        assert_eq!(err.to_string(), "Failed to parse device configuration");
    }

    #[test]
    fn test_backend_names() {
        assert_eq!(parse_backend("GL").unwrap(), BackendType::OpenGl);
        assert_eq!(parse_backend(" direct3d11 ").unwrap(), BackendType::Direct3D11);
        assert_eq!(parse_backend("vk").unwrap(), BackendType::Vulkan);
        assert!(parse_backend("metal").is_err());
    }

    #[test]
    fn test_backend_override() {
        let config = DeviceConfig::default()
            .with_backend_override(Some("d3d11"))
            .unwrap();
        assert_eq!(config.backend, BackendType::Direct3D11);

        let unchanged = config.clone().with_backend_override(None).unwrap();
        assert_eq!(unchanged, config);
        assert!(config.with_backend_override(Some("glide")).is_err());
    }
}
