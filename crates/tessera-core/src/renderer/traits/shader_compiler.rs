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

//! The external cross-compiler collaborator.

use crate::renderer::api::shader::{ShaderStage, SpecializationConstant};
use std::fmt::Debug;

/// The language a backend consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetLanguage {
    /// GLSL source.
    Glsl {
        /// `#version` number (e.g. 450).
        version: u32,
        /// Emit the ES profile.
        es: bool,
    },
    /// HLSL source.
    Hlsl {
        /// Shader model times ten (50 for SM 5.0).
        shader_model: u32,
    },
    /// The SPIR-V module itself; only reflection is produced.
    SpirV,
}

/// One translation job.
#[derive(Debug, Clone, Copy)]
pub struct TranslationRequest<'a> {
    /// The stage being translated.
    pub stage: ShaderStage,
    /// The SPIR-V module.
    pub bytecode: &'a [u8],
    /// The entry point to emit.
    pub entry_point: &'a str,
    /// The requested output language.
    pub target: TargetLanguage,
    /// Constants to bake into source targets.
    pub specialization: &'a [SpecializationConstant],
}

/// Backend-ready code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderCode {
    /// Source text for a native compiler.
    Source(String),
    /// Binary module consumed directly.
    Binary(Vec<u8>),
}

/// The result of a successful translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedShader {
    /// The generated code.
    pub code: ShaderCode,
    /// The reflection document, as JSON.
    pub reflection_json: String,
}

/// Converts one SPIR-V module into a backend language plus reflection.
///
/// Implementations wrap an external cross-compiler. Failures are reported as
/// the compiler's diagnostic text.
pub trait ShaderCompiler: Debug {
    /// Translates one stage.
    fn translate(&self, request: &TranslationRequest<'_>) -> Result<TranslatedShader, String>;
}
