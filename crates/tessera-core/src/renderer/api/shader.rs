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

//! Shader stage descriptors, specialization constants and the shader resource.

use crate::renderer::api::common::ResourceId;
use crate::renderer::api::native::ShaderNative;
use crate::renderer::error::RenderError;
use crate::renderer::shader::reflection::ShaderReflection;

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    /// Vertex stage.
    Vertex,
    /// Geometry stage.
    Geometry,
    /// Fragment (pixel) stage.
    Fragment,
    /// Compute stage.
    Compute,
}

impl ShaderStage {
    /// The execution-model tag used in reflection documents.
    pub const fn reflection_mode(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vert",
            ShaderStage::Geometry => "geom",
            ShaderStage::Fragment => "frag",
            ShaderStage::Compute => "comp",
        }
    }
}

/// One stage of a shader: an intermediate bytecode module and its entry point.
#[derive(Debug, Clone, Copy)]
pub struct ShaderStageDescriptor<'a> {
    /// The stage this module implements.
    pub stage: ShaderStage,
    /// The SPIR-V module, as little-endian bytes.
    pub bytecode: &'a [u8],
    /// The entry point inside the module.
    pub entry_point: &'a str,
}

/// The value of a specialization constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecializationValue {
    /// A boolean constant.
    Bool(bool),
    /// A 32-bit signed integer constant.
    Int(i32),
    /// A 32-bit unsigned integer constant.
    UInt(u32),
    /// A 32-bit float constant.
    Float(f32),
}

impl SpecializationValue {
    /// The 32-bit pattern stored in specialization data blobs.
    pub fn to_bits(self) -> u32 {
        match self {
            SpecializationValue::Bool(v) => v as u32,
            SpecializationValue::Int(v) => v as u32,
            SpecializationValue::UInt(v) => v,
            SpecializationValue::Float(v) => v.to_bits(),
        }
    }

    /// The value as a source-language literal.
    pub fn to_literal(self) -> String {
        match self {
            SpecializationValue::Bool(v) => v.to_string(),
            SpecializationValue::Int(v) => v.to_string(),
            SpecializationValue::UInt(v) => format!("{v}u"),
            SpecializationValue::Float(v) => format!("{v:?}"),
        }
    }
}

/// A compile-time constant baked into a shader before native compilation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecializationConstant {
    /// The `constant_id` declared in the module.
    pub id: u32,
    /// The value to bake in.
    pub value: SpecializationValue,
}

/// Per-stage information kept by a created shader.
#[derive(Debug, Clone)]
pub struct ShaderStageInfo {
    /// The stage.
    pub stage: ShaderStage,
    /// The entry point the stage was built from.
    pub entry_point: String,
    /// Reflection of the stage's interface.
    pub reflection: ShaderReflection,
}

/// Checks a stage list: non-empty, no duplicate stage, compute alone,
/// graphics shaders with a vertex stage.
pub fn validate_stages(stages: &[ShaderStageDescriptor<'_>]) -> Result<(), RenderError> {
    if stages.is_empty() {
        return Err(RenderError::config("a shader needs at least one stage"));
    }
    for (i, a) in stages.iter().enumerate() {
        if stages[i + 1..].iter().any(|b| b.stage == a.stage) {
            return Err(RenderError::config(format!(
                "stage {:?} appears more than once",
                a.stage
            )));
        }
    }
    let has_compute = stages.iter().any(|s| s.stage == ShaderStage::Compute);
    if has_compute && stages.len() > 1 {
        return Err(RenderError::config(
            "compute stages cannot be combined with graphics stages",
        ));
    }
    if !has_compute && !stages.iter().any(|s| s.stage == ShaderStage::Vertex) {
        return Err(RenderError::config("graphics shaders need a vertex stage"));
    }
    Ok(())
}

/// A set of compiled stages bound as one unit. Owned by the caller.
#[derive(Debug)]
pub struct Shader {
    id: ResourceId,
    stages: Vec<ShaderStageInfo>,
    specialization: Vec<SpecializationConstant>,
    native: Option<ShaderNative>,
}

impl Shader {
    /// Wraps freshly compiled native stages.
    pub fn new(
        id: ResourceId,
        stages: Vec<ShaderStageInfo>,
        specialization: Vec<SpecializationConstant>,
        native: ShaderNative,
    ) -> Self {
        Self {
            id,
            stages,
            specialization,
            native: Some(native),
        }
    }

    /// The device-unique identity.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The stages, in the order they were supplied.
    pub fn stages(&self) -> &[ShaderStageInfo] {
        &self.stages
    }

    /// The info of one stage.
    pub fn stage(&self, stage: ShaderStage) -> Option<&ShaderStageInfo> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Returns `true` for compute shaders.
    pub fn is_compute(&self) -> bool {
        self.stage(ShaderStage::Compute).is_some()
    }

    /// The specialization constants the shader was built with.
    pub fn specialization(&self) -> &[SpecializationConstant] {
        &self.specialization
    }

    /// The native objects, or `None` once disposed.
    pub fn native(&self) -> Option<&ShaderNative> {
        self.native.as_ref()
    }

    /// Takes the native objects out, leaving the shader disposed.
    pub fn take_native(&mut self) -> Option<ShaderNative> {
        self.native.take()
    }

    /// Returns `true` until the shader is disposed.
    pub fn is_alive(&self) -> bool {
        self.native.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(stage: ShaderStage) -> ShaderStageDescriptor<'static> {
        ShaderStageDescriptor {
            stage,
            bytecode: &[],
            entry_point: "main",
        }
    }

    #[test]
    fn stage_list_rules() {
        assert!(validate_stages(&[stage(ShaderStage::Vertex), stage(ShaderStage::Fragment)]).is_ok());
        assert!(validate_stages(&[stage(ShaderStage::Compute)]).is_ok());
        assert!(validate_stages(&[]).is_err());
        assert!(validate_stages(&[stage(ShaderStage::Fragment)]).is_err());
        assert!(validate_stages(&[stage(ShaderStage::Vertex), stage(ShaderStage::Vertex)]).is_err());
        assert!(validate_stages(&[stage(ShaderStage::Vertex), stage(ShaderStage::Compute)]).is_err());
    }

    #[test]
    fn specialization_values_encode_as_words() {
        assert_eq!(SpecializationValue::Bool(true).to_bits(), 1);
        assert_eq!(SpecializationValue::Int(-1).to_bits(), u32::MAX);
        assert_eq!(SpecializationValue::Float(1.0).to_bits(), 0x3f80_0000);
        assert_eq!(SpecializationValue::UInt(7).to_literal(), "7u");
        assert_eq!(SpecializationValue::Float(2.0).to_literal(), "2.0");
    }
}
