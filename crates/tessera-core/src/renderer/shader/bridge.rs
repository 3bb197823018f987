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

//! Turns one SPIR-V stage into backend-ready code and reflection.
//!
//! The bridge validates its inputs, hands the module to the external
//! [`ShaderCompiler`], then parses and checks the reflection document. Every
//! failure here is a [`ShaderError::Translation`]; native compilation happens
//! later, in the backend.

use crate::renderer::api::shader::{ShaderStageDescriptor, ShaderStageInfo, SpecializationConstant};
use crate::renderer::error::ShaderError;
use crate::renderer::shader::reflection::ShaderReflection;
use crate::renderer::traits::{ShaderCode, ShaderCompiler, TargetLanguage, TranslationRequest};
use std::sync::Arc;

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Number of words in the SPIR-V header.
const SPIRV_HEADER_WORDS: usize = 5;

/// Checks that `bytecode` looks like a SPIR-V module.
pub fn validate_spirv(bytecode: &[u8]) -> Result<(), String> {
    if bytecode.is_empty() || bytecode.len() % 4 != 0 {
        return Err(format!(
            "bytecode length {} is not a non-zero multiple of 4",
            bytecode.len()
        ));
    }
    if bytecode.len() < SPIRV_HEADER_WORDS * 4 {
        return Err(format!(
            "bytecode is {} bytes, shorter than the SPIR-V header",
            bytecode.len()
        ));
    }
    let magic: u32 = bytemuck::pod_read_unaligned(&bytecode[..4]);
    if magic != SPIRV_MAGIC {
        return Err(format!("bad SPIR-V magic number {magic:#010x}"));
    }
    Ok(())
}

/// Rejects constant lists that assign the same id twice.
pub fn validate_specialization(constants: &[SpecializationConstant]) -> Result<(), String> {
    for (i, constant) in constants.iter().enumerate() {
        if constants[i + 1..].iter().any(|other| other.id == constant.id) {
            return Err(format!(
                "specialization constant {} is assigned more than once",
                constant.id
            ));
        }
    }
    Ok(())
}

/// A translated stage ready for native compilation.
#[derive(Debug, Clone)]
pub struct BridgedStage {
    /// Stage, entry point and reflection.
    pub info: ShaderStageInfo,
    /// Source text, or the untouched module for SPIR-V targets.
    pub code: ShaderCode,
}

/// Drives the external compiler for one backend's target language.
#[derive(Debug, Clone)]
pub struct ShaderBridge {
    compiler: Arc<dyn ShaderCompiler>,
    target: TargetLanguage,
}

impl ShaderBridge {
    /// Creates a bridge emitting `target`.
    pub fn new(compiler: Arc<dyn ShaderCompiler>, target: TargetLanguage) -> Self {
        Self { compiler, target }
    }

    /// The language this bridge emits.
    pub fn target(&self) -> TargetLanguage {
        self.target
    }

    /// Translates one stage. Source targets get the constants baked in; the
    /// SPIR-V target passes the module through untouched.
    pub fn translate(
        &self,
        desc: &ShaderStageDescriptor<'_>,
        specialization: &[SpecializationConstant],
    ) -> Result<BridgedStage, ShaderError> {
        let fail = |diagnostics: String| ShaderError::Translation {
            stage: desc.stage,
            entry_point: desc.entry_point.to_string(),
            diagnostics,
        };

        if desc.entry_point.is_empty() {
            return Err(fail("entry point name is empty".to_string()));
        }
        validate_spirv(desc.bytecode).map_err(fail)?;
        validate_specialization(specialization).map_err(fail)?;

        let request = TranslationRequest {
            stage: desc.stage,
            bytecode: desc.bytecode,
            entry_point: desc.entry_point,
            target: self.target,
            specialization,
        };
        let translated = self.compiler.translate(&request).map_err(fail)?;

        let reflection = ShaderReflection::from_json(&translated.reflection_json)
            .map_err(|e| fail(format!("malformed reflection document: {e}")))?;
        if reflection.entry_point(desc.entry_point, desc.stage).is_none() {
            return Err(fail(format!(
                "module has no {} entry point named '{}'",
                desc.stage.reflection_mode(),
                desc.entry_point
            )));
        }

        let code = match (self.target, translated.code) {
            (TargetLanguage::SpirV, _) => ShaderCode::Binary(desc.bytecode.to_vec()),
            (_, ShaderCode::Source(source)) if !source.trim().is_empty() => {
                ShaderCode::Source(source)
            }
            (target, _) => {
                return Err(fail(format!("compiler produced no source for {target:?}")));
            }
        };

        log::debug!(
            "ShaderBridge: translated {:?} stage '{}' for {:?}",
            desc.stage,
            desc.entry_point,
            self.target
        );

        Ok(BridgedStage {
            info: ShaderStageInfo {
                stage: desc.stage,
                entry_point: desc.entry_point.to_string(),
                reflection,
            },
            code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::shader::{ShaderStage, SpecializationValue};
    use crate::renderer::traits::TranslatedShader;

    #[derive(Debug)]
    struct EchoCompiler {
        reflection: &'static str,
    }

    impl ShaderCompiler for EchoCompiler {
        fn translate(&self, request: &TranslationRequest<'_>) -> Result<TranslatedShader, String> {
            if request.entry_point == "broken" {
                return Err("unsupported capability".to_string());
            }
            let defines: String = request
                .specialization
                .iter()
                .map(|c| format!("#define SPIRV_CROSS_CONSTANT_ID_{} {}\n", c.id, c.value.to_literal()))
                .collect();
            Ok(TranslatedShader {
                code: ShaderCode::Source(format!("{defines}void {}() {{}}\n", request.entry_point)),
                reflection_json: self.reflection.to_string(),
            })
        }
    }

    const VERTEX_REFLECTION: &str = r#"{ "entryPoints": [{ "name": "main", "mode": "vert" }] }"#;

    fn module() -> Vec<u8> {
        let words: [u32; 5] = [SPIRV_MAGIC, 0x0001_0000, 0, 8, 0];
        bytemuck::cast_slice(&words).to_vec()
    }

    fn bridge(target: TargetLanguage, reflection: &'static str) -> ShaderBridge {
        ShaderBridge::new(Arc::new(EchoCompiler { reflection }), target)
    }

    fn vertex<'a>(bytecode: &'a [u8], entry_point: &'static str) -> ShaderStageDescriptor<'a> {
        ShaderStageDescriptor {
            stage: ShaderStage::Vertex,
            bytecode,
            entry_point,
        }
    }

    #[test]
    fn source_targets_bake_constants() {
        let bytecode = module();
        let constants = [SpecializationConstant {
            id: 3,
            value: SpecializationValue::Float(0.5),
        }];
        let stage = bridge(TargetLanguage::Glsl { version: 450, es: false }, VERTEX_REFLECTION)
            .translate(&vertex(&bytecode, "main"), &constants)
            .unwrap();
        match stage.code {
            ShaderCode::Source(source) => {
                assert!(source.contains("#define SPIRV_CROSS_CONSTANT_ID_3 0.5"))
            }
            other => panic!("expected source, got {other:?}"),
        }
        assert_eq!(stage.info.entry_point, "main");
    }

    #[test]
    fn spirv_target_passes_the_module_through() {
        let bytecode = module();
        let stage = bridge(TargetLanguage::SpirV, VERTEX_REFLECTION)
            .translate(&vertex(&bytecode, "main"), &[])
            .unwrap();
        assert_eq!(stage.code, ShaderCode::Binary(bytecode));
    }

    #[test]
    fn invalid_inputs_fail_before_the_compiler_runs() {
        let bridge = bridge(TargetLanguage::Hlsl { shader_model: 50 }, VERTEX_REFLECTION);
        let bytecode = module();

        let err = bridge.translate(&vertex(&bytecode[..6], "main"), &[]).unwrap_err();
        assert!(matches!(err, ShaderError::Translation { .. }));

        let mut wrong_magic = bytecode.clone();
        wrong_magic[0] = 0;
        assert!(bridge.translate(&vertex(&wrong_magic, "main"), &[]).is_err());

        let duplicated = [
            SpecializationConstant { id: 1, value: SpecializationValue::Bool(true) },
            SpecializationConstant { id: 1, value: SpecializationValue::Bool(false) },
        ];
        assert!(bridge.translate(&vertex(&bytecode, "main"), &duplicated).is_err());
    }

    #[test]
    fn compiler_failures_carry_diagnostics() {
        let bytecode = module();
        let err = bridge(TargetLanguage::Glsl { version: 330, es: false }, VERTEX_REFLECTION)
            .translate(&vertex(&bytecode, "broken"), &[])
            .unwrap_err();
        assert_eq!(
            err,
            ShaderError::Translation {
                stage: ShaderStage::Vertex,
                entry_point: "broken".to_string(),
                diagnostics: "unsupported capability".to_string(),
            }
        );
    }

    #[test]
    fn reflection_must_declare_the_entry_point() {
        let bytecode = module();
        let fragment_only = r#"{ "entryPoints": [{ "name": "main", "mode": "frag" }] }"#;
        assert!(bridge(TargetLanguage::SpirV, fragment_only)
            .translate(&vertex(&bytecode, "main"), &[])
            .is_err());
        assert!(bridge(TargetLanguage::SpirV, "{ broken")
            .translate(&vertex(&bytecode, "main"), &[])
            .is_err());
    }
}
