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

use std::collections::HashMap;
use std::fmt::Write as _;
use tessera_core::renderer::api::ShaderStage;
use tessera_core::renderer::shader::{ReflectedEntryPoint, ShaderReflection};
use tessera_core::renderer::{ShaderCode, ShaderCompiler, TargetLanguage, TranslatedShader, TranslationRequest};

/// A cross-compiler stand-in that emits declaration-only source.
///
/// The generated GLSL and HLSL declare the blocks, textures and plain
/// uniforms of the configured reflection, bake specialization constants as
/// `SPIRV_CROSS_CONSTANT_ID_<id>` defines, and have an empty entry point.
/// The reflection document always declares the requested entry point.
#[derive(Debug, Clone, Default)]
pub struct NullCompiler {
    reflections: HashMap<ShaderStage, ShaderReflection>,
    uniforms: Vec<(String, String)>,
    rejected_entry_points: Vec<String>,
    invalid_stages: Vec<ShaderStage>,
}

impl NullCompiler {
    /// A compiler that reports only the entry point of each module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `reflection` for every module of `stage`.
    pub fn with_reflection(mut self, stage: ShaderStage, reflection: ShaderReflection) -> Self {
        self.reflections.insert(stage, reflection);
        self
    }

    /// Declares a plain `uniform <ty> <name>;` in every GLSL stage.
    pub fn with_uniform(mut self, name: &str, ty: &str) -> Self {
        self.uniforms.push((name.to_string(), ty.to_string()));
        self
    }

    /// Fails translation of any module whose entry point is `entry_point`.
    pub fn rejecting_entry_point(mut self, entry_point: &str) -> Self {
        self.rejected_entry_points.push(entry_point.to_string());
        self
    }

    /// Emits source for `stage` that native compilers refuse.
    pub fn emitting_invalid(mut self, stage: ShaderStage) -> Self {
        self.invalid_stages.push(stage);
        self
    }

    fn reflection(&self, request: &TranslationRequest<'_>) -> ShaderReflection {
        let mut reflection = self
            .reflections
            .get(&request.stage)
            .cloned()
            .unwrap_or_default();
        reflection.entry_points = vec![ReflectedEntryPoint {
            name: request.entry_point.to_string(),
            mode: request.stage.reflection_mode().to_string(),
        }];
        reflection
    }

    fn glsl(&self, request: &TranslationRequest<'_>, reflection: &ShaderReflection, version: u32, es: bool) -> String {
        let mut source = if es {
            format!("#version {version} es\n")
        } else {
            format!("#version {version} core\n")
        };
        self.preamble(&mut source, request);
        for block in &reflection.ubos {
            let name = reflection
                .block_type(block)
                .map_or(block.name.as_str(), |ty| ty.name.as_str());
            let _ = writeln!(
                source,
                "layout(std140, binding = {}) uniform {name} {{ vec4 data[{}]; }} {};",
                block.binding,
                (block.block_size / 16).max(1),
                block.name
            );
        }
        for texture in &reflection.textures {
            let _ = writeln!(
                source,
                "layout(binding = {}) uniform {} {};",
                texture.binding, texture.ty, texture.name
            );
        }
        for (name, ty) in &self.uniforms {
            let _ = writeln!(source, "uniform {ty} {name};");
        }
        for input in &reflection.inputs {
            let _ = writeln!(source, "layout(location = {}) in {} {};", input.location, input.ty, input.name);
        }
        source.push_str("void main() {}\n");
        source
    }

    fn hlsl(&self, request: &TranslationRequest<'_>, reflection: &ShaderReflection) -> String {
        let mut source = String::new();
        self.preamble(&mut source, request);
        for block in &reflection.ubos {
            let _ = writeln!(
                source,
                "cbuffer {} : register(b{}) {{ float4 data[{}]; }};",
                block.name,
                block.binding,
                (block.block_size / 16).max(1)
            );
        }
        for texture in &reflection.textures {
            let _ = writeln!(source, "Texture2D {0} : register(t{1});", texture.name, texture.binding);
            let _ = writeln!(source, "SamplerState {0}_sampler : register(s{1});", texture.name, texture.binding);
        }
        let entry = request.entry_point;
        let _ = match request.stage {
            ShaderStage::Vertex => writeln!(source, "float4 {entry}() : SV_Position {{ return 0; }}"),
            ShaderStage::Fragment => writeln!(source, "float4 {entry}() : SV_Target {{ return 0; }}"),
            ShaderStage::Geometry => writeln!(source, "[maxvertexcount(1)] void {entry}() {{}}"),
            ShaderStage::Compute => writeln!(source, "[numthreads(1, 1, 1)] void {entry}() {{}}"),
        };
        source
    }

    fn preamble(&self, source: &mut String, request: &TranslationRequest<'_>) {
        if self.invalid_stages.contains(&request.stage) {
            source.push_str("#error generated source rejected\n");
        }
        for constant in request.specialization {
            let _ = writeln!(
                source,
                "#define SPIRV_CROSS_CONSTANT_ID_{} {}",
                constant.id,
                constant.value.to_literal()
            );
        }
    }
}

impl ShaderCompiler for NullCompiler {
    fn translate(&self, request: &TranslationRequest<'_>) -> Result<TranslatedShader, String> {
        if self
            .rejected_entry_points
            .iter()
            .any(|name| name == request.entry_point)
        {
            return Err(format!(
                "entry point '{}' uses an unsupported capability",
                request.entry_point
            ));
        }

        let reflection = self.reflection(request);
        let code = match request.target {
            TargetLanguage::Glsl { version, es } => {
                ShaderCode::Source(self.glsl(request, &reflection, version, es))
            }
            TargetLanguage::Hlsl { .. } => ShaderCode::Source(self.hlsl(request, &reflection)),
            TargetLanguage::SpirV => ShaderCode::Binary(request.bytecode.to_vec()),
        };
        let reflection_json = reflection.to_json().map_err(|e| e.to_string())?;
        Ok(TranslatedShader {
            code,
            reflection_json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::renderer::api::{SpecializationConstant, SpecializationValue};
    use tessera_core::renderer::shader::{ReflectedBlock, ReflectedTexture};

    fn request<'a>(
        target: TargetLanguage,
        specialization: &'a [SpecializationConstant],
    ) -> TranslationRequest<'a> {
        TranslationRequest {
            stage: ShaderStage::Fragment,
            bytecode: &[],
            entry_point: "main",
            target,
            specialization,
        }
    }

    fn compiler() -> NullCompiler {
        NullCompiler::new().with_reflection(
            ShaderStage::Fragment,
            ShaderReflection {
                ubos: vec![ReflectedBlock {
                    name: "material".to_string(),
                    type_id: "_7".to_string(),
                    block_size: 32,
                    set: 0,
                    binding: 2,
                }],
                textures: vec![ReflectedTexture {
                    name: "albedo".to_string(),
                    ty: "sampler2D".to_string(),
                    set: 0,
                    binding: 0,
                }],
                ..Default::default()
            },
        )
    }

    #[test]
    fn glsl_declares_reflected_resources() {
        let constants = [SpecializationConstant {
            id: 7,
            value: SpecializationValue::UInt(3),
        }];
        let translated = compiler()
            .with_uniform("u_time", "float")
            .translate(&request(TargetLanguage::Glsl { version: 450, es: false }, &constants))
            .unwrap();
        let ShaderCode::Source(source) = translated.code else {
            panic!("GLSL target must produce source");
        };
        assert!(source.starts_with("#version 450 core"));
        assert!(source.contains("#define SPIRV_CROSS_CONSTANT_ID_7 3u"));
        assert!(source.contains("uniform material"), "block without a type entry uses its name");
        assert!(source.contains("layout(binding = 0) uniform sampler2D albedo;"));
        assert!(source.contains("uniform float u_time;"));

        let reflection = ShaderReflection::from_json(&translated.reflection_json).unwrap();
        assert!(reflection.entry_point("main", ShaderStage::Fragment).is_some());
        assert_eq!(reflection.ubos[0].binding, 2);
    }

    #[test]
    fn hlsl_uses_register_slots() {
        let translated = compiler()
            .translate(&request(TargetLanguage::Hlsl { shader_model: 50 }, &[]))
            .unwrap();
        let ShaderCode::Source(source) = translated.code else {
            panic!("HLSL target must produce source");
        };
        assert!(source.contains("cbuffer material : register(b2)"));
        assert!(source.contains("register(t0)"));
        assert!(source.contains("float4 main() : SV_Target"));
    }

    #[test]
    fn rejected_entry_points_fail_translation() {
        let compiler = NullCompiler::new().rejecting_entry_point("main");
        let err = compiler
            .translate(&request(TargetLanguage::SpirV, &[]))
            .unwrap_err();
        assert!(err.contains("unsupported capability"));
    }
}
