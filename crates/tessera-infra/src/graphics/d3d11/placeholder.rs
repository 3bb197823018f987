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

//! Placeholder vertex shaders for input-layout validation.
//!
//! `CreateInputLayout` checks the element list against the input signature of
//! a compiled vertex shader. Layouts are created independently of any real
//! shader, so the device synthesizes a minimal shader whose inputs match the
//! layout: one parameter per attribute, `TEXCOORD<location>` semantics, with
//! the attribute's base type and component count.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Write as _;
use tessera_core::renderer::api::{ScalarType, VertexAttribute};

/// The input signature of a layout: base type and arity per location.
pub type Signature = Vec<(ScalarType, u32)>;

/// The signature an attribute list is validated against.
pub fn signature(attributes: &[VertexAttribute]) -> Signature {
    attributes
        .iter()
        .map(|attribute| (attribute.format.scalar_type(), attribute.format.components()))
        .collect()
}

fn hlsl_type(scalar: ScalarType, components: u32) -> String {
    let base = match scalar {
        ScalarType::Float => "float",
        ScalarType::Sint => "int",
        ScalarType::Uint => "uint",
    };
    if components == 1 {
        base.to_string()
    } else {
        format!("{base}{components}")
    }
}

/// HLSL source of a vertex shader accepting exactly `signature`.
pub fn vertex_shader_source(signature: &[(ScalarType, u32)]) -> String {
    let mut source = String::from("struct PlaceholderInput\n{\n");
    for (location, &(scalar, components)) in signature.iter().enumerate() {
        let _ = writeln!(
            source,
            "    {} attr{location} : TEXCOORD{location};",
            hlsl_type(scalar, components)
        );
    }
    source.push_str(
        "};\n\nfloat4 main(PlaceholderInput input) : SV_Position\n{\n    return float4(0.0, 0.0, 0.0, 1.0);\n}\n",
    );
    source
}

/// Compiled placeholder bytecode, memoized per signature.
#[derive(Debug, Default)]
pub struct PlaceholderCache {
    compiled: HashMap<Signature, Vec<u8>>,
}

impl PlaceholderCache {
    /// Returns the bytecode for `signature`, compiling it with `compile` the
    /// first time the signature is seen.
    pub fn get_or_compile<F>(&mut self, signature: Signature, compile: F) -> Result<&[u8], String>
    where
        F: FnOnce(&str) -> Result<Vec<u8>, String>,
    {
        match self.compiled.entry(signature) {
            Entry::Occupied(entry) => Ok(entry.into_mut().as_slice()),
            Entry::Vacant(entry) => {
                let bytecode = compile(&vertex_shader_source(entry.key()))?;
                log::debug!(
                    "D3d11Device: Compiled placeholder vertex shader for {:?}",
                    entry.key()
                );
                Ok(entry.insert(bytecode).as_slice())
            }
        }
    }

    /// Number of distinct signatures compiled.
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// Returns `true` if nothing was compiled yet.
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::renderer::api::VertexFormat;

    #[test]
    fn inputs_match_attribute_types_and_locations() {
        let attributes = [
            VertexAttribute::new(VertexFormat::Float32x3, 0),
            VertexAttribute::new(VertexFormat::Uint32, 12),
            VertexAttribute::new(VertexFormat::Sint32x2, 16),
            VertexAttribute::new(VertexFormat::Unorm8x4, 24),
        ];
        let source = vertex_shader_source(&signature(&attributes));

        assert!(source.contains("float3 attr0 : TEXCOORD0;"));
        assert!(source.contains("uint attr1 : TEXCOORD1;"));
        assert!(source.contains("int2 attr2 : TEXCOORD2;"));
        assert!(source.contains("float4 attr3 : TEXCOORD3;"), "normalized formats read as float");
        assert!(source.contains("SV_Position"));
    }

    #[test]
    fn bytecode_is_memoized_per_signature() {
        let mut cache = PlaceholderCache::default();
        let mut compiles = 0;
        let layout_a = signature(&[VertexAttribute::new(VertexFormat::Float32x2, 0)]);
        let layout_b = signature(&[VertexAttribute::new(VertexFormat::Float32x4, 0)]);

        for signature in [layout_a.clone(), layout_a, layout_b] {
            cache
                .get_or_compile(signature, |source| {
                    compiles += 1;
                    Ok(source.as_bytes().to_vec())
                })
                .unwrap();
        }

        assert_eq!(compiles, 2, "the repeated signature must reuse its bytecode");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn compile_failures_are_not_cached() {
        let mut cache = PlaceholderCache::default();
        let signature = signature(&[VertexAttribute::new(VertexFormat::Float32, 0)]);
        assert!(cache
            .get_or_compile(signature.clone(), |_| Err("X3000: syntax error".to_string()))
            .is_err());
        assert!(cache.is_empty());
        assert!(cache
            .get_or_compile(signature, |source| Ok(source.as_bytes().to_vec()))
            .is_ok());
    }
}
