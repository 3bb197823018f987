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

//! The reflection document emitted by the cross-compiler for one stage.
//!
//! The JSON layout follows the SPIR-V-Cross `--reflect` output: entry points,
//! a map of named aggregate types, stage inputs/outputs with locations, and
//! uniform/storage blocks and textures with their `(set, binding)`.

use crate::renderer::api::shader::ShaderStage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An entry point declared by the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectedEntryPoint {
    /// The entry point name.
    pub name: String,
    /// Execution model: `vert`, `frag`, `geom` or `comp`.
    pub mode: String,
}

/// One member of an aggregate type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectedMember {
    /// Member name.
    pub name: String,
    /// Type name (`vec4`, `mat4`, or a key of [`ShaderReflection::types`]).
    #[serde(rename = "type")]
    pub ty: String,
    /// Byte offset from the start of the aggregate.
    #[serde(default)]
    pub offset: u32,
    /// Array dimensions, empty for scalars.
    #[serde(default)]
    pub array: Vec<u32>,
    /// Byte stride between array elements.
    #[serde(default)]
    pub array_stride: Option<u32>,
    /// Byte stride between matrix columns.
    #[serde(default)]
    pub matrix_stride: Option<u32>,
}

/// A named aggregate type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectedType {
    /// Declared type name.
    pub name: String,
    /// Members in declaration order.
    #[serde(default)]
    pub members: Vec<ReflectedMember>,
}

/// A stage input or output variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectedAttribute {
    /// Variable name.
    pub name: String,
    /// Type name.
    #[serde(rename = "type")]
    pub ty: String,
    /// Location index.
    pub location: u32,
}

/// A uniform or storage block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectedBlock {
    /// Block instance name.
    pub name: String,
    /// Key of the block's type in [`ShaderReflection::types`].
    #[serde(rename = "type")]
    pub type_id: String,
    /// Size of the block in bytes.
    pub block_size: u32,
    /// Descriptor set.
    #[serde(default)]
    pub set: u32,
    /// Binding inside the set.
    pub binding: u32,
}

/// A sampled texture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectedTexture {
    /// Variable name.
    pub name: String,
    /// Sampler type name (`sampler2D`, `samplerCube`, ...).
    #[serde(rename = "type")]
    pub ty: String,
    /// Descriptor set.
    #[serde(default)]
    pub set: u32,
    /// Binding inside the set.
    pub binding: u32,
}

/// Reflection of one translated stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShaderReflection {
    /// Declared entry points.
    #[serde(rename = "entryPoints", default)]
    pub entry_points: Vec<ReflectedEntryPoint>,
    /// Aggregate types keyed by their internal id (e.g. `_12`).
    #[serde(default)]
    pub types: BTreeMap<String, ReflectedType>,
    /// Stage inputs.
    #[serde(default)]
    pub inputs: Vec<ReflectedAttribute>,
    /// Stage outputs.
    #[serde(default)]
    pub outputs: Vec<ReflectedAttribute>,
    /// Sampled textures.
    #[serde(default)]
    pub textures: Vec<ReflectedTexture>,
    /// Uniform blocks.
    #[serde(default)]
    pub ubos: Vec<ReflectedBlock>,
    /// Storage blocks.
    #[serde(default)]
    pub ssbos: Vec<ReflectedBlock>,
}

impl ShaderReflection {
    /// Parses a reflection document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the document back to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Finds the entry point `name` with the execution model of `stage`.
    pub fn entry_point(&self, name: &str, stage: ShaderStage) -> Option<&ReflectedEntryPoint> {
        self.entry_points
            .iter()
            .find(|ep| ep.name == name && ep.mode == stage.reflection_mode())
    }

    /// The aggregate type of a block.
    pub fn block_type(&self, block: &ReflectedBlock) -> Option<&ReflectedType> {
        self.types.get(&block.type_id)
    }

    /// Finds a uniform block by instance or type name.
    pub fn uniform_block(&self, name: &str) -> Option<&ReflectedBlock> {
        self.ubos.iter().find(|block| {
            block.name == name || self.block_type(block).is_some_and(|ty| ty.name == name)
        })
    }

    /// The input at `location`.
    pub fn input(&self, location: u32) -> Option<&ReflectedAttribute> {
        self.inputs.iter().find(|input| input.location == location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "entryPoints": [{ "name": "main", "mode": "vert" }],
        "types": {
            "_12": {
                "name": "Camera",
                "members": [
                    { "name": "view_proj", "type": "mat4", "offset": 0, "matrix_stride": 16 },
                    { "name": "lights", "type": "vec4", "array": [4], "offset": 64, "array_stride": 16 }
                ]
            }
        },
        "inputs": [
            { "type": "vec3", "name": "in_position", "location": 0 },
            { "type": "vec2", "name": "in_uv", "location": 1 }
        ],
        "outputs": [{ "type": "vec2", "name": "out_uv", "location": 0 }],
        "ubos": [{ "type": "_12", "name": "camera", "block_size": 128, "set": 0, "binding": 1 }]
    }"#;

    #[test]
    fn parses_the_reflect_layout() {
        let reflection = ShaderReflection::from_json(DOCUMENT).unwrap();

        assert!(reflection.entry_point("main", ShaderStage::Vertex).is_some());
        assert!(reflection.entry_point("main", ShaderStage::Fragment).is_none());
        assert_eq!(reflection.input(1).map(|i| i.name.as_str()), Some("in_uv"));

        let block = reflection.uniform_block("Camera").expect("lookup by type name");
        assert_eq!((block.set, block.binding, block.block_size), (0, 1, 128));
        let ty = reflection.block_type(block).unwrap();
        assert_eq!(ty.members[0].matrix_stride, Some(16));
        assert_eq!(ty.members[1].array, vec![4]);
        assert_eq!(ty.members[1].array_stride, Some(16));
        assert_eq!(ty.members[1].offset, 64);
        assert!(reflection.textures.is_empty());
    }

    #[test]
    fn round_trips_through_json() {
        let reflection = ShaderReflection::from_json(DOCUMENT).unwrap();
        let again = ShaderReflection::from_json(&reflection.to_json().unwrap()).unwrap();
        assert_eq!(reflection, again);
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(ShaderReflection::from_json("{ \"inputs\": 3 }").is_err());
        assert!(ShaderReflection::from_json("not json").is_err());
    }
}
