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

//! Shader store. Source is kept verbatim and reflected, never compiled.

use crate::handle::HandleTable;
use umbra_core::{ResourceKind, Rid, ServerError};

/// The pipeline a shader is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderMode {
    /// 3D geometry.
    #[default]
    Spatial,
    /// 2D canvas items.
    CanvasItem,
    /// Particle processing.
    Particles,
    /// Sky backgrounds.
    Sky,
    /// Volumetric fog.
    Fog,
}

impl ShaderMode {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "spatial" => Some(ShaderMode::Spatial),
            "canvas_item" => Some(ShaderMode::CanvasItem),
            "particles" => Some(ShaderMode::Particles),
            "sky" => Some(ShaderMode::Sky),
            "fog" => Some(ShaderMode::Fog),
            _ => None,
        }
    }
}

/// A uniform declared by a shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderParam {
    /// Uniform name.
    pub name: String,
    /// Declared type, as written.
    pub type_name: String,
    /// Hint following the `:` of the declaration, if any.
    pub hint: Option<String>,
}

/// A shader resource.
#[derive(Debug, Clone, Default)]
pub struct Shader {
    /// Source code.
    pub code: String,
    /// Mode from the `shader_type` declaration.
    pub mode: ShaderMode,
    /// Uniforms, in declaration order.
    pub params: Vec<ShaderParam>,
}

/// Extracts the mode and uniform list from shader source.
///
/// Unknown or missing `shader_type` declarations fall back to [`ShaderMode::Spatial`].
pub fn reflect(code: &str) -> (ShaderMode, Vec<ShaderParam>) {
    let mut mode = ShaderMode::Spatial;
    let mut params = Vec::new();
    for statement in code.split(';') {
        let statement = strip_comments(statement);
        let mut words = statement.split_whitespace();
        match words.next() {
            Some("shader_type") => {
                if let Some(parsed) = words.next().and_then(ShaderMode::parse) {
                    mode = parsed;
                }
            }
            Some("uniform") | Some("global") | Some("instance") => {
                if let Some(param) = parse_uniform(&statement) {
                    params.push(param);
                }
            }
            _ => {}
        }
    }
    (mode, params)
}

fn strip_comments(statement: &str) -> String {
    statement
        .lines()
        .map(|line| line.split("//").next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_uniform(statement: &str) -> Option<ShaderParam> {
    // `[global|instance] uniform <precision>? <type> <name> [: hint] [= default]`
    let declaration = statement.split('=').next()?;
    let (head, hint) = match declaration.split_once(':') {
        Some((head, hint)) => (head, Some(hint.trim().to_string())),
        None => (declaration, None),
    };
    let words: Vec<&str> = head
        .split_whitespace()
        .filter(|w| !matches!(*w, "global" | "instance" | "uniform" | "lowp" | "mediump" | "highp"))
        .collect();
    match words.as_slice() {
        [type_name, name] => Some(ShaderParam {
            name: name.to_string(),
            type_name: type_name.to_string(),
            hint: hint.filter(|h| !h.is_empty()),
        }),
        _ => None,
    }
}

/// Storage for every shader.
#[derive(Debug)]
pub struct ShaderStore {
    shaders: HandleTable<Shader>,
}

impl Default for ShaderStore {
    fn default() -> Self {
        Self {
            shaders: HandleTable::new(ResourceKind::Shader),
        }
    }
}

store_access!(ShaderStore, Shader, shaders);

impl ShaderStore {
    /// Creates an empty spatial shader.
    pub fn create(&mut self, rid: Rid) -> Result<(), ServerError> {
        self.shaders.insert(rid, Shader::default())
    }

    /// Replaces the source and re-reflects it.
    pub fn set_code(&mut self, rid: Rid, code: String) -> Result<(), ServerError> {
        let shader = self.shaders.lookup_mut(rid)?;
        let (mode, params) = reflect(&code);
        shader.code = code;
        shader.mode = mode;
        shader.params = params;
        Ok(())
    }

    /// Source code, or empty for unknown handles.
    pub fn code(&self, rid: Rid) -> String {
        self.shaders.get(rid).map(|s| s.code.clone()).unwrap_or_default()
    }

    /// Declared uniforms.
    pub fn params(&self, rid: Rid) -> Vec<ShaderParam> {
        self.shaders
            .get(rid)
            .map(|s| s.params.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
        shader_type canvas_item; // 2D
        uniform vec4 albedo_color : source_color = vec4(1.0);
        uniform sampler2D albedo_texture : hint_default_white;
        uniform highp float roughness = 0.5;
        // uniform float commented_out;
        void fragment() { COLOR = albedo_color; }
    "#;

    #[test]
    fn reflects_mode_and_uniforms() {
        let (mode, params) = reflect(SOURCE);
        assert_eq!(mode, ShaderMode::CanvasItem);
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["albedo_color", "albedo_texture", "roughness"]);
        assert_eq!(params[0].hint.as_deref(), Some("source_color"));
        assert_eq!(params[2].type_name, "float");
        assert_eq!(params[2].hint, None);
    }

    #[test]
    fn missing_shader_type_defaults_to_spatial() {
        let (mode, params) = reflect("void vertex() {}");
        assert_eq!(mode, ShaderMode::Spatial);
        assert!(params.is_empty());
    }

    #[test]
    fn store_reflects_on_set_code() {
        let mut store = ShaderStore::default();
        let rid = Rid::from_parts(0, 1, ResourceKind::Shader);
        store.create(rid).unwrap();
        store.set_code(rid, SOURCE.to_string()).unwrap();
        assert_eq!(store.params(rid).len(), 3);
        assert_eq!(store.get(rid).unwrap().mode, ShaderMode::CanvasItem);
        assert!(store.code(Rid::INVALID).is_empty());
    }
}
