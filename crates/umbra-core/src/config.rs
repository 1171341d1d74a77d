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

//! Server configuration, loadable from JSON.

use crate::math::Color;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which thread owns the server state and runs frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadModel {
    /// The thread that creates the server is the render thread.
    #[default]
    SingleThreaded,
    /// A dedicated render thread is spawned and owns the frame loop.
    Separate,
}

/// Which backend family to try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Explicit API first, then compatibility, then headless.
    #[default]
    Auto,
    /// Vulkan, Metal or DX12.
    Explicit,
    /// OpenGL / GLES.
    Compatibility,
    /// No GPU.
    Headless,
}

/// Adapter selection hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerPreference {
    /// Prefer a discrete GPU.
    #[default]
    HighPerformance,
    /// Prefer an integrated GPU.
    LowPower,
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Threading model of the render loop.
    pub thread_model: ThreadModel,
    /// Backend selection order.
    pub backend: BackendPreference,
    /// Adapter selection hint for GPU backends.
    pub power_preference: PowerPreference,
    /// When set, a separate render thread draws on its own at this rate.
    pub frame_pacing_fps: Option<u32>,
    /// Clear color of viewports that do not override it.
    pub default_clear_color: Color,
    /// Pending command count above which a warning is logged.
    pub queue_warn_threshold: usize,
    /// Whether the paced render loop is allowed to draw.
    pub render_loop_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            thread_model: ThreadModel::SingleThreaded,
            backend: BackendPreference::Auto,
            power_preference: PowerPreference::HighPerformance,
            frame_pacing_fps: None,
            default_clear_color: Color::rgb(0.3, 0.3, 0.3),
            queue_warn_threshold: 65_536,
            render_loop_enabled: true,
        }
    }
}

impl ServerConfig {
    /// A configuration for tests and tools: single-threaded, headless.
    pub fn headless() -> Self {
        Self {
            backend: BackendPreference::Headless,
            ..Self::default()
        }
    }

    /// Load the configuration from a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load the configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }

    /// Save the configuration to a JSON file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// The frame interval implied by `frame_pacing_fps`, if any.
    pub fn frame_interval(&self) -> Option<std::time::Duration> {
        self.frame_pacing_fps
            .filter(|fps| *fps > 0)
            .map(|fps| std::time::Duration::from_secs_f64(1.0 / fps as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config = ServerConfig::from_json(r#"{ "thread_model": "separate" }"#).unwrap();
        assert_eq!(config.thread_model, ThreadModel::Separate);
        assert_eq!(config.backend, BackendPreference::Auto);
        assert!(config.render_loop_enabled);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(ServerConfig::from_json(r#"{ "backend": "software" }"#).is_err());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        let config = ServerConfig {
            frame_pacing_fps: Some(30),
            backend: BackendPreference::Compatibility,
            ..ServerConfig::default()
        };
        config.to_file(&path).unwrap();
        assert_eq!(ServerConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn frame_interval_ignores_zero() {
        let mut config = ServerConfig::default();
        assert!(config.frame_interval().is_none());
        config.frame_pacing_fps = Some(0);
        assert!(config.frame_interval().is_none());
        config.frame_pacing_fps = Some(50);
        assert_eq!(
            config.frame_interval(),
            Some(std::time::Duration::from_millis(20))
        );
    }
}
