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

//! Backend selection with fallback support.
//!
//! Backends are tried in order of preference: an explicit API (Vulkan, DX12,
//! Metal), then OpenGL/GLES, then the headless backend, which always succeeds.

use anyhow::{anyhow, Result};
use std::time::Instant;
use umbra_core::backend::{BackendKind, RenderBackend};
use umbra_core::config::{BackendPreference, ServerConfig};

use super::headless::HeadlessBackend;
use super::wgpu::WgpuBackend;

/// The backends to attempt, in order, for a preference.
fn fallback_order(preference: BackendPreference) -> &'static [BackendKind] {
    match preference {
        BackendPreference::Auto | BackendPreference::Explicit => &[
            BackendKind::Explicit,
            BackendKind::Compatibility,
            BackendKind::Headless,
        ],
        BackendPreference::Compatibility => &[BackendKind::Compatibility, BackendKind::Headless],
        BackendPreference::Headless => &[BackendKind::Headless],
    }
}

/// Creates the backend described by `config`, falling back to more compatible
/// backends when the preferred one cannot be initialized.
///
/// ## Arguments
/// * `config` - The server configuration; `backend` and `power_preference` are read.
///
/// ## Returns
/// * `Result<Box<dyn RenderBackend>>` - The first backend that initialized.
pub fn create_backend(config: &ServerConfig) -> Result<Box<dyn RenderBackend>> {
    let start_time = Instant::now();
    let mut attempted = Vec::new();
    log::info!("Starting backend selection ({:?} preferred)...", config.backend);

    for &kind in fallback_order(config.backend) {
        attempted.push(kind);
        let backend: Result<Box<dyn RenderBackend>> = match kind {
            BackendKind::Headless => Ok(Box::new(HeadlessBackend::new())),
            gpu => WgpuBackend::new(gpu, config.power_preference)
                .map(|b| Box::new(b) as Box<dyn RenderBackend>),
        };
        match backend {
            Ok(backend) => {
                if attempted.len() > 1 {
                    log::warn!(
                        "Fell back to the {} backend after trying {attempted:?}.",
                        kind.driver_name()
                    );
                }
                log::info!(
                    "Selected the {} backend in {} ms.",
                    kind.driver_name(),
                    start_time.elapsed().as_millis()
                );
                return Ok(backend);
            }
            Err(e) => {
                log::warn!("Failed to initialize the {} backend: {e:#}", kind.driver_name());
            }
        }
    }

    Err(anyhow!(
        "All backend attempts failed. Attempted: {attempted:?}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preference_ends_with_headless() {
        for preference in [
            BackendPreference::Auto,
            BackendPreference::Explicit,
            BackendPreference::Compatibility,
            BackendPreference::Headless,
        ] {
            assert_eq!(
                fallback_order(preference).last(),
                Some(&BackendKind::Headless)
            );
        }
    }

    #[test]
    fn auto_tries_explicit_first() {
        assert_eq!(
            fallback_order(BackendPreference::Auto)[0],
            BackendKind::Explicit
        );
        assert_eq!(
            fallback_order(BackendPreference::Compatibility)[0],
            BackendKind::Compatibility
        );
    }

    #[test]
    fn headless_preference_never_touches_a_gpu() {
        let backend = create_backend(&ServerConfig::headless()).unwrap();
        assert_eq!(backend.kind(), BackendKind::Headless);
    }
}
