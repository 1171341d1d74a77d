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

use anyhow::{anyhow, Context, Result};
use umbra_core::backend::{AdapterInfo, BackendKind};
use umbra_core::config::PowerPreference;

use super::conversions::{device_type_from_wgpu, graphics_api_from_wgpu, vendor_name, IntoWgpu};

/// Holds the wgpu objects required for offscreen rendering.
/// The context owns no surface; viewports render into textures and the platform
/// layer presents them.
#[derive(Debug)]
pub struct WgpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    /// Which family of API the adapter belongs to.
    pub kind: BackendKind,
    pub adapter_info: AdapterInfo,
    pub active_device_features: wgpu::Features,
    pub downlevel_flags: wgpu::DownlevelFlags,
    pub device_limits: wgpu::Limits,
}

/// The wgpu backends making up a backend family.
fn backends_for(kind: BackendKind) -> Result<wgpu::Backends> {
    match kind {
        BackendKind::Explicit => Ok(wgpu::Backends::VULKAN
            | wgpu::Backends::METAL
            | wgpu::Backends::DX12),
        BackendKind::Compatibility => Ok(wgpu::Backends::GL),
        BackendKind::Headless => Err(anyhow!("The headless backend has no wgpu context")),
    }
}

/// Optional features requested when the adapter offers them.
fn wanted_features(kind: BackendKind) -> wgpu::Features {
    match kind {
        BackendKind::Explicit => {
            wgpu::Features::TEXTURE_COMPRESSION_BC
                | wgpu::Features::TEXTURE_COMPRESSION_ETC2
                | wgpu::Features::FLOAT32_FILTERABLE
        }
        // No block compression on the compatibility path.
        _ => wgpu::Features::FLOAT32_FILTERABLE,
    }
}

impl WgpuContext {
    /// Initializes a device of the given family, blocking until it is ready.
    ///
    /// ## Arguments
    /// * `kind` - `Explicit` or `Compatibility`.
    /// * `power` - Adapter selection hint.
    ///
    /// ## Returns
    /// * `Result<Self>` - The context, or an error if no adapter of that family
    ///   exists or the device could not be created.
    pub fn new(kind: BackendKind, power: PowerPreference) -> Result<Self> {
        pollster::block_on(Self::new_async(kind, power))
    }

    async fn new_async(kind: BackendKind, power: PowerPreference) -> Result<Self> {
        log::info!("Initializing WGPU context for the {} backend...", kind.driver_name());
        let backends = backends_for(kind)?;

        // --- 1. Instance and adapter ---
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power.into_wgpu(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow!("Failed to find a suitable adapter for {kind:?}: {e}"))?;

        let info = adapter.get_info();
        let family_matches = match kind {
            BackendKind::Compatibility => info.backend == wgpu::Backend::Gl,
            _ => info.backend != wgpu::Backend::Gl,
        };
        if !family_matches {
            return Err(anyhow!(
                "Adapter returned wrong backend: requested {kind:?}, got {:?}",
                info.backend
            ));
        }
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?})",
            info.name,
            info.backend
        );

        // --- 2. Logical device and command queue ---
        let features_to_enable = adapter.features() & wanted_features(kind);
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Umbra Logical Device"),
                required_features: features_to_enable,
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::default(),
                ..Default::default()
            })
            .await
            .context("Failed to create logical device")?;
        log::info!("Logical device and command queue created.");

        device.on_uncaptured_error(std::sync::Arc::new(|e| {
            log::error!("WGPU Uncaptured Error: {e:?}");
        }));

        let active_device_features = device.features();
        let device_limits = device.limits();
        let downlevel_flags = adapter.get_downlevel_capabilities().flags;
        log::debug!("Active device features: {active_device_features:?}");

        let driver = format!("{} {}", info.driver, info.driver_info);
        let adapter_info = AdapterInfo {
            name: info.name.clone(),
            vendor: vendor_name(info.vendor).to_string(),
            vendor_id: info.vendor,
            device_type: device_type_from_wgpu(info.device_type),
            api: graphics_api_from_wgpu(info.backend),
            api_version: driver.trim().to_string(),
        };

        Ok(Self {
            adapter,
            device,
            queue,
            kind,
            adapter_info,
            active_device_features,
            downlevel_flags,
            device_limits,
        })
    }

    /// Blocks until the queue is empty.
    pub fn poll_device_blocking(&self) {
        if let Err(e) = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        }) {
            log::warn!("WgpuContext: blocking poll failed: {e:?}");
        }
    }

    /// Processes completed work without waiting.
    pub fn poll_device_non_blocking(&self) {
        if let Err(e) = self.device.poll(wgpu::PollType::Poll) {
            log::warn!("WgpuContext: poll failed: {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatibility_is_gl_only() {
        assert_eq!(
            backends_for(BackendKind::Compatibility).unwrap(),
            wgpu::Backends::GL
        );
        assert!(!backends_for(BackendKind::Explicit)
            .unwrap()
            .contains(wgpu::Backends::GL));
        assert!(backends_for(BackendKind::Headless).is_err());
    }

    #[test]
    fn compatibility_never_requests_block_compression() {
        assert!(!wanted_features(BackendKind::Compatibility)
            .contains(wgpu::Features::TEXTURE_COMPRESSION_BC));
        assert!(wanted_features(BackendKind::Explicit)
            .contains(wgpu::Features::TEXTURE_COMPRESSION_BC));
    }
}
