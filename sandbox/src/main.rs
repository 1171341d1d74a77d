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

// Umbra Sandbox
// Builds a small scene, draws a few frames and reports what was rendered.

mod scene;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use umbra_core::config::{BackendPreference, ThreadModel};
use umbra_core::stats::{RenderingInfo, ViewportRenderInfo, ViewportRenderInfoType};
use umbra_core::ServerConfig;
use umbra_server::RenderingServer;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Auto,
    Explicit,
    Compatibility,
    Headless,
}

impl From<BackendArg> for BackendPreference {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendPreference::Auto,
            BackendArg::Explicit => BackendPreference::Explicit,
            BackendArg::Compatibility => BackendPreference::Compatibility,
            BackendArg::Headless => BackendPreference::Headless,
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about = "Draws a demo scene through the Umbra rendering server")]
struct Args {
    /// Backend to try first; overrides the configuration file.
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Number of frames to draw.
    #[arg(long, default_value_t = 3)]
    frames: u32,

    /// Run the server on its own render thread.
    #[arg(long)]
    threaded: bool,

    /// JSON server configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)
            .map_err(|err| anyhow!("{err}"))
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(backend) = args.backend {
        config.backend = backend.into();
    }
    if args.threaded {
        config.thread_model = ThreadModel::Separate;
    }
    Ok(config)
}

fn print_adapter(server: &RenderingServer) {
    println!("--- Adapter ---");
    println!("  driver : {}", server.get_current_rendering_driver_name());
    println!("  name   : {}", server.get_video_adapter_name());
    println!("  vendor : {}", server.get_video_adapter_vendor());
    println!("  type   : {:?}", server.get_video_adapter_type());
    println!("  api    : {}", server.get_video_adapter_api_version());
}

fn print_render_info(server: &RenderingServer, scene: &scene::DemoScene) {
    println!("--- Last frame ---");
    println!(
        "  objects {} | primitives {} | draw calls {}",
        server.get_rendering_info(RenderingInfo::TotalObjectsInFrame),
        server.get_rendering_info(RenderingInfo::TotalPrimitivesInFrame),
        server.get_rendering_info(RenderingInfo::TotalDrawCallsInFrame),
    );
    println!(
        "  video memory {} bytes ({} texture, {} buffer)",
        server.get_rendering_info(RenderingInfo::VideoMemUsed),
        server.get_rendering_info(RenderingInfo::TextureMemUsed),
        server.get_rendering_info(RenderingInfo::BufferMemUsed),
    );
    for (name, viewport) in scene.viewports() {
        let info = |kind, what| server.viewport_get_render_info(viewport, kind, what);
        println!(
            "  {name:<8} 3D: {} objects, {} draw calls | 2D: {} objects, {} draw calls",
            info(ViewportRenderInfoType::Visible, ViewportRenderInfo::Objects),
            info(ViewportRenderInfoType::Visible, ViewportRenderInfo::DrawCalls),
            info(ViewportRenderInfoType::Canvas, ViewportRenderInfo::Objects),
            info(ViewportRenderInfoType::Canvas, ViewportRenderInfo::DrawCalls),
        );
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Warn)
        .filter_module("wgpu_core", log::LevelFilter::Warn)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let backend = umbra_infra::create_backend(&config)?;
    let server =
        RenderingServer::new(config, backend).context("Failed to start the rendering server")?;
    print_adapter(&server);

    let scene = scene::DemoScene::build(&server);
    let started = Instant::now();
    for frame in 0..args.frames {
        scene.animate(&server, frame);
        let stats = server
            .force_draw(true, 1.0 / 60.0)
            .context("Frame submission failed")?;
        log::debug!("Frame {} took {:.2} ms.", stats.frame, stats.cpu_time_ms);
    }
    server.force_sync();
    log::info!(
        "Drew {} frame(s) in {:.1} ms.",
        args.frames,
        started.elapsed().as_secs_f64() * 1000.0
    );

    print_render_info(&server, &scene);
    server.finish();
    Ok(())
}
