mod watch;

use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec3;
use hearth_common::Transform;
use hearth_render::{GlobalUniformsBinding, RenderContext, RenderSettings};
use hearth_render_wgpu::{FrameTargets, OrbitCamera, WgpuDevice, WgpuRenderPass};
use hearth_resources::{ResourceError, ResourceSystem};
use hearth_scene::{ComponentStore, ModelRenderSystem, RenderStats};
use hearth_vfs::NativeFileSystem;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use watch::ShaderWatcher;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "hearth-viewer", about = "Draw a glTF model from a hearth data directory")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Data directory
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Render settings JSON file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Virtual model path
    #[arg(long, default_value = hearth_tools::SAMPLE_MODEL_PATH)]
    model: String,

    /// Draw an N x N grid of instances
    #[arg(long, default_value = "3")]
    grid: u32,

    /// Distance between grid instances
    #[arg(long, default_value = "4.0")]
    spacing: f32,
}

const SHADER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Everything that does not need a window: resources, scene, camera.
struct ViewerState {
    fs: NativeFileSystem,
    settings: RenderSettings,
    resources: ResourceSystem,
    components: ComponentStore,
    renderer: ModelRenderSystem,
    watcher: ShaderWatcher,
    camera: OrbitCamera,
    dragging: bool,
    started: Instant,
    last_poll: Instant,
    last_stats: RenderStats,
    failure: Option<ResourceError>,
}

impl ViewerState {
    fn new(cli: &Cli) -> Result<Self> {
        let fs = NativeFileSystem::open(&cli.data_dir)
            .with_context(|| format!("cannot open data directory {}", cli.data_dir.display()))?;
        let settings = match &cli.settings {
            Some(path) => RenderSettings::from_json_file(path)?,
            None => RenderSettings::default(),
        };

        let mut resources = ResourceSystem::default();
        let model_path = cli.model.clone();
        let model = resources.request_with(&cli.model, move |_| {
            tracing::info!(path = %model_path, "model ready");
        })?;

        let mut components = ComponentStore::new();
        let half = (cli.grid.max(1) - 1) as f32 * cli.spacing * 0.5;
        for x in 0..cli.grid.max(1) {
            for z in 0..cli.grid.max(1) {
                let position = Vec3::new(
                    x as f32 * cli.spacing - half,
                    0.0,
                    z as f32 * cli.spacing - half,
                );
                components.spawn_model(
                    &format!("instance_{x}_{z}"),
                    Transform::from_position(position),
                    model,
                );
            }
        }
        components.drain_events();

        let mut camera = OrbitCamera::default();
        camera.distance = (half * 3.0).max(camera.distance);

        let now = Instant::now();
        Ok(Self {
            fs,
            settings,
            resources,
            components,
            renderer: ModelRenderSystem::new(),
            watcher: ShaderWatcher::new(),
            camera,
            dragging: false,
            started: now,
            last_poll: now,
            last_stats: RenderStats::default(),
            failure: None,
        })
    }

    /// Per-frame resource work. Returns false once a resource failed.
    fn update(&mut self, device: &mut WgpuDevice, ctx: &RenderContext) -> bool {
        if let Err(e) = self.resources.update(device, ctx, &self.fs) {
            tracing::error!(error = %e, "resource load failed");
            self.failure = Some(e);
            return false;
        }
        if self.last_poll.elapsed() >= SHADER_POLL_INTERVAL {
            self.last_poll = Instant::now();
            self.watcher
                .poll(&mut self.resources, device, &mut self.fs);
        }
        for event in self.resources.drain_events() {
            tracing::debug!(?event, "resource event");
        }
        true
    }

    fn record_stats(&mut self, stats: RenderStats) {
        if stats != self.last_stats {
            tracing::info!(
                models = stats.models,
                instances = stats.instances,
                pending = stats.pending,
                dropped = stats.dropped,
                "frame contents changed"
            );
            self.last_stats = stats;
        }
    }
}

/// Window and GPU objects, created on the first `resumed`.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: WgpuDevice,
    globals: GlobalUniformsBinding,
    ctx: RenderContext,
    targets: FrameTargets,
}

impl Gpu {
    fn new(event_loop: &ActiveEventLoop, settings: &RenderSettings) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("Hearth Viewer")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("hearth_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if settings.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let targets = FrameTargets::new(
            &device,
            format,
            settings.msaa_samples,
            config.width,
            config.height,
        );
        let mut device = WgpuDevice::new(device, queue);
        let globals = GlobalUniformsBinding::create(&mut device);
        let ctx = RenderContext::new(&globals, format, settings);

        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            ?format,
            samples = settings.msaa_samples,
            "GPU initialized"
        );
        Ok(Self {
            window,
            surface,
            config,
            device,
            globals,
            ctx,
            targets,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(self.device.device(), &self.config);
        self.targets
            .resize(self.device.device(), self.config.width, self.config.height);
    }

    fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    fn frame(&mut self, state: &mut ViewerState) {
        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(self.device.device(), &self.config);
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "surface error");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let uniforms = state.camera.global_uniforms(
            state.started.elapsed().as_secs_f32(),
            self.config.width,
            self.config.height,
        );
        let mut encoder =
            self.device
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame_encoder"),
                });
        let stats = {
            let mut rpass =
                self.targets
                    .begin_pass(&mut encoder, &view, state.settings.clear_color);
            let mut pass = WgpuRenderPass::new(&mut rpass, &self.device);
            self.globals.update(&self.device, &mut pass, &uniforms);
            state
                .renderer
                .render(&state.components, &state.resources, &mut pass, &self.device)
        };
        self.device.queue().submit(std::iter::once(encoder.finish()));
        output.present();
        state.record_stats(stats);
    }
}

struct ViewerApp {
    state: ViewerState,
    gpu: Option<Gpu>,
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match Gpu::new(event_loop, &self.state.settings) {
            Ok(gpu) => {
                self.state.camera.aspect = gpu.aspect();
                self.gpu = Some(gpu);
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot initialize GPU");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                gpu.resize(size.width, size.height);
                self.state.camera.aspect = gpu.aspect();
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                self.state.dragging = state == ElementState::Pressed;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 40.0,
                };
                self.state.camera.zoom(lines);
            }
            WindowEvent::RedrawRequested => {
                if !self.state.update(&mut gpu.device, &gpu.ctx) {
                    event_loop.exit();
                    return;
                }
                gpu.frame(&mut self.state);
                gpu.window.request_redraw();
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.state.dragging {
                self.state.camera.rotate(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut gpu) = self.gpu.take() {
            self.state.resources.clear(&mut gpu.device);
            gpu.globals.release(&mut gpu.device);
            tracing::info!(live = gpu.device.live_object_count(), "GPU objects at exit");
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!(model = %cli.model, data_dir = %cli.data_dir.display(), "hearth-viewer starting");

    let state = ViewerState::new(&cli)?;
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp { state, gpu: None };
    event_loop.run_app(&mut app)?;

    match app.state.failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
