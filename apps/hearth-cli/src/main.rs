use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use glam::{Mat4, Vec3};
use hearth_common::{ResourceType, resource_extension};
use hearth_render::{
    GlobalUniformsBinding, RecordingDevice, RecordingPass, RenderContext, RenderSettings,
};
use hearth_resources::{ResourceError, ResourceSystem};
use hearth_tools::{ModelInspector, ResourceInspector};
use hearth_vfs::{FileSystem, NativeFileSystem};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hearth-cli", about = "CLI tool for hearth data directories")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Load a model against a recording device and print its summary
    Inspect {
        /// Data directory
        dir: PathBuf,
        /// Virtual model path, e.g. /models/ship.glb
        model: String,
        /// Instances to draw in the test frame
        #[arg(short, long, default_value = "1")]
        instances: usize,
    },
    /// Load every resource in a data directory and report failures
    Validate {
        /// Data directory
        dir: PathBuf,
        /// Hash every file into manifest.json before validating
        #[arg(long)]
        write_manifest: bool,
    },
    /// Write the built-in sample model and its shader into a data directory
    Sample {
        /// Data directory
        dir: PathBuf,
    },
}

/// Resource loading against a [`RecordingDevice`]: everything but the GPU.
struct Headless {
    device: RecordingDevice,
    ctx: RenderContext,
    system: ResourceSystem,
}

impl Headless {
    fn new() -> Self {
        let mut device = RecordingDevice::new();
        let globals = GlobalUniformsBinding::create(&mut device);
        let ctx = RenderContext::new(
            &globals,
            wgpu::TextureFormat::Bgra8UnormSrgb,
            &RenderSettings::default(),
        );
        Self {
            device,
            ctx,
            system: ResourceSystem::default(),
        }
    }

    /// Update until idle. Fatal resource errors are collected, not raised.
    fn settle(&mut self, fs: &dyn FileSystem) -> Vec<ResourceError> {
        let mut errors = Vec::new();
        for _ in 0..64 {
            if let Err(e) = self.system.update(&mut self.device, &self.ctx, fs) {
                errors.push(e);
            }
            if self.system.is_idle() {
                break;
            }
        }
        errors
    }
}

fn inspect(dir: PathBuf, model: &str, instances: usize, dump: bool) -> anyhow::Result<()> {
    let fs = NativeFileSystem::open(&dir)
        .with_context(|| format!("cannot open data directory {}", dir.display()))?;
    let mut headless = Headless::new();
    let id = headless.system.request(model)?;
    for e in headless.settle(&fs) {
        tracing::error!(error = %e, "load failed");
    }
    let resource = headless
        .system
        .model(id)
        .context("requested path is not a model")?;
    println!("{}", ModelInspector::summary(resource));

    let transforms: Vec<Mat4> = (0..instances)
        .map(|i| Mat4::from_translation(Vec3::X * i as f32 * 2.0))
        .collect();
    let mut pass = RecordingPass::new();
    resource.render(&mut pass, &headless.device, &transforms);
    println!(
        "test frame: {} commands, {} draws, {} live gpu objects",
        pass.commands().len(),
        pass.draw_count(),
        headless.device.live_objects().total()
    );
    if dump {
        println!("{}", pass.dump());
    }
    Ok(())
}

fn validate(dir: PathBuf, write_manifest: bool) -> anyhow::Result<()> {
    let mut fs = NativeFileSystem::open(&dir)
        .with_context(|| format!("cannot open data directory {}", dir.display()))?;
    if write_manifest {
        let manifest = fs.write_manifest()?;
        println!("manifest written: {} files", manifest.files.len());
    }
    let integrity = fs.verify_integrity();
    for e in &integrity {
        println!("integrity: {e}");
    }

    let mut headless = Headless::new();
    for path in fs.list("/") {
        let known = resource_extension(&path)
            .and_then(|ext| ResourceType::from_extension(&ext))
            .is_some();
        if known {
            headless.system.request(&path)?;
        }
    }
    headless.settle(&fs);

    for line in ResourceInspector::lines(&headless.system) {
        println!("{line}");
    }
    let failures = ResourceInspector::failures(&headless.system);
    if !failures.is_empty() || !integrity.is_empty() {
        bail!(
            "{} resource(s) failed, {} integrity error(s)",
            failures.len(),
            integrity.len()
        );
    }
    println!("ok: {} resources", headless.system.len());
    Ok(())
}

fn sample(dir: PathBuf) -> anyhow::Result<()> {
    let mut fs = NativeFileSystem::open(&dir)
        .with_context(|| format!("cannot open data directory {}", dir.display()))?;
    fs.write(hearth_tools::SAMPLE_MODEL_PATH, &hearth_tools::sample_model())?;
    fs.write(
        hearth_tools::SAMPLE_SHADER_PATH,
        hearth_render_wgpu::MODEL_SHADER.as_bytes(),
    )?;
    println!(
        "wrote {} and {} under {}",
        hearth_tools::SAMPLE_MODEL_PATH,
        hearth_tools::SAMPLE_SHADER_PATH,
        dir.display()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("hearth-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", hearth_common::crate_info());
            println!("vfs: {}", hearth_vfs::crate_info());
            println!("render: {}", hearth_render::crate_info());
            println!("assets: {}", hearth_assets::crate_info());
            println!("resources: {}", hearth_resources::crate_info());
            println!("tools: {}", hearth_tools::crate_info());
        }
        Commands::Inspect {
            dir,
            model,
            instances,
        } => inspect(dir, &model, instances, cli.verbose)?,
        Commands::Validate {
            dir,
            write_manifest,
        } => validate(dir, write_manifest)?,
        Commands::Sample { dir } => sample(dir)?,
    }

    Ok(())
}
