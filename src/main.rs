//! meshpack CLI
//!
//! Loads a scene model serialized as JSON and writes it as glTF 2.0.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

use meshpack_core::Scene;
use meshpack_export::{analyze_nodes, GltfExportOptions, GltfExporter};

/// meshpack - write optimized scenes as glTF 2.0
#[derive(Parser)]
#[command(name = "meshpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scene model JSON file
    input: PathBuf,

    /// Output path (.gltf or .glb)
    #[arg(short, long)]
    output: PathBuf,

    /// Load export options from a JSON file; flags below override it
    #[arg(long)]
    options: Option<PathBuf>,

    /// Write a single GLB container
    #[arg(long)]
    glb: bool,

    /// Pretty-print the document
    #[arg(long)]
    pretty: bool,

    /// Embed external images into the binary buffer
    #[arg(long)]
    embed_textures: bool,

    /// Animation resampling frequency in Hz
    #[arg(long)]
    anim_freq: Option<f32>,

    /// Keep animation tracks that never leave the rest pose
    #[arg(long)]
    anim_const: bool,

    /// Copy extras into the document
    #[arg(long)]
    keep_extras: bool,

    /// Enable verbose output (-v -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn export_options(&self) -> Result<GltfExportOptions> {
        let mut options = match &self.options {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read options: {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse options: {}", path.display()))?
            }
            None => GltfExportOptions::default(),
        };

        let is_glb = self
            .output
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("glb"));

        options.use_glb |= self.glb || is_glb;
        options.pretty_json |= self.pretty;
        options.texture_embed |= self.embed_textures;
        options.anim_const |= self.anim_const;
        options.keep_extras |= self.keep_extras;
        if let Some(freq) = self.anim_freq {
            options.anim_freq = freq;
        }

        Ok(options)
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_thread_ids(verbosity >= 3)
        .with_file(verbosity >= 3)
        .with_line_number(verbosity >= 3)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let options = cli.export_options()?;
    if options.compress || options.texture_basis {
        bail!("this build has no buffer or texture codec; disable compress and texture_basis");
    }

    let text = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read scene: {}", cli.input.display()))?;
    let scene: Scene = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse scene: {}", cli.input.display()))?;

    info!(
        nodes = scene.nodes.len(),
        meshes = scene.meshes.len(),
        animations = scene.animations.len(),
        "loaded scene"
    );

    let mut nodes = analyze_nodes(&scene);
    let exporter = GltfExporter::new(options);
    let exported = exporter
        .export(&scene, &mut nodes, &cli.input, &cli.output)
        .context("Export failed")?;
    exported.save().context("Failed to write output")?;

    let report = &exported.report;
    if !report.warnings.is_empty() {
        warn!(count = report.warnings.len(), "export finished with warnings");
    }

    println!("Wrote {}", exported.document_path().display());
    println!(
        "  {} nodes, {} meshes, {} animations, {} cameras, {} images, {} bytes",
        exported.document.nodes.len(),
        exported.document.meshes.len(),
        report.animations,
        report.cameras,
        report.images,
        exported.main.len()
    );

    Ok(())
}
