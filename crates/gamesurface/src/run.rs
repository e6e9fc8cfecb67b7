use std::path::Path;

use anyhow::{bail, Context, Result};
use presets::{AssetDir, EmbeddedAssets, Preset, ShaderCatalog, MAX_SHADER_PASSES};
use renderer::ApiGeneration;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use videoconfig::VideoConfig;

use crate::cli::{CheckArgs, Cli, Command, PresetsArgs};

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    match cli.command {
        Command::Presets(args) => list_presets(&args),
        Command::Check(args) => check(&args),
        #[cfg(feature = "egl")]
        Command::Preview(args) => crate::preview::run_preview(&args),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Serialize)]
struct PresetRow {
    preset: Preset,
    friendly_name: &'static str,
    description: &'static str,
    requires_vsync: bool,
    usable: bool,
}

fn list_presets(args: &PresetsArgs) -> Result<()> {
    let catalog = match &args.assets {
        Some(root) => {
            tracing::debug!(root = %root.display(), "loading presets from asset directory");
            ShaderCatalog::load(&AssetDir::new(root))
        }
        None => ShaderCatalog::load(&EmbeddedAssets),
    };

    let rows: Vec<PresetRow> = catalog
        .entries()
        .iter()
        .map(|entry| PresetRow {
            preset: entry.preset,
            friendly_name: entry.friendly_name_ref(),
            description: entry.description_ref(),
            requires_vsync: entry.requires_vsync(),
            usable: entry.is_usable(),
        })
        .collect();

    if args.json {
        let json = serde_json::to_string_pretty(&rows).context("failed to encode presets")?;
        println!("{json}");
        return Ok(());
    }

    println!("{:<14} {:<6} {:<7} FRIENDLY NAME", "PRESET", "VSYNC", "USABLE");
    for row in &rows {
        println!(
            "{:<14} {:<6} {:<7} {}",
            row.preset.name(),
            yes_no(row.requires_vsync),
            yes_no(row.usable),
            row.friendly_name
        );
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn check(args: &CheckArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let catalog = load_catalog(&config);
    let chain = config.chain();

    let unusable: Vec<Preset> = chain
        .iter()
        .copied()
        .filter(|preset| !catalog.entry(*preset).is_some_and(|entry| entry.is_usable()))
        .collect();
    let generation = ApiGeneration::for_api_level(config.context.api_level);

    println!("config:    {}", args.config.display());
    println!("assets:    {}", config.shaders.assets.display());
    println!(
        "backend:   {} (api level {})",
        generation_label(generation),
        config.context.api_level
    );
    println!(
        "context:   {} {}.{}",
        if config.context.try_full_gl && generation.supports_full_gl() {
            "OpenGL (GLES fallback)"
        } else {
            "OpenGL ES"
        },
        config.context.gl_major,
        config.context.gl_minor
    );
    println!("passes:    {}", resolved_pass_count(&chain, &unusable));
    println!(
        "chain:     {}",
        if chain.is_empty() {
            "(default)".to_string()
        } else {
            chain
                .iter()
                .map(|preset| preset.name())
                .collect::<Vec<_>>()
                .join(", ")
        }
    );
    println!("vsync:     {}", yes_no(presets::needs_vsync(&chain)));
    println!("interval:  {}", config.effective_swap_interval());

    if !unusable.is_empty() {
        let names: Vec<&str> = unusable.iter().map(|preset| preset.name()).collect();
        bail!(
            "shader sources missing under {} for: {}",
            config.shaders.assets.join("shaders").display(),
            names.join(", ")
        );
    }
    Ok(())
}

pub(crate) fn load_config(path: &Path) -> Result<VideoConfig> {
    let config = VideoConfig::load(path)
        .with_context(|| format!("failed to load configuration {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded video configuration");
    Ok(config)
}

pub(crate) fn load_catalog(config: &VideoConfig) -> ShaderCatalog {
    let assets = AssetDir::new(&config.shaders.assets);
    let catalog = ShaderCatalog::load(&assets);
    tracing::debug!(
        root = %assets.root().display(),
        unusable = catalog.unusable().count(),
        "loaded shader catalog"
    );
    catalog
}

/// Mirrors how the pipeline resolves a chain: empty means the default
/// preset, unusable entries drop out, and nothing usable leaves the
/// built-in pass-through.
fn resolved_pass_count(chain: &[Preset], unusable: &[Preset]) -> usize {
    if chain.is_empty() {
        return 1;
    }
    chain
        .iter()
        .take(MAX_SHADER_PASSES)
        .filter(|preset| !unusable.contains(preset))
        .count()
        .max(1)
}

fn generation_label(generation: ApiGeneration) -> &'static str {
    match generation {
        ApiGeneration::Legacy => "legacy",
        ApiGeneration::Modern => "modern",
    }
}
