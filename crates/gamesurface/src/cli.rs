use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gamesurface",
    author,
    version,
    about = "EGL video output and shader post-processing for emulated game frames"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the shader presets and whether their sources load.
    Presets(PresetsArgs),
    /// Validate a video configuration against its asset bundle.
    Check(CheckArgs),
    /// Open a desktop window and run the configured chain over a test feed.
    #[cfg(feature = "egl")]
    Preview(PreviewArgs),
}

#[derive(Parser, Debug, Default)]
pub struct PresetsArgs {
    /// Asset bundle root (shaders under `<DIR>/shaders`); defaults to the
    /// presets compiled into the binary.
    #[arg(long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Print machine-readable JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Path to the TOML video configuration.
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

#[cfg(feature = "egl")]
#[derive(Parser, Debug)]
pub struct PreviewArgs {
    /// Path to the TOML video configuration.
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Window size (e.g. `1280x960`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, default_value = "960x720")]
    pub size: (u32, u32),

    /// Save the last presented frame as PNG when the window closes.
    #[arg(long, value_name = "PATH")]
    pub screenshot: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg_attr(not(feature = "egl"), allow(dead_code))]
pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{trimmed}'; expected WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{trimmed}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("size must be non-zero, got {width}x{height}"));
    }
    Ok((width, height))
}
