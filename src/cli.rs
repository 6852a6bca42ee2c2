use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;

use crate::rgb_map::GridSize;
use crate::rgb_script::RgbScript;
use crate::script_catalog::ScriptCatalog;
use crate::script_dirs::ScriptDirs;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List discoverable pattern scripts
    List {
        /// Extra script directory (overrides the custom location)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate one script file against the contract
    Check {
        /// Script file to validate
        file: PathBuf,

        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a script's steps to PNG frames
    Render {
        /// Script name as reported by `list`
        #[arg(long)]
        script: String,

        /// Grid width in cells
        #[arg(long, default_value_t = 8)]
        width: u32,

        /// Grid height in cells
        #[arg(long, default_value_t = 8)]
        height: u32,

        /// Lit-cell color as RRGGBB hex
        #[arg(long, default_value = "ff0000")]
        color: String,

        /// Number of steps to render (defaults to the script's step count)
        #[arg(long)]
        steps: Option<i64>,

        /// Pixels per grid cell
        #[arg(long, default_value_t = 16)]
        cell: u32,

        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// Extra script directory (overrides the custom location)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::List { dir, json } => list(catalog_for(dir), json),
        Commands::Check { file, json } => check(file, json),
        Commands::Render { script, width, height, color, steps, cell, out, dir } => {
            render(catalog_for(dir), script, GridSize::new(width, height), color, steps, cell, out)
        }
    }
}

fn catalog_for(dir: Option<PathBuf>) -> ScriptCatalog {
    match dir {
        Some(dir) => ScriptCatalog::new(ScriptDirs::with_custom(dir)),
        None => ScriptCatalog::with_defaults(),
    }
}

fn list(catalog: ScriptCatalog, as_json: bool) -> Result<()> {
    let mut entries = Vec::new();
    for mut script in catalog.available_scripts() {
        entries.push(json!({
            "name": script.name().to_string(),
            "author": script.author().to_string(),
            "apiVersion": script.api_version(),
            "file": script.file_name(),
            "valid": script.evaluate(),
        }));
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No scripts found.");
        return Ok(());
    }
    for entry in &entries {
        if entry["valid"].as_bool().unwrap_or(false) {
            println!(
                "{:<24} v{:<3} {:<20} {}",
                entry["name"].as_str().unwrap_or(""),
                entry["apiVersion"].as_i64().unwrap_or(0),
                entry["author"].as_str().unwrap_or(""),
                entry["file"].as_str().unwrap_or(""),
            );
        } else {
            println!("{:<49} {} (invalid)", "-", entry["file"].as_str().unwrap_or(""));
        }
    }
    Ok(())
}

fn check(file: PathBuf, as_json: bool) -> Result<()> {
    let mut script = RgbScript::load(&file)?;
    let valid = script.evaluate();

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "file": script.file_name(),
                "valid": valid,
                "apiVersion": script.api_version(),
                "name": script.name().to_string(),
                "author": script.author().to_string(),
                "fault": script.fault(),
            }))?
        );
    } else if valid {
        let api_version = script.api_version();
        println!("ok: {} (apiVersion {})", script.name(), api_version);
    } else if let Some(fault) = script.fault() {
        println!("invalid: {}", fault.message);
    }

    if !valid {
        std::process::exit(1);
    }
    Ok(())
}

fn render(
    catalog: ScriptCatalog,
    name: String,
    size: GridSize,
    color: String,
    steps: Option<i64>,
    cell: u32,
    out_dir: PathBuf,
) -> Result<()> {
    if size.width == 0 || size.height == 0 || cell == 0 {
        bail!("grid and cell dimensions must be non-zero");
    }
    let rgb = parse_color(&color)?;

    let mut script = catalog.find_by_name(&name);
    if script.api_version() == 0 {
        bail!("script '{}' not found or invalid", name);
    }

    let steps = match steps {
        Some(steps) => steps,
        None => script.rgb_map_step_count(size),
    };
    if steps <= 0 {
        bail!("script '{}' reports no steps at {}x{}", name, size.width, size.height);
    }

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory '{}'", out_dir.display()))?;

    println!("Rendering {} steps of '{}' to {:?}...", steps, name, out_dir);

    for step in 0..steps {
        let map = script.rgb_map(size, rgb, step);
        if map.is_empty() {
            bail!("script '{}' failed to render step {}", name, step);
        }

        let frame_width = size.width * cell;
        let frame_height = size.height * cell;
        let mut pixels = Vec::with_capacity((frame_width * frame_height * 3) as usize);
        for py in 0..frame_height {
            for px in 0..frame_width {
                let value = map.get(px / cell, py / cell).unwrap_or(0);
                pixels.push((value >> 16) as u8);
                pixels.push((value >> 8) as u8);
                pixels.push(value as u8);
            }
        }

        let frame_path = out_dir.join(format!("step_{:03}.png", step));
        image::save_buffer(&frame_path, &pixels, frame_width, frame_height, image::ColorType::Rgb8)
            .with_context(|| format!("writing '{}'", frame_path.display()))?;
    }

    println!("Done.");
    Ok(())
}

fn parse_color(color: &str) -> Result<u32> {
    let hex = color.trim_start_matches('#');
    if hex.len() != 6 {
        bail!("color must be 6 hex digits (RRGGBB), got '{}'", color);
    }
    u32::from_str_radix(hex, 16).map_err(|_| anyhow!("invalid color '{}'", color))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_color_accepts_plain_and_hash_prefixed_hex() {
        assert_eq!(parse_color("ff0000").unwrap(), 0xff0000);
        assert_eq!(parse_color("#00ff7f").unwrap(), 0x00ff7f);
        assert!(parse_color("red").is_err());
        assert!(parse_color("ff00").is_err());
    }
}
