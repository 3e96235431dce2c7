//! lbmtool - Convert DeluxePaint LBM/ILBM images
//!
//! A command-line tool for converting LBM/ILBM images to JSON descriptions
//! or indexed-color PNG files.

use clap::{Parser, Subcommand};
use ilbm::{lbm_decode, png_encode, ImageReport, LbmImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Parser)]
#[command(name = "lbmtool")]
#[command(version)]
#[command(about = "Convert DeluxePaint LBM/ILBM images to JSON or PNG", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe an LBM image as JSON (palette, pixels, color cycles)
    Json {
        /// Input LBM/ILBM file
        input: PathBuf,

        /// Output JSON file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report the pixel count instead of the full pixel array
        #[arg(long)]
        no_pixels: bool,
    },

    /// Convert an LBM image to an indexed-color PNG
    Png {
        /// Input LBM/ILBM file
        input: PathBuf,

        /// Output PNG file (default: input with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert to a temporary PNG and open it with the default image viewer
    View {
        /// Input LBM/ILBM file
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Json {
            input,
            output,
            no_pixels,
        } => {
            let image = read_lbm(&input)?;
            let report = ImageReport::new(input.to_string_lossy(), &image, !no_pixels);
            let json = serde_json::to_string(&report)?;

            match output {
                Some(path) => {
                    fs::write(&path, json + "\n")
                        .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
                    eprintln!("Saved JSON to '{}'", path.display());
                }
                None => {
                    println!("{json}");
                }
            }
        }

        Commands::Png { input, output } => {
            let image = read_lbm(&input)?;
            let png = png_encode(&image)?;

            let output_path = output.unwrap_or_else(|| {
                let mut p = input.clone();
                p.set_extension("png");
                p
            });
            fs::write(&output_path, &png)
                .map_err(|e| format!("Failed to write '{}': {}", output_path.display(), e))?;

            eprintln!(
                "Saved PNG ({}x{}, {} bytes) to '{}'",
                image.header.width,
                image.header.height,
                png.len(),
                output_path.display()
            );
        }

        Commands::View { input } => {
            let image = read_lbm(&input)?;
            let png = png_encode(&image)?;

            let path = std::env::temp_dir().join(format!("lbmtool-{}.png", std::process::id()));
            fs::write(&path, &png)
                .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;

            eprintln!("Opening '{}'", path.display());
            open_viewer(&path)?;
        }
    }

    Ok(())
}

fn read_lbm(input: &Path) -> Result<LbmImage, Box<dyn std::error::Error>> {
    let data = fs::read(input)
        .map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;
    let image = lbm_decode(&data)
        .map_err(|e| format!("Failed to decode '{}': {}", input.display(), e))?;
    Ok(image)
}

fn open_viewer(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(target_os = "macos")]
    let launcher = "open";
    #[cfg(not(target_os = "macos"))]
    let launcher = "xdg-open";

    let status = Command::new(launcher)
        .arg(path)
        .status()
        .map_err(|e| format!("Failed to launch viewer '{}': {}", launcher, e))?;
    if !status.success() {
        return Err(format!("Viewer '{}' exited with {}", launcher, status).into());
    }
    Ok(())
}
