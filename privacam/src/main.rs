//! Privacam - CLI
//!
//! Command-line front end for detection, naming and share cache upkeep.

use std::path::{Path, PathBuf};
use clap::{Parser, Subcommand};

use privacam::config::default_config_path;
use privacam::{PhotoIdentity, PrivacamApi, PrivacamConfig, PrivacamResult};

#[derive(Parser)]
#[command(name = "privacam")]
#[command(version = privacam::VERSION)]
#[command(about = "Privacam - face-aware export and share cache tools")]
struct Cli {
    /// Config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces in an image
    Detect {
        /// Image path
        image: PathBuf,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Show the capture time encoded in a filename
    DateTaken {
        /// Stored photo file name
        name: String,
    },

    /// Show the next free copy name in a directory
    CopyName {
        /// Destination directory
        dir: PathBuf,

        /// Original file name
        file: String,
    },

    /// Stage a photo in a fresh share session and report its faces
    Share {
        /// Photo path
        image: PathBuf,

        /// Leave the staged copy in place
        #[arg(long)]
        keep: bool,
    },

    /// Remove everything from the share cache
    ClearShare,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(if e.threatens_integrity() { 3 } else { 1 });
    }
}

fn load_config(cli: &Cli) -> PrivacamResult<PrivacamConfig> {
    let mut config = match cli.config.clone().or_else(default_config_path) {
        Some(path) => PrivacamConfig::load_or_default(&path)?,
        None => PrivacamConfig::default(),
    };

    if let Some(cache_dir) = &cli.cache_dir {
        config.cache_dir = cache_dir.clone();
    }
    Ok(config)
}

async fn run(cli: Cli) -> PrivacamResult<()> {
    let config = load_config(&cli)?;
    let api = PrivacamApi::open(config, None)?;

    match cli.command {
        Commands::Detect { image, json } => {
            let data = std::fs::read(&image)?;
            let analysis = api.analyze_photo(&data).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                println!(
                    "{}: {} face(s) [{}], {:.1}% to redact",
                    image.display(),
                    analysis.faces.len(),
                    api.detector_name(),
                    analysis.coverage * 100.0
                );
                for (face, region) in analysis.faces.iter().zip(&analysis.regions) {
                    let b = face.bounding_box;
                    let eyes = if face.eyes.is_some() { "eyes" } else { "no eyes" };
                    println!(
                        "  ({}, {}) - ({}, {})  {}  redact ({}, {}) - ({}, {})",
                        b.left, b.top, b.right, b.bottom, eyes,
                        region.left, region.top, region.right, region.bottom
                    );
                }
            }
        }

        Commands::DateTaken { name } => {
            let identity = PhotoIdentity::from_path(Path::new(&name));
            println!("{}", api.date_taken(&identity).format("%Y-%m-%d %H:%M:%S%.3f %:z"));
        }

        Commands::CopyName { dir, file } => {
            println!("{}", api.generate_copy_name(&dir, &file)?);
        }

        Commands::Share { image, keep } => {
            let data = std::fs::read(&image)?;
            let analysis = api.analyze_photo(&data).await?;

            let identity = PhotoIdentity::from_path(&image);
            let session = api.begin_share()?;
            let staged = api.stage_for_share(&session, &identity, &data)?;

            println!("Staged {}", staged.path.display());
            println!("  taken:   {}", staged.date_taken.format("%Y-%m-%d %H:%M:%S"));
            println!("  faces:   {}", analysis.faces.len());
            println!("  regions: {}", analysis.regions.len());

            if keep {
                // a later clear-share removes it
                session.keep();
            } else if !session.close() {
                log::warn!("Share session was not fully cleared");
            }
        }

        Commands::ClearShare => {
            if api.clear_share_directory().await {
                println!("Share cache cleared");
            } else {
                eprintln!("Share cache could not be fully cleared");
                std::process::exit(2);
            }
        }
    }

    Ok(())
}
