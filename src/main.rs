use clap::{Parser, Subcommand};
use photoblog::imaging::RustBackend;
use photoblog::metadata::{ExifToolReader, MetadataReader, NoopReader};
use photoblog::process::{Pipeline, RunOptions};
use photoblog::{config, output, scan, storage};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "photoblog")]
#[command(about = "Photo pipeline for a static photo blog")]
#[command(long_about = "\
Photo pipeline for a static photo blog

Each directory under the photos root is an album. A run resizes every new or
changed photo into original, medium and thumbnail JPEGs, publishes them to
local storage or an S3-compatible bucket, and writes the album manifest the
site reads.

Photos layout:

  ~/Pictures/albums/
  ├── Summer in Lisbon/            # Album → id `summer-in-lisbon`
  │   ├── album.yaml               # title, description, date, tags, cover_photo
  │   ├── IMG_2041.JPG             # Photo → id `img2041`
  │   └── IMG_2042.png
  └── Winter/
      ├── album.txt                # Line 1: title, line 2: description
      └── snow.jpeg

Configuration is read from photoblog.toml in the site root, then from the
environment (PHOTOS_DIR, USE_CLOUD_STORAGE, S3_BUCKET, ...). A .env file in
the working directory is loaded first.

Run 'photoblog gen-config' to print a documented photoblog.toml.")]
#[command(version)]
struct Cli {
    /// Site repository root (holds photoblog.toml, data/, content/, static/)
    #[arg(long, default_value = ".", global = true)]
    site_root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process new and changed photos and rewrite the manifest
    Run {
        /// Only process this album (directory name or id)
        #[arg(long)]
        album: Option<String>,
        /// Reprocess photos even when their variants are up to date
        #[arg(long)]
        force: bool,
        /// Show what would be processed without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate configuration and the photos tree without processing
    Check,
    /// Print a stock photoblog.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            album,
            force,
            dry_run,
        } => {
            let config = config::load_config(&cli.site_root)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let handle = runtime.handle().clone();

            let images = RustBackend::new();
            let metadata: Box<dyn MetadataReader> = if config.metadata.exiftool.is_empty() {
                Box::new(NoopReader)
            } else {
                Box::new(ExifToolReader::new(
                    &config.metadata.exiftool,
                    Duration::from_secs(config.metadata.timeout_secs),
                    handle.clone(),
                ))
            };
            let storage = storage::from_config(&config, &handle);

            tracing::info!(
                photos = %config.photos_root().display(),
                backend = ?config.storage.backend,
                "starting run"
            );

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let options = RunOptions {
                album,
                force,
                dry_run,
            };
            let result = Pipeline::new(&config, &images, &*metadata, &*storage)
                .with_events(tx)
                .run(&options);
            printer.join().ok();

            let report = result?;
            output::print_run_report(&report);
            if report.has_failures() {
                tracing::warn!(failures = report.failures.len(), "run finished with failures");
            }
        }
        Command::Check => {
            let config = config::load_config(&cli.site_root)?;
            let root = config.photos_root();
            println!("==> Checking {}", root.display());
            let albums = scan::scan(&root, &config.derived_root(), &scan::ScanOptions::default())?;
            output::print_check(&albums);
            println!("==> Configuration and photos are valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
