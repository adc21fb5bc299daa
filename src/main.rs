//! gridcal - Weekly schedule grid to calendar events

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use gridcal::calendar::FeishuCalendar;
use gridcal::config::{load_config, save_config, AppConfig};
use gridcal::pipeline::Pipeline;
use gridcal::vision::{GridDetector, RemoteOcr};

/// gridcal - Turn a weekly schedule grid image into calendar events
#[derive(Parser, Debug)]
#[command(name = "gridcal")]
#[command(about = "Detects schedule slots on a grid image and books them as calendar events")]
struct Args {
    /// Schedule grid image to process
    #[arg(required_unless_present = "write_default_config")]
    image: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, default_value = "gridcal.toml")]
    config: PathBuf,

    /// Where to write the annotated review image
    #[arg(short, long, default_value = "annotated.jpg")]
    out: PathBuf,

    /// Write a default configuration file and exit
    #[arg(long)]
    write_default_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.write_default_config {
        save_config(&AppConfig::default(), &args.config)?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(());
    }

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;

    let image_path = args.image.expect("clap enforces the image argument");
    let image_bytes = std::fs::read(&image_path)
        .with_context(|| format!("Failed to read image {}", image_path.display()))?;

    let detector = Arc::new(GridDetector::new(&config.model)?);
    let ocr = Arc::new(RemoteOcr::new(&config.ocr)?);
    let store = Arc::new(FeishuCalendar::new(&config.calendar)?);
    let pipeline = Pipeline::new(&config, detector, ocr, store);

    info!("processing {}", image_path.display());
    let result = pipeline.run(&image_bytes).await?;

    for warning in &result.warnings {
        warn!("{warning}");
    }
    println!(
        "{} of {} detected slots booked",
        result.successful_count, result.total_detected
    );
    for (i, outcome) in result.outcomes.iter().enumerate() {
        if let Some(event_id) = &outcome.event_id {
            println!(
                "  box {}: {} -> event {}",
                i + 1,
                outcome
                    .draft
                    .as_ref()
                    .map(|d| d.summary.as_str())
                    .unwrap_or("?"),
                event_id
            );
        }
        for entry in &outcome.errors {
            println!("  {entry}");
        }
    }

    std::fs::write(&args.out, &result.annotated_jpeg)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;
    println!("Annotated image written to {}", args.out.display());

    Ok(())
}
