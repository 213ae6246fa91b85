use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use plateblur::config::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use plateblur::{
    BatchCoordinator, DetectorConfig, ExportConfig, GeminiDetector, ItemProcessor, Queue,
    QueueEvent, RedactionConfig, RedactionEngine, StatusKind, export, intake,
};

#[derive(Parser)]
#[command(name = "plateblur")]
#[command(about = "Detect license plates in images and pixelate them")]
struct Cli {
    /// Images to process (non-image files are skipped)
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    /// Directory for the blurred_* outputs
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    out: PathBuf,

    /// Detector API key (falls back to API_KEY)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Detector model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Detector API base URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Pause between saved files, in milliseconds
    #[arg(long, default_value_t = ExportConfig::default().stagger_ms)]
    stagger_ms: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let mut detector_config = DetectorConfig::from_env();
    if args.api_key.is_some() {
        detector_config.api_key = args.api_key.clone();
    }
    detector_config.model = args.model.clone();
    detector_config.endpoint = args.endpoint.clone();
    let detector = GeminiDetector::new(detector_config)?;

    let queue = Queue::new();
    let mut events = queue.subscribe();
    let names = queue.clone();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(QueueEvent::StatusChanged { id, status }) => {
                    let name = names
                        .get(id)
                        .await
                        .map(|item| item.file_name().to_string())
                        .unwrap_or_default();
                    println!("  {name}: {status:?}");
                }
                Ok(QueueEvent::BatchFinished { .. }) | Err(RecvError::Closed) => break,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
            }
        }
    });

    let ids = intake::enqueue_paths(&queue, &args.images).await?;
    if ids.is_empty() {
        println!("No images to process.");
        return Ok(());
    }
    println!("Queued {} image(s)\n", ids.len());

    let engine = RedactionEngine::from_config(&RedactionConfig::default());
    let processor = ItemProcessor::new(queue.clone(), Arc::new(detector), engine);
    let coordinator = BatchCoordinator::new(processor);

    let report = coordinator.process_all().await;
    printer.await?;

    let progress = queue.progress().await;
    println!("\n=== Results ===");
    println!(
        "Completed {}/{} ({:.0}%), failed {}",
        progress.completed,
        progress.total,
        progress.percent(),
        report.failed
    );
    for item in queue.snapshot().await {
        if item.status() == StatusKind::Error {
            println!("  {}: {}", item.file_name(), item.error().unwrap_or_default());
        }
    }

    let export_config = ExportConfig {
        stagger_ms: args.stagger_ms,
    };
    let saved = export::save_all(&queue, &args.out, export_config.stagger()).await?;
    for path in &saved {
        println!("Saved {}", path.display());
    }

    Ok(())
}
