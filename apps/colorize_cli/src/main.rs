use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{
    config::load_settings,
    preview::{Pane, PreviewView},
    HttpColorizeService, ProcessOutcome, ResultViewer, SessionSnapshot, StageListener,
    WorkflowController,
};
use shared::domain::Stage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Colorize a black and white photo with the remote colorization service")]
struct Args {
    /// Photo to colorize.
    file: PathBuf,
    /// Base URL of the colorization service; overrides colorize.toml and the environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Caption stored with the upload.
    #[arg(long)]
    title: Option<String>,
    /// Save the colorized image here.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Print the result URL for opening in a browser.
    #[arg(long)]
    open: bool,
}

struct LoggingStageListener;

impl StageListener for LoggingStageListener {
    fn stage_changed(&self, stage: Stage) {
        info!(?stage, "stage changed");
    }
}

struct PrintingViewer;

impl ResultViewer for PrintingViewer {
    fn open(&self, url: &str) -> Result<()> {
        println!("Open the colorized image: {url}");
        Ok(())
    }
}

fn describe_source(snapshot: &SessionSnapshot) -> String {
    match &snapshot.source_image {
        Some(image) => match image.dimensions() {
            Some(dims) => format!(
                "{} ({}x{}, {} bytes)",
                image.mime_type(),
                dims.width,
                dims.height,
                image.len()
            ),
            None => format!("{} ({} bytes)", image.mime_type(), image.len()),
        },
        None => "none".to_string(),
    }
}

fn print_view(snapshot: &SessionSnapshot, view: &PreviewView) {
    println!("Original:  {}", describe_source(snapshot));
    match &view.colorized {
        Pane::Image(url) => println!("Colorized: {url}"),
        Pane::Placeholder(text) => println!("Colorized: {text}"),
    }
    if let Some(id) = &snapshot.resource_id {
        println!("Image id:  {id}");
    }
    if let Some(error) = &view.error_banner {
        println!("Error:     {error}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }
    if let Some(title) = args.title {
        settings.upload_title = title;
    }

    let service = HttpColorizeService::from_settings(&settings)?;
    info!(api_url = service.api_url(), "using colorization service");
    let controller = WorkflowController::new_with_dependencies(
        Arc::new(service),
        Arc::new(LoggingStageListener),
        Arc::new(PrintingViewer),
        settings.upload_title.clone(),
    );

    controller.select_image_file(&args.file).await;
    if let Some(error) = controller.snapshot().last_error() {
        bail!("{error}");
    }

    let outcome = controller.process_image().await;
    print_view(&controller.snapshot(), &controller.view());

    match outcome {
        ProcessOutcome::Completed(_) => {
            if let Some(output) = &args.output {
                let bytes = controller
                    .fetch_result()
                    .await?
                    .context("colorized image disappeared before download")?;
                tokio::fs::write(output, &bytes)
                    .await
                    .with_context(|| format!("failed to write {}", output.display()))?;
                println!("Saved {} bytes to {}", bytes.len(), output.display());
            }
            if args.open {
                controller.download_result();
            }
            Ok(())
        }
        ProcessOutcome::Failed(error) => bail!("colorization failed: {error}"),
        ProcessOutcome::Skipped(reason) => bail!("nothing was processed: {reason:?}"),
        ProcessOutcome::Superseded => bail!("the session was replaced before colorization finished"),
    }
}
