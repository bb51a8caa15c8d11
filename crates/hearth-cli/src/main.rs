use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hearth_cli::{init_tracing, load_asset, truncate_string};
use hearth_core::PipelineConfig;
use hearth_processing::{
    checksum, BatchCoordinator, BatchFailure, BatchSummary, MediaPipeline, MetadataExtractor,
    UploadCoordinator, UploadReceipt, Validator,
};
use hearth_storage::create_storage;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Validate, inspect and process real-estate media files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved policy table
    Policies,
    /// Print the SHA-256 digest of a file
    Checksum { file: PathBuf },
    /// Print the metadata extracted from a file
    Inspect {
        file: PathBuf,
        /// Declared MIME type (guessed from the extension when omitted)
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Validate a file against the policy for its media type
    Validate {
        file: PathBuf,
        #[arg(long)]
        media_type: String,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Run files through the pipeline as one batch
    Process {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        media_type: String,
        #[arg(long, default_value = "local")]
        owner: String,
        #[arg(long, default_value = "default")]
        context: String,
        /// Store completed jobs with the configured storage backend
        #[arg(long)]
        upload: bool,
        /// Override HEARTH_MAX_CONCURRENCY
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

#[derive(Serialize)]
struct ProcessReport<'a> {
    summary: BatchSummary,
    cancelled: bool,
    elapsed_ms: u64,
    jobs: &'a [hearth_core::ProcessingJob],
    failures: Vec<BatchFailure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    uploads: Vec<UploadReceipt>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    upload_errors: Vec<UploadFailure>,
}

#[derive(Serialize)]
struct UploadFailure {
    index: usize,
    error: String,
    retryable: bool,
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let s = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", s);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("Invalid HEARTH_* configuration")?;

    match cli.command {
        Commands::Policies => {
            let policies = config.load_policies().context("Load policy table")?;
            print_json(&policies.entries())?;
        }
        Commands::Checksum { file } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            println!("{}", checksum::digest(&data));
        }
        Commands::Inspect { file, content_type } => {
            let asset = load_asset(&file, "other", content_type.as_deref())?;
            let mut metadata = MetadataExtractor::from_config(&config)
                .extract(asset.data(), &asset.normalized_content_type());
            metadata.checksum = Some(checksum::digest(asset.data()));
            print_json(&metadata)?;
        }
        Commands::Validate {
            file,
            media_type,
            content_type,
        } => {
            let policies = config.load_policies().context("Load policy table")?;
            let asset = load_asset(&file, &media_type, content_type.as_deref())?;
            let metadata = MetadataExtractor::from_config(&config)
                .extract(asset.data(), &asset.normalized_content_type());
            let result = Validator::validate(&asset, &metadata, policies.resolve(&media_type));
            print_json(&result)?;
        }
        Commands::Process {
            files,
            media_type,
            owner,
            context,
            upload,
            concurrency,
        } => {
            process(
                &config,
                files,
                &media_type,
                &owner,
                &context,
                upload,
                concurrency,
            )
            .await?;
        }
    }

    Ok(())
}

async fn process(
    config: &PipelineConfig,
    files: Vec<PathBuf>,
    media_type: &str,
    owner: &str,
    context: &str,
    upload: bool,
    concurrency: Option<usize>,
) -> Result<()> {
    let policies = config.load_policies().context("Load policy table")?;

    // Open storage before any work so a misconfiguration fails fast.
    let storage = if upload {
        Some(create_storage(config).await.context("Configure storage for --upload")?)
    } else {
        None
    };

    let assets = files
        .iter()
        .map(|path| load_asset(path, media_type, None))
        .collect::<Result<Vec<_>>>()?;

    let pipeline = Arc::new(MediaPipeline::from_config(Arc::clone(&policies), config));
    let mut coordinator = BatchCoordinator::from_config(pipeline, config);
    if let Some(n) = concurrency {
        anyhow::ensure!(n > 0, "--concurrency must be at least 1");
        coordinator = coordinator.with_max_concurrency(n);
    }

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling items that have not started");
            cancel.cancel();
        }
    });

    let result = coordinator
        .process_batch(assets, |progress| {
            tracing::info!(
                completed = progress.completed,
                total = progress.total,
                percentage = %format!("{:.0}", progress.percentage),
                item = %truncate_string(progress.current_item.as_deref().unwrap_or(""), 40),
                "Processed item"
            );
        })
        .await;

    let mut uploads = Vec::new();
    let mut upload_errors = Vec::new();
    if let Some(storage) = storage {
        let uploader = UploadCoordinator::from_config(policies, config);
        for job in result.successful() {
            let outcome = match uploader.prepare_upload(job, owner, context, media_type) {
                Ok(request) => uploader.submit(&request, storage.as_ref()).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(receipt) => uploads.push(receipt),
                Err(e) => {
                    tracing::error!(index = job.index, error = %e, "Upload failed");
                    upload_errors.push(UploadFailure {
                        index: job.index,
                        retryable: e.is_retryable(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    print_json(&ProcessReport {
        summary: result.summary(),
        cancelled: result.cancelled,
        elapsed_ms: result.elapsed_ms,
        jobs: &result.jobs,
        failures: result.failures(),
        uploads,
        upload_errors,
    })
}
