//! Emojitiler CLI - command-line driver for the generation pipeline.
//!
//! Runs one emoji-pack generation job against the remote platform from a
//! local media file, or sweeps expired job working directories.

use clap::{Parser, Subcommand};
use emojitiler::config::{RetentionConfig, TilingConfig, TransportConfig, UploadConfig};
use emojitiler::job::workspace::WorkspaceRegistry;
use emojitiler::logging::init_logging;
use emojitiler::media::{FfmpegTranscoder, FfprobeProber};
use emojitiler::pipeline::{parse_args, run_generation, GenerationRequest, PipelineContext};
use emojitiler::platform::PlatformClient;
use emojitiler::retrieval::LocalFileRetrieval;
use emojitiler::storage::InMemoryPackStorage;
use emojitiler::transport::RateLimitedTransport;
use std::process;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "emojitiler")]
#[command(version = emojitiler::VERSION)]
#[command(about = "Generate custom emoji packs from video, images and GIFs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an emoji pack from a local media file
    Generate {
        /// Source media file (mp4, webm, gif, jpeg, png, webp)
        #[arg(long)]
        file: String,

        /// Generation arguments, e.g. "w=4 b=black t=[My Pack]"
        #[arg(long, default_value = "")]
        args: String,

        /// Platform API base URL
        #[arg(long, default_value = "https://api.platform.example")]
        api_base: String,

        /// Bot credential token
        #[arg(long, env = "EMOJITILER_TOKEN")]
        token: String,

        /// Chat to post the progress message in
        #[arg(long)]
        chat: i64,

        /// Acting user id (pack owner and cancel authority)
        #[arg(long)]
        user: i64,

        /// Workspace root for job working directories
        #[arg(long, default_value = "workspace")]
        work_dir: String,
    },

    /// Remove job working directories older than the retention window
    Purge {
        /// Workspace root for job working directories
        #[arg(long, default_value = "workspace")]
        work_dir: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _guard = match init_logging("logs", "emojitiler.log") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Generate {
            file,
            args,
            api_base,
            token,
            chat,
            user,
            work_dir,
        } => generate(file, args, api_base, token, chat, user, work_dir).await,
        Commands::Purge { work_dir } => purge(work_dir),
    };

    if let Err(message) = result {
        eprintln!("Error: {message}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
async fn generate(
    file: String,
    args: String,
    api_base: String,
    token: String,
    chat: i64,
    user: i64,
    work_dir: String,
) -> Result<(), String> {
    let job = parse_args(&args).map_err(|e| e.to_string())?;

    let transport = Arc::new(RateLimitedTransport::new(TransportConfig::default()));
    let client =
        PlatformClient::new(api_base, token, transport).map_err(|e| e.to_string())?;
    let workspace = WorkspaceRegistry::new(&work_dir, RetentionConfig::default())
        .map_err(|e| e.to_string())?;

    let ctx = PipelineContext::new(
        Arc::new(FfprobeProber::new()),
        Arc::new(FfmpegTranscoder::new()),
        Arc::new(client.clone()),
        client,
        LocalFileRetrieval,
        InMemoryPackStorage::new(),
        workspace,
        TilingConfig::default(),
        UploadConfig::default(),
    );

    let request = GenerationRequest {
        chat,
        reply_to: None,
        initiator: user,
        attachment: file,
    };

    let outcome = run_generation(&ctx, job, request)
        .await
        .map_err(|e| e.to_string())?;

    info!(
        pack = %outcome.pack_link,
        members = outcome.total_members,
        "generation finished"
    );
    println!(
        "Pack {} now has {} members ({} new assets{})",
        outcome.pack_link,
        outcome.total_members,
        outcome.assets.len(),
        if outcome.created_new { ", created" } else { "" },
    );
    Ok(())
}

fn purge(work_dir: String) -> Result<(), String> {
    let workspace = WorkspaceRegistry::new(&work_dir, RetentionConfig::default())
        .map_err(|e| e.to_string())?;
    let removed = workspace.purge_expired();
    println!("Removed {removed} expired working directories");
    Ok(())
}
