use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use study_notes::api::{self, AppState};
use study_notes::config::ServerConfig;
use study_notes::gemini::{GeminiClient, GeminiConfig};
use study_notes::rag::RagEngine;
use study_notes::study::StudyService;

/// Turns uploaded PDFs into summaries, notes and flashcards
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Directory for uploads while they are processed
    #[arg(long, env = "UPLOAD_FOLDER", default_value = "uploads")]
    upload_dir: PathBuf,
}

#[actix_web::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig::new(args.host, args.port, args.upload_dir);
    config.ensure_upload_dir()?;

    let gemini_config = GeminiConfig::from_env()?;
    info!(
        "Using model {} with embeddings from {}",
        gemini_config.model, gemini_config.embedding_model
    );
    let gemini = Arc::new(GeminiClient::new(gemini_config));

    let rag_engine = RagEngine::new(gemini.clone(), gemini);
    let state = AppState::new(StudyService::new(rag_engine), &config);

    api::run(state, &config)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
