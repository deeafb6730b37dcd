mod db;
pub mod error;
pub mod materialize;
pub mod models;
pub mod prediction;
pub mod schema;
pub mod session;
pub mod settings;
pub mod submissions;
pub mod upload;
mod utils;

use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use db::Database;
use log::{info, warn};
use prediction::{LinearPipeline, PredictionAdapter, Scorer};
use session::{MemorySessionStore, SessionId, SessionStore, SqliteSessionStore};
use settings::AppConfig;
use submissions::{PageResponse, SubmissionController, SubmitResponse};
use upload::UploadedFile;

pub use error::{ErrorKind, SubmissionError};

/// Process-wide state shared by every request handler.
///
/// The scorer inside is loaded once and only read afterwards.
pub struct AppState {
    pub config: AppConfig,
    pub(crate) submissions: SubmissionController,
}

impl AppState {
    /// Load the pipeline artifact named in the config and open the session store.
    pub fn bootstrap(config: AppConfig) -> Result<Self> {
        let pipeline = LinearPipeline::load(&config.model_path)?;
        Self::with_scorer(config, Arc::new(pipeline))
    }

    pub fn with_scorer(config: AppConfig, scorer: Arc<dyn Scorer>) -> Result<Self> {
        let adapter = PredictionAdapter::new(scorer).context("scorer is incompatible")?;

        let store: Arc<dyn SessionStore> = match &config.session_db_path {
            Some(path) => {
                let database = Database::new(path.clone())?;
                Arc::new(SqliteSessionStore::new(database, config.session_ttl_secs))
            }
            None => Arc::new(MemorySessionStore::new(config.session_ttl_secs)),
        };

        let submissions = SubmissionController::new(adapter, store, config.upload_limits());
        Ok(Self {
            config,
            submissions,
        })
    }

    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        self.submissions.store()
    }
}

fn init_logging(debug: bool) {
    // Reads RUST_LOG; falls back to info (debug when STRESS_GAUGE_DEBUG is set).
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

/// Score a CSV file the way a browser session would: upload, then download.
pub async fn score_file(state: &AppState, input: &Path, output: &Path) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let filename = input
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let file = UploadedFile::new(filename, bytes);
    let session = SessionId::generate();

    match submissions::submit_upload(state, &session, Some(&file)).await {
        SubmitResponse::Redirect { .. } => {}
        SubmitResponse::Error(payload) => bail!("{}", payload.message),
        SubmitResponse::Prediction(_) => bail!("unexpected single prediction for a file upload"),
    }

    let PageResponse::Render(view) = submissions::view_results(state, &session).await else {
        bail!("results for session {session} are no longer available");
    };
    let PageResponse::Render(download) = submissions::download_results(state, &session).await
    else {
        bail!("download for session {session} is no longer available");
    };

    fs::write(output, &download.bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    state.session_store().clear(&session).await?;

    info!("Wrote {} rows to {}", view.summary.total, output.display());
    println!("{}", serde_json::to_string_pretty(&view.summary)?);
    Ok(())
}

pub fn run() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(config.debug);

    info!("Stress Gauge starting up...");

    let mut args = env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        bail!("usage: stress-gauge <input.csv> [output.csv]");
    };
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(materialize::DOWNLOAD_FILENAME));

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async move {
        let state = AppState::bootstrap(config)?;

        // Drop payloads left behind by earlier runs.
        match state.session_store().purge_expired().await {
            Ok(0) => {}
            Ok(purged) => info!("Purged {purged} expired session payloads"),
            Err(err) => warn!("Failed to purge expired session payloads: {err:#}"),
        }

        score_file(&state, &input, &output).await
    })
}
