//! Serve command handler.
//!
//! Runs the HTTP host used by the login UI.

use crate::server::{self, AppState};
use clap::Args;
use roleflow_access::{CsvHrDirectory, TokenSigner};
use roleflow_core::{config::AppConfig, AppResult};
use roleflow_knowledge::VectorIndex;
use std::sync::Arc;

/// Run the HTTP server
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to bind (overrides server.bind)
    #[arg(short, long, env = "ROLEFLOW_BIND")]
    pub bind: Option<String>,

    /// Build every department index before accepting requests
    #[arg(long)]
    pub preload: bool,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing serve command");
        config.validate()?;

        let service = super::knowledge_service(config)?;
        let signer = TokenSigner::new(
            config.resolve_jwt_secret()?,
            chrono::Duration::hours(config.server.token_ttl_hours),
        )?;
        let directory = Arc::new(CsvHrDirectory::new(config.hr_records()));
        tracing::debug!("HR records: {:?}", directory.path());

        if self.preload {
            for department in service.store.available_departments().await? {
                match service.store.get_index(&department).await {
                    Some(index) => {
                        tracing::info!("Preloaded {} ({} passages)", department, index.len())
                    }
                    None => tracing::warn!("No usable index for {}", department),
                }
            }
        }

        let state = AppState {
            orchestrator: Arc::new(service.orchestrator),
            directory,
            signer,
        };
        let app = server::router(state, &config.server.cors_origins)?;
        let bind = self.bind.as_deref().unwrap_or(&config.server.bind);

        server::serve(bind, app).await
    }
}
