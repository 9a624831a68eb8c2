//! Departments command handler.

use clap::Args;
use roleflow_core::{config::AppConfig, AppError, AppResult};
use roleflow_knowledge::index_store;

/// List departments with documents and whether their index is persisted
#[derive(Args, Debug)]
pub struct DepartmentsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DepartmentsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing departments command");

        let (store, _) = index_store(config)?;
        let departments = store.available_departments().await?;
        tracing::debug!("Found {} departments under {:?}", departments.len(), config.data_root());

        if self.json {
            let output: Vec<_> = departments
                .iter()
                .map(|d| serde_json::json!({ "department": d, "indexed": store.is_persisted(d) }))
                .collect();
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
            return Ok(());
        }

        if departments.is_empty() {
            println!("No departments with documents under {}", config.data_root().display());
            return Ok(());
        }

        for department in &departments {
            let status = if store.is_persisted(department) {
                "indexed"
            } else {
                "not indexed"
            };
            println!("{:<16} {}", department, status);
        }

        Ok(())
    }
}
