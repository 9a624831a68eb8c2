//! Refresh command handler.

use clap::Args;
use roleflow_core::{config::AppConfig, AppError, AppResult};
use roleflow_knowledge::{index_store, VectorIndex};

/// Rebuild department indexes from the source documents
#[derive(Args, Debug)]
pub struct RefreshCommand {
    /// Departments to rebuild
    #[arg(required_unless_present = "all")]
    pub departments: Vec<String>,

    /// Rebuild every department that has documents
    #[arg(long, conflicts_with = "departments")]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RefreshCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing refresh command");

        let (store, _) = index_store(config)?;
        let departments = if self.all {
            store.available_departments().await?
        } else {
            self.departments.clone()
        };

        let mut rebuilt = Vec::new();
        let mut failures = 0;
        for department in &departments {
            let passages = match store.refresh(department).await {
                Ok(Some(index)) => Some(index.len()),
                Ok(None) => None,
                Err(e) => {
                    tracing::error!("{}", e);
                    failures += 1;
                    continue;
                }
            };

            if !self.json {
                match passages {
                    Some(count) => println!("Rebuilt {} ({} passages)", department, count),
                    None => println!("No documents for {}", department),
                }
            }
            rebuilt.push(serde_json::json!({
                "department": department,
                "passages": passages,
            }));
        }

        if self.json {
            let json = serde_json::to_string_pretty(&rebuilt)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        }

        if failures > 0 {
            return Err(AppError::Knowledge(format!(
                "{} of {} departments failed to rebuild",
                failures,
                departments.len()
            )));
        }

        Ok(())
    }
}
