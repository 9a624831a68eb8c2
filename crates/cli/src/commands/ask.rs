//! Ask command handler.
//!
//! Verifies an employee against the HR records and answers one question
//! within that employee's department scope.

use clap::Args;
use roleflow_access::{CsvHrDirectory, HrDirectory};
use roleflow_core::{config::AppConfig, AppError, AppResult};

/// Ask a question as a verified employee
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: String,

    /// Employee full name, as in the HR records
    #[arg(short = 'n', long)]
    pub name: String,

    /// Employee department, as in the HR records
    #[arg(short, long)]
    pub department: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let directory = CsvHrDirectory::new(config.hr_records());
        let record = directory
            .verify(&self.name, &self.department)?
            .ok_or_else(|| {
                AppError::Authentication(format!(
                    "No employee named '{}' in department '{}'",
                    self.name, self.department
                ))
            })?;
        let identity = record.identity();

        let service = super::knowledge_service(config)?;
        let scopes = service.orchestrator.resolver().resolve(&identity);
        tracing::debug!(
            "{} may read: {}",
            identity.employee_id,
            scopes.as_slice().join(", ")
        );

        let result = service.orchestrator.answer(&identity, &self.query).await?;

        if self.json {
            let output = serde_json::json!({
                "employeeId": identity.employee_id,
                "departments": scopes,
                "response": result.response,
                "sources": result.sources,
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            println!("{}", result.response);
            if !result.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &result.sources {
                    println!("  - {}", source);
                }
            }
        }

        Ok(())
    }
}
