//! HR record lookup used to verify logins.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use roleflow_core::{AppError, AppResult};

use crate::identity::Identity;

/// One row of the HR record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub employee_id: String,
    pub full_name: String,
    pub department: String,
    pub role: String,
    #[serde(default)]
    pub attendance_pct: Option<f64>,
    #[serde(default)]
    pub leave_balance: Option<f64>,
}

impl EmployeeRecord {
    pub fn identity(&self) -> Identity {
        Identity::new(
            self.employee_id.clone(),
            self.full_name.clone(),
            self.department.clone(),
            self.role.clone(),
        )
    }
}

/// Verifies a claimed (name, department) pair against the HR store.
pub trait HrDirectory: Send + Sync {
    /// Returns the matching record, `None` if no employee matches.
    fn verify(&self, full_name: &str, department: &str) -> AppResult<Option<EmployeeRecord>>;
}

/// `HrDirectory` backed by a CSV file with a header row.
///
/// The file is re-read on every lookup so edits to the HR export apply
/// without a restart.
#[derive(Debug, Clone)]
pub struct CsvHrDirectory {
    path: PathBuf,
}

impl CsvHrDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HrDirectory for CsvHrDirectory {
    fn verify(&self, full_name: &str, department: &str) -> AppResult<Option<EmployeeRecord>> {
        let name = full_name.trim().to_lowercase();
        let dept = department.trim().to_lowercase();

        // An unreadable store is a server fault, not a failed login
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| {
                AppError::Other(format!("Failed to open HR records {:?}: {}", self.path, e))
            })?;

        for (line, row) in reader.deserialize::<EmployeeRecord>().enumerate() {
            let record = match row {
                Ok(record) => record,
                Err(e) if e.is_io_error() => {
                    return Err(AppError::Other(format!(
                        "Failed to read HR records {:?}: {}",
                        self.path, e
                    )));
                }
                Err(e) => {
                    tracing::warn!("Skipping malformed HR record {}: {}", line + 1, e);
                    continue;
                }
            };

            if record.full_name.to_lowercase() == name && record.department.to_lowercase() == dept
            {
                tracing::debug!("Verified employee {}", record.employee_id);
                return Ok(Some(record));
            }
        }

        Ok(None)
    }
}
