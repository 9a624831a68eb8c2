//! Identity and department access control for RoleFlow.
//!
//! This crate answers "who is asking, and which departments may they read":
//! - `Identity` / `ScopeSet` data types
//! - `ScopeResolver`: policy-table mapping from identity to scopes
//! - `HrDirectory`: login verification against the HR record store
//! - `TokenSigner`: HS256 bearer tokens carrying identity and scopes

pub mod directory;
pub mod identity;
pub mod scope;
pub mod token;

pub use directory::{CsvHrDirectory, EmployeeRecord, HrDirectory};
pub use identity::{Identity, ScopeSet};
pub use scope::ScopeResolver;
pub use token::{Claims, TokenSigner};
