//! Query pipeline types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Answer returned when no authorized passage matched the query.
pub const NO_INFORMATION_RESPONSE: &str = "No relevant information found in accessible documents.";

/// Answer to one query plus the source files cited for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Natural language answer from the LLM, or the no-information sentinel
    pub response: String,

    /// Ordered, duplicate-free source file names
    pub sources: Vec<String>,
}

impl QueryResult {
    pub fn new(response: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            response: response.into(),
            sources,
        }
    }

    /// The "searched and found nothing" outcome.
    pub fn no_information() -> Self {
        Self::new(NO_INFORMATION_RESPONSE, Vec::new())
    }

    pub fn is_no_information(&self) -> bool {
        self.response == NO_INFORMATION_RESPONSE && self.sources.is_empty()
    }
}

/// Stages of a single query, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Resolving,
    Retrieving,
    Synthesizing,
    Attributing,
    Done,
    Errored,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::Retrieving => "retrieving",
            Self::Synthesizing => "synthesizing",
            Self::Attributing => "attributing",
            Self::Done => "done",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}
