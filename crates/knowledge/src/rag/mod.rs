//! Retrieval-augmented answering over department indexes.

pub mod ask;
pub mod attribution;
pub mod retrieval;
pub mod synthesis;
pub mod types;

pub use ask::{QueryOrchestrator, NO_ACCESSIBLE_DATA};
pub use attribution::{LexicalOverlapAttributor, ProbeHit, SimilarityProbe, SourceAttributor};
pub use retrieval::{Retrieval, RetrievalAggregator};
pub use synthesis::AnswerSynthesizer;
pub use types::{QueryResult, QueryStage, NO_INFORMATION_RESPONSE};
