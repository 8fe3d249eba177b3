//! Concierge shared library - pure types and logic, no IO.
//!
//! Everything here is deterministic and synchronous so it can be exercised
//! directly from unit tests; the daemon crate supplies the network and
//! storage collaborators.

pub mod answer;
pub mod cache;
pub mod error;
pub mod knowledge;
pub mod messages;
pub mod reconcile;
pub mod retrieval;
pub mod retry;
pub mod types;

pub use answer::{parse_model_answer, ModelAnswer, NOT_FOUND_SENTINEL};
pub use cache::{Cache, MemoryCache, TieredCache};
pub use error::CoreError;
pub use knowledge::KnowledgeBase;
pub use reconcile::reconcile;
pub use retrieval::retrieve;
pub use retry::RetryPolicy;
pub use types::{ChatMessage, EvidenceRecord, Role, Source};
