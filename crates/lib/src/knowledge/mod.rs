//! Knowledge base: courses and FAQs.
//!
//! Rows are owned by the relational store and read per resolution; the core never writes
//! them except through the explicit seeding command.

mod model;
mod sqlite;
mod store;

pub use model::{parse_keywords, Course, Faq, KnowledgeSnapshot};
pub use sqlite::{run_migrations, SqliteKnowledgeStore};
pub use store::{KnowledgeCounts, KnowledgeStore, StoreError};
