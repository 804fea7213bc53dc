//! Read-only knowledge store seam.

use async_trait::async_trait;

use crate::knowledge::model::{Course, Faq, KnowledgeSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Unavailable(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid knowledge row: {0}")]
    InvalidRow(String),
}

/// Row counts reported by the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KnowledgeCounts {
    pub courses: u64,
    pub faqs: u64,
}

/// Read access to the course catalog and FAQ set.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Courses with `is_active = true`, ordered by id.
    async fn active_courses(&self) -> Result<Vec<Course>, StoreError>;

    /// FAQs with `is_active = true`, ordered by id.
    async fn active_faqs(&self) -> Result<Vec<Faq>, StoreError>;

    /// Active row counts. Also serves as the reachability probe.
    async fn counts(&self) -> Result<KnowledgeCounts, StoreError>;

    /// Load both sets. Implementations must not keep a connection checked out after returning.
    async fn snapshot(&self) -> Result<KnowledgeSnapshot, StoreError> {
        let courses = self.active_courses().await?;
        let faqs = self.active_faqs().await?;
        Ok(KnowledgeSnapshot::new(courses, faqs))
    }
}
