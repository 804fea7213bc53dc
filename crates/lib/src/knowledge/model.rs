//! Course and FAQ records as read from the store.

use serde::{Deserialize, Serialize};

use crate::matcher::normalize;

/// A course in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Price in dollars; never negative (enforced by the schema).
    pub price: f64,
    pub duration_weeks: u32,
    pub instructor: String,
    pub is_active: bool,
}

/// A canned question/answer pair with the keywords that select it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Faq {
    pub id: i64,
    pub question: String,
    pub answer: String,
    /// Normalized keyword phrases, in stored order.
    pub keywords: Vec<String>,
    /// Course this FAQ is about, if any. Lookup only.
    pub course_id: Option<i64>,
    pub is_active: bool,
}

/// Split a stored comma-separated keyword column into normalized phrases.
/// Empty phrases are dropped; order is kept.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(normalize)
        .filter(|k| !k.is_empty())
        .collect()
}

/// Active courses and FAQs loaded for one resolution.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeSnapshot {
    pub courses: Vec<Course>,
    pub faqs: Vec<Faq>,
}

impl KnowledgeSnapshot {
    pub fn new(courses: Vec<Course>, faqs: Vec<Faq>) -> Self {
        Self { courses, faqs }
    }
}
