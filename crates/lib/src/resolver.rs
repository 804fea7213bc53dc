//! Message resolution: knowledge lookup, intent match, reply formatting, fallback, dispatch.
//!
//! This is the only layer that performs I/O. The knowledge snapshot is fully loaded (and its
//! pool connection returned) before any completion or send call starts.

use serde::Serialize;
use std::sync::Arc;

use crate::channels::{DispatchError, ReplyDispatcher};
use crate::fallback::FallbackResponder;
use crate::knowledge::{KnowledgeSnapshot, KnowledgeStore};
use crate::matcher::{match_intent, MatchResult};
use crate::reply::{self, STORE_UNAVAILABLE_REPLY};
use crate::webhook::IncomingMessage;

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReplySource {
    Faq { id: i64 },
    Course { id: i64 },
    Greeting,
    Fallback,
    StoreUnavailable,
}

/// A resolved reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub reply: String,
    pub source: ReplySource,
}

/// Resolves messages against the knowledge store, falling back to generation.
pub struct Resolver {
    store: Arc<dyn KnowledgeStore>,
    fallback: FallbackResponder,
}

impl Resolver {
    pub fn new(store: Arc<dyn KnowledgeStore>, fallback: FallbackResponder) -> Self {
        Self { store, fallback }
    }

    pub fn fallback(&self) -> &FallbackResponder {
        &self.fallback
    }

    /// Resolve one message text to a reply. Never fails; store and completion failures
    /// become static replies.
    pub async fn resolve(&self, text: &str) -> Resolution {
        let snapshot = match self.store.snapshot().await {
            Ok(s) => s,
            Err(e) => {
                log::error!("resolver: knowledge store unavailable: {}", e);
                return Resolution {
                    reply: STORE_UNAVAILABLE_REPLY.to_string(),
                    source: ReplySource::StoreUnavailable,
                };
            }
        };
        self.resolve_with(text, &snapshot).await
    }

    /// Resolve against an already loaded snapshot.
    pub async fn resolve_with(&self, text: &str, snapshot: &KnowledgeSnapshot) -> Resolution {
        match match_intent(text, &snapshot.faqs, &snapshot.courses) {
            MatchResult::FaqMatch { faq, score } => {
                log::info!("resolver: faq {} matched (score {})", faq.id, score);
                Resolution {
                    reply: reply::format_faq_reply(&faq),
                    source: ReplySource::Faq { id: faq.id },
                }
            }
            MatchResult::CourseMatch { course, score } => {
                log::info!("resolver: course {} matched (score {})", course.id, score);
                Resolution {
                    reply: reply::format_course_reply(&course),
                    source: ReplySource::Course { id: course.id },
                }
            }
            MatchResult::NoMatch if reply::is_greeting(text) => {
                log::info!("resolver: greeting");
                Resolution {
                    reply: reply::format_greeting_reply(&snapshot.courses),
                    source: ReplySource::Greeting,
                }
            }
            MatchResult::NoMatch => {
                log::info!("resolver: no match, using {} fallback", self.fallback.backend_name());
                Resolution {
                    reply: self.fallback.respond(text, snapshot).await,
                    source: ReplySource::Fallback,
                }
            }
        }
    }

    /// Resolve an inbound message and deliver the reply to its sender.
    pub async fn handle(
        &self,
        msg: &IncomingMessage,
        dispatcher: &dyn ReplyDispatcher,
    ) -> Result<Resolution, DispatchError> {
        log::info!(
            "resolver: message {} from {} ({} chars)",
            msg.message_id.as_deref().unwrap_or("-"),
            msg.sender_id,
            msg.raw_text.len()
        );
        let resolution = self.resolve(&msg.raw_text).await;
        dispatcher.send_text(&msg.sender_id, &resolution.reply).await?;
        log::info!("resolver: reply sent to {} via {}", msg.sender_id, dispatcher.id());
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::{FALLBACK_REPLY, UNCONFIGURED_REPLY};
    use crate::knowledge::{parse_keywords, Course, Faq, KnowledgeCounts, StoreError};
    use crate::llm::{ChatMessage, ChatOptions, LlmBackend, LlmError};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FixedStore {
        snapshot: Option<KnowledgeSnapshot>,
    }

    #[async_trait]
    impl KnowledgeStore for FixedStore {
        async fn active_courses(&self) -> Result<Vec<Course>, StoreError> {
            self.snapshot
                .as_ref()
                .map(|s| s.courses.clone())
                .ok_or(StoreError::Unavailable(sqlx::Error::PoolTimedOut))
        }

        async fn active_faqs(&self) -> Result<Vec<Faq>, StoreError> {
            self.snapshot
                .as_ref()
                .map(|s| s.faqs.clone())
                .ok_or(StoreError::Unavailable(sqlx::Error::PoolTimedOut))
        }

        async fn counts(&self) -> Result<KnowledgeCounts, StoreError> {
            let s = self
                .snapshot
                .as_ref()
                .ok_or(StoreError::Unavailable(sqlx::Error::PoolTimedOut))?;
            Ok(KnowledgeCounts {
                courses: s.courses.len() as u64,
                faqs: s.faqs.len() as u64,
            })
        }
    }

    struct UnreachableBackend;

    #[async_trait]
    impl LlmBackend for UnreachableBackend {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn chat(&self, _: &str, _: Vec<ChatMessage>, _: ChatOptions) -> Result<String, LlmError> {
            Err(LlmError::Api("connection refused".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ReplyDispatcher for RecordingDispatcher {
        fn id(&self) -> &str {
            "recording"
        }

        async fn send_text(&self, recipient: &str, text: &str) -> Result<(), DispatchError> {
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn catalog() -> KnowledgeSnapshot {
        let course = |id: i64, title: &str, price: f64| Course {
            id,
            title: title.to_string(),
            description: format!("All about {}.", title),
            price,
            duration_weeks: 8,
            instructor: "John Smith".to_string(),
            is_active: true,
        };
        let faq = |id: i64, q: &str, a: &str, k: &str| Faq {
            id,
            question: q.to_string(),
            answer: a.to_string(),
            keywords: parse_keywords(k),
            course_id: None,
            is_active: true,
        };
        KnowledgeSnapshot::new(
            vec![
                course(1, "Python Programming Fundamentals", 299.99),
                course(2, "Java Development Bootcamp", 399.99),
            ],
            vec![
                faq(1, "What programming courses do you offer?", "We offer Python and Java.", "courses, programming, languages, available"),
                faq(6, "How much does the Python course cost?", "It costs $299.99.", "python, price, cost, fee"),
            ],
        )
    }

    fn resolver(snapshot: Option<KnowledgeSnapshot>, backend: Option<Arc<dyn LlmBackend>>) -> Resolver {
        Resolver::new(
            Arc::new(FixedStore { snapshot }),
            FallbackResponder::new(backend, "m", ChatOptions::default(), Duration::from_secs(1)),
        )
    }

    #[tokio::test]
    async fn faq_match_replies_with_answer() {
        let r = resolver(Some(catalog()), None);
        let res = r.resolve("What courses do you offer?").await;
        assert_eq!(res.source, ReplySource::Faq { id: 1 });
        assert!(res.reply.contains("We offer Python and Java."));
    }

    #[tokio::test]
    async fn python_price_prefers_specific_faq() {
        let r = resolver(Some(catalog()), None);
        let res = r.resolve("How much does Python course cost?").await;
        assert_eq!(res.source, ReplySource::Faq { id: 6 });
        assert!(res.reply.contains("It costs $299.99."));
    }

    #[tokio::test]
    async fn course_match_replies_with_details() {
        let r = resolver(Some(catalog()), None);
        let res = r.resolve("what's the fee for java?").await;
        assert_eq!(res.source, ReplySource::Course { id: 2 });
        assert!(res.reply.contains("$399.99"));
    }

    #[tokio::test]
    async fn no_match_with_unreachable_backend_is_static_fallback() {
        let r = resolver(Some(catalog()), Some(Arc::new(UnreachableBackend)));
        let res = r.resolve("asdkfj random text").await;
        assert_eq!(res.source, ReplySource::Fallback);
        assert_eq!(res.reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn no_match_without_backend_is_unconfigured_reply() {
        let r = resolver(Some(catalog()), None);
        let res = r.resolve("asdkfj random text").await;
        assert_eq!(res.reply, UNCONFIGURED_REPLY);
    }

    #[tokio::test]
    async fn greeting_lists_courses() {
        let r = resolver(Some(catalog()), None);
        let res = r.resolve("hello!").await;
        assert_eq!(res.source, ReplySource::Greeting);
        assert!(res.reply.contains("- Python Programming Fundamentals"));
    }

    #[tokio::test]
    async fn greeting_does_not_hide_a_match() {
        let r = resolver(Some(catalog()), None);
        let res = r.resolve("hi, how much does python cost").await;
        assert_eq!(res.source, ReplySource::Faq { id: 6 });
    }

    #[tokio::test]
    async fn store_failure_is_a_static_reply() {
        let r = resolver(None, None);
        let res = r.resolve("What courses do you offer?").await;
        assert_eq!(res.source, ReplySource::StoreUnavailable);
        assert_eq!(res.reply, STORE_UNAVAILABLE_REPLY);
    }

    #[tokio::test]
    async fn handle_dispatches_to_sender() {
        let r = resolver(Some(catalog()), None);
        let dispatcher = RecordingDispatcher::default();
        let msg = IncomingMessage {
            sender_id: "15551234567".to_string(),
            raw_text: "What courses do you offer?".to_string(),
            received_at: Utc::now(),
            message_id: Some("wamid.1".to_string()),
        };
        let res = r.handle(&msg, &dispatcher).await.unwrap();
        let sent = dispatcher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "15551234567");
        assert_eq!(sent[0].1, res.reply);
    }

    #[test]
    fn source_serializes_with_kind_tag() {
        let v = serde_json::to_value(ReplySource::Faq { id: 3 }).unwrap();
        assert_eq!(v, serde_json::json!({ "kind": "faq", "id": 3 }));
        let v = serde_json::to_value(ReplySource::StoreUnavailable).unwrap();
        assert_eq!(v, serde_json::json!({ "kind": "storeUnavailable" }));
    }
}
