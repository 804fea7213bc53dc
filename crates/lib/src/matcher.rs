//! Intent matching: score a message against FAQ keywords and course titles.
//!
//! Pure and deterministic. Given the same snapshot and text the result is always the same,
//! so the matcher is tested without a store.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::knowledge::{Course, Faq};

/// Minimum score for a candidate to count as a match.
pub const MIN_SCORE: u32 = 1;

/// Score for a course whose title words appear in the text.
const COURSE_TITLE_SCORE: u32 = 1;

/// Extra score for a course hit when the text also asks about price.
const COURSE_PRICE_BONUS: u32 = 1;

/// Title words that say nothing about which course is meant.
const GENERIC_TITLE_WORDS: &[&str] = &[
    "a", "an", "and", "the", "of", "for", "to", "in", "with", "on", "course", "courses",
    "programming", "development", "fundamentals", "bootcamp", "introduction", "intro",
    "masterclass", "basics", "complete", "advanced", "beginner", "beginners",
];

/// Phrases that mark a question about price.
const PRICE_CUES: &[&str] = &[
    "price", "cost", "fee", "how much", "tuition", "pay", "expensive", "cheap", "afford",
];

/// Outcome of matching one message.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    FaqMatch { faq: Faq, score: u32 },
    CourseMatch { course: Course, score: u32 },
    NoMatch,
}

impl MatchResult {
    pub fn score(&self) -> u32 {
        match self {
            MatchResult::FaqMatch { score, .. } | MatchResult::CourseMatch { score, .. } => *score,
            MatchResult::NoMatch => 0,
        }
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, MatchResult::NoMatch)
    }
}

/// Lowercase, replace every non-alphanumeric run with one space, trim.
pub fn normalize(text: &str) -> String {
    tokenize(text).collect::<Vec<_>>().join(" ")
}

/// Lowercase alphanumeric words of `text`, in order.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// A message prepared for scoring.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    text: String,
    tokens: BTreeSet<String>,
}

impl NormalizedText {
    pub fn new(raw: &str) -> Self {
        let tokens: Vec<String> = tokenize(raw).collect();
        Self {
            text: tokens.join(" "),
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// Substring containment over the normalized text; `phrase` must already be normalized.
    pub fn contains(&self, phrase: &str) -> bool {
        !phrase.is_empty() && self.text.contains(phrase)
    }
}

/// Number of the FAQ's keyword phrases contained in the text.
pub fn score_faq(text: &NormalizedText, faq: &Faq) -> u32 {
    faq.keywords
        .iter()
        .map(|k| normalize(k))
        .filter(|k| text.contains(k))
        .count() as u32
}

/// Words of a course title that identify it (e.g. "python", "react").
pub fn significant_title_words(title: &str) -> Vec<String> {
    tokenize(title)
        .filter(|w| !GENERIC_TITLE_WORDS.contains(&w.as_str()))
        .collect()
}

/// True when the text asks about price. Single-word cues must be whole tokens
/// ("fee" does not match "feedback"); multi-word cues match as phrases.
pub fn has_price_cue(text: &NormalizedText) -> bool {
    PRICE_CUES.iter().any(|cue| {
        if cue.contains(' ') {
            text.contains(cue)
        } else {
            text.has_token(cue)
        }
    })
}

/// Title hit scores 1, plus a bonus when the text also asks about price. No title hit scores 0.
pub fn score_course(text: &NormalizedText, course: &Course) -> u32 {
    let title_hit = significant_title_words(&course.title)
        .iter()
        .any(|w| text.has_token(w));
    if !title_hit {
        return 0;
    }
    if has_price_cue(text) {
        COURSE_TITLE_SCORE + COURSE_PRICE_BONUS
    } else {
        COURSE_TITLE_SCORE
    }
}

/// Candidate ranking key: higher score first, then FAQ before course, then lower id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rank {
    score: u32,
    is_faq: bool,
    id: i64,
}

impl Rank {
    /// `Greater` means `self` is the better candidate.
    fn cmp_preference(&self, other: &Rank) -> Ordering {
        self.score
            .cmp(&other.score)
            .then(self.is_faq.cmp(&other.is_faq))
            .then(other.id.cmp(&self.id))
    }
}

/// Pick the best active FAQ or course for `text`, or `NoMatch` when nothing scores at least [`MIN_SCORE`].
pub fn match_intent(text: &str, faqs: &[Faq], courses: &[Course]) -> MatchResult {
    let text = NormalizedText::new(text);
    if text.is_empty() {
        return MatchResult::NoMatch;
    }

    let mut best_faq: Option<(Rank, &Faq)> = None;
    for faq in faqs.iter().filter(|f| f.is_active) {
        let rank = Rank {
            score: score_faq(&text, faq),
            is_faq: true,
            id: faq.id,
        };
        if rank.score < MIN_SCORE {
            continue;
        }
        if best_faq.map_or(true, |(b, _)| rank.cmp_preference(&b) == Ordering::Greater) {
            best_faq = Some((rank, faq));
        }
    }

    let mut best_course: Option<(Rank, &Course)> = None;
    for course in courses.iter().filter(|c| c.is_active) {
        let rank = Rank {
            score: score_course(&text, course),
            is_faq: false,
            id: course.id,
        };
        if rank.score < MIN_SCORE {
            continue;
        }
        if best_course.map_or(true, |(b, _)| rank.cmp_preference(&b) == Ordering::Greater) {
            best_course = Some((rank, course));
        }
    }

    match (best_faq, best_course) {
        (Some((fr, faq)), Some((cr, course))) => {
            if fr.cmp_preference(&cr) == Ordering::Greater {
                MatchResult::FaqMatch { faq: faq.clone(), score: fr.score }
            } else {
                MatchResult::CourseMatch { course: course.clone(), score: cr.score }
            }
        }
        (Some((fr, faq)), None) => MatchResult::FaqMatch { faq: faq.clone(), score: fr.score },
        (None, Some((cr, course))) => MatchResult::CourseMatch { course: course.clone(), score: cr.score },
        (None, None) => MatchResult::NoMatch,
    }
}
