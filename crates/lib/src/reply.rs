//! Reply templates for structured matches and greetings.

use crate::knowledge::{Course, Faq};
use crate::matcher::NormalizedText;

const MAX_GREETING_COURSES: usize = 5;

/// Single-word greetings, matched as whole tokens.
const GREETING_WORDS: &[&str] = &[
    "hello", "hi", "hey", "hiya", "start", "salam", "assalam", "assalamualaikum", "namaste", "adaab",
];

/// Multi-word greetings, matched against the normalized text.
const GREETING_PHRASES: &[&str] = &["good morning", "good afternoon", "good evening"];

/// Reply when the knowledge store cannot be read.
pub const STORE_UNAVAILABLE_REPLY: &str = "Sorry, our course information is temporarily unavailable. Please try again in a few minutes.";

/// Reply for a matched FAQ.
pub fn format_faq_reply(faq: &Faq) -> String {
    format!("*{}*\n\n{}", faq.question.trim(), faq.answer.trim())
}

/// Reply for a matched course.
pub fn format_course_reply(course: &Course) -> String {
    format!(
        "*{}*\nPrice: ${:.2}\nDuration: {} weeks\nInstructor: {}\n\n{}\n\nReady to enroll? Just let me know!",
        course.title.trim(),
        course.price,
        course.duration_weeks,
        course.instructor.trim(),
        course.description.trim()
    )
}

/// True when the text contains a greeting word or phrase.
pub fn is_greeting(text: &str) -> bool {
    let text = NormalizedText::new(text);
    GREETING_WORDS.iter().any(|w| text.has_token(w))
        || GREETING_PHRASES.iter().any(|p| text.contains(p))
}

/// Welcome message listing the first few active courses.
pub fn format_greeting_reply(courses: &[Course]) -> String {
    let listing = if courses.is_empty() {
        "- Our catalog is being updated, check back soon.".to_string()
    } else {
        courses
            .iter()
            .filter(|c| c.is_active)
            .take(MAX_GREETING_COURSES)
            .map(|c| format!("- {}", c.title))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Welcome to our EdTech Learning Platform!\n\n*Available Courses:*\n{}\n\n\
         Ask me about course details, pricing and enrollment, prerequisites, or career guidance.",
        listing
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: i64, title: &str) -> Course {
        Course {
            id,
            title: title.to_string(),
            description: "Learn things.".to_string(),
            price: 299.9,
            duration_weeks: 8,
            instructor: "John Smith".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn course_reply_has_price_and_duration() {
        let reply = format_course_reply(&course(1, "Python Programming Fundamentals"));
        assert!(reply.starts_with("*Python Programming Fundamentals*"));
        assert!(reply.contains("Price: $299.90"));
        assert!(reply.contains("Duration: 8 weeks"));
        assert!(reply.contains("Instructor: John Smith"));
        assert!(reply.contains("Learn things."));
    }

    #[test]
    fn faq_reply_has_question_and_answer() {
        let faq = Faq {
            id: 1,
            question: "Do you provide certificates?".to_string(),
            answer: "Yes!".to_string(),
            keywords: vec![],
            course_id: None,
            is_active: true,
        };
        assert_eq!(format_faq_reply(&faq), "*Do you provide certificates?*\n\nYes!");
    }

    #[test]
    fn greetings_are_whole_words() {
        assert!(is_greeting("Hi!"));
        assert!(is_greeting("hello there"));
        assert!(is_greeting("Good Morning"));
        assert!(!is_greeting("this is nothing"));
        assert!(!is_greeting("which course"));
        assert!(!is_greeting("asdkfj random text"));
    }

    #[test]
    fn greeting_lists_at_most_five_courses() {
        let courses: Vec<Course> = (1..=7).map(|i| course(i, &format!("Course {}", i))).collect();
        let reply = format_greeting_reply(&courses);
        assert!(reply.contains("- Course 5"));
        assert!(!reply.contains("- Course 6"));
    }

    #[test]
    fn greeting_with_empty_catalog() {
        assert!(format_greeting_reply(&[]).contains("being updated"));
    }
}
