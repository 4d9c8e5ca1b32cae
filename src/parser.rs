use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_NOTES: usize = 10;
pub const MAX_FLASHCARDS: usize = 8;

/// Notes shorter than this are treated as noise (headings, stray numbering)
const MIN_NOTE_CHARS: usize = 10;

/// A question/answer study card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub question: String,
    pub answer: String,
}

impl Flashcard {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Flashcard {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Turn a bulleted or numbered model reply into a list of notes
pub fn parse_notes(reply: &str) -> Vec<String> {
    reply
        .trim()
        .lines()
        .map(|line| strip_list_marker(line.trim()))
        .filter(|note| note.chars().count() > MIN_NOTE_CHARS)
        .map(str::to_string)
        .take(MAX_NOTES)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    line.trim_start_matches(|c: char| matches!(c, '•' | '-' | '*' | '.' | ' ') || c.is_ascii_digit())
}

/// Turn a `Q:` / `A:` formatted model reply into flashcards
///
/// An answer may continue over several lines. Cards missing either half are
/// dropped.
pub fn parse_flashcards(reply: &str) -> Vec<Flashcard> {
    let mut flashcards = Vec::new();
    let mut question = String::new();
    let mut answer = String::new();

    for line in reply.trim().lines() {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("Q:") {
            flush_card(&mut flashcards, &question, &answer);
            question = rest.trim().to_string();
            answer.clear();
        } else if let Some(rest) = line.strip_prefix("A:") {
            answer = rest.trim().to_string();
        } else if !line.is_empty() && !answer.is_empty() {
            answer.push(' ');
            answer.push_str(line);
        }
    }
    flush_card(&mut flashcards, &question, &answer);

    flashcards.truncate(MAX_FLASHCARDS);
    flashcards
}

fn flush_card(flashcards: &mut Vec<Flashcard>, question: &str, answer: &str) {
    if !question.is_empty() && !answer.is_empty() {
        flashcards.push(Flashcard::new(question, answer));
    }
}
