// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Removal of per-turn steering text and extraction of safe facts.
//!
//! One-off instructions (`[Instruction For This Turn Only]: ...`, OOC lines)
//! must never reach long-term memory. Everything stored or replayed passes
//! through [`strip_ephemeral`] first.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Minimum fact length in characters.
pub const MIN_FACT_CHARS: usize = 12;
/// Maximum fact length in characters.
pub const MAX_FACT_CHARS: usize = 180;
/// Default cap on facts per turn.
pub const DEFAULT_MAX_FACTS: usize = 8;

/// `[... Instruction ...]` or `[... System Note ...]` header, the rest of its
/// line, and every following non-blank line.
static INSTRUCTION_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[[^\]\n]*(?:instruction|system note)[^\]\n]*\][^\n]*(?:\n[ \t]*\S[^\n]*)*")
        .unwrap()
});

/// Lines opening with a transient directive marker.
static DIRECTIVE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:\(\(|ooc\s*:|\[ooc\]|/ooc\b).*(?:\n|$)").unwrap()
});

static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*){2,}").unwrap());

static ROLE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:user|model|assistant|system)[ \t]*:[ \t]*").unwrap()
});

static SENTENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^.!?؟۔]+[.!?؟۔]*").unwrap());

static STARTS_WITH_ROLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:user|model|assistant|system)\s*:").unwrap());

/// Vocabulary marking a sentence as transient instruction text.
const TRANSIENT_VOCABULARY: &[&str] = &[
    "instruction",
    "system note",
    "this turn only",
    "for this turn",
    "ooc",
];

/// Strip instruction blocks and directive lines, then collapse blank runs.
///
/// Speaker labels are left in place.
pub fn strip_ephemeral(text: &str) -> String {
    let text = INSTRUCTION_BLOCK.replace_all(text, "");
    let text = DIRECTIVE_LINE.replace_all(&text, "");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Remove `User:` / `Model:` / `Assistant:` / `System:` at the start of each line.
pub fn strip_role_prefixes(text: &str) -> String {
    ROLE_PREFIX.replace_all(text, "").trim().to_string()
}

/// Full pipeline used before enrichment and fact extraction.
pub fn sanitize(text: &str) -> String {
    strip_role_prefixes(&strip_ephemeral(text))
}

/// Extract short factual sentences, earlier sources first.
///
/// Sources are typically `[summary, sanitized_turn]`. Sentences are split on
/// Latin and Arabic terminators, kept when 12-180 characters long, and
/// deduplicated case-insensitively.
pub fn extract_facts(sources: &[&str], max_facts: usize) -> Vec<String> {
    let mut facts = Vec::new();
    let mut seen = HashSet::new();

    for source in sources {
        let cleaned = sanitize(source);
        for m in SENTENCE.find_iter(&cleaned) {
            if facts.len() >= max_facts {
                return facts;
            }
            let sentence = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            if !is_fact_candidate(&sentence) {
                continue;
            }
            if seen.insert(sentence.to_lowercase()) {
                facts.push(sentence);
            }
        }
    }
    facts
}

fn is_fact_candidate(sentence: &str) -> bool {
    let len = sentence.chars().count();
    if !(MIN_FACT_CHARS..=MAX_FACT_CHARS).contains(&len) {
        return false;
    }
    if is_bracketed(sentence) || STARTS_WITH_ROLE.is_match(sentence) {
        return false;
    }
    let lower = sentence.to_lowercase();
    !TRANSIENT_VOCABULARY.iter().any(|word| lower.contains(word))
}

fn is_bracketed(sentence: &str) -> bool {
    let body = sentence.trim_end_matches(['.', '!', '?', '؟', '۔']);
    (body.starts_with('[') && body.ends_with(']')) || (body.starts_with('(') && body.ends_with(')'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_block_is_removed_up_to_blank_line() {
        let raw = "[Instruction For This Turn Only]: do X\nand also Y\n\nActual content here.";
        let cleaned = strip_ephemeral(raw);
        assert_eq!(cleaned, "Actual content here.");
    }

    #[test]
    fn system_note_inside_labeled_line() {
        let raw = "User: [System Note: be terse] keep it short\n\nThe dragon sleeps.";
        let cleaned = strip_ephemeral(raw);
        assert!(!cleaned.contains("terse"));
        assert!(cleaned.starts_with("User:"));
        assert!(cleaned.contains("The dragon sleeps."));
    }

    #[test]
    fn directive_lines_and_blank_runs() {
        let raw = "Line one.\n((OOC: brb))\nOOC: also this\n[OOC] and this\n/ooc last\n\n\n\nLine two.";
        assert_eq!(strip_ephemeral(raw), "Line one.\n\nLine two.");
    }

    #[test]
    fn role_prefixes_are_stripped_per_line() {
        let text = "User: hi there\nModel:  hello\n  assistant : ok";
        assert_eq!(strip_role_prefixes(text), "hi there\nhello\nok");
    }

    #[test]
    fn facts_prefer_summary_and_dedupe() {
        let facts = extract_facts(
            &[
                "Aria found the silver key.",
                "User: Aria found the silver key. She hides it under the floorboard!",
            ],
            DEFAULT_MAX_FACTS,
        );
        assert_eq!(
            facts,
            vec!["Aria found the silver key.", "She hides it under the floorboard!"]
        );
    }

    #[test]
    fn facts_skip_short_long_bracketed_and_transient() {
        let long = format!("{}.", "word ".repeat(50));
        let text = format!(
            "Too short. [An aside in brackets here]. (Another parenthetical aside). \
             Remember this for this turn only please. {long} The harbor smells of salt."
        );
        assert_eq!(
            extract_facts(&[&text], DEFAULT_MAX_FACTS),
            vec!["The harbor smells of salt."]
        );
    }

    #[test]
    fn arabic_terminators_split_sentences() {
        let facts = extract_facts(&["هذه جملة عربية طويلة؟ وهذه جملة ثانية أيضا۔"], 8);
        assert_eq!(facts.len(), 2);
    }

    #[test]
    fn facts_are_capped() {
        let text = (0..20)
            .map(|i| format!("This is fact number {i} today."))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(extract_facts(&[&text], 8).len(), 8);
    }

    #[test]
    fn instruction_round_trip_leaves_no_trace() {
        let raw = "[Instruction For This Turn Only]: do X\n\nActual content";
        let cleaned = sanitize(raw);
        let facts = extract_facts(&[&cleaned], 8);
        assert!(!cleaned.contains("Instruction For This Turn Only"));
        assert!(!cleaned.contains("do X"));
        assert!(facts.iter().all(|f| !f.contains("do X")));
    }
}
