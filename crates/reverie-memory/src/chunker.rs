// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sentence-respecting text chunker with character overlap.
//!
//! Sizes are measured in `char`s, not bytes. A chunk only exceeds the
//! maximum when a single sentence is longer than the maximum on its own.

/// Default characters carried over from one chunk into the next.
pub const DEFAULT_OVERLAP: usize = 100;

/// Split `text` into ordered chunks of at most `max_chars` characters.
///
/// Text that already fits is returned unchanged as the only chunk.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    if max_chars == 0 || char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0;

    for segment in split_segments(text) {
        let segment_len = char_len(segment);
        if buffer_len > 0 && buffer_len + segment_len > max_chars {
            push_trimmed(&mut chunks, &buffer);
            // Seed never crowds out the next segment if it could fit alone.
            let seed_len = overlap.min(max_chars.saturating_sub(segment_len));
            buffer = tail_chars(&buffer, seed_len).to_string();
            buffer_len = char_len(&buffer);
        }
        buffer.push_str(segment);
        buffer_len += segment_len;
    }
    push_trimmed(&mut chunks, &buffer);

    if chunks.is_empty() {
        chunks.push(text.trim().to_string());
    }
    chunks
}

/// Sentences, or paragraphs / lines when the text has no sentence boundary.
///
/// Segments keep their terminator and trailing whitespace, so concatenating
/// them reproduces the input.
pub fn split_segments(text: &str) -> Vec<&str> {
    let sentences = split_sentences(text);
    if sentences.len() > 1 {
        return sentences;
    }
    let paragraphs: Vec<&str> = text.split_inclusive("\n\n").collect();
    if paragraphs.len() > 1 {
        return paragraphs;
    }
    text.split_inclusive('\n').collect()
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let mut end = None;
        while let Some(&(idx, next)) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            end = Some(idx + next.len_utf8());
            chars.next();
        }
        if let Some(end) = end {
            out.push(&text[start..end]);
            start = end;
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn push_trimmed(chunks: &mut Vec<String>, buffer: &str) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The last `n` characters of `s`, cut on a char boundary.
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_text_is_returned_verbatim() {
        let text = "  Hello there. How are you?  ";
        assert_eq!(chunk_text(text, 2000, 100), vec![text.to_string()]);
    }

    #[test]
    fn sentences_keep_terminators() {
        let parts = split_segments("One. Two! Three? Four");
        assert_eq!(parts, vec!["One. ", "Two! ", "Three? ", "Four"]);
    }

    #[test]
    fn decimals_do_not_split() {
        assert_eq!(split_segments("Pi is 3.14 roughly.").len(), 1);
    }

    #[test]
    fn falls_back_to_paragraphs_then_lines() {
        assert_eq!(split_segments("alpha\n\nbeta"), vec!["alpha\n\n", "beta"]);
        assert_eq!(split_segments("alpha\nbeta"), vec!["alpha\n", "beta"]);
    }

    #[test]
    fn chunks_respect_max_and_overlap() {
        let sentence = "The lantern flickered in the cold tower room. ";
        let text = sentence.repeat(20);
        let chunks = chunk_text(&text, 200, 30);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200, "chunk too long: {}", chunk.len());
        }
        // Second chunk starts with the tail of the first.
        let tail: String = chunks[0]
            .chars()
            .rev()
            .take(10)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        assert!(chunks[1].contains(&tail));
    }

    #[test]
    fn oversized_sentence_is_kept_whole() {
        let long = format!("{}.", "a".repeat(300));
        let text = format!("Short one. {long} Another short one.");
        let chunks = chunk_text(&text, 100, 20);
        assert!(chunks.iter().any(|c| c.contains(&long)));
    }

    #[test]
    fn multibyte_text_cuts_on_char_boundaries() {
        let text = "Ünïcödé señtence hère. ".repeat(30);
        let chunks = chunk_text(&text, 64, 17);
        assert!(chunks.iter().all(|c| c.chars().count() <= 64));
    }

    #[test]
    fn five_thousand_chars_make_at_least_five_chunks() {
        let sentence = "Mira traced the old map while the rain drummed on the roof of the inn. ";
        let text: String = sentence.repeat(5000 / sentence.len() + 1);
        assert!(text.chars().count() >= 5000);
        let chunks = chunk_text(&text, 1000, DEFAULT_OVERLAP);
        assert!(chunks.len() >= 5, "got {} chunks", chunks.len());
    }

    proptest! {
        #[test]
        fn every_sentence_survives_in_order(
            words in prop::collection::vec("[a-z]{1,8}( [a-z]{1,8}){0,6}", 1..40),
            max in 40usize..300,
            overlap in 0usize..60,
        ) {
            let sentences: Vec<String> = words.iter().map(|w| format!("{w}.")).collect();
            let text = sentences.join(" ");
            let chunks = chunk_text(&text, max, overlap);
            prop_assert!(!chunks.is_empty());

            // Each sentence appears in some chunk, and first appearances are ordered.
            let mut last_chunk = 0;
            for sentence in &sentences {
                let found = chunks
                    .iter()
                    .enumerate()
                    .skip(last_chunk)
                    .find(|(_, c)| c.contains(sentence.as_str()));
                prop_assert!(found.is_some(), "sentence {:?} lost", sentence);
                last_chunk = found.map(|(i, _)| i).unwrap_or(last_chunk);
            }

            // Sentences here are at most 63 chars, so every chunk fits.
            if max >= 64 {
                for chunk in &chunks {
                    prop_assert!(chunk.chars().count() <= max);
                }
            }
        }

        #[test]
        fn fitting_text_is_single_chunk(text in ".{0,200}") {
            let chunks = chunk_text(&text, 200, 50);
            prop_assert_eq!(chunks, vec![text.clone()]);
        }
    }
}
