// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use reverie_core::TokenCounter;

/// Counts whitespace-separated words, so token budgets can be asserted exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl TokenCounter for WordTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}
