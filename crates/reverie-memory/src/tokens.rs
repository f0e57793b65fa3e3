// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! BPE token counting for retrieval budgets.

use reverie_core::{ReverieError, TokenCounter};
use tiktoken_rs::CoreBPE;

/// Token counter backed by a tiktoken encoding.
pub struct TiktokenCounter {
    encoding: String,
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// Load an encoding by name (`cl100k_base`, `o200k_base`, `p50k_base`, `r50k_base`).
    pub fn from_name(encoding: &str) -> Result<Self, ReverieError> {
        let bpe = match encoding {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "r50k_base" => tiktoken_rs::r50k_base(),
            other => {
                return Err(ReverieError::Config(format!("unknown tokenizer `{other}`")));
            }
        }
        .map_err(|e| ReverieError::Internal(format!("failed to load {encoding}: {e}")))?;

        Ok(Self {
            encoding: encoding.to_string(),
            bpe,
        })
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }
}

impl std::fmt::Debug for TiktokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenCounter")
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}
