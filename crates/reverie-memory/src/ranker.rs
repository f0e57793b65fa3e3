// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-search filtering, composite re-ranking and token budgeting.
//!
//! The ranker never sees vectors: the service hands it `(memory, distance)`
//! candidates from the index and it returns the final ordered list.

use std::collections::HashSet;
use std::sync::Arc;

use reverie_config::MemoryConfig;
use reverie_core::{ChatMessage, TokenCounter};
use tracing::debug;

use crate::types::{Memory, ScoredMemory};

/// Appended to a truncated top result.
pub const ELLIPSIS: &str = "…";

/// Weights of the composite score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub relevance: f64,
    pub importance: f64,
    pub recency: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            relevance: 0.6,
            importance: 0.3,
            recency: 0.1,
        }
    }
}

pub struct RetrievalRanker {
    weights: RankingWeights,
    dedup_window: usize,
    candidate_multiplier: usize,
    min_candidate_pool: usize,
    tokenizer: Arc<dyn TokenCounter>,
}

impl RetrievalRanker {
    pub fn new(config: &MemoryConfig, tokenizer: Arc<dyn TokenCounter>) -> Self {
        Self {
            weights: RankingWeights {
                relevance: config.relevance_weight,
                importance: config.importance_weight,
                recency: config.recency_weight,
            },
            dedup_window: config.dedup_window,
            candidate_multiplier: config.candidate_multiplier,
            min_candidate_pool: config.min_candidate_pool,
            tokenizer,
        }
    }

    /// How many neighbors to fetch: oversampled because filtering drops some.
    pub fn pool_size(&self, k: usize, index_len: usize) -> usize {
        self.min_candidate_pool
            .max(self.candidate_multiplier.saturating_mul(k).min(index_len))
    }

    /// Filter, score, sort and budget the candidates.
    pub fn rank(
        &self,
        candidates: Vec<(Memory, f32)>,
        active_context: &[ChatMessage],
        k: usize,
        token_budget: usize,
    ) -> Vec<Memory> {
        let total = candidates.len();
        let recent = recent_ids(active_context, self.dedup_window);
        let fresh: Vec<(Memory, f32)> = candidates
            .into_iter()
            .filter(|(memory, _)| !is_in_active_context(memory, &recent))
            .collect();
        debug!(candidates = total, kept = fresh.len(), "filtered active-context duplicates");

        let scored = score_candidates(fresh, &self.weights);
        apply_token_budget(scored, k, token_budget, self.tokenizer.as_ref())
    }
}

/// Ids of the last `window` messages of the active context.
fn recent_ids(context: &[ChatMessage], window: usize) -> HashSet<&str> {
    let start = context.len().saturating_sub(window);
    context[start..].iter().map(|m| m.id.as_str()).collect()
}

/// True when every source message of `memory` is already in the recent window.
///
/// Memories without source ids (manual inserts) are never considered duplicates.
pub fn is_in_active_context(memory: &Memory, recent: &HashSet<&str>) -> bool {
    !memory.source_message_ids.is_empty()
        && memory
            .source_message_ids
            .iter()
            .all(|id| recent.contains(id.as_str()))
}

/// Composite score, sorted best first.
pub fn score_candidates(
    candidates: Vec<(Memory, f32)>,
    weights: &RankingWeights,
) -> Vec<ScoredMemory> {
    let (min_ts, max_ts) = candidates
        .iter()
        .map(|(m, _)| m.timestamp)
        .fold((i64::MAX, i64::MIN), |(lo, hi), t| (lo.min(t), hi.max(t)));
    let span = max_ts.saturating_sub(min_ts);

    let mut scored: Vec<ScoredMemory> = candidates
        .into_iter()
        .map(|(memory, distance)| {
            let relevance = 1.0 / (1.0 + f64::from(distance.max(0.0)));
            let importance = (f64::from(memory.importance.clamp(1, 10)) - 1.0) / 9.0;
            let recency = if span > 0 {
                (memory.timestamp - min_ts) as f64 / span as f64
            } else {
                0.0
            };
            let score = weights.relevance * relevance
                + weights.importance * importance
                + weights.recency * recency;
            ScoredMemory {
                memory,
                distance,
                score,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.distance.total_cmp(&b.distance))
    });
    scored
}

/// Accept memories in order until `k` are taken or the next one would overflow the budget.
///
/// If the first memory alone exceeds the budget it is returned alone with
/// its text cut to fit and an ellipsis appended.
pub fn apply_token_budget(
    scored: Vec<ScoredMemory>,
    k: usize,
    token_budget: usize,
    tokenizer: &dyn TokenCounter,
) -> Vec<Memory> {
    let mut accepted = Vec::new();
    let mut used = 0usize;

    for (position, candidate) in scored.into_iter().enumerate() {
        if accepted.len() >= k {
            break;
        }
        let tokens = tokenizer.count_tokens(&candidate.memory.full_text);
        if used + tokens <= token_budget {
            used += tokens;
            accepted.push(candidate.memory);
            continue;
        }
        if position == 0 {
            if let Some(memory) = truncate_to_budget(candidate.memory, token_budget, tokenizer) {
                accepted.push(memory);
            }
        }
        break;
    }
    accepted
}

/// Longest char prefix whose text plus ellipsis fits in `budget` tokens.
fn truncate_to_budget(
    mut memory: Memory,
    budget: usize,
    tokenizer: &dyn TokenCounter,
) -> Option<Memory> {
    let fits = |n: usize| {
        let candidate = truncated(&memory.full_text, n);
        tokenizer.count_tokens(&candidate) <= budget
    };
    if !fits(0) {
        return None;
    }

    let (mut lo, mut hi) = (0usize, memory.full_text.chars().count());
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    memory.full_text = truncated(&memory.full_text, lo);
    Some(memory)
}

fn truncated(text: &str, chars: usize) -> String {
    let prefix: String = text.chars().take(chars).collect();
    format!("{}{ELLIPSIS}", prefix.trim_end())
}
