// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enrichment adapter trait for scene metadata extraction.

use async_trait::async_trait;

use crate::error::ReverieError;
use crate::traits::adapter::PluginAdapter;
use crate::types::SceneEnrichment;

/// Adapter that derives structured scene metadata from a conversation turn.
///
/// Implementations validate the backend payload and fill every missing
/// field with its default before returning.
#[async_trait]
pub trait EnrichmentAdapter: PluginAdapter {
    /// Summarize and classify the given sanitized turn text.
    async fn enrich(&self, text: &str) -> Result<SceneEnrichment, ReverieError>;
}
