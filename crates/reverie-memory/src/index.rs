// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Approximate nearest neighbor index over squared L2 distance.
//!
//! The graph itself is an [`hnsw_rs`] HNSW. This wrapper owns the label
//! space: vectors are addressed by dense labels `0..len`, deletion only flags
//! a label dead (the point stays in the graph so traversal keeps working, but
//! it is never returned from [`HnswIndex::search`]) and there is no
//! compaction.
//!
//! The persisted form holds the raw vectors and dead flags; the graph is
//! rebuilt from them on decode.

use std::fmt;

use hnsw_rs::filter::FilterT;
use hnsw_rs::prelude::{DistL2, Hnsw, Neighbour};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use reverie_config::IndexConfig;

/// Leading bytes of a serialized index.
const MAGIC: &[u8; 8] = b"RVHNSW\0\0";
const FORMAT_VERSION: u32 = 2;
const HEADER_LEN: usize = MAGIC.len() + 4;
/// Layer cap accepted by `hnsw_rs`.
const MAX_LAYERS: usize = 16;

type Graph = Hnsw<'static, f32, DistL2>;

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("corrupt index data: {0}")]
    Corrupt(String),

    #[error("index serialization failed: {0}")]
    Serialization(String),
}

/// Graph construction and search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswConfig {
    pub max_connections: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub initial_capacity: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self::from(&IndexConfig::default())
    }
}

impl From<&IndexConfig> for HnswConfig {
    fn from(config: &IndexConfig) -> Self {
        Self {
            max_connections: config.max_connections.max(2),
            ef_construction: config.ef_construction.max(1),
            ef_search: config.ef_search.max(1),
            initial_capacity: config.initial_capacity.max(1),
        }
    }
}

/// What goes into the blob after the header.
#[derive(Serialize, Deserialize)]
struct Stored {
    dimensions: usize,
    config: HnswConfig,
    capacity: usize,
    vectors: Vec<Vec<f32>>,
    deleted: Vec<bool>,
}

/// HNSW graph plus the label bookkeeping around it.
pub struct HnswIndex {
    dimensions: usize,
    config: HnswConfig,
    capacity: usize,
    vectors: Vec<Vec<f32>>,
    deleted: Vec<bool>,
    graph: Graph,
}

impl fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HnswIndex")
            .field("dimensions", &self.dimensions)
            .field("config", &self.config)
            .field("capacity", &self.capacity)
            .field("len", &self.vectors.len())
            .field("dead", &self.dead_count())
            .finish()
    }
}

impl HnswIndex {
    pub fn new(dimensions: usize, config: HnswConfig) -> Self {
        Self {
            dimensions,
            capacity: config.initial_capacity,
            config,
            vectors: Vec::with_capacity(config.initial_capacity),
            deleted: Vec::with_capacity(config.initial_capacity),
            graph: new_graph(&config, config.initial_capacity),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of labels ever assigned, dead ones included.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Labels not marked dead.
    pub fn live_count(&self) -> usize {
        self.deleted.iter().filter(|d| !**d).count()
    }

    pub fn dead_count(&self) -> usize {
        self.len() - self.live_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_deleted(&self, label: usize) -> bool {
        self.deleted.get(label).copied().unwrap_or(true)
    }

    /// Flag a label dead. Returns `false` if it was unknown or already dead.
    pub fn mark_deleted(&mut self, label: usize) -> bool {
        match self.deleted.get_mut(label) {
            Some(flag) if !*flag => {
                *flag = true;
                true
            }
            _ => false,
        }
    }

    /// Insert a vector at the next label and return that label.
    ///
    /// The index is left untouched when the dimension does not match.
    pub fn insert(&mut self, vector: &[f32]) -> Result<usize, IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        let label = self.vectors.len();
        if label >= self.capacity {
            self.grow(label + 1);
        }
        self.graph.insert_slice((vector, label));
        self.vectors.push(vector.to_vec());
        self.deleted.push(false);
        Ok(label)
    }

    /// Up to `k` live labels nearest to `query`, closest first, with squared L2 distance.
    ///
    /// An empty index or a query of the wrong dimension yields no results.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if k == 0 || query.len() != self.dimensions || self.live_count() == 0 {
            return Vec::new();
        }

        let is_live = |label: &usize| !self.is_deleted(*label);
        let filter: &dyn FilterT = &is_live;
        // Dead points still take beam slots during traversal.
        let ef = self.config.ef_search.max(k) + self.dead_count();

        let mut found: Vec<(usize, f32)> = self
            .graph
            .search_filter(query, k, ef, Some(filter))
            .into_iter()
            .filter(|n: &Neighbour| !self.is_deleted(n.d_id))
            .map(|n| (n.d_id, squared_l2(query, &self.vectors[n.d_id])))
            .collect();
        found.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        found.truncate(k);
        found
    }

    /// Serialize as magic header, format version, then a bincode payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        let stored = Stored {
            dimensions: self.dimensions,
            config: self.config,
            capacity: self.capacity,
            vectors: self.vectors.clone(),
            deleted: self.deleted.clone(),
        };
        let payload =
            bincode::serialize(&stored).map_err(|e| IndexError::Serialization(e.to_string()))?;
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Decode a serialized index, validate it and rebuild its graph.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(IndexError::Corrupt("missing index header".into()));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(IndexError::Corrupt(format!(
                "unsupported format version {version}"
            )));
        }

        let stored: Stored = bincode::deserialize(&bytes[HEADER_LEN..])
            .map_err(|e| IndexError::Corrupt(e.to_string()))?;
        validate(&stored)?;

        let graph = new_graph(&stored.config, stored.capacity);
        for (label, vector) in stored.vectors.iter().enumerate() {
            graph.insert_slice((vector.as_slice(), label));
        }
        Ok(Self {
            dimensions: stored.dimensions,
            config: stored.config,
            capacity: stored.capacity,
            vectors: stored.vectors,
            deleted: stored.deleted,
            graph,
        })
    }

    /// Double capacity until `needed` fits and rebuild the graph at that size.
    fn grow(&mut self, needed: usize) {
        let mut capacity = self.capacity.max(1);
        while capacity < needed {
            capacity *= 2;
        }
        let graph = new_graph(&self.config, capacity);
        for (label, vector) in self.vectors.iter().enumerate() {
            graph.insert_slice((vector.as_slice(), label));
        }
        self.graph = graph;
        self.capacity = capacity;
    }
}

fn new_graph(config: &HnswConfig, capacity: usize) -> Graph {
    Hnsw::new(
        config.max_connections,
        capacity.max(1),
        MAX_LAYERS,
        config.ef_construction,
        DistL2 {},
    )
}

fn validate(stored: &Stored) -> Result<(), IndexError> {
    let n = stored.vectors.len();
    if stored.dimensions == 0 {
        return Err(IndexError::Corrupt("zero dimensions".into()));
    }
    if stored.deleted.len() != n || stored.capacity < n {
        return Err(IndexError::Corrupt("inconsistent label tables".into()));
    }
    if stored.vectors.iter().any(|v| v.len() != stored.dimensions) {
        return Err(IndexError::Corrupt("vector with wrong dimensions".into()));
    }
    Ok(())
}

/// Squared Euclidean distance.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
