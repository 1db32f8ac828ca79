use rand::seq::IndexedRandom;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

use crate::types::{ContentItem, Question, RoomConfig};

/// Unfiltered slice used when genre/difficulty filtering leaves nothing
const FALLBACK_SLICE: usize = 20;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Failed to read content pool: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse content pool: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Pool files are either a bare list or `{"meta": ..., "items": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum PoolFile {
    List(Vec<ContentItem>),
    Wrapped { items: Vec<ContentItem> },
}

/// Read-only content pool, loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct ContentPool {
    items: Vec<ContentItem>,
}

impl ContentPool {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self { items }
    }

    /// Load from disk. A missing file is not an error and yields an empty pool.
    pub fn load(path: &Path) -> Result<Self, PoolError> {
        if !path.exists() {
            tracing::warn!("Content pool {} not found, starting with an empty pool", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let items = match serde_json::from_str::<PoolFile>(&raw)? {
            PoolFile::List(items) | PoolFile::Wrapped { items } => items,
        };
        tracing::info!("Loaded {} content items from {}", items.len(), path.display());
        Ok(Self { items })
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sorted, distinct, non-empty genre names
    pub fn genres(&self) -> Vec<String> {
        self.items
            .iter()
            .flat_map(|item| item.genres.iter())
            .filter(|g| !g.is_empty())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Items a game with this config may draw from, best first
    pub fn candidates(&self, config: &RoomConfig) -> Vec<&ContentItem> {
        let mut sorted: Vec<&ContentItem> = self.items.iter().collect();
        sorted.sort_by(|a, b| b.metric(config.sort_by).total_cmp(&a.metric(config.sort_by)));

        let mut filtered: Vec<&ContentItem> = match &config.genres {
            Some(wanted) if !wanted.is_empty() => sorted
                .iter()
                .copied()
                .filter(|item| item.genres.iter().any(|g| wanted.contains(g)))
                .collect(),
            _ => sorted.clone(),
        };
        if let Some(cap) = config.difficulty.pool_cap(config.pool_size) {
            filtered.truncate(cap);
        }

        if filtered.is_empty() {
            sorted.truncate(FALLBACK_SLICE);
            return sorted;
        }
        filtered
    }

    /// Sample up to `config.rounds_total` questions without replacement.
    /// The returned length is the effective number of rounds.
    pub fn select_questions(&self, config: &RoomConfig) -> Vec<Question> {
        let candidates = self.candidates(config);
        let count = (config.rounds_total as usize).min(candidates.len());
        let mut rng = rand::rng();
        candidates
            .choose_multiple(&mut rng, count)
            .map(|item| Question::from(*item))
            .collect()
    }
}
