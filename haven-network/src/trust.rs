use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::INITIAL_TRUST_SCORE;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TrustRecord {
    trusted_nodes: HashMap<String, String>,
    trust_scores: HashMap<String, i32>,
}

/// Per-node trust tracking, persisted to a JSON file on every mutation.
///
/// A node earns a ledger entry the first time it produces a message that
/// verifies against its claimed signature; its score then moves up or down
/// with every subsequent message, and `purge` drops anyone who has fallen to
/// or below a given floor.
pub struct TrustLedger {
    path: PathBuf,
    state: Mutex<TrustRecord>,
}

impl TrustLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = Self::load(&path).unwrap_or_default();
        Self { path, state: Mutex::new(state) }
    }

    fn load(path: &Path) -> Option<TrustRecord> {
        let text = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&text) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "trust ledger file is corrupt, starting fresh");
                None
            }
        }
    }

    fn persist(&self, record: &TrustRecord) {
        let Ok(json) = serde_json::to_string_pretty(record) else { return };
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&self.path, json) {
            warn!(path = %self.path.display(), error = %e, "failed to persist trust ledger");
        }
    }

    /// Admit a newly-verified signer with the default starting score, unless
    /// already known.
    pub fn add_trusted_node(&self, node_id: &str, public_key_pem: &str) {
        let mut state = self.state.lock();
        state.trusted_nodes.entry(node_id.to_string()).or_insert_with(|| public_key_pem.to_string());
        state.trust_scores.entry(node_id.to_string()).or_insert(INITIAL_TRUST_SCORE);
        self.persist(&state);
    }

    /// A node is trusted once it has an admitted ledger entry and its score
    /// has not fallen below `min_score`.
    pub fn is_trusted(&self, node_id: &str, min_score: i32) -> bool {
        let state = self.state.lock();
        if !state.trusted_nodes.contains_key(node_id) {
            return false;
        }
        state.trust_scores.get(node_id).copied().unwrap_or(0) >= min_score
    }

    pub fn score(&self, node_id: &str) -> Option<i32> {
        self.state.lock().trust_scores.get(node_id).copied()
    }

    /// Apply `delta` to `node_id`'s score, clamped to `[0, 100]`, creating the
    /// entry at [`INITIAL_TRUST_SCORE`] first if unseen.
    pub fn update_trust_score(&self, node_id: &str, delta: i32) -> i32 {
        let mut state = self.state.lock();
        let score = state.trust_scores.entry(node_id.to_string()).or_insert(INITIAL_TRUST_SCORE);
        *score = (*score + delta).clamp(0, 100);
        let updated = *score;
        self.persist(&state);
        updated
    }

    /// Remove every node whose score has fallen to or below `below`, returning their ids.
    pub fn purge(&self, below: i32) -> Vec<String> {
        let mut state = self.state.lock();
        let doomed: Vec<String> = state
            .trust_scores
            .iter()
            .filter(|(_, score)| **score <= below)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &doomed {
            state.trusted_nodes.remove(id);
            state.trust_scores.remove(id);
        }
        if !doomed.is_empty() {
            self.persist(&state);
        }
        doomed
    }

    pub fn trust_info(&self) -> HashMap<String, i32> {
        self.state.lock().trust_scores.clone()
    }
}
