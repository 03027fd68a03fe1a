use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminates the payload carried by an [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    FileChunk,
    Control,
}

/// The wire-level unit relayed between nodes.
///
/// `route` records every node id the envelope has passed through, in order,
/// and exists purely for loop avoidance and diagnostics — it is never
/// consulted to choose the *next* hop, which is [`crate::linkstate`]'s job
/// when link-state data is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub msg_id: String,
    pub source_id: String,
    pub dest_id: String,
    pub kind: MessageKind,
    /// Cleartext payload before encryption, or the base64 ciphertext on
    /// the wire — callers on either side of [`crate::router`] know which.
    pub payload: String,
    pub timestamp: u64,
    pub ttl: u8,
    pub route: Vec<String>,
}

impl Envelope {
    pub fn new(source_id: String, dest_id: String, kind: MessageKind, payload: String, ttl: u8) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            msg_id: Uuid::new_v4().to_string(),
            source_id: source_id.clone(),
            dest_id,
            kind,
            payload,
            timestamp,
            ttl,
            route: vec![source_id],
        }
    }

    /// Appends `hop` to the route. Called once by every node that sees the
    /// envelope, whether it ends up delivering or forwarding it.
    pub fn record_hop(&mut self, hop: &str) {
        self.route.push(hop.to_string());
    }

    pub fn has_visited(&self, node_id: &str) -> bool {
        self.route.iter().any(|hop| hop == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_envelope_seeds_route_with_source() {
        let env = Envelope::new("a".into(), "b".into(), MessageKind::Text, "hi".into(), 2);
        assert_eq!(env.route, vec!["a".to_string()]);
    }

    #[test]
    fn record_hop_appends_to_route() {
        let mut env = Envelope::new("a".into(), "b".into(), MessageKind::Text, "hi".into(), 2);
        env.record_hop("relay-1");
        assert_eq!(env.route, vec!["a".to_string(), "relay-1".to_string()]);
    }

    #[test]
    fn has_visited_checks_route_membership() {
        let mut env = Envelope::new("a".into(), "b".into(), MessageKind::Text, "hi".into(), 5);
        env.record_hop("relay-1");
        assert!(env.has_visited("a"));
        assert!(env.has_visited("relay-1"));
        assert!(!env.has_visited("relay-2"));
    }
}
