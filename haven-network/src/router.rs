use std::sync::Arc;

use tracing::{debug, warn};

use haven_crypto::CryptoService;
use haven_identity::IdentityService;

use crate::constants::{
    BROADCAST_DEST, MIN_TRUST_TO_RELAY, TRUST_PENALTY_BAD_SIGNATURE, TRUST_PENALTY_SIGNER_MISMATCH,
    TRUST_REWARD_VALID_SIGNATURE,
};
use crate::duplicate_cache::DuplicateCache;
use crate::envelope::{Envelope, MessageKind};
use crate::trust::TrustLedger;

/// Result of running a received envelope through the receive pipeline.
#[derive(Debug)]
pub enum ReceiveOutcome {
    /// Addressed to this node (or broadcast). `envelope.payload` has already
    /// been replaced with the decrypted cleartext, and the local node id has
    /// been appended to `envelope.route`, ready to hand to delivery callbacks.
    Deliver(Envelope),
    /// Not for us and still has hops left; relay it onward.
    Forward(Envelope),
    /// Dropped for the stated reason; nothing further to do.
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Duplicate,
    TtlExhausted,
    MalformedEnvelope,
    DecryptFailed,
    InvalidSignature,
    SignerMismatch,
    SenderUntrusted,
}

/// Envelope send/receive pipeline: signs, encrypts, checksums, and routes
/// messages; the transport layer only ever sees opaque bytes.
pub struct Router {
    node_id: String,
    crypto: Option<CryptoService>,
    identity: Option<Arc<IdentityService>>,
    trust: Arc<TrustLedger>,
    dup_cache: Arc<DuplicateCache>,
    max_ttl: u8,
}

impl Router {
    pub fn new(
        node_id: String,
        crypto: Option<CryptoService>,
        identity: Option<Arc<IdentityService>>,
        trust: Arc<TrustLedger>,
        dup_cache: Arc<DuplicateCache>,
        max_ttl: u8,
    ) -> Self {
        Self { node_id, crypto, identity, trust, dup_cache, max_ttl }
    }

    /// Build the envelope for a freshly originated message: sign (if an
    /// identity is configured), encrypt (if a shared key is configured),
    /// then register it in our own duplicate cache so a copy that loops
    /// back to us is recognized as already-seen.
    pub fn build_outgoing(&self, dest_id: &str, kind: MessageKind, cleartext: &str) -> Envelope {
        let wire_payload = self.seal(cleartext);
        let envelope = Envelope::new(self.node_id.clone(), dest_id.to_string(), kind, wire_payload, self.max_ttl);
        self.dup_cache.insert_if_new(&envelope.msg_id);
        envelope
    }

    fn seal(&self, cleartext: &str) -> String {
        let signed = match &self.identity {
            Some(identity) => serde_json::to_string(&identity.sign(cleartext)).unwrap_or_else(|_| cleartext.to_string()),
            None => cleartext.to_string(),
        };
        match &self.crypto {
            Some(crypto) => crypto.encrypt(&signed),
            None => signed,
        }
    }

    /// Run a just-received, still-serialized envelope through the full
    /// receive pipeline.
    pub fn receive(&self, raw_envelope_json: &str) -> ReceiveOutcome {
        let mut envelope: Envelope = match serde_json::from_str(raw_envelope_json) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "dropped envelope: malformed JSON");
                return ReceiveOutcome::Dropped(DropReason::MalformedEnvelope);
            }
        };

        if !self.dup_cache.insert_if_new(&envelope.msg_id) {
            debug!(msg_id = %envelope.msg_id, "dropped envelope: duplicate");
            return ReceiveOutcome::Dropped(DropReason::Duplicate);
        }

        let cleartext = match self.unseal(&envelope) {
            Ok(text) => text,
            Err(reason) => return ReceiveOutcome::Dropped(reason),
        };

        envelope.payload = cleartext.clone();
        envelope.record_hop(&self.node_id);

        let is_for_us = envelope.dest_id == self.node_id || envelope.dest_id == BROADCAST_DEST;
        if is_for_us {
            return ReceiveOutcome::Deliver(envelope);
        }

        if envelope.ttl == 0 {
            debug!(msg_id = %envelope.msg_id, "dropped envelope: ttl exhausted");
            return ReceiveOutcome::Dropped(DropReason::TtlExhausted);
        }
        envelope.ttl -= 1;

        if self.identity.is_some() && !self.trust.is_trusted(&envelope.source_id, MIN_TRUST_TO_RELAY) {
            debug!(source = %envelope.source_id, "refused to relay: sender trust too low");
            return ReceiveOutcome::Dropped(DropReason::SenderUntrusted);
        }

        envelope.payload = self.seal(&cleartext);
        ReceiveOutcome::Forward(envelope)
    }

    fn unseal(&self, envelope: &Envelope) -> Result<String, DropReason> {
        let decrypted = match &self.crypto {
            Some(crypto) => match crypto.decrypt(&envelope.payload) {
                Ok(text) => text,
                Err(e) => {
                    debug!(error = %e, "dropped envelope: decryption failed");
                    return Err(DropReason::DecryptFailed);
                }
            },
            None => envelope.payload.clone(),
        };

        if self.identity.is_none() {
            return Ok(decrypted);
        }

        let outcome = IdentityService::verify(&decrypted);
        if !outcome.ok {
            self.trust.update_trust_score(&envelope.source_id, -TRUST_PENALTY_BAD_SIGNATURE);
            warn!(source = %envelope.source_id, "dropped envelope: invalid signature");
            return Err(DropReason::InvalidSignature);
        }

        let signer_id = outcome.signer_id.unwrap_or_default();
        if signer_id != envelope.source_id {
            self.trust.update_trust_score(&envelope.source_id, -TRUST_PENALTY_SIGNER_MISMATCH);
            warn!(claimed = %envelope.source_id, actual = %signer_id, "dropped envelope: signer mismatch");
            return Err(DropReason::SignerMismatch);
        }

        if !self.trust.is_trusted(&signer_id, 0) {
            if let Some(pem) = &outcome.signer_public_key_pem {
                self.trust.add_trusted_node(&signer_id, pem);
            }
        }
        self.trust.update_trust_score(&signer_id, TRUST_REWARD_VALID_SIGNATURE);

        Ok(outcome.cleartext.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_identity::NodeId;
    use std::sync::Arc;

    fn router_pair() -> (Router, Router, String, String) {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let identity_a = Arc::new(IdentityService::new(dir_a.path(), NodeId::generate()).unwrap());
        let identity_b = Arc::new(IdentityService::new(dir_b.path(), NodeId::generate()).unwrap());
        let node_a = identity_a.node_id().to_string();
        let node_b = identity_b.node_id().to_string();

        let trust_dir = tempfile::tempdir().unwrap();
        let router_a = Router::new(
            node_a.clone(),
            Some(CryptoService::new("shared-passphrase")),
            Some(identity_a),
            Arc::new(TrustLedger::new(trust_dir.path().join("a.json"))),
            Arc::new(DuplicateCache::new()),
            20,
        );
        let router_b = Router::new(
            node_b.clone(),
            Some(CryptoService::new("shared-passphrase")),
            Some(identity_b),
            Arc::new(TrustLedger::new(trust_dir.path().join("b.json"))),
            Arc::new(DuplicateCache::new()),
            20,
        );
        (router_a, router_b, node_a, node_b)
    }

    #[test]
    fn unicast_message_delivers_and_decrypts_at_destination() {
        let (router_a, router_b, node_a, node_b) = router_pair();
        let envelope = router_a.build_outgoing(&node_b, MessageKind::Text, "hello there");
        let json = serde_json::to_string(&envelope).unwrap();

        match router_b.receive(&json) {
            ReceiveOutcome::Deliver(envelope) => {
                assert_eq!(envelope.payload, "hello there");
                assert_eq!(envelope.route, vec![node_a, node_b]);
            }
            other => panic!("expected delivery, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_envelope_is_dropped_on_second_delivery() {
        let (router_a, router_b, _node_a, _node_b) = router_pair();
        let envelope = router_a.build_outgoing(BROADCAST_DEST, MessageKind::Text, "hi");
        let json = serde_json::to_string(&envelope).unwrap();

        assert!(matches!(router_b.receive(&json), ReceiveOutcome::Deliver(_)));
        assert!(matches!(router_b.receive(&json), ReceiveOutcome::Dropped(DropReason::Duplicate)));
    }

    #[test]
    fn tampered_payload_is_dropped_and_penalizes_trust() {
        let (router_a, router_b, _node_a, _node_b) = router_pair();
        let mut envelope = router_a.build_outgoing(BROADCAST_DEST, MessageKind::Text, "hi");
        envelope.payload = format!("{}x", envelope.payload);
        let json = serde_json::to_string(&envelope).unwrap();

        assert!(matches!(router_b.receive(&json), ReceiveOutcome::Dropped(DropReason::DecryptFailed)));
    }

    #[test]
    fn ttl_reaches_zero_after_enough_hops() {
        let (router_a, router_b, _node_a, _node_b) = router_pair();
        let mut envelope = router_a.build_outgoing("someone-else", MessageKind::Text, "hi");
        envelope.ttl = 0;
        let json = serde_json::to_string(&envelope).unwrap();

        assert!(matches!(router_b.receive(&json), ReceiveOutcome::Dropped(DropReason::TtlExhausted)));
    }

    #[test]
    fn low_trust_source_is_refused_relay() {
        let (router_a, router_b, node_a, _node_b) = router_pair();
        let envelope = router_a.build_outgoing("someone-else", MessageKind::Text, "hi");
        let json = serde_json::to_string(&envelope).unwrap();

        // router_b has never seen node_a before, so the first delivery admits
        // it at the default starting score. Knock it down below the relay
        // threshold before the envelope arrives.
        router_b.unseal(&envelope).ok();
        router_b.trust.update_trust_score(&node_a, -40);

        assert!(matches!(
            router_b.receive(&json),
            ReceiveOutcome::Dropped(DropReason::SenderUntrusted)
        ));
    }
}
