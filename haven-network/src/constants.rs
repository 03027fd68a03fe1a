//! Protocol-wide defaults for ports, timings, and tunable limits.

/// UDP discovery broadcast port.
pub const DEFAULT_DISCOVERY_PORT: u16 = 5000;

/// TCP data/mesh port.
pub const DEFAULT_DATA_PORT: u16 = 5001;

/// How often the discovery broadcaster emits a beacon.
pub const DEFAULT_BROADCAST_INTERVAL_S: u64 = 30;

/// How long a neighbor may go unseen before the janitor evicts it.
pub const DEFAULT_NODE_TIMEOUT_S: u64 = 90;

/// Initial TTL stamped on every originated envelope.
pub const DEFAULT_MAX_TTL: u8 = 20;

/// Chunk size used by the file reassembler (64 KiB).
pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 64 * 1024;

/// TCP connect timeout for a single forwarding hop.
pub const CONNECT_TIMEOUT_S: u64 = 5;

/// Idle timeout while draining a length-prefixed frame body.
pub const FRAME_IDLE_TIMEOUT_S: u64 = 5;

/// Bound on the duplicate-message-id cache, to keep memory use flat over a
/// long-running deployment.
pub const DUPLICATE_CACHE_CAPACITY: usize = 65_536;

/// Default trust score assigned to a newly-observed signed peer.
pub const INITIAL_TRUST_SCORE: i32 = 50;

/// Trust penalty for an invalid signature.
pub const TRUST_PENALTY_BAD_SIGNATURE: i32 = 20;

/// Trust penalty for a signer id that does not match the envelope's source id.
pub const TRUST_PENALTY_SIGNER_MISMATCH: i32 = 30;

/// Trust reward for a successfully verified message.
pub const TRUST_REWARD_VALID_SIGNATURE: i32 = 1;

/// Minimum trust score required to relay traffic on a sender's behalf.
pub const MIN_TRUST_TO_RELAY: i32 = 20;

/// Link latency assumed between neighbors when no measurement exists.
pub const DEFAULT_LINK_LATENCY: f64 = 1.0;

/// Literal destination id meaning "deliver to every known neighbor".
pub const BROADCAST_DEST: &str = "broadcast";
