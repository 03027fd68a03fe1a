use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::DEFAULT_CHUNK_SIZE_BYTES;
use haven_crypto::sha256_hex;

/// One chunk of a file in transit, matching the wire shape carried as the
/// text of a `file`-kind envelope payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChunk {
    pub file_id: String,
    pub filename: String,
    pub file_size: u64,
    pub chunk_index: u32,
    pub total_chunks: u32,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

mod base64_bytes {
    use super::{Engine, STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
    }
}

/// In-progress reassembly state for one file, keyed by `file_id`.
struct FileTransferState {
    filename: String,
    file_size: u64,
    total_chunks: u32,
    chunks: HashMap<u32, Vec<u8>>,
    completed: bool,
}

impl FileTransferState {
    fn is_complete(&self) -> bool {
        self.chunks.len() as u32 == self.total_chunks
    }

    fn assemble(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.file_size as usize);
        for index in 0..self.total_chunks {
            if let Some(piece) = self.chunks.get(&index) {
                buf.extend_from_slice(piece);
            }
        }
        buf
    }
}

/// Derives the stable id used to correlate chunks of the same file,
/// independent of transfer order.
pub fn file_id(filename: &str, file_size: u64) -> String {
    let digest = sha256_hex(&format!("{filename}{file_size}"));
    digest[..16].to_string()
}

/// Splits `data` into [`FileChunk`]s of at most `chunk_size` bytes each.
pub fn split_into_chunks(filename: &str, data: &[u8], chunk_size: usize) -> Vec<FileChunk> {
    let chunk_size = if chunk_size == 0 { DEFAULT_CHUNK_SIZE_BYTES } else { chunk_size };
    let file_size = data.len() as u64;
    let id = file_id(filename, file_size);
    let total_chunks = data.chunks(chunk_size).count().max(1) as u32;

    data.chunks(chunk_size)
        .enumerate()
        .map(|(index, piece)| FileChunk {
            file_id: id.clone(),
            filename: filename.to_string(),
            file_size,
            chunk_index: index as u32,
            total_chunks,
            data: piece.to_vec(),
        })
        .collect()
}

/// Reassembles files from chunks arriving in arbitrary order, writing each
/// completed file under `save_directory`.
pub struct FileTransferManager {
    save_directory: PathBuf,
    transfers: Mutex<HashMap<String, FileTransferState>>,
    completion_callbacks: Mutex<Vec<Box<dyn Fn(String, PathBuf) + Send + Sync>>>,
}

impl FileTransferManager {
    pub fn new(save_directory: impl Into<PathBuf>) -> Self {
        Self {
            save_directory: save_directory.into(),
            transfers: Mutex::new(HashMap::new()),
            completion_callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback invoked once, with `(filename, destination_path)`,
    /// the moment a transfer finishes reassembling. A panicking callback is
    /// caught and logged rather than tearing down the caller.
    pub fn register_completion_callback<F>(&self, callback: F)
    where
        F: Fn(String, PathBuf) + Send + Sync + 'static,
    {
        self.completion_callbacks.lock().push(Box::new(callback));
    }

    /// Records `chunk`, idempotently (re-delivery of an already-seen index is
    /// a no-op), returning the destination path once the file is complete.
    /// The transfer's state is kept (marked `completed`) until the next
    /// [`FileTransferManager::cleanup`] pass rather than removed immediately.
    pub fn process_chunk(&self, chunk: FileChunk) -> std::io::Result<Option<PathBuf>> {
        let mut transfers = self.transfers.lock();
        let state = transfers.entry(chunk.file_id.clone()).or_insert_with(|| FileTransferState {
            filename: chunk.filename.clone(),
            file_size: chunk.file_size,
            total_chunks: chunk.total_chunks,
            chunks: HashMap::new(),
            completed: false,
        });
        state.chunks.entry(chunk.chunk_index).or_insert(chunk.data);

        if state.completed || !state.is_complete() {
            return Ok(None);
        }

        let bytes = state.assemble();
        let destination = self.reserve_destination(&state.filename)?;
        std::fs::create_dir_all(&self.save_directory)?;
        std::fs::write(&destination, &bytes)?;
        info!(path = %destination.display(), "file transfer complete");
        let filename = state.filename.clone();
        state.completed = true;
        drop(transfers);

        self.fire_completion_callbacks(&filename, &destination);
        Ok(Some(destination))
    }

    fn fire_completion_callbacks(&self, filename: &str, destination: &Path) {
        for callback in self.completion_callbacks.lock().iter() {
            let filename = filename.to_string();
            let destination = destination.to_path_buf();
            let filename_for_log = filename.clone();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(filename, destination)));
            if result.is_err() {
                warn!(filename = %filename_for_log, "completion callback panicked");
            }
        }
    }

    /// Removes the state of every transfer that has already completed,
    /// leaving in-progress transfers untouched.
    pub fn cleanup(&self) {
        self.transfers.lock().retain(|_, state| !state.completed);
    }

    /// Finds a non-colliding path under `save_directory`, suffixing
    /// `name_1.ext`, `name_2.ext`, ... if `filename` is already taken.
    fn reserve_destination(&self, filename: &str) -> std::io::Result<PathBuf> {
        let base = self.save_directory.join(filename);
        if !base.exists() {
            return Ok(base);
        }
        let path = Path::new(filename);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
        let ext = path.extension().and_then(|s| s.to_str());

        for suffix in 1..10_000 {
            let candidate_name = match ext {
                Some(ext) => format!("{stem}_{suffix}.{ext}"),
                None => format!("{stem}_{suffix}"),
            };
            let candidate = self.save_directory.join(candidate_name);
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        Ok(base)
    }

    /// Fraction of chunks received for an in-progress transfer, or `None` if unknown.
    pub fn progress(&self, file_id: &str) -> Option<f64> {
        let transfers = self.transfers.lock();
        let state = transfers.get(file_id)?;
        Some(state.chunks.len() as f64 / state.total_chunks as f64)
    }
}
