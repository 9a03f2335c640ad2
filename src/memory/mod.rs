pub mod engine;
pub mod events;
pub mod maintenance;
pub mod search;
pub mod similarity;
pub mod stats;
pub mod store;
pub mod types;

pub use engine::MemoryEngine;
pub use store::MemoryStore;

/// Encode an embedding as little-endian f32 bytes for the `embedding` BLOB column.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// An `embedding` BLOB whose length is not a whole number of f32 values.
#[derive(Debug, thiserror::Error)]
#[error("embedding blob of {0} bytes is not a multiple of 4")]
pub struct MalformedEmbedding(pub usize);

/// Decode a BLOB written by [`embedding_to_bytes`].
pub fn bytes_to_embedding(bytes: &[u8]) -> Result<Vec<f32>, MalformedEmbedding> {
    if bytes.len() % 4 != 0 {
        return Err(MalformedEmbedding(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
