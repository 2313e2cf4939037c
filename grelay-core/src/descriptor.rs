//! # Descriptor Loader
//!
//! Reads a serialized `FileDescriptorSet` (as written by `protoc --descriptor_set_out`)
//! and builds a [`DescriptorPool`] from it.
//!
//! The pool resolves type references across files, so a method whose input message lives
//! in an imported file is handled transparently. Nothing is cached here; callers that want
//! to share a pool keep it themselves.
use prost::Message;
use prost_reflect::{DescriptorError, DescriptorPool};
use prost_types::FileDescriptorSet;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DescriptorLoadError {
    #[error("Failed to read descriptor file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode file descriptor set: '{0}'")]
    Decode(#[from] prost::DecodeError),
    #[error("Failed to build descriptor registry: '{0}'")]
    Registry(#[from] DescriptorError),
}

/// Reads the descriptor set stored at `path` and builds its registry.
pub async fn load(path: impl AsRef<Path>) -> Result<DescriptorPool, DescriptorLoadError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| DescriptorLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    decode(&bytes)
}

/// Builds a registry from the raw bytes of an encoded `FileDescriptorSet`.
pub fn decode(bytes: &[u8]) -> Result<DescriptorPool, DescriptorLoadError> {
    let file_descriptor_set = FileDescriptorSet::decode(bytes)?;
    let pool = DescriptorPool::from_file_descriptor_set(file_descriptor_set)?;
    Ok(pool)
}
