//! Checksummed on-disk snapshot of the session store.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::combat::types::{ParticipantId, Session};
use crate::core::constants::{SNAPSHOT_FILE_NAME, SNAPSHOT_MAGIC};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot encoding failed: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("snapshot checksum mismatch")]
    ChecksumMismatch,

    #[error("not a session snapshot (magic 0x{0:016X})")]
    BadMagic(u64),

    #[error("no config directory available for snapshots")]
    NoConfigDir,
}

/// Reads and writes the session snapshot file.
///
/// File format:
/// - Magic (8 bytes)
/// - Payload length (4 bytes)
/// - bincode payload
/// - SHA-256 over magic, length and payload (32 bytes)
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot in the platform config directory, created if needed.
    pub fn in_config_dir() -> Result<Self, SnapshotError> {
        let dirs = ProjectDirs::from("", "", "skirmish").ok_or(SnapshotError::NoConfigDir)?;
        let dir = dirs.config_dir();
        fs::create_dir_all(dir)?;
        Ok(Self::at(dir.join(SNAPSHOT_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, sessions: &HashMap<ParticipantId, Session>) -> Result<(), SnapshotError> {
        let data = bincode::serialize(sessions)?;
        let data_len = data.len() as u32;
        let checksum = digest(data_len, &data);

        // Write to a sibling file and rename so a crash never leaves half a snapshot
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&SNAPSHOT_MAGIC.to_le_bytes())?;
            file.write_all(&data_len.to_le_bytes())?;
            file.write_all(&data)?;
            file.write_all(&checksum)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            "wrote {} session entries to {}",
            sessions.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn load(&self) -> Result<HashMap<ParticipantId, Session>, SnapshotError> {
        let mut file = fs::File::open(&self.path)?;

        let mut magic_bytes = [0u8; 8];
        file.read_exact(&mut magic_bytes)?;
        let magic = u64::from_le_bytes(magic_bytes);
        if magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic(magic));
        }

        let mut len_bytes = [0u8; 4];
        file.read_exact(&mut len_bytes)?;
        let data_len = u32::from_le_bytes(len_bytes);

        let mut data = vec![0u8; data_len as usize];
        file.read_exact(&mut data)?;

        let mut stored = [0u8; 32];
        file.read_exact(&mut stored)?;

        if digest(data_len, &data).as_slice() != stored.as_slice() {
            tracing::warn!("snapshot {} failed checksum", self.path.display());
            return Err(SnapshotError::ChecksumMismatch);
        }

        Ok(bincode::deserialize(&data)?)
    }
}

fn digest(data_len: u32, data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(SNAPSHOT_MAGIC.to_le_bytes());
    hasher.update(data_len.to_le_bytes());
    hasher.update(data);
    hasher.finalize().to_vec()
}
