//! Process-wide conquest state: fleets and the last round's token grants.
//!
//! Constructed once at service start and threaded through the server; saved
//! with bincode on the autosave cadence and restored on the next start.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::fleet::FleetRegistry;
use crate::ledger::TokenLedger;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConquestState {
    pub fleets: FleetRegistry,
    pub tokens_last_round: TokenLedger,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to access state file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode or decode state: {0}")]
    Encoding(#[from] bincode::Error),
}

impl ConquestState {
    pub fn encode(&self) -> Result<Vec<u8>, StateError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Writes to a sibling `.tmp` file, then renames it over `path`.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let bytes = self.encode()?;
        let staging = path.with_extension("tmp");
        fs::write(&staging, &bytes).map_err(|source| StateError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            target: "conquest::state",
            path = %path.display(),
            bytes = bytes.len(),
            "state.saved"
        );
        Ok(())
    }

    /// Restores saved state; a missing file is a fresh start, not an error.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(
                    target: "conquest::state",
                    path = %path.display(),
                    "state.loaded=empty"
                );
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(StateError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let state = Self::decode(&bytes)?;
        info!(
            target: "conquest::state",
            path = %path.display(),
            fleets = state.fleets.owner_count(),
            "state.loaded=file"
        );
        Ok(state)
    }
}
