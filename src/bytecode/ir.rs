use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bytecode::Instructions;
use crate::lang::value::Value;

/// File signature of a serialized [`Bytecode`].
const MAGIC: &[u8; 4] = b"MKB1";

/// A compiled bytecode program: everything the VM needs to run one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
    pub instructions: Instructions,

    /// Constant pool. In a REPL session this also holds the constants of
    /// earlier inputs, so indices stay valid across cycles.
    pub constants: Vec<Value>,
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("not a bytecode file (bad signature)")]
    BadMagic,

    #[error("cannot encode bytecode: {0}")]
    Encode(postcard::Error),

    #[error("cannot decode bytecode: {0}")]
    Decode(postcard::Error),

    #[error("cannot access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Bytecode {
    pub fn new(instructions: Instructions, constants: Vec<Value>) -> Self {
        Self {
            instructions,
            constants,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        let body = postcard::to_allocvec(self).map_err(ArtifactError::Encode)?;
        let mut bytes = Vec::with_capacity(MAGIC.len() + body.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend(body);
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let body = bytes.strip_prefix(MAGIC).ok_or(ArtifactError::BadMagic)?;
        postcard::from_bytes(body).map_err(ArtifactError::Decode)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ArtifactError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read_from(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }
}
