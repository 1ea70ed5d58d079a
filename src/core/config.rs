//! Cache and table configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::util::{Error, Result};

/// Resource cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Base location every relative URI is resolved against.
    pub base: Url,
}

impl CacheConfig {
    /// Configuration with an explicit base URL.
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// Configuration rooted at a local directory (`file://` base).
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            std::env::current_dir()?.join(dir)
        };
        let base = Url::from_directory_path(&dir).map_err(|_| Error::InvalidUri {
            uri: dir.display().to_string(),
            reason: "not an absolute directory path".into(),
        })?;
        Ok(Self { base })
    }
}

/// How writes to binary properties treat buffers shared with other accessors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BufferWritePolicy {
    /// Copy the property's byte range into private storage on first write.
    #[default]
    CopyOnWrite,
    /// Write through to the shared document buffer. Other accessors over the
    /// same bytes observe the change.
    Alias,
}

/// Options applied while building a feature table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableOptions {
    pub buffer_writes: BufferWritePolicy,
}

impl TableOptions {
    /// Options that let writes alias shared document buffers.
    pub fn aliasing() -> Self {
        Self {
            buffer_writes: BufferWritePolicy::Alias,
        }
    }
}
