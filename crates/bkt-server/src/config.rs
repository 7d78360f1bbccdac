use std::net::SocketAddr;
use std::path::Path;

use bkt_namespace::NamespaceConfig;
use bkt_store::S3Config;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// File names tried, in order, when a directory is requested.
    pub directory_index: Vec<String>,
    /// Files placed above the listing table; the first that exists wins.
    /// A leading `/` makes the name a bucket key instead of a name relative
    /// to the listed directory.
    pub directory_header: Vec<String>,
    /// Like `directory_header`, below the table.
    pub directory_footer: Vec<String>,
    /// Request header that unlocks PUT and DELETE. Writes are refused when
    /// unset.
    pub modify_allow_header: Option<String>,
    pub health_path: String,
    pub namespace: NamespaceConfig,
    pub s3: S3Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            directory_index: Vec::new(),
            directory_header: Vec::new(),
            directory_footer: Vec::new(),
            modify_allow_header: None,
            health_path: "/.well-known/health".into(),
            namespace: NamespaceConfig::default(),
            s3: S3Config::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(raw: &str) -> ServerResult<Self> {
        toml::from_str(raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: &Path) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn writes_enabled(&self) -> bool {
        self.modify_allow_header
            .as_deref()
            .is_some_and(|h| !h.is_empty())
    }
}
