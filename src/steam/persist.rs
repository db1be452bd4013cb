//! Steam logon state kept between runs: the CM server list and the Steam
//! Guard sentry blob.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::SteamError;

/// A Steam connection manager endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    /// Host or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Paths of the persisted state files.
#[derive(Debug, Clone)]
pub struct SteamState {
    servers_file: PathBuf,
    sentry_file: PathBuf,
}

impl SteamState {
    /// State stored at the given paths.
    pub fn new(servers_file: PathBuf, sentry_file: PathBuf) -> Self {
        Self {
            servers_file,
            sentry_file,
        }
    }

    /// Cached server list. Missing or unreadable files yield an empty list.
    pub fn load_servers(&self) -> Vec<ServerEndpoint> {
        match std::fs::read_to_string(&self.servers_file) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(servers) => servers,
                Err(e) => {
                    warn!(error = %e, path = %self.servers_file.display(), "ignoring corrupt server list");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(error = %e, path = %self.servers_file.display(), "failed to read server list");
                Vec::new()
            }
        }
    }

    /// Replace the cached server list.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_servers(&self, servers: &[ServerEndpoint]) -> Result<(), SteamError> {
        let json = serde_json::to_string(servers)?;
        write_file(&self.servers_file, json.as_bytes())?;
        debug!(count = servers.len(), "steam server list saved");
        Ok(())
    }

    /// Sentry blob as base64, if one was saved.
    pub fn load_sentry(&self) -> Option<String> {
        match std::fs::read(&self.sentry_file) {
            Ok(bytes) => Some(STANDARD.encode(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(error = %e, path = %self.sentry_file.display(), "failed to read sentry");
                None
            }
        }
    }

    /// Decode and store a base64 sentry blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not base64 or the file cannot be
    /// written.
    pub fn save_sentry(&self, data: &str) -> Result<(), SteamError> {
        let bytes = STANDARD.decode(data)?;
        write_file(&self.sentry_file, &bytes)?;
        debug!(bytes = bytes.len(), "steam sentry saved");
        Ok(())
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), SteamError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
