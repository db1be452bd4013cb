//! Secrets loaded from the runtime `.env` file, with the process
//! environment as fallback.
//!
//! The config only names the variables (`STEAM_USERNAME`,
//! `STEAM_PASSWORD`, `OPENWEATHER_API_KEY` by default); their values never
//! appear in `config.toml` or in logs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::config::SteamConfig;
use crate::steam::SteamLogin;

/// Runtime credentials loaded from the `.env` file.
#[derive(Clone, Default)]
pub struct Credentials {
    vars: BTreeMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a key-value map.
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Value from the `.env` file, then from the process environment.
    /// Blank values count as missing.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.vars.get(key).filter(|v| !v.trim().is_empty()) {
            return Some(value.clone());
        }
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    /// Returns a required credential or an error when missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is in neither the `.env` file nor the
    /// environment.
    pub fn require(&self, key: &str) -> anyhow::Result<String> {
        self.get(key)
            .ok_or_else(|| anyhow::anyhow!("missing required credential: {key}"))
    }

    /// Steam logon credentials named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error when the account name or password is missing.
    pub fn steam_login(&self, config: &SteamConfig) -> anyhow::Result<SteamLogin> {
        Ok(SteamLogin {
            account_name: self.require(&config.username_env)?,
            password: self.require(&config.password_env)?,
            auth_code: config.auth_code.clone().filter(|c| !c.trim().is_empty()),
        })
    }
}

/// Load credentials from a specific `.env` path.
///
/// # Errors
///
/// Returns an error if the file does not exist, permissions are too broad,
/// or parsing fails.
pub fn load_credentials(path: &Path) -> anyhow::Result<Credentials> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "credentials file does not exist: {}",
            path.display()
        ));
    }

    validate_private_permissions(path)?;

    let mut vars = BTreeMap::new();
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read credentials at {}", path.display()))?;

    for item in iter {
        let (key, value) = item.with_context(|| {
            format!(
                "failed to parse key-value entry in credentials file {}",
                path.display()
            )
        })?;
        vars.insert(key, value);
    }

    Ok(Credentials { vars })
}

/// Like [`load_credentials`], but a missing file yields empty credentials
/// so everything falls back to the environment.
///
/// # Errors
///
/// Returns an error if the file exists but is unsafe or unparsable.
pub fn load_optional_credentials(path: &Path) -> anyhow::Result<Credentials> {
    if !path.exists() {
        debug!(path = %path.display(), "no .env file, using process environment");
        return Ok(Credentials::default());
    }
    load_credentials(path)
}

/// Set owner-only permissions on a file when supported.
///
/// # Errors
///
/// Returns an error if permissions cannot be updated.
pub fn enforce_private_file_permissions(path: &Path) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

#[cfg(unix)]
fn validate_private_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to inspect credentials file {}", path.display()))?;
    let mode = metadata.permissions().mode() & 0o777;

    if mode & 0o077 != 0 {
        return Err(anyhow::anyhow!(
            "credentials file {} must be 0600, found {:o}",
            path.display(),
            mode
        ));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_private_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
