//! Stored access keys: JSON mapping of controller endpoint -> { name, access key }.
//! Stored under XDG config dir: $XDG_CONFIG_HOME/termlink/credentials.json (fallback ~/.config/termlink/credentials.json)

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::{collections::BTreeMap, fs, io, path::Path, path::PathBuf};
use termlink_agent::RegisteredIdentity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialEntry {
    pub name: String,
    pub access_key_id: String,
    pub access_key_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CredentialsFile {
    #[serde(default)]
    pub terminals: BTreeMap<String, CredentialEntry>,
    #[serde(default)]
    pub version: u32,
}

impl CredentialsFile {
    /// Key pair registered under `name` at `endpoint`. A different name means
    /// the terminal has to register again.
    pub fn identity_for(&self, endpoint: &str, name: &str) -> Option<RegisteredIdentity> {
        self.terminals
            .get(endpoint)
            .filter(|e| e.name == name)
            .map(|e| RegisteredIdentity::new(&e.access_key_id, &e.access_key_secret))
    }

    pub fn remember(&mut self, endpoint: &str, name: &str, identity: &RegisteredIdentity) {
        self.terminals.insert(
            endpoint.to_string(),
            CredentialEntry {
                name: name.to_string(),
                access_key_id: identity.access_key_id.clone(),
                access_key_secret: identity.access_key_secret.clone(),
            },
        );
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("termlink")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("termlink")
    }
}

pub fn credentials_path() -> PathBuf {
    config_dir().join("credentials.json")
}

pub fn load_credentials() -> CredentialsFile {
    load_from(&credentials_path())
}

pub fn save_credentials(c: &CredentialsFile) -> io::Result<()> {
    save_to(&credentials_path(), c)
}

fn load_from(path: &Path) -> CredentialsFile {
    match fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
        Err(_) => CredentialsFile::default(),
    }
}

fn save_to(path: &Path, c: &CredentialsFile) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(c).map_err(io::Error::other)?;
    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut f = opts.open(path)?;
    // mode() only applies on create; tighten files left by older versions
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        f.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    f.write_all(&data)
}
