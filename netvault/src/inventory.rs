//! Device inventory and secrets loading.
//!
//! The inventory is a YAML `devices:` list; secrets are a YAML `secrets:`
//! map keyed by the devices' `secret_ref`. A password may be overridden
//! with `NETVAULT_SECRET_<REF>` where `<REF>` is the reference in upper
//! snake case.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use secrecy::SecretString;
use serde::Deserialize;

use crate::backup::DeviceDescriptor;
use crate::error::{ConfigError, Result};
use crate::platform::Vendor;
use crate::storage::is_safe_file_name;
use crate::transport::AuthMethod;

/// Prefix of password override environment variables.
pub const SECRET_ENV_PREFIX: &str = "NETVAULT_SECRET_";

fn default_port() -> u16 {
    22
}

fn default_true() -> bool {
    true
}

/// One `devices:` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceEntry {
    pub name: String,
    pub vendor: Vendor,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub model: Option<String>,
    pub secret_ref: String,
    /// Authenticate with this private key; the secret's `key_passphrase`
    /// unlocks it.
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub system_backup: bool,
}

impl DeviceEntry {
    /// Combine the entry with its resolved credentials.
    pub fn descriptor(&self, secret: SecretEntry) -> DeviceDescriptor {
        let auth = match &self.key_file {
            Some(path) => AuthMethod::PrivateKey {
                path: path.clone(),
                passphrase: secret.key_passphrase,
            },
            None => AuthMethod::Password(secret.password),
        };
        DeviceDescriptor {
            name: self.name.clone(),
            vendor: self.vendor,
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            auth,
            enable_credential: secret.enable_password,
            model: self.model.clone(),
            system_backup: self.system_backup && self.vendor == Vendor::Mikrotik,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InventoryFile {
    devices: Vec<DeviceEntry>,
}

/// Load and validate the device inventory.
pub fn load_inventory(path: &Path) -> Result<Vec<DeviceEntry>> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let devices = parse_inventory(&raw, path)?;
    debug!(
        "inventory loaded path={} devices={}",
        path.display(),
        devices.len()
    );
    Ok(devices)
}

fn parse_inventory(raw: &str, path: &Path) -> Result<Vec<DeviceEntry>> {
    let file: InventoryFile = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut seen = HashSet::new();
    for device in &file.devices {
        if device.name.trim().is_empty() {
            return Err(invalid("device name must not be empty"));
        }
        if !is_safe_file_name(&device.name) {
            return Err(invalid(format!(
                "device name '{}' must not contain whitespace or path separators",
                device.name
            )));
        }
        if !seen.insert(device.name.as_str()) {
            return Err(invalid(format!("duplicate device name '{}'", device.name)));
        }
        if device.host.trim().is_empty() {
            return Err(invalid(format!("device '{}' has an empty host", device.name)));
        }
        if device.username.trim().is_empty() {
            return Err(invalid(format!(
                "device '{}' has an empty username",
                device.name
            )));
        }
        if device.secret_ref.trim().is_empty() {
            return Err(invalid(format!(
                "device '{}' has an empty secret_ref",
                device.name
            )));
        }
    }
    Ok(file.devices)
}

fn invalid(message: impl Into<String>) -> crate::error::Error {
    ConfigError::Invalid {
        message: message.into(),
    }
    .into()
}

/// Credentials for one secret reference.
#[derive(Debug, Clone)]
pub struct SecretEntry {
    pub password: SecretString,
    pub enable_password: Option<SecretString>,
    pub key_passphrase: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSecret {
    password: String,
    #[serde(default)]
    enable_password: Option<String>,
    #[serde(default)]
    key_passphrase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecretsFile {
    secrets: HashMap<String, RawSecret>,
}

/// Secrets loaded from disk.
#[derive(Debug, Default)]
pub struct Secrets {
    entries: HashMap<String, SecretEntry>,
}

impl Secrets {
    /// Load the secrets file. A missing file is not an error; only
    /// environment overrides will resolve in that case.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("secrets file not found at {}", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let secrets = Self::parse(&raw, path)?;
        debug!(
            "secrets file loaded path={} entries={}",
            path.display(),
            secrets.len()
        );
        Ok(secrets)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self> {
        let file: SecretsFile = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let entries = file
            .secrets
            .into_iter()
            .map(|(secret_ref, raw)| {
                let entry = SecretEntry {
                    password: SecretString::from(raw.password),
                    enable_password: raw.enable_password.map(SecretString::from),
                    key_passphrase: raw.key_passphrase.map(SecretString::from),
                };
                (secret_ref, entry)
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve `secret_ref`, letting the process environment override the
    /// password.
    pub fn resolve(&self, secret_ref: &str) -> Result<SecretEntry> {
        self.resolve_with(secret_ref, |key| std::env::var(key).ok())
    }

    /// Resolve `secret_ref` with an explicit environment lookup.
    ///
    /// An override replaces only the password; the file's enable password
    /// and key passphrase are kept.
    pub fn resolve_with(
        &self,
        secret_ref: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<SecretEntry> {
        let entry = self.entries.get(secret_ref);
        if let Some(password) = env(&env_key(secret_ref)) {
            debug!("secret '{}' taken from environment", secret_ref);
            return Ok(SecretEntry {
                password: SecretString::from(password),
                enable_password: entry.and_then(|e| e.enable_password.clone()),
                key_passphrase: entry.and_then(|e| e.key_passphrase.clone()),
            });
        }
        entry.cloned().ok_or_else(|| {
            ConfigError::SecretNotFound {
                secret_ref: secret_ref.to_string(),
            }
            .into()
        })
    }
}

/// Environment variable holding the password override for `secret_ref`.
pub fn env_key(secret_ref: &str) -> String {
    let mut key = String::with_capacity(SECRET_ENV_PREFIX.len() + secret_ref.len());
    key.push_str(SECRET_ENV_PREFIX);
    let mut pending_separator = false;
    for c in secret_ref.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && key.len() > SECRET_ENV_PREFIX.len() {
                key.push('_');
            }
            pending_separator = false;
            key.push(c.to_ascii_uppercase());
        } else {
            pending_separator = true;
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use secrecy::ExposeSecret;

    const INVENTORY: &str = r#"
devices:
  - name: core-sw1
    vendor: cisco
    host: 192.0.2.1
    username: backup
    secret_ref: cisco-core
  - name: edge-rtr
    vendor: mikrotik
    host: 192.0.2.2
    port: 2222
    username: admin
    model: RB4011
    secret_ref: mikrotik
    system_backup: false
"#;

    const SECRETS: &str = r#"
secrets:
  cisco-core:
    password: file-pass
    enable_password: enable-pass
  mikrotik:
    password: mt-pass
"#;

    fn path() -> PathBuf {
        PathBuf::from("devices.yml")
    }

    #[test]
    fn test_parse_inventory() {
        let devices = parse_inventory(INVENTORY, &path()).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].vendor, Vendor::Cisco);
        assert_eq!(devices[0].port, 22);
        assert!(devices[0].system_backup);
        assert_eq!(devices[1].port, 2222);
        assert_eq!(devices[1].model.as_deref(), Some("RB4011"));
        assert!(!devices[1].system_backup);
    }

    #[test]
    fn test_inventory_rejects_duplicates() {
        let raw = r#"
devices:
  - {name: r1, vendor: cisco, host: a, username: u, secret_ref: s}
  - {name: r1, vendor: cisco, host: b, username: u, secret_ref: s}
"#;
        let err = parse_inventory(raw, &path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("duplicate device name 'r1'"));
    }

    #[test]
    fn test_inventory_rejects_path_like_names() {
        for name in ["../../x", "lab/r1", "'r1 old'", ".."] {
            let raw = format!(
                "devices:\n  - {{name: {name}, vendor: cisco, host: a, username: u, secret_ref: s}}\n"
            );
            let err = parse_inventory(&raw, &path()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{name}");
            assert!(err.to_string().contains("path separators"), "{name}");
        }
    }

    #[test]
    fn test_inventory_rejects_unknown_vendor() {
        let raw =
            "devices:\n  - {name: r1, vendor: juniper, host: a, username: u, secret_ref: s}\n";
        assert!(parse_inventory(raw, &path()).is_err());
    }

    #[test]
    fn test_load_inventory_missing_file() {
        let err = load_inventory(Path::new("/nonexistent/devices.yml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_env_key() {
        assert_eq!(env_key("cisco-core"), "NETVAULT_SECRET_CISCO_CORE");
        assert_eq!(env_key("--lab.router 1--"), "NETVAULT_SECRET_LAB_ROUTER_1");
        assert_eq!(env_key("mikrotik"), "NETVAULT_SECRET_MIKROTIK");
    }

    #[test]
    fn test_resolve_from_file() {
        let secrets = Secrets::parse(SECRETS, &path()).unwrap();
        let entry = secrets.resolve_with("cisco-core", |_| None).unwrap();
        assert_eq!(entry.password.expose_secret(), "file-pass");
        assert_eq!(
            entry.enable_password.as_ref().map(|s| s.expose_secret()),
            Some("enable-pass")
        );
    }

    #[test]
    fn test_env_override_keeps_enable_password() {
        let secrets = Secrets::parse(SECRETS, &path()).unwrap();
        let entry = secrets
            .resolve_with("cisco-core", |key| {
                (key == "NETVAULT_SECRET_CISCO_CORE").then(|| "env-pass".to_string())
            })
            .unwrap();
        assert_eq!(entry.password.expose_secret(), "env-pass");
        assert!(entry.enable_password.is_some());
    }

    #[test]
    fn test_env_only_secret() {
        let secrets = Secrets::default();
        let entry = secrets
            .resolve_with("lab", |_| Some("env-pass".to_string()))
            .unwrap();
        assert_eq!(entry.password.expose_secret(), "env-pass");
        assert!(entry.enable_password.is_none());
    }

    #[test]
    fn test_missing_secret() {
        let secrets = Secrets::parse(SECRETS, &path()).unwrap();
        let err = secrets.resolve_with("unknown", |_| None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("Secret 'unknown' not found"));
    }

    #[test]
    fn test_missing_secrets_file_is_empty() {
        let secrets = Secrets::load(Path::new("/nonexistent/secrets.yml")).unwrap();
        assert!(secrets.is_empty());
    }

    #[test]
    fn test_descriptor_auth() {
        let devices = parse_inventory(INVENTORY, &path()).unwrap();
        let secrets = Secrets::parse(SECRETS, &path()).unwrap();

        let cisco = devices[0].descriptor(secrets.resolve_with("cisco-core", |_| None).unwrap());
        assert!(matches!(cisco.auth, AuthMethod::Password(_)));
        assert!(cisco.enable_credential.is_some());
        assert!(!cisco.system_backup);

        let mut keyed = devices[1].clone();
        keyed.key_file = Some(PathBuf::from("/keys/id_ed25519"));
        let mikrotik = keyed.descriptor(secrets.resolve_with("mikrotik", |_| None).unwrap());
        assert!(matches!(mikrotik.auth, AuthMethod::PrivateKey { .. }));
    }
}
