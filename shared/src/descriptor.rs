//! Connection descriptors: `Key=Value;Key=Value` strings and files of them
//!
//! Keys are matched case-insensitively. Values may contain `=` (base64 keys
//! usually end with padding), only the first `=` of a pair separates key and
//! value.

use base64::prelude::*;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const HOST_NAME: &str = "HostName";
pub const SHARED_ACCESS_KEY_NAME: &str = "SharedAccessKeyName";
pub const SHARED_ACCESS_KEY: &str = "SharedAccessKey";
pub const DEVICE_ID: &str = "DeviceId";

/// Errors raised while reading connection descriptors
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Invalid connection descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Failed to read descriptor file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A parsed connection descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    raw: String,
    entries: Vec<(String, String)>,
}

impl ConnectionDescriptor {
    /// Split a descriptor into its key/value pairs. Never fails; required
    /// fields are checked by the consumer.
    pub fn parse(raw: &str) -> Self {
        let entries = raw
            .trim()
            .split(';')
            .filter(|element| !element.trim().is_empty())
            .map(|element| {
                let (key, value) = element.split_once('=').unwrap_or((element, ""));
                (key.trim().to_string(), value.trim().to_string())
            })
            .collect();

        Self {
            raw: raw.trim().to_string(),
            entries,
        }
    }

    /// Look up a value by case-insensitive key; the last occurrence wins
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Look up a value that must be present and non-empty
    pub fn require(&self, key: &'static str) -> Result<&str, DescriptorError> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(DescriptorError::InvalidDescriptor(format!("missing {key}"))),
        }
    }

    /// The descriptor text as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Credentials needed to sign tokens for a hub access policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubCredentials {
    pub host_name: String,
    pub policy_name: String,
    key: Vec<u8>,
}

impl HubCredentials {
    /// Extract host name, policy name and shared key.
    ///
    /// Fails with `InvalidDescriptor` if any of the three is absent or the
    /// shared key is not base64.
    pub fn from_descriptor(descriptor: &ConnectionDescriptor) -> Result<Self, DescriptorError> {
        let host_name = descriptor.require(HOST_NAME)?.to_string();
        let shared_key = descriptor.require(SHARED_ACCESS_KEY)?;
        let policy_name = descriptor.require(SHARED_ACCESS_KEY_NAME)?.to_string();

        let key = BASE64_STANDARD.decode(shared_key).map_err(|e| {
            DescriptorError::InvalidDescriptor(format!("{SHARED_ACCESS_KEY} is not base64: {e}"))
        })?;

        Ok(Self {
            host_name,
            policy_name,
            key,
        })
    }

    /// Parse credentials straight from descriptor text
    pub fn parse(raw: &str) -> Result<Self, DescriptorError> {
        Self::from_descriptor(&ConnectionDescriptor::parse(raw))
    }

    /// Decoded signing key
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

/// Parse descriptor lines, keyed by the value of `key_name`.
///
/// Blank lines and lines starting with `#` are skipped, as are lines without
/// `key_name`. A repeated key keeps its first position and takes the last
/// line's descriptor.
pub fn parse_descriptor_lines(text: &str, key_name: &str) -> Vec<(String, ConnectionDescriptor)> {
    let mut found: Vec<(String, ConnectionDescriptor)> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let descriptor = ConnectionDescriptor::parse(line);
        let Some(key) = descriptor.get(key_name).map(str::to_string) else {
            continue;
        };

        match found.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = descriptor,
            None => found.push((key, descriptor)),
        }
    }

    found
}

/// Read a descriptor file, see [`parse_descriptor_lines`]
pub fn read_descriptor_file(
    path: impl AsRef<Path>,
    key_name: &str,
) -> Result<Vec<(String, ConnectionDescriptor)>, DescriptorError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| DescriptorError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_descriptor_lines(&text, key_name))
}
