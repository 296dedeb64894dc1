//! Apache htpasswd credential file (bcrypt entries).
//!
//! Format: one `user:hash` entry per line. Blank lines and lines whose first
//! non-blank character is `#` are ignored.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Password hashed for comparisons against unknown users.
const DUMMY_PASSWORD: &str = "sesam-unknown-user";

/// Valid bcrypt cost range.
const COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Failed to read credentials file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("htpasswd: invalid entry at line {line}: {text:?}")]
    InvalidEntry { line: usize, text: String },

    #[error("bcrypt error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Parsed credential file. Lookups never reveal whether a user exists:
/// unknown users are checked against a dummy hash with the same cost.
#[derive(Debug)]
pub struct HtPasswd {
    entries: HashMap<String, String>,
    dummy_hash: String,
}

impl HtPasswd {
    /// Read and parse the credential file at `path`.
    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let text = std::fs::read_to_string(path).map_err(|source| CredentialsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, CredentialsError> {
        let mut entries = HashMap::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once(':') {
                Some((user, hash)) if !user.is_empty() => {
                    entries.insert(user.to_string(), hash.to_string());
                }
                _ => {
                    return Err(CredentialsError::InvalidEntry {
                        line: idx + 1,
                        text: raw.to_string(),
                    })
                }
            }
        }

        // Match the cost of real entries so both paths take the same time
        let cost = entries
            .values()
            .filter_map(|hash| bcrypt_cost(hash))
            .max()
            .unwrap_or(bcrypt::DEFAULT_COST);
        let dummy_hash = bcrypt::hash(DUMMY_PASSWORD, cost)?;

        Ok(Self {
            entries,
            dummy_hash,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Verify a username/password pair. Always runs one bcrypt comparison.
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        let (hash, known) = self.verify_target(username);
        let matched = bcrypt::verify(password, hash).unwrap_or(false);
        known && matched
    }

    /// Hash to compare against, and whether a match may succeed. Unknown
    /// users and entries that are not bcrypt use the dummy hash.
    fn verify_target(&self, username: &str) -> (&str, bool) {
        match self.entries.get(username) {
            Some(hash) if bcrypt_cost(hash).is_some() => (hash, true),
            _ => (&self.dummy_hash, false),
        }
    }
}

/// Extract the cost from a `$2y$NN$...` hash.
fn bcrypt_cost(hash: &str) -> Option<u32> {
    let mut parts = hash.split('$');
    let _ = parts.next()?;
    let version = parts.next()?;
    if !version.starts_with('2') {
        return None;
    }
    parts
        .next()?
        .parse::<u32>()
        .ok()
        .filter(|c| COST_RANGE.contains(c))
}
