//! Round-robin rotation over the configured provider API keys.
//!
//! Keys are discovered once, at construction, from variables named
//! `OPENAI_API_KEY_<suffix>` (any suffix, in enumeration order). When none are
//! present the single `OPENAI_API_KEY` is used if it is non-empty. The set never
//! changes afterwards; an empty set is valid and only fails when a key is requested.
//!
//! Enumeration order of the process environment is platform dependent, so the
//! rotation order of numbered keys is stable for the process lifetime but not
//! lexically sorted.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::CredentialError;

/// Prefix shared by numbered keys.
pub const NUMBERED_KEY_PREFIX: &str = "OPENAI_API_KEY_";

/// Single fallback key used when no numbered keys exist.
pub const DEFAULT_KEY_VAR: &str = "OPENAI_API_KEY";

/// Ordered credential set with a shared rotation cursor.
#[derive(Debug, Default)]
pub struct CredentialRotator {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl CredentialRotator {
    /// Rotate over an explicit list of keys, in the given order.
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Discover keys from the process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn from_env() -> Self {
        let vars = std::env::vars_os().filter_map(|(k, v)| {
            let k = k.into_string().ok()?;
            let v = v.into_string().ok()?;
            Some((k, v))
        });
        let rotator = Self::from_vars(vars);
        tracing::info!(count = rotator.len(), "OpenAI API keys discovered");
        rotator
    }

    /// Apply the discovery rules to an explicit `(name, value)` sequence.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut numbered = Vec::new();
        let mut default_key = None;
        for (name, value) in vars {
            let name = name.as_ref();
            if name.starts_with(NUMBERED_KEY_PREFIX) {
                numbered.push(value.into());
            } else if name == DEFAULT_KEY_VAR {
                default_key = Some(value.into());
            }
        }

        if numbered.is_empty() {
            if let Some(k) = default_key.filter(|k| !k.is_empty()) {
                numbered.push(k);
            }
        }
        Self::new(numbered)
    }

    /// Return the key under the cursor and advance the cursor by one, wrapping.
    ///
    /// The read and the advance are one atomic step, so concurrent callers are
    /// handed consecutive positions.
    pub fn next_credential(&self) -> Result<String, CredentialError> {
        let len = self.keys.len();
        if len == 0 {
            return Err(CredentialError::NoCredentialsConfigured);
        }
        let idx = match self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some((c + 1) % len))
        {
            Ok(prev) | Err(prev) => prev,
        };
        Ok(self.keys[idx].clone())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
