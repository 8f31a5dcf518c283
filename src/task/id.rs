// src/task/id.rs

use std::collections::BTreeMap;
use std::fmt;

use blake3::Hasher;

/// Parameter mapping that, together with the kind, identifies a task.
///
/// A `BTreeMap` keeps iteration order stable, which the fingerprint and the
/// display form rely on.
pub type Params = BTreeMap<String, String>;

/// Number of hex characters kept from the blake3 digest in [`TaskId::fingerprint`].
const FINGERPRINT_LEN: usize = 10;

/// Structural task identity: `(kind, parameters)`.
///
/// Equality, ordering and hashing are derived from the fields, so two tasks
/// built independently from the same parameters are the same task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    kind: String,
    params: Params,
}

impl TaskId {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Params::new(),
        }
    }

    pub fn from_params(kind: impl Into<String>, params: Params) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Short, stable hash of the identity.
    ///
    /// Every field is length-prefixed before hashing so that different
    /// splits of the same bytes never collide (`a=bc` vs `ab=c`).
    pub fn fingerprint(&self) -> String {
        let mut hasher = Hasher::new();
        update_field(&mut hasher, &self.kind);
        for (key, value) in &self.params {
            update_field(&mut hasher, key);
            update_field(&mut hasher, value);
        }
        let hex = hasher.finalize().to_hex();
        hex.as_str()[..FINGERPRINT_LEN].to_string()
    }

    /// Default token name for a task, e.g. `transform_3f9a0c12de`.
    pub fn token_name(&self) -> String {
        format!("{}_{}", self.kind, self.fingerprint())
    }
}

fn update_field(hasher: &mut Hasher, field: &str) {
    hasher.update(&(field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind)?;
        if self.params.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str(")")
    }
}
