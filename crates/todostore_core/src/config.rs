//! Store configuration.
//!
//! # Responsibility
//! - Describe which namespace a store persists into and how ids are made.
//! - Validate namespace keys before they reach a slot provider.
//!
//! # Invariants
//! - A namespace starts with an ASCII alphanumeric and has at most 128
//!   characters from `[A-Za-z0-9_.:-]`.

use crate::store::{IdGenerator, RandomIds, SequentialIds};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Namespace used by the todo collection when none is configured.
pub const DEFAULT_NAMESPACE: &str = "todo";

static NAMESPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]{0,127}$").expect("valid namespace regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNamespace(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNamespace(value) => write!(
                f,
                "invalid namespace `{value}`; expected 1-128 chars of [A-Za-z0-9_.:-] starting alphanumeric"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Id generation strategy selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdStrategy {
    /// UUID v4 tokens; safe across reloads and process restarts.
    #[default]
    Random,
    /// Process-scoped counter, continued past the highest persisted id.
    ///
    /// Not a high-water mark: after the highest record is removed, a
    /// reopened store reuses its id.
    Sequential,
}

impl IdStrategy {
    pub fn generator(self) -> Box<dyn IdGenerator> {
        match self {
            Self::Random => Box::new(RandomIds),
            Self::Sequential => Box::new(SequentialIds::new()),
        }
    }
}

/// Settings for opening a `RecordStore` or `TodoList`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub namespace: String,
    pub id_strategy: IdStrategy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            id_strategy: IdStrategy::default(),
        }
    }
}

impl StoreConfig {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_id_strategy(mut self, id_strategy: IdStrategy) -> Self {
        self.id_strategy = id_strategy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_namespace(&self.namespace)
    }
}

/// Checks a namespace key against the allowed shape.
pub fn validate_namespace(namespace: &str) -> Result<(), ConfigError> {
    if NAMESPACE_RE.is_match(namespace) {
        Ok(())
    } else {
        Err(ConfigError::InvalidNamespace(namespace.to_string()))
    }
}
