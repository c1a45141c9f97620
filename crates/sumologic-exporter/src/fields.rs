// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Routing metadata extracted from record attributes.
//!
//! The [`Filter`] selects the attributes whose names match one of the configured metadata
//! patterns. The selected pairs become the record's [`Fields`], which are rendered into the
//! `X-Sumo-Fields` header and used to group consecutive records into the same request.

use indexmap::IndexMap;
use regex::Regex;
use std::fmt;

use crate::errors::ConfigError;
use crate::record::Attributes;

/// Ordered set of metadata key/value pairs.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    inner: IndexMap<String, String>,
}

// Two field sets are only equal when they hold the same pairs in the same order.
impl PartialEq for Fields {
    fn eq(&self, other: &Self) -> bool {
        self.inner.len() == other.inner.len() && self.inner.iter().eq(other.inner.iter())
    }
}

impl Eq for Fields {}

impl Fields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Renders the fields as `key=value` pairs joined by `, `, in insertion order.
impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.inner.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Fields {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut fields = Self::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// Compiled metadata attribute patterns.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    regexes: Vec<Regex>,
}

impl Filter {
    /// Compiles each pattern as a regular expression anchored at both ends, so plain attribute
    /// names only match themselves and `k8s.*` matches every `k8s.` attribute.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let regexes = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
                    ConfigError::InvalidPattern {
                        pattern: pattern.to_string(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { regexes })
    }

    fn matches(&self, key: &str) -> bool {
        self.regexes.iter().any(|regex| regex.is_match(key))
    }

    /// Returns the matching attributes as fields, in attribute order.
    #[must_use]
    pub fn filter_in(&self, attributes: &Attributes) -> Fields {
        attributes
            .iter()
            .filter(|(key, _)| self.matches(key))
            .map(|(key, value)| (key.clone(), value.as_string()))
            .collect()
    }

    /// Returns the attributes that do not match any pattern.
    #[must_use]
    pub fn filter_out(&self, attributes: &Attributes) -> Attributes {
        attributes
            .iter()
            .filter(|(key, _)| !self.matches(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}
