//! `key=value;key=value` parameter strings
//!
//! The framework passes control-plane settings (codec hints, routing) as a
//! flat string of semicolon separated pairs. Order is preserved and a repeated
//! key keeps its last value.

use crate::error::{Result, SoulError};
use std::fmt;

/// Parsed key/value parameter list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueParams {
    pairs: Vec<(String, String)>,
}

impl KeyValueParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `k=v;k2=v2` string
    ///
    /// Empty segments are skipped. A key without `=` is kept with an empty value,
    /// which lets `get_parameters("routing")` style key lists reuse this parser.
    pub fn parse(input: &str) -> Self {
        let mut params = Self::new();
        for segment in input.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            match segment.split_once('=') {
                Some((key, value)) => params.insert(key.trim(), value.trim()),
                None => params.insert(segment, ""),
            }
        }
        params
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.pairs.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.pairs.push((key, value));
        }
    }

    pub fn insert_int(&mut self, key: impl Into<String>, value: i64) {
        self.insert(key, value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Integer value of `key`, `Ok(None)` when absent
    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<i64>().map(Some).map_err(|e| {
                SoulError::invalid_argument(format!("{key}={raw} is not an integer: {e}"))
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for KeyValueParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}
