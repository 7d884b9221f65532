//! Typed accessors over the untyped content-API payload.
//!
//! The API guarantees nothing about field presence, so every accessor
//! returns an Option instead of panicking or erroring. "Field missing" is a
//! value here; callers decide whether that means a default, a degradation
//! tier, or a failed entity.

use std::collections::BTreeMap;

use serde_json::Value;

/// One fetched payload: a nested JSON document with no guaranteed shape.
#[derive(Debug, Clone)]
pub struct RawPayload {
    root: Value,
}

impl RawPayload {
    pub fn from_value(root: Value) -> Self {
        RawPayload { root }
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        Ok(RawPayload {
            root: serde_json::from_str(text)?,
        })
    }

    /// True when the document root is a JSON object at all. A non-object
    /// root makes every lookup miss, which is the fail-closed behavior the
    /// completeness check relies on.
    pub fn is_object(&self) -> bool {
        self.root.is_object()
    }

    /// Walk a path of object keys. Any missing step yields None.
    pub fn at(&self, path: &[&str]) -> Option<&Value> {
        let mut current = &self.root;
        for key in path {
            current = current.as_object()?.get(*key)?;
        }
        Some(current)
    }

    pub fn has(&self, path: &[&str]) -> bool {
        self.at(path).is_some()
    }

    pub fn str_at(&self, path: &[&str]) -> Option<&str> {
        self.at(path)?.as_str()
    }

    pub fn f64_at(&self, path: &[&str]) -> Option<f64> {
        self.at(path)?.as_f64()
    }

    /// A numeric progression track: present only when the node is an array
    /// whose every element is a number. Length is the caller's concern.
    pub fn number_track_at(&self, path: &[&str]) -> Option<Vec<f64>> {
        let items = self.at(path)?.as_array()?;
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(item.as_f64()?);
        }
        Some(values)
    }

    /// A language → text map, e.g. the localized description block.
    /// Non-string entries are dropped rather than failing the whole map.
    pub fn text_map_at(&self, path: &[&str]) -> Option<BTreeMap<String, String>> {
        let object = self.at(path)?.as_object()?;
        let mut map = BTreeMap::new();
        for (lang, value) in object {
            if let Some(text) = value.as_str() {
                map.insert(lang.clone(), text.to_string());
            }
        }
        Some(map)
    }

    /// First hit across a set of equivalent key paths. This is the search
    /// primitive behind degradation tier 1 (alternate containers).
    pub fn first_str(&self, paths: &[&[&str]]) -> Option<&str> {
        paths.iter().find_map(|path| self.str_at(path))
    }

    /// Scan the `components` array (when present) for the first object that
    /// carries the given key as a string.
    pub fn find_in_components(&self, key: &str) -> Option<&str> {
        let components = self.at(&["components"])?.as_array()?;
        components
            .iter()
            .find_map(|component| component.as_object()?.get(key)?.as_str())
    }

    /// Clone out one subtree, used to attach salvageable fragments to a
    /// failed entity.
    pub fn section(&self, path: &[&str]) -> Option<Value> {
        self.at(path).cloned()
    }
}
