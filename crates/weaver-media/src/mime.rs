//! MIME type taxonomy and file classification.
//!
//! A taxonomy maps category keys to MIME patterns. A pattern is either a
//! single MIME string, an ordered list of them, or a nested taxonomy. Both
//! exact types (`application/pdf`) and main-type wildcards (`image/*`) are
//! accepted. Key order is significant: classification returns the first
//! depth-first match.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smol_str::SmolStr;

/// One taxonomy entry value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MimePattern {
    Single(SmolStr),
    List(Vec<SmolStr>),
    Nested(MimeTaxonomy),
}

impl MimePattern {
    /// Check whether a file MIME type matches this pattern.
    ///
    /// Nested taxonomies never match directly; use [`MimeTaxonomy::classify`].
    fn matches_leaf(&self, mime: &str) -> bool {
        match self {
            Self::Single(pattern) => pattern_matches(pattern, mime),
            Self::List(patterns) => patterns.iter().any(|p| pattern_matches(p, mime)),
            Self::Nested(_) => false,
        }
    }

    fn flatten_into(&self, out: &mut Vec<SmolStr>) {
        match self {
            Self::Single(pattern) => push_unique(out, pattern),
            Self::List(patterns) => patterns.iter().for_each(|p| push_unique(out, p)),
            Self::Nested(taxonomy) => taxonomy
                .entries
                .iter()
                .for_each(|(_, pattern)| pattern.flatten_into(out)),
        }
    }
}

impl From<&str> for MimePattern {
    fn from(value: &str) -> Self {
        Self::Single(value.into())
    }
}

impl From<&[&str]> for MimePattern {
    fn from(values: &[&str]) -> Self {
        Self::List(values.iter().map(|v| SmolStr::new(v)).collect())
    }
}

impl<const N: usize> From<[&str; N]> for MimePattern {
    fn from(values: [&str; N]) -> Self {
        Self::List(values.iter().map(|v| SmolStr::new(v)).collect())
    }
}

impl From<MimeTaxonomy> for MimePattern {
    fn from(taxonomy: MimeTaxonomy) -> Self {
        Self::Nested(taxonomy)
    }
}

/// Ordered mapping from category key to [`MimePattern`].
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct MimeTaxonomy {
    entries: Vec<(SmolStr, MimePattern)>,
}

const WORD: [&str; 2] = [
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];
const EXCEL: [&str; 2] = [
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];
const POWERPOINT: [&str; 2] = [
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
];

impl MimeTaxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in taxonomy used when no overrides are configured.
    pub fn defaults() -> Self {
        Self::new()
            .with("image", "image/*")
            .with("audio", "audio/*")
            .with("video", "video/*")
            .with("pdf", "application/pdf")
            .with("word", WORD)
            .with("excel", EXCEL)
            .with("powerpoint", POWERPOINT)
            .with(
                "file",
                Self::new()
                    .with("pdf", "application/pdf")
                    .with("word", WORD)
                    .with("excel", EXCEL)
                    .with("powerpoint", POWERPOINT),
            )
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<SmolStr>, pattern: impl Into<MimePattern>) -> Self {
        self.insert(key, pattern);
        self
    }

    /// Insert an entry. An existing key keeps its position and gets the new
    /// pattern; a new key is appended.
    pub fn insert(&mut self, key: impl Into<SmolStr>, pattern: impl Into<MimePattern>) {
        let key = key.into();
        let pattern = pattern.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = pattern,
            None => self.entries.push((key, pattern)),
        }
    }

    /// Shallow merge of `overrides` over `self`.
    pub fn merge(&mut self, overrides: MimeTaxonomy) {
        for (key, pattern) in overrides.entries {
            self.insert(key, pattern);
        }
    }

    /// Get the top-level pattern for a key.
    pub fn get(&self, key: &str) -> Option<&MimePattern> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, pattern)| pattern)
    }

    /// Iterate top-level entries in declared order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MimePattern)> {
        self.entries.iter().map(|(k, p)| (k.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Classify a MIME type, returning the first depth-first leaf key that
    /// matches.
    pub fn classify(&self, mime: &str) -> Option<&str> {
        self.entries.iter().find_map(|(key, pattern)| match pattern {
            MimePattern::Nested(inner) => inner.classify(mime),
            leaf if leaf.matches_leaf(mime) => Some(key.as_str()),
            _ => None,
        })
    }

    /// Find the pattern for a key anywhere in the tree, depth-first.
    pub fn find(&self, key: &str) -> Option<&MimePattern> {
        self.entries.iter().find_map(|(k, pattern)| {
            if k == key {
                Some(pattern)
            } else if let MimePattern::Nested(inner) = pattern {
                inner.find(key)
            } else {
                None
            }
        })
    }

    /// Flattened MIME patterns for a file picker `accept` constraint.
    ///
    /// `None` flattens the whole tree. An unknown category yields an empty
    /// list. Duplicates are dropped, keeping the first occurrence.
    pub fn accept_list(&self, category: Option<&str>) -> Vec<SmolStr> {
        let mut out = Vec::new();
        match category {
            Some(key) => {
                if let Some(pattern) = self.find(key) {
                    pattern.flatten_into(&mut out);
                }
            }
            None => MimePattern::Nested(self.clone()).flatten_into(&mut out),
        }
        out
    }

    /// All leaf keys in depth-first order (may contain repeats across levels).
    pub fn leaf_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        for (key, pattern) in &self.entries {
            match pattern {
                MimePattern::Nested(inner) => keys.extend(inner.leaf_keys()),
                _ => keys.push(key.as_str()),
            }
        }
        keys
    }
}

/// Free-function form of [`MimeTaxonomy::classify`].
pub fn classify<'t>(mime: &str, taxonomy: &'t MimeTaxonomy) -> Option<&'t str> {
    taxonomy.classify(mime)
}

/// Main type of a MIME string (`image` for `image/png`).
///
/// Only word characters are accepted before the slash.
pub fn main_type(mime: &str) -> Option<&str> {
    let (main, _) = mime.split_once('/')?;
    let is_word = !main.is_empty() && main.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    is_word.then_some(main)
}

fn pattern_matches(pattern: &str, mime: &str) -> bool {
    if pattern == mime {
        return true;
    }
    match pattern.split_once('/') {
        Some((main, "*")) => main_type(pattern).is_some() && main_type(mime) == Some(main),
        _ => false,
    }
}

fn push_unique(out: &mut Vec<SmolStr>, pattern: &SmolStr) {
    if !out.contains(pattern) {
        out.push(pattern.clone());
    }
}

impl Serialize for MimeTaxonomy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, pattern) in &self.entries {
            map.serialize_entry(key, pattern)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MimeTaxonomy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TaxonomyVisitor;

        impl<'de> Visitor<'de> for TaxonomyVisitor {
            type Value = MimeTaxonomy;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category keys to MIME patterns")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut taxonomy = MimeTaxonomy::new();
                while let Some((key, pattern)) = access.next_entry::<SmolStr, MimePattern>()? {
                    taxonomy.insert(key, pattern);
                }
                Ok(taxonomy)
            }
        }

        deserializer.deserialize_map(TaxonomyVisitor)
    }
}
