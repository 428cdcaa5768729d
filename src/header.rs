//! Dictionary header: on-disk format version and string attributes.

use std::collections::BTreeMap;

use crate::settings::settings;

/// Attribute key for the unigram capacity hint consumed by the GC policy.
pub const MAX_UNIGRAM_COUNT_KEY: &str = "MAX_UNIGRAM_COUNT";
/// Attribute key for the bigram capacity hint consumed by the GC policy.
pub const MAX_BIGRAM_COUNT_KEY: &str = "MAX_BIGRAM_COUNT";

/// Closed set of on-disk encodings, ordered oldest to newest.
///
/// The wire tag is written after the magic bytes so every file image is
/// self-describing; decode dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FormatVersion {
    V402,
    V403,
    V4Dev,
}

impl FormatVersion {
    pub const fn tag(self) -> u16 {
        match self {
            FormatVersion::V402 => 402,
            FormatVersion::V403 => 403,
            FormatVersion::V4Dev => 499,
        }
    }

    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            402 => Some(FormatVersion::V402),
            403 => Some(FormatVersion::V403),
            499 => Some(FormatVersion::V4Dev),
            _ => None,
        }
    }

    /// V402 stores only unigram and bigram associations; two-word contexts
    /// exist from V403 on.
    pub const fn supports_trigrams(self) -> bool {
        !matches!(self, FormatVersion::V402)
    }
}

/// Format version, locale tag, and the string-attribute map persisted at the
/// front of every dictionary image.
#[derive(Debug, Clone)]
pub struct DictionaryHeader {
    pub version: FormatVersion,
    pub locale: String,
    attributes: BTreeMap<String, String>,
}

impl DictionaryHeader {
    pub fn new(
        version: FormatVersion,
        locale: impl Into<String>,
        attributes: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            version,
            locale: locale.into(),
            attributes: attributes.into_iter().collect(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn int_attribute(&self, key: &str) -> Option<usize> {
        self.attribute(key)?.parse().ok()
    }

    /// Unigram capacity: header attribute, or the settings default when the
    /// attribute is absent or unparseable.
    pub fn max_unigram_count(&self) -> usize {
        self.int_attribute(MAX_UNIGRAM_COUNT_KEY)
            .unwrap_or(settings().capacity.max_unigrams)
    }

    pub fn max_bigram_count(&self) -> usize {
        self.int_attribute(MAX_BIGRAM_COUNT_KEY)
            .unwrap_or(settings().capacity.max_bigrams)
    }
}
