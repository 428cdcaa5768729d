//! Versioned binary image encoding.
//!
//! Layout: magic `LXDT`, u16 format-version tag, u32 CRC32 of the body,
//! u32 body length, then the bincode-serialized record body. The tag makes
//! every image self-describing, so encodings from different versions can
//! coexist and be migrated.

use serde::{Deserialize, Serialize};

use super::DictError;
use crate::header::FormatVersion;
use crate::probability::HistoricalInfo;

const MAGIC: &[u8; 4] = b"LXDT";
const HEADER_SIZE: usize = 4 + 2 + 4 + 4; // magic + version tag + crc + body_len = 14

/// Flat record body of one dictionary image.
#[derive(Serialize, Deserialize)]
pub(super) struct DictImage {
    pub locale: String,
    pub attributes: Vec<(String, String)>,
    pub unigrams: Vec<UnigramRecord>,
    pub ngrams: Vec<NgramRecord>,
}

#[derive(Serialize, Deserialize)]
pub(super) struct UnigramRecord {
    pub word: String,
    pub probability: u8,
    pub historical: Option<HistoricalInfo>,
    pub is_beginning_of_sentence: bool,
    pub is_not_a_word: bool,
    pub is_possibly_offensive: bool,
    pub shortcuts: Vec<ShortcutRecord>,
}

#[derive(Serialize, Deserialize)]
pub(super) struct ShortcutRecord {
    pub target: String,
    pub probability: u8,
}

#[derive(Serialize, Deserialize)]
pub(super) struct NgramRecord {
    pub is_beginning_of_sentence: bool,
    /// Context words oldest-first; empty only for beginning-of-sentence
    /// entries.
    pub context_words: Vec<String>,
    pub target: String,
    pub probability: u8,
    pub historical: Option<HistoricalInfo>,
}

pub(super) fn encode(version: FormatVersion, image: &DictImage) -> Result<Vec<u8>, DictError> {
    let body = bincode::serialize(image).map_err(DictError::Serialize)?;
    let body_len: u32 = body
        .len()
        .try_into()
        .map_err(|_| DictError::Parse("image body exceeds u32::MAX".to_string()))?;
    let crc = crc32fast::hash(&body);

    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&version.tag().to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&body_len.to_le_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

pub(super) fn decode(data: &[u8]) -> Result<(FormatVersion, DictImage), DictError> {
    if data.len() < 6 {
        return Err(DictError::InvalidHeader);
    }
    if &data[..4] != MAGIC {
        return Err(DictError::InvalidMagic);
    }
    let tag = u16::from_le_bytes(data[4..6].try_into().unwrap());
    let version = FormatVersion::from_tag(tag).ok_or(DictError::UnsupportedVersion(tag))?;
    if data.len() < HEADER_SIZE {
        return Err(DictError::InvalidHeader);
    }

    let crc = u32::from_le_bytes(data[6..10].try_into().unwrap());
    let body_len = u32::from_le_bytes(data[10..14].try_into().unwrap()) as usize;
    if data.len() < HEADER_SIZE + body_len {
        return Err(DictError::InvalidHeader);
    }

    let body = &data[HEADER_SIZE..HEADER_SIZE + body_len];
    if crc32fast::hash(body) != crc {
        return Err(DictError::ChecksumMismatch);
    }

    let mut image: DictImage = bincode::deserialize(body).map_err(DictError::Deserialize)?;
    // Images at a version without trigram support never carry two-word
    // contexts; drop any that appear in a hand-crafted file.
    if !version.supports_trigrams() {
        image.ngrams.retain(|n| n.context_words.len() < 2);
    }
    Ok((version, image))
}
