//! Decoding many archive entries at once.
//!
//! Entries share no state once the directory is read, so each one is
//! decoded on the rayon pool and reports its own result.

use rayon::prelude::*;
use serde::Serialize;

use crate::archive::{Archive, ArchiveEntry, EntryKind};
use crate::config::DecodeConfig;
use crate::error::Result;
use crate::wad::{Wad, WadSummary};

/// Decode every WAD entry of `archive`. Results keep the entry order; a
/// failing entry never stops the others.
pub fn decode_entries<'a>(
    archive: &'a Archive,
    config: &DecodeConfig,
) -> Vec<(&'a ArchiveEntry, Result<Wad>)> {
    archive
        .entries
        .par_iter()
        .filter(|entry| entry.kind() == EntryKind::Wad)
        .map(|entry| {
            let result = entry.decode_wad(config);
            if let Err(e) = &result {
                tracing::warn!(entry = %entry.name, "{e}");
            }
            (entry, result)
        })
        .collect()
}

/// One line of an archive report.
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub name: String,
    pub kind: EntryKind,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wad: Option<WadSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summaries of every entry, WADs decoded in parallel.
pub fn summarize(archive: &Archive, config: &DecodeConfig) -> Vec<EntrySummary> {
    archive
        .entries
        .par_iter()
        .map(|entry| {
            let kind = entry.kind();
            let (wad, error) = if kind == EntryKind::Wad {
                match entry.decode_wad(config) {
                    Ok(wad) => (Some(wad.summary()), None),
                    Err(e) => (None, Some(e.to_string())),
                }
            } else {
                (None, None)
            };
            EntrySummary {
                name: entry.name.to_string(),
                kind,
                size: entry.data.len(),
                wad,
                error,
            }
        })
        .collect()
}

/// Outcome of decoding and re-encoding one WAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Identical,
    /// First differing byte.
    Differs { offset: usize },
    Failed(String),
}

/// Decode then encode every WAD entry and compare with the original bytes.
pub fn verify_entries(archive: &Archive, config: &DecodeConfig) -> Vec<(String, Verification)> {
    decode_entries(archive, config)
        .into_par_iter()
        .map(|(entry, result)| {
            let outcome = match result.and_then(|wad| wad.encode(config.game)) {
                Ok(bytes) if bytes == entry.data => Verification::Identical,
                Ok(bytes) => Verification::Differs {
                    offset: bytes
                        .iter()
                        .zip(&entry.data)
                        .position(|(a, b)| a != b)
                        .unwrap_or(bytes.len().min(entry.data.len())),
                },
                Err(e) => Verification::Failed(e.to_string()),
            };
            (entry.name.to_string(), outcome)
        })
        .collect()
}
