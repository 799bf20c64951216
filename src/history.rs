//! # History Module
//!
//! Builds `history.json`, the short "recent updates" list shown on the site,
//! from the existing content manifests.
//!
//! ## Regole:
//! - Entry senza data vengono saltate
//! - `YYYY-MM` vale come primo giorno del mese, date illeggibili come 1970-01-01
//! - Ordinamento decrescente per data, stabile rispetto all'ordine dei manifest
//! - Nome: `title`/`name`, altrimenti il nome della cartella in title case
//! - Link: `src/<type>s.html?<type>=<n>` dove `n` è il prefisso numerico
//!   della cartella, oppure l'indice nel manifest

use crate::config::HistoryConfig;
use crate::error::OptimizeError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// One item of a content manifest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestEntry {
    #[serde(default)]
    pub folder: String,
    pub title: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub date: String,
    pub audio: Option<String>,
}

/// One item of `history.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub name: String,
    pub date: String,
    pub link: String,
}

impl HistoryEntry {
    /// Build a history entry, `None` when the manifest entry has no date.
    pub fn from_manifest(entry_type: &str, index: usize, entry: &ManifestEntry) -> Option<Self> {
        let date = entry.date.trim();
        if date.is_empty() {
            return None;
        }

        let name = entry
            .title
            .as_deref()
            .or(entry.name.as_deref())
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| folder_title(&entry.folder));

        let number = folder_number(&entry.folder).unwrap_or_else(|| index.to_string());

        Some(Self {
            entry_type: entry_type.to_string(),
            name: strip_number_prefix(&name).to_string(),
            date: date.to_string(),
            link: format!("src/{0}s.html?{0}={1}", entry_type, number),
        })
    }

    pub fn sort_date(&self) -> NaiveDate {
        parse_date(&self.date)
    }
}

/// Parse `YYYY-MM-DD` or `YYYY-MM`. Anything else sorts as 1970-01-01.
pub fn parse_date(date: &str) -> NaiveDate {
    let date = date.trim();
    let parsed = match date.split('-').count() {
        2 => NaiveDate::parse_from_str(&format!("{}-01", date), "%Y-%m-%d").ok(),
        3 => NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
        _ => None,
    };
    parsed.unwrap_or(NaiveDate::default())
}

/// Most recent `limit` entries across manifests, newest first.
pub fn select_recent(mut entries: Vec<HistoryEntry>, limit: usize) -> Vec<HistoryEntry> {
    entries.sort_by(|a, b| b.sort_date().cmp(&a.sort_date()));
    entries.truncate(limit);
    entries
}

/// Read one manifest. A missing file yields no entries.
pub async fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>, OptimizeError> {
    if !path.exists() {
        warn!("Manifest not found: {}", path.display());
        return Ok(Vec::new());
    }

    let content = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&content).map_err(|e| OptimizeError::Manifest(format!("{}: {}", path.display(), e)))
}

/// Rebuild the history file under `site_root` and return what was written.
///
/// When no manifest yields a dated entry the existing file is left as it is
/// and an empty list is returned.
pub async fn update_history(site_root: &Path, config: &HistoryConfig) -> Result<Vec<HistoryEntry>, OptimizeError> {
    let mut entries = Vec::new();

    for source in &config.manifests {
        let manifest = read_manifest(&site_root.join(&source.path)).await?;
        let before = entries.len();
        for (index, item) in manifest.iter().enumerate() {
            match HistoryEntry::from_manifest(&source.entry_type, index, item) {
                Some(entry) => entries.push(entry),
                None => debug!("Skipping {} #{} ({}), no date", source.entry_type, index, item.folder),
            }
        }
        info!("Read {} dated {} entries", entries.len() - before, source.entry_type);
    }

    let output = site_root.join(&config.output);
    if entries.is_empty() {
        warn!("No dated entries found, keeping {}", output.display());
        return Ok(Vec::new());
    }

    let recent = select_recent(entries, config.limit);
    write_history(&output, &recent).await?;

    info!("Wrote {} entries to {}", recent.len(), output.display());
    Ok(recent)
}

async fn write_history(path: &Path, entries: &[HistoryEntry]) -> Result<(), OptimizeError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| OptimizeError::Manifest(format!("cannot serialize history: {}", e)))?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// `3_letter_to_a_friend` → `3 Letter To A Friend`
fn folder_title(folder: &str) -> String {
    folder
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn folder_number(folder: &str) -> Option<String> {
    let digits: String = folder.chars().take_while(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}

/// `1 - Title` → `Title`
fn strip_number_prefix(name: &str) -> &str {
    let rest = name.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == name.len() {
        return name;
    }
    match rest.trim_start().strip_prefix('-') {
        Some(title) => title.trim_start(),
        None => name,
    }
}
