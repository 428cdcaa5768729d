//! Engine tunables loaded from TOML behind a lazy `OnceLock` singleton.
//!
//! - `init_custom(toml_content)` sets a custom TOML before the first
//!   `settings()` call
//! - `settings()` returns `&'static Settings`
//! - Default values are embedded via `include_str!("default_settings.toml")`
//!
//! Per-dictionary capacity overrides live in the dictionary header; the
//! values here are fallbacks and GC policy knobs.

use std::sync::OnceLock;

use serde::Deserialize;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Set custom TOML before first `settings()` call.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Get or initialize the global settings singleton.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let toml_str = CUSTOM_TOML
            .get()
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_SETTINGS_TOML);
        parse_settings_toml(toml_str).expect("settings TOML must be valid")
    })
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub capacity: CapacitySettings,
    pub gc: GcSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapacitySettings {
    /// Default maximum live unigram count when the header carries no
    /// `MAX_UNIGRAM_COUNT` attribute.
    pub max_unigrams: usize,
    pub max_bigrams: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GcSettings {
    /// Mutations after a compaction during which `needs_gc(true)` stays
    /// false, to keep back-to-back GC runs from thrashing.
    pub blocking_window_mutations: u64,
    /// Fraction of tombstoned terminals that flags the store as fragmented.
    pub fragmentation_threshold: f64,
}

fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))
}
