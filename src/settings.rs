use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::extract::ExtractOptions;
use crate::grammar::{get_by_key, SignConvention};
use crate::layout::LayoutOptions;
use crate::merchants::MerchantAliases;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub pattern: String,
    pub merchant: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir_string")]
    pub data_dir: String,
    #[serde(default = "default_char_width")]
    pub char_width: f64,
    #[serde(default = "default_column_gap_chars")]
    pub column_gap_chars: f64,
    #[serde(default)]
    pub fallback_year: Option<i32>,
    /// Grammar key -> sign convention.
    #[serde(default)]
    pub sign_overrides: BTreeMap<String, SignConvention>,
    /// Checked before the built-in merchant table.
    #[serde(default)]
    pub merchant_aliases: Vec<AliasEntry>,
}

fn default_data_dir_string() -> String {
    default_data_dir().to_string_lossy().to_string()
}

fn default_char_width() -> f64 {
    LayoutOptions::default().char_width
}

fn default_column_gap_chars() -> f64 {
    LayoutOptions::default().column_gap_chars
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_string(),
            char_width: default_char_width(),
            column_gap_chars: default_column_gap_chars(),
            fallback_year: None,
            sign_overrides: BTreeMap::new(),
            merchant_aliases: Vec::new(),
        }
    }
}

impl Settings {
    pub fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            char_width: self.char_width,
            column_gap_chars: self.column_gap_chars,
        }
    }

    pub fn extract_options(&self) -> Result<ExtractOptions> {
        let mut sign_overrides = HashMap::new();
        for (key, convention) in &self.sign_overrides {
            let grammar = get_by_key(key).ok_or_else(|| LedgerError::UnknownGrammar(key.clone()))?;
            sign_overrides.insert(grammar, *convention);
        }
        Ok(ExtractOptions {
            layout: self.layout_options(),
            fallback_year: self.fallback_year,
            grammar: None,
            sign_overrides,
        })
    }

    pub fn merchant_aliases(&self) -> MerchantAliases {
        MerchantAliases::default().extended(
            self.merchant_aliases
                .iter()
                .map(|a| (a.pattern.as_str(), a.merchant.clone())),
        )
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(shellexpand_path(&self.data_dir)).join("ledger.db")
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("stmtledger")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("stmtledger")
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(&settings_path())
}

/// Missing file means defaults; a present but unreadable one is an error.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| LedgerError::Settings(format!("{}: {e}", path.display())))
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(settings, &settings_path())
}

pub fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
