use std::sync::OnceLock;

use regex::Regex;

use crate::normalize::normalize_description;

// (substring, merchant)
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("starbucks", "Starbucks"),
    ("cvs", "CVS"),
    ("wal-mart", "Walmart"),
    ("stop & shop", "Stop & Shop"),
    ("e-zpass", "E-ZPass"),
    ("uber", "Uber"),
    ("lyft", "Lyft"),
    ("doordash", "DoorDash"),
    ("netflix", "Netflix"),
    ("spotify", "Spotify"),
    ("openai", "OpenAI"),
    ("amazon", "Amazon"),
    ("amzn", "Amazon"),
    ("steamgames", "Steam"),
    ("exitlag", "ExitLag"),
];

fn store_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#\d+").expect("valid store number regex"))
}

/// Immutable substring -> merchant lookup used to label admitted rows.
#[derive(Debug, Clone, PartialEq)]
pub struct MerchantAliases {
    entries: Vec<(String, String)>,
}

impl Default for MerchantAliases {
    fn default() -> Self {
        Self::new(BUILTIN_ALIASES.iter().copied())
    }
}

impl MerchantAliases {
    pub fn new<I, P, M>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, M)>,
        P: AsRef<str>,
        M: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(p, m)| (p.as_ref().to_lowercase(), m.into()))
            .filter(|(p, _)| !p.is_empty())
            .collect();
        Self { entries }
    }

    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Put `extra` ahead of the current entries.
    pub fn extended<I, P, M>(self, extra: I) -> Self
    where
        I: IntoIterator<Item = (P, M)>,
        P: AsRef<str>,
        M: Into<String>,
    {
        let mut entries = Self::new(extra).entries;
        entries.extend(self.entries);
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First alias contained in the description wins; otherwise the
    /// description itself with store numbers removed.
    pub fn clean(&self, description: &str) -> String {
        let lower = description.to_lowercase();
        if let Some((_, merchant)) = self.entries.iter().find(|(p, _)| lower.contains(p.as_str())) {
            return merchant.clone();
        }
        normalize_description(&store_number_re().replace_all(description, ""))
    }
}
