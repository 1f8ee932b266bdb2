use serde::{Deserialize, Serialize};

/// Statement layouts the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarKind {
    BofaCredit,
    ChaseChecking,
    Generic,
}

impl GrammarKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::BofaCredit => "bofa_credit",
            Self::ChaseChecking => "chase_checking",
            Self::Generic => "generic",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BofaCredit => "Bank of America Credit Card",
            Self::ChaseChecking => "Chase Checking",
            Self::Generic => "Generic statement",
        }
    }

    /// How printed amounts map onto the ledger sign for this layout.
    pub fn sign_convention(&self) -> SignConvention {
        match self {
            Self::BofaCredit | Self::ChaseChecking | Self::Generic => SignConvention::AsPrinted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConvention {
    /// Keep the sign the statement prints.
    #[default]
    AsPrinted,
    /// Flip it, for statements that print spend as positive credits.
    Negated,
}

impl SignConvention {
    pub fn apply(&self, amount: f64) -> f64 {
        match self {
            Self::AsPrinted => amount,
            Self::Negated if amount != 0.0 => -amount,
            Self::Negated => amount,
        }
    }
}

const ALL_GRAMMARS: &[GrammarKind] = &[
    GrammarKind::BofaCredit,
    GrammarKind::ChaseChecking,
    GrammarKind::Generic,
];

// Lower-case institution markers, tested in order. Append to add a grammar.
const INSTITUTION_MARKERS: &[(&str, GrammarKind)] = &[
    ("bank of america", GrammarKind::BofaCredit),
    ("jpmorgan chase bank", GrammarKind::ChaseChecking),
];

pub fn get_by_key(key: &str) -> Option<GrammarKind> {
    ALL_GRAMMARS.iter().find(|g| g.key() == key).copied()
}

/// Pick the grammar for a document's full text; the first marker found wins.
pub fn select_grammar(text: &str) -> GrammarKind {
    let lower = text.to_lowercase();
    INSTITUTION_MARKERS
        .iter()
        .find(|(marker, _)| lower.contains(*marker))
        .map(|(_, grammar)| *grammar)
        .unwrap_or(GrammarKind::Generic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_bofa_case_insensitive() {
        assert_eq!(select_grammar("Statement\nBANK OF AMERICA\n..."), GrammarKind::BofaCredit);
        assert_eq!(select_grammar("bank of america, n.a."), GrammarKind::BofaCredit);
    }

    #[test]
    fn test_select_chase() {
        assert_eq!(select_grammar("JPMorgan Chase Bank, N.A.\nP O Box 182051"), GrammarKind::ChaseChecking);
    }

    #[test]
    fn test_first_marker_wins() {
        let text = "JPMorgan Chase Bank, N.A.\nOnline Payment To Bank of America";
        assert_eq!(select_grammar(text), GrammarKind::BofaCredit);
    }

    #[test]
    fn test_fallback_to_generic() {
        assert_eq!(select_grammar("Credit Union of Nowhere"), GrammarKind::Generic);
        assert_eq!(select_grammar(""), GrammarKind::Generic);
    }

    #[test]
    fn test_get_by_key() {
        for g in ALL_GRAMMARS {
            assert_eq!(get_by_key(g.key()), Some(*g));
        }
        assert_eq!(get_by_key("wells_fargo"), None);
    }

    #[test]
    fn test_sign_convention() {
        assert_eq!(SignConvention::AsPrinted.apply(-4.0), -4.0);
        assert_eq!(SignConvention::Negated.apply(45.67), -45.67);
        assert!(SignConvention::Negated.apply(0.0).is_sign_positive());
        assert_eq!(GrammarKind::BofaCredit.sign_convention(), SignConvention::AsPrinted);
    }

    #[test]
    fn test_sign_convention_serde() {
        let s: SignConvention = serde_json::from_str("\"negated\"").unwrap();
        assert_eq!(s, SignConvention::Negated);
        assert_eq!(serde_json::to_string(&SignConvention::AsPrinted).unwrap(), "\"as_printed\"");
    }
}
