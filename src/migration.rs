//! Legacy MQL4 idioms and their MQL5 replacements.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationHint {
    /// Lowercased legacy spelling that triggers the hint.
    pub trigger: &'static str,
    pub replacement: &'static str,
    pub hint: &'static str,
    /// Index keys worth surfacing alongside the replacement.
    pub target_keys: &'static [&'static str],
}

pub const HINTS: &[MigrationHint] = &[
    MigrationHint {
        trigger: "resultcode",
        replacement: "ResultRetcode",
        hint: "CTrade result methods were renamed to ResultRetcode() in MQL5",
        target_keys: &["ctrade", "trade"],
    },
    MigrationHint {
        trigger: "symbol()",
        replacement: "_Symbol",
        hint: "the Symbol() call became the predefined variable _Symbol",
        target_keys: &["_symbol", "symbol"],
    },
    MigrationHint {
        trigger: "period()",
        replacement: "_Period",
        hint: "the Period() call became the predefined variable _Period",
        target_keys: &["_period", "period"],
    },
    MigrationHint {
        trigger: "ima",
        replacement: "IndicatorCreate",
        hint: "iMA handles are usually built through IndicatorCreate in MQL5",
        target_keys: &["indicatorcreate", "icustom"],
    },
];

static UNDECLARED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)undeclared\s+identifier\s+'?"?([a-z_][a-z0-9_]*)'?"?"#)
        .unwrap()
});

/// Identifier named by an "undeclared identifier" message, lowercased.
pub fn undeclared_identifier(query: &str) -> Option<String> {
    UNDECLARED
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

pub fn hint_for(trigger: &str) -> Option<&'static MigrationHint> {
    HINTS.iter().find(|h| h.trigger == trigger)
}

/// Hints whose trigger occurs in the query.
pub fn hints_in(query: &str) -> Vec<&'static MigrationHint> {
    let lower = query.to_lowercase();
    HINTS.iter().filter(|h| lower.contains(h.trigger)).collect()
}

/// Hints whose trigger occurs in the query, plus the hint for an undeclared
/// identifier that names a trigger.
pub fn hints_for(query: &str) -> Vec<&'static MigrationHint> {
    let mut hints = hints_in(query);
    if let Some(hint) =
        undeclared_identifier(query).and_then(|ident| hint_for(&ident))
        && !hints.contains(&hint)
    {
        hints.push(hint);
    }
    hints
}

/// Lowercased replacement for the identifier named by an "undeclared
/// identifier" message, when that identifier is a known legacy spelling.
pub fn undeclared_replacement(query: &str) -> Option<String> {
    undeclared_identifier(query)
        .and_then(|ident| hint_for(&ident))
        .map(|hint| hint.replacement.to_lowercase())
}

/// Index keys related to the matching hints, in table order.
pub fn target_keys(query: &str) -> Vec<&'static str> {
    let mut keys = Vec::new();
    for hint in hints_for(query) {
        for key in hint.target_keys {
            if !keys.contains(key) {
                keys.push(*key);
            }
        }
    }
    keys
}
