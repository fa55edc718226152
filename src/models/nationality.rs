//! Nationality name to portal country code lookup.

/// Known nationality names and their portal country codes
const NATIONALITY_CODES: &[(&str, &str)] = &[
    ("United States", "226"),
    ("United Kingdom", "77"),
    ("Canada", "38"),
    ("Australia", "13"),
    ("Germany", "81"),
    ("France", "70"),
    ("Italy", "105"),
    ("Spain", "197"),
    ("Netherlands", "151"),
    ("Sweden", "202"),
    ("Norway", "157"),
    ("Denmark", "56"),
    ("Finland", "69"),
];

/// Portal code for a nationality name, matched case-insensitively.
pub fn nationality_code(name: &str) -> Option<&'static str> {
    let name = name.trim();
    NATIONALITY_CODES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, code)| *code)
}

/// Resolve the code to submit: an explicit code wins, then the name lookup, then `fallback`.
pub fn resolve_nationality_code(explicit: &str, name: &str, fallback: &str) -> String {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    nationality_code(name).unwrap_or(fallback).to_string()
}
