//! Transcript clean-up before chunking.
//!
//! Auto-generated captions rarely carry punctuation, which leaves the chunker
//! with nothing to split on. A lowercase letter directly followed by an
//! uppercase one usually marks a sentence boundary that lost its period, so a
//! `. ` is inserted there.

use std::sync::OnceLock;

use regex::Regex;

fn boundary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([a-z])([A-Z])").expect("valid boundary regex"))
}

/// Insert sentence breaks at lowercase→uppercase boundaries.
pub fn normalize(text: &str) -> String {
    boundary_regex().replace_all(text, "$1. $2").into_owned()
}
