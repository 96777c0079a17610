//! Tokenizer shared by the sentiment classifier and the similarity scorer.

use std::sync::LazyLock;

use regex::Regex;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("valid word regex"));

/// Split `text` into lowercase word tokens.
///
/// Apostrophes are deleted rather than treated as separators, so `don't`
/// becomes `dont` and `it's` becomes `its`. Every other non-alphanumeric
/// character separates tokens.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let folded: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !is_apostrophe(*c))
        .collect();
    WORD_RE
        .find_iter(&folded)
        .map(|m| m.as_str().to_owned())
        .collect()
}

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '`')
}
