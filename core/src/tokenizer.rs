use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    // Punctuation, symbols and digits all act as separators.
    static ref SEPARATORS: Regex = Regex::new(r"[\p{P}\p{S}\p{N}]").expect("valid regex");
}

/// Tokenize text into lowercase terms.
///
/// Every punctuation, symbol or digit character becomes a space, so `foo3bar`
/// yields `foo` and `bar`. No stemming is applied. Terms come out in the order
/// they appear in the text.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    SEPARATORS
        .replace_all(&lowered, " ")
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}

/// Count occurrences of each term.
pub fn count_terms<I>(terms: I) -> HashMap<String, u32>
where
    I: IntoIterator<Item = String>,
{
    let mut counts = HashMap::new();
    for term in terms {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}
