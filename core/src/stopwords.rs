use crate::tokenizer::tokenize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

const ENGLISH: &[&str] = &[
    "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
    "be","because","been","before","being","below","between","both","but","by",
    "can","cannot","could",
    "did","do","does","doing","down","during",
    "each","few","for","from","further",
    "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
    "i","if","in","into","is","it","its","itself",
    "me","more","most","my","myself",
    "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
    "same","she","should","so","some","such",
    "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
    "under","until","up","very",
    "was","we","were","what","when","where","which","while","who","whom","why","with","would",
    "you","your","yours","yourself","yourselves",
];

/// Terms excluded from TF-IDF scoring. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct StopwordSet {
    words: HashSet<String>,
}

impl StopwordSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in English list, used when no list is configured.
    pub fn english() -> Self {
        Self::from_words(ENGLISH.iter().copied())
    }

    /// Words are normalized with the document tokenizer.
    pub fn from_words<'a, I>(words: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self { words: words.into_iter().flat_map(tokenize).collect() }
    }

    /// Parse a whitespace separated word list.
    pub fn parse(text: &str) -> Self {
        Self { words: tokenize(text).into_iter().collect() }
    }

    /// Load a word list from disk. An unreadable file yields an empty set.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let set = Self::parse(&text);
                info!(path = %path.display(), words = set.len(), "loaded stopwords");
                set
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read stopwords, continuing without");
                Self::empty()
            }
        }
    }

    pub fn contains(&self, term: &str) -> bool {
        self.words.contains(term)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
