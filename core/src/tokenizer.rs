use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

use crate::config::IndexConfig;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
    "be","because","been","before","being","below","between","both","but","by",
    "can","can't","cannot","could","couldn't",
    "did","didn't","do","does","doesn't","doing","don't","down","during",
    "each","few","for","from","further",
    "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
    "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
    "let's","me","more","most","mustn't","my","myself",
    "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
    "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
    "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
    "under","until","up","very",
    "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
    "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves",
];

pub fn english_stop_words() -> HashSet<String> {
    ENGLISH_STOP_WORDS.iter().map(|w| w.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokenizer {
    stop_words: HashSet<String>,
    stem: bool,
}

impl Tokenizer {
    pub fn new(stop_words: &HashSet<String>, stem: bool) -> Self {
        let stop_words = stop_words.iter().map(|w| w.to_lowercase()).collect();
        Self { stop_words, stem }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(&config.stop_words, config.stem)
    }

    /// Tokenize text into (term, position) using NFKC normalization, lowercase, stopword removal, and optional stemming.
    pub fn tokenize(&self, text: &str) -> Vec<(String, usize)> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        for (pos, mat) in RE.find_iter(&normalized).enumerate() {
            let token = mat.as_str();
            if self.stop_words.contains(token) { continue; }
            let term = if self.stem { STEMMER.stem(token).to_string() } else { token.to_string() };
            tokens.push((term, pos));
        }
        tokens
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self { stop_words: english_stop_words(), stem: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = Tokenizer::default().tokenize("Running, runner's run!");
        assert!(t.iter().any(|(w, _)| w == "run"));
    }

    #[test]
    fn positions_count_dropped_stop_words() {
        let t = Tokenizer::default().tokenize("the budget");
        assert_eq!(t, vec![("budget".to_string(), 1)]);
    }

    #[test]
    fn custom_stop_words_are_case_insensitive() {
        let stop: HashSet<String> = ["Meeting".to_string()].into_iter().collect();
        let t = Tokenizer::new(&stop, false).tokenize("team MEETING notes");
        let words: Vec<&str> = t.iter().map(|(w, _)| w.as_str()).collect();
        assert_eq!(words, vec!["team", "notes"]);
    }
}
