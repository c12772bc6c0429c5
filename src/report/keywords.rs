//! Keyword frequencies for low-sentiment reviews

use std::collections::HashMap;

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "am", "an", "and", "any", "app", "are", "as",
    "at", "be", "because", "been", "before", "but", "by", "can", "could", "did", "do", "does",
    "even", "for", "from", "get", "got", "had", "has", "have", "he", "her", "his", "how", "i",
    "if", "in", "into", "is", "it", "its", "just", "me", "more", "my", "no", "not", "now", "of",
    "on", "one", "only", "or", "our", "out", "please", "so", "some", "than", "that", "the",
    "their", "them", "then", "there", "they", "this", "to", "too", "up", "us", "use", "very",
    "was", "we", "were", "what", "when", "which", "while", "who", "why", "will", "with", "would",
    "you", "your",
];

/// Lowercased word tokens of at least two letters, stopwords removed
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphabetic() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| t.chars().count() > 1 && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// The `k` most frequent tokens across `texts`. Ties break alphabetically.
pub fn top_keywords<S: AsRef<str>>(texts: &[S], k: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for token in tokenize(text.as_ref()) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_stopwords_and_short_tokens() {
        let tokens = tokenize("The app is SLOW, and I can't login! x 2fa");
        assert_eq!(tokens, vec!["slow", "can't", "login", "fa"]);
    }

    #[test]
    fn test_top_keywords_ordering() {
        let texts = vec![
            "login fails again",
            "Login error after update",
            "update broke transfer",
            "transfer error",
        ];
        let top = top_keywords(&texts, 3);
        assert_eq!(
            top,
            vec![
                ("error".to_string(), 2),
                ("login".to_string(), 2),
                ("transfer".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_top_keywords_empty() {
        let texts: Vec<String> = Vec::new();
        assert!(top_keywords(&texts, 20).is_empty());
    }
}
