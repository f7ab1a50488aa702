// Text normalization shared by the lexical and phonological metrics.

/// Lowercase, turn punctuation into spaces, and collapse whitespace.
///
/// Letters keep their diacritics; "Grãde!" becomes "grãde".
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into normalized word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("  Casa,  GRANDE!  "), "casa grande");
    }

    #[test]
    fn test_normalize_keeps_diacritics() {
        assert_eq!(normalize("Grãde coração"), "grãde coração");
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("  ... ").is_empty());
    }
}
