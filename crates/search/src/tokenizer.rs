/// Splits text into index terms
pub type Tokenizer = fn(&str) -> Vec<String>;

const CJK_START: char = '\u{4e00}';
const CJK_END: char = '\u{9fff}';

fn is_term_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || (CJK_START..=CJK_END).contains(&c)
}

/// Lowercase, then keep maximal runs of ASCII letters, digits, `_` and CJK ideographs
pub fn default_tokenizer(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.to_lowercase()
        .split(|c: char| !is_term_char(c))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
