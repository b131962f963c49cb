use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;

pub fn is_blank(input: &str) -> bool {
    input.chars().all(char::is_whitespace)
}

/// Makes a character name safe to use as a file stem.
pub fn sanitize_file_stem(input: &str) -> Cow<str> {
    lazy_static! {
        static ref UNSAFE: Regex = Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).unwrap();
    }
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Cow::Borrowed("character");
    }
    UNSAFE.replace_all(trimmed, "_")
}
