//! Input hygiene applied to the raw keyword before it is normalized.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static ENTITY: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").unwrap());

/// Cleans user-typed keywords and enforces the configured length bounds.
///
/// A keyword that is blank after cleaning, or whose length falls outside
/// `[min_length, max_length]` characters, becomes the empty string. The
/// search engine then returns an empty response without touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSanitizer {
  pub min_length: usize,
  pub max_length: usize,
}

impl Default for KeywordSanitizer {
  fn default() -> Self {
    Self {
      min_length: 3,
      max_length: 100,
    }
  }
}

impl KeywordSanitizer {
  pub fn new(min_length: usize, max_length: usize) -> Self {
    Self {
      min_length,
      max_length,
    }
  }

  /// Strips markup, decodes entities, collapses whitespace and checks length.
  pub fn sanitize(&self, raw: &str) -> String {
    let text = MARKUP.replace_all(raw, "");
    let text = decode_entities(&text);
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let length = text.chars().count();
    if length == 0 || length < self.min_length || length > self.max_length {
      return String::new();
    }
    text
  }
}

fn decode_entities(text: &str) -> String {
  ENTITY
    .replace_all(text, |caps: &Captures<'_>| {
      let entity = &caps[1];
      let decoded = match entity {
        "nbsp" => Some('\u{a0}'),
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => numeric_entity(entity),
      };
      match decoded {
        Some(c) => c.to_string(),
        None => caps[0].to_string(),
      }
    })
    .into_owned()
}

fn numeric_entity(entity: &str) -> Option<char> {
  let digits = entity.strip_prefix('#')?;
  let code = match digits.strip_prefix(|c: char| c == 'x' || c == 'X') {
    Some(hex) => u32::from_str_radix(hex, 16).ok()?,
    None => digits.parse().ok()?,
  };
  char::from_u32(code)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn dropdown() -> KeywordSanitizer {
    KeywordSanitizer::new(3, 30)
  }

  #[test]
  fn test_rejected_keywords_become_empty() {
    let cases = [
      ("empty", ""),
      ("spaces only", "            "),
      ("html tags", "<p></p>"),
      ("space as html entity", "&nbsp;&nbsp;&nbsp;&nbsp;"),
      ("length less than minimum", "ab"),
      (
        "length more than maximum",
        "Lorem ipsum dolor sit amet erat justo invidunt odio et clita molestie eirmod dolore",
      ),
    ];
    for (name, keyword) in cases {
      assert_eq!(dropdown().sanitize(keyword), "", "case: {name}");
    }
  }

  #[test]
  fn test_keeps_clean_keyword() {
    assert_eq!(dropdown().sanitize("  socket   wrench "), "socket wrench");
  }

  #[test]
  fn test_strips_markup_and_decodes_entities() {
    assert_eq!(dropdown().sanitize("<b>nuts</b> &amp; bolts"), "nuts & bolts");
    assert_eq!(dropdown().sanitize("caf&#233; &#x41;"), "café A");
    assert_eq!(dropdown().sanitize("wr<b>en</b>ch"), "wrench");
  }

  #[test]
  fn test_unknown_entity_is_kept() {
    assert_eq!(dropdown().sanitize("a &bogus; b"), "a &bogus; b");
  }

  #[test]
  fn test_length_counts_characters() {
    let sanitizer = KeywordSanitizer::new(3, 4);
    assert_eq!(sanitizer.sanitize("ßßß"), "ßßß");
    assert_eq!(sanitizer.sanitize("ßßßßß"), "");
  }
}
