//! Keyword normalization.
//!
//! A [`SearchQuery`] derives, once, every encoding of the keyword that the
//! matching strategies bind as parameters:
//!
//! | form | used by | example for `wrench 10%` |
//! |------|---------|--------------------------|
//! | substring | `LIKE` containment | `%wrench 10\%%` |
//! | alternation | `REGEXP` any-word | `wrench\|10%` |
//! | boolean expansion | full-text boolean mode | `wrench* 10*` |
//! | prefix | `LIKE` begins-with | `wrench 10%%` |

use crate::error::{Result, SearchError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}_]+").unwrap());

/// Language used when the caller does not pick one.
pub const DEFAULT_LANGUAGE_ID: u32 = 1;

/// A normalized keyword plus the per-request filters that go with it.
///
/// The derived forms are private: they are computed from the same keyword
/// in [`SearchQuery::new`] and cannot be changed independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
  keyword: String,
  substring: String,
  alternation: String,
  boolean_expansion: String,
  prefix: String,
  alpha_filter: Option<char>,
  language_id: u32,
}

impl SearchQuery {
  /// Derives all forms from `keyword`.
  ///
  /// A blank keyword yields empty forms and [`is_empty`](Self::is_empty)
  /// returns true; it never fails.
  pub fn new(keyword: impl Into<String>) -> Self {
    let keyword = keyword.into();
    if keyword.trim().is_empty() {
      return Self {
        keyword,
        substring: String::new(),
        alternation: String::new(),
        boolean_expansion: String::new(),
        prefix: String::new(),
        alpha_filter: None,
        language_id: DEFAULT_LANGUAGE_ID,
      };
    }

    Self {
      substring: format!("%{}%", escape_like(&keyword)),
      alternation: alternation_pattern(&keyword),
      boolean_expansion: boolean_expansion_token(&keyword),
      prefix: format!("{keyword}%"),
      keyword,
      alpha_filter: None,
      language_id: DEFAULT_LANGUAGE_ID,
    }
  }

  /// Restricts matches to display names starting with `letter`.
  pub fn with_alpha_filter(mut self, letter: char) -> Result<Self> {
    if !letter.is_ascii_alphabetic() {
      return Err(SearchError::validation(format!(
        "alpha filter must be a single letter, got `{letter}`"
      )));
    }
    self.alpha_filter = Some(letter);
    Ok(self)
  }

  /// Alpha filter given as the character code the storefront submits.
  /// Zero means no filter.
  pub fn with_alpha_filter_code(self, code: u32) -> Result<Self> {
    if code == 0 {
      return Ok(self);
    }
    let letter = char::from_u32(code)
      .ok_or_else(|| SearchError::validation(format!("invalid alpha filter code {code}")))?;
    self.with_alpha_filter(letter)
  }

  pub fn with_language(mut self, language_id: u32) -> Self {
    self.language_id = language_id;
    self
  }

  /// The keyword exactly as received.
  pub fn keyword(&self) -> &str {
    &self.keyword
  }

  /// `%keyword%` with `\`, `%` and `_` escaped.
  pub fn substring(&self) -> &str {
    &self.substring
  }

  /// Regex-escaped keyword with its words joined by `|`.
  pub fn alternation(&self) -> &str {
    &self.alternation
  }

  /// Word characters only, each word suffixed with the `*` wildcard.
  pub fn boolean_expansion(&self) -> &str {
    &self.boolean_expansion
  }

  /// The keyword followed by `%`.
  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  pub fn alpha_filter(&self) -> Option<char> {
    self.alpha_filter
  }

  /// `LIKE` pattern for the alpha filter, if any.
  pub fn alpha_pattern(&self) -> Option<String> {
    self.alpha_filter.map(|letter| format!("{letter}%"))
  }

  pub fn language_id(&self) -> u32 {
    self.language_id
  }

  /// True when the keyword normalized to nothing; no strategy may run.
  pub fn is_empty(&self) -> bool {
    self.substring.is_empty()
  }
}

/// Escapes `LIKE` wildcards so the text matches literally.
pub fn escape_like(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    if matches!(c, '\\' | '%' | '_') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped
}

fn alternation_pattern(keyword: &str) -> String {
  let escaped = regex::escape(keyword.trim());
  WHITESPACE.replace_all(&escaped, " ").replace(' ', "|")
}

fn boolean_expansion_token(keyword: &str) -> String {
  let words = NON_WORD.replace_all(keyword, " ");
  let words = words.trim();
  if words.is_empty() {
    return String::new();
  }
  format!("{}*", words.replace(' ', "* "))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_derived_forms() {
    let query = SearchQuery::new("hex  key");
    assert_eq!(query.substring(), "%hex  key%");
    assert_eq!(query.alternation(), "hex|key");
    assert_eq!(query.boolean_expansion(), "hex* key*");
    assert_eq!(query.prefix(), "hex  key%");
    assert!(!query.is_empty());
  }

  #[test]
  fn test_substring_escapes_like_wildcards() {
    let query = SearchQuery::new(r"50%_off\");
    assert_eq!(query.substring(), r"%50\%\_off\\%");
  }

  #[test]
  fn test_alternation_escapes_regex_metacharacters() {
    let query = SearchQuery::new("m8 (1.25)");
    assert_eq!(query.alternation(), r"m8|\(1\.25\)");
  }

  #[test]
  fn test_boolean_token_drops_punctuation() {
    let query = SearchQuery::new("o-ring, 12mm!");
    assert_eq!(query.boolean_expansion(), "o* ring* 12mm*");
  }

  #[test]
  fn test_boolean_token_keeps_unicode_letters() {
    let query = SearchQuery::new("größe café");
    assert_eq!(query.boolean_expansion(), "größe* café*");
  }

  #[test]
  fn test_blank_keyword_yields_empty_forms() {
    for keyword in ["", "   ", "\t\n"] {
      let query = SearchQuery::new(keyword);
      assert!(query.is_empty());
      assert_eq!(query.substring(), "");
      assert_eq!(query.alternation(), "");
      assert_eq!(query.boolean_expansion(), "");
      assert_eq!(query.prefix(), "");
    }
  }

  #[test]
  fn test_alpha_filter() {
    let query = SearchQuery::new("bolt").with_alpha_filter('B').unwrap();
    assert_eq!(query.alpha_pattern().as_deref(), Some("B%"));

    assert!(SearchQuery::new("bolt").with_alpha_filter('7').is_err());
    assert!(SearchQuery::new("bolt").with_alpha_filter('é').is_err());
  }

  #[test]
  fn test_alpha_filter_code() {
    let query = SearchQuery::new("bolt").with_alpha_filter_code(0).unwrap();
    assert_eq!(query.alpha_filter(), None);

    let query = SearchQuery::new("bolt").with_alpha_filter_code(66).unwrap();
    assert_eq!(query.alpha_filter(), Some('B'));
  }
}
