//! Okapi BM25 relevance for the in-memory catalog.
//!
//! Stands in for the store's natural-language full-text score: a
//! [`RelevanceIndex`] is built once per text column (product names,
//! product descriptions) and scores a keyword against any document in it.

use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

/// Lowercased Unicode words of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
  text.unicode_words().map(|word| word.to_lowercase()).collect()
}

/// BM25 parameters.
#[derive(Debug, Clone, Copy)]
pub struct Bm25 {
  /// Term frequency saturation.
  pub k1: f64,
  /// Document length normalization, 0.0 (none) to 1.0 (full).
  pub b: f64,
}

impl Default for Bm25 {
  fn default() -> Self {
    Self { k1: 1.5, b: 0.75 }
  }
}

impl Bm25 {
  fn idf(&self, doc_freq: f64, total_docs: f64) -> f64 {
    ((total_docs - doc_freq + 0.5) / (doc_freq + 0.5) + 1.0).ln()
  }
}

#[derive(Debug, Clone, Default)]
struct Document {
  terms: HashMap<String, usize>,
  length: usize,
}

/// Corpus statistics for one text column.
#[derive(Debug, Clone, Default)]
pub struct RelevanceIndex {
  params: Bm25,
  documents: Vec<Document>,
  doc_freq: HashMap<String, usize>,
  avg_length: f64,
}

impl RelevanceIndex {
  /// Indexes `texts`; document `i` is the `i`-th text.
  pub fn build<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
    let mut documents = Vec::new();
    let mut doc_freq: HashMap<String, usize> = HashMap::new();

    for text in texts {
      let tokens = tokenize(text);
      let mut terms: HashMap<String, usize> = HashMap::new();
      for token in &tokens {
        *terms.entry(token.clone()).or_insert(0) += 1;
      }
      for term in terms.keys() {
        *doc_freq.entry(term.clone()).or_insert(0) += 1;
      }
      documents.push(Document {
        terms,
        length: tokens.len(),
      });
    }

    let total_length: usize = documents.iter().map(|d| d.length).sum();
    let avg_length = if documents.is_empty() {
      0.0
    } else {
      total_length as f64 / documents.len() as f64
    };

    Self {
      params: Bm25::default(),
      documents,
      doc_freq,
      avg_length,
    }
  }

  /// BM25 score of document `doc` for the keyword's terms. Zero when the
  /// document shares no term with the keyword or does not exist.
  pub fn score(&self, doc: usize, query_terms: &[String]) -> f64 {
    let Some(document) = self.documents.get(doc) else {
      return 0.0;
    };
    if document.length == 0 || self.avg_length == 0.0 {
      return 0.0;
    }

    let total_docs = self.documents.len() as f64;
    let Bm25 { k1, b } = self.params;
    let length_ratio = document.length as f64 / self.avg_length;

    query_terms
      .iter()
      .filter_map(|term| {
        let tf = *document.terms.get(term)? as f64;
        let df = *self.doc_freq.get(term).unwrap_or(&1) as f64;
        let norm_tf = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * length_ratio));
        Some(self.params.idf(df, total_docs) * norm_tf)
      })
      .sum()
  }
}
