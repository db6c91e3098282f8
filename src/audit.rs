//! Audit hook for completed searches.

use tracing::info;

/// Receives one record per completed search.
///
/// Called after the response is assembled, so nothing an implementation does
/// can change the outcome. Implementations must not block for long; the call
/// runs on the search task.
///
/// # Examples
///
/// ```rust
/// use instasearch::prelude::*;
/// use std::sync::{Arc, Mutex};
///
/// let log = Arc::new(Mutex::new(Vec::new()));
/// let sink = log.clone();
/// let audit = move |keyword: &str, count: usize| {
///   sink.lock().unwrap().push((keyword.to_string(), count));
/// };
/// audit.record("wrench", 4);
/// assert_eq!(log.lock().unwrap()[0], ("wrench".to_string(), 4));
/// ```
pub trait SearchAudit: Send + Sync {
  /// `result_count` is the total number of products, categories and
  /// manufacturers returned.
  fn record(&self, keyword: &str, result_count: usize);
}

impl<F> SearchAudit for F
where
  F: Fn(&str, usize) + Send + Sync,
{
  fn record(&self, keyword: &str, result_count: usize) {
    self(keyword, result_count)
  }
}

/// Writes each search to the `instasearch::audit` tracing target.
#[derive(Debug, Clone)]
pub struct TracingAudit {
  label: String,
}

impl TracingAudit {
  pub const DEFAULT_LABEL: &'static str = "[Instant Search Suggestions]";

  /// `label` tags every record, e.g. to tell the dropdown from the results page.
  pub fn new(label: impl Into<String>) -> Self {
    Self { label: label.into() }
  }

  pub fn label(&self) -> &str {
    &self.label
  }
}

impl Default for TracingAudit {
  fn default() -> Self {
    Self::new(Self::DEFAULT_LABEL)
  }
}

impl SearchAudit for TracingAudit {
  fn record(&self, keyword: &str, result_count: usize) {
    info!(
      target: "instasearch::audit",
      keyword,
      result_count,
      "{} search recorded",
      self.label
    );
  }
}
