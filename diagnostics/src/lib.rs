//! Shared diagnostics model and rendering utilities.
//!
//! The data structures here are intentionally minimal and deterministic so the
//! bundler can hand warnings to whatever reporting channel the host owns
//! (terminal, JSON log, editor) without pulling in heavy dependencies.
//!
//! ```
//! use diagnostics::render::{render_diagnostic, SourceProvider};
//! use diagnostics::{Diagnostic, FileId, Span, TextRange};
//!
//! struct SingleFile {
//!   name: String,
//!   text: String,
//! }
//!
//! impl SourceProvider for SingleFile {
//!   fn file_name(&self, _file: FileId) -> Option<&str> {
//!     Some(&self.name)
//!   }
//!
//!   fn file_text(&self, _file: FileId) -> Option<&str> {
//!     Some(&self.text)
//!   }
//! }
//!
//! let provider = SingleFile {
//!   name: "main.js".into(),
//!   text: "use(ns.y);".into(),
//! };
//! let diag = Diagnostic::warning(
//!   "MISSING_EXPORT",
//!   "'y' is not exported by 'b.js'",
//!   Span::new(FileId(0), TextRange::new(7, 8)),
//! )
//! .with_field("missing", "y");
//!
//! let rendered = render_diagnostic(&provider, &diag);
//! assert!(rendered.contains("warning[MISSING_EXPORT]"));
//! assert!(rendered.contains("--> main.js:1:8"));
//! assert_eq!(diag.field("missing"), Some("y"));
//! ```

pub mod paths;
pub mod render;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Formatter;

/// A stable identifier for a file (module) in a program.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize)]
pub struct FileId(pub u32);

/// A half-open byte range in a file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct TextRange {
  pub start: u32,
  pub end: u32,
}

impl TextRange {
  pub const fn new(start: u32, end: u32) -> Self {
    Self { start, end }
  }

  pub fn len(&self) -> u32 {
    self.end.saturating_sub(self.start)
  }

  pub fn is_empty(&self) -> bool {
    self.start >= self.end
  }

  /// Builds a range from `usize` offsets, saturating to `u32`.
  pub fn from_offsets(start: usize, end: usize) -> Self {
    Self {
      start: saturating_to_u32(start),
      end: saturating_to_u32(end),
    }
  }
}

/// A span across a specific file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct Span {
  pub file: FileId,
  pub range: TextRange,
}

impl Span {
  pub const fn new(file: FileId, range: TextRange) -> Self {
    Self { file, range }
  }
}

/// Diagnostic severity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Error,
  Warning,
  Note,
}

impl Severity {
  pub const fn as_str(&self) -> &'static str {
    match self {
      Severity::Error => "error",
      Severity::Warning => "warning",
      Severity::Note => "note",
    }
  }
}

impl Display for Severity {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A secondary label attached to a diagnostic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Label {
  pub span: Span,
  pub message: String,
}

impl Label {
  pub fn new(span: Span, message: impl Into<String>) -> Self {
    Self {
      span,
      message: message.into(),
    }
  }
}

/// A user-facing diagnostic.
///
/// Besides the message and location, a diagnostic can carry a documentation
/// `url` and a set of named `fields`. Fields are flattened into the top level
/// when serialized, so a `MISSING_EXPORT` warning serializes as
/// `{"code": "MISSING_EXPORT", "missing": ..., "importer": ..., ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
  pub code: &'static str,
  pub severity: Severity,
  pub message: String,
  pub primary: Span,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<&'static str>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub labels: Vec<Label>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub notes: Vec<String>,
  #[serde(flatten)]
  pub fields: BTreeMap<&'static str, String>,
}

impl Diagnostic {
  pub fn new(
    severity: Severity,
    code: &'static str,
    message: impl Into<String>,
    primary: Span,
  ) -> Self {
    Self {
      code,
      severity,
      message: message.into(),
      primary,
      url: None,
      labels: Vec::new(),
      notes: Vec::new(),
      fields: BTreeMap::new(),
    }
  }

  pub fn error(code: &'static str, message: impl Into<String>, primary: Span) -> Self {
    Self::new(Severity::Error, code, message, primary)
  }

  pub fn warning(code: &'static str, message: impl Into<String>, primary: Span) -> Self {
    Self::new(Severity::Warning, code, message, primary)
  }

  pub fn with_label(mut self, label: Label) -> Self {
    self.labels.push(label);
    self
  }

  pub fn with_note(mut self, note: impl Into<String>) -> Self {
    self.notes.push(note.into());
    self
  }

  pub fn with_url(mut self, url: &'static str) -> Self {
    self.url = Some(url);
    self
  }

  /// Attaches a named payload field. Setting the same key twice keeps the
  /// latest value.
  pub fn with_field(mut self, key: &'static str, value: impl Into<String>) -> Self {
    self.fields.insert(key, value.into());
    self
  }

  pub fn field(&self, key: &str) -> Option<&str> {
    self.fields.get(key).map(String::as_str)
  }
}

fn saturating_to_u32(value: usize) -> u32 {
  u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn span() -> Span {
    Span::new(FileId(2), TextRange::new(4, 9))
  }

  #[test]
  fn builder_methods_accumulate() {
    let diag = Diagnostic::warning("MISSING_EXPORT", "'y' is not exported", span())
      .with_url("https://example.com/troubleshooting")
      .with_field("missing", "y")
      .with_field("importer", "main.js")
      .with_note("first note")
      .with_label(Label::new(span(), "here"));

    assert_eq!(diag.severity, Severity::Warning);
    assert_eq!(diag.field("missing"), Some("y"));
    assert_eq!(diag.field("importer"), Some("main.js"));
    assert_eq!(diag.field("exporter"), None);
    assert_eq!(diag.notes, vec!["first note".to_string()]);
    assert_eq!(diag.labels.len(), 1);
  }

  #[test]
  fn serializes_fields_flat() {
    let diag = Diagnostic::warning("MISSING_EXPORT", "'y' is not exported by 'b.js'", span())
      .with_url("https://example.com/x")
      .with_field("missing", "y")
      .with_field("exporter", "b.js");
    let json = serde_json::to_value(&diag).unwrap();
    assert_eq!(json["code"], "MISSING_EXPORT");
    assert_eq!(json["severity"], "warning");
    assert_eq!(json["missing"], "y");
    assert_eq!(json["exporter"], "b.js");
    assert_eq!(json["url"], "https://example.com/x");
    assert_eq!(json["primary"]["file"], 2);
    assert_eq!(json["primary"]["range"]["start"], 4);
    assert!(json.get("labels").is_none());
    assert!(json.get("notes").is_none());
  }

  #[test]
  fn text_range_saturates() {
    let range = TextRange::from_offsets(3, usize::MAX);
    assert_eq!(range.start, 3);
    assert_eq!(range.end, u32::MAX);
    assert!(!range.is_empty());
    assert!(TextRange::new(5, 5).is_empty());
    assert_eq!(TextRange::new(2, 7).len(), 5);
  }
}
