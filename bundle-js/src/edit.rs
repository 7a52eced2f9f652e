use crate::ast::Loc;
use crate::err::BundleError;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverwriteOptions {
  /// Record an original-name to new-name mapping for source map consumers.
  pub store_name: bool,
  /// Replace only the span's content, leaving surrounding formatting owned by
  /// other edits. `false` means the edit owns the whole span.
  pub content_only: bool,
}

impl OverwriteOptions {
  pub fn rename() -> Self {
    Self {
      store_name: true,
      content_only: false,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
  pub start: usize,
  pub end: usize,
  pub text: String,
  pub store_name: bool,
  pub content_only: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredName {
  pub loc: Loc,
  pub original: String,
  pub renamed: String,
}

/// Result of applying an [`EditBuffer`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Rendered {
  pub code: String,
  pub edits: Vec<Edit>,
  pub names: Vec<StoredName>,
}

/// Accumulates non-overlapping text edits against an immutable source and
/// applies them in a single pass.
pub struct EditBuffer<'a> {
  source: &'a str,
  // Keyed by start offset. Every stored edit spans a non-empty range, so
  // ordering by start is also ordering by end.
  edits: BTreeMap<usize, Edit>,
  intro: String,
  outro: String,
}

impl<'a> EditBuffer<'a> {
  pub fn new(source: &'a str) -> Self {
    Self {
      source,
      edits: BTreeMap::new(),
      intro: String::new(),
      outro: String::new(),
    }
  }

  pub fn source(&self) -> &'a str {
    self.source
  }

  pub fn slice(&self, loc: Loc) -> Option<&'a str> {
    self.source.get(loc.0..loc.1)
  }

  pub fn is_empty(&self) -> bool {
    self.edits.is_empty() && self.intro.is_empty() && self.outro.is_empty()
  }

  /// Replaces `start..end` with `text`. Fails if the range is empty, out of
  /// bounds, not on char boundaries, or overlaps an existing edit.
  pub fn overwrite(
    &mut self,
    start: usize,
    end: usize,
    text: &str,
    options: OverwriteOptions,
  ) -> Result<(), BundleError> {
    let len = self.source.len();
    if start >= end
      || end > len
      || !self.source.is_char_boundary(start)
      || !self.source.is_char_boundary(end)
    {
      return Err(BundleError::InvalidEditRange { start, end, len });
    }
    if let Some((_, prev)) = self.edits.range(..end).next_back() {
      if prev.end > start {
        return Err(BundleError::OverlappingEdit {
          start,
          end,
          existing: Loc(prev.start, prev.end),
        });
      }
    }
    self.edits.insert(start, Edit {
      start,
      end,
      text: text.to_string(),
      store_name: options.store_name,
      content_only: options.content_only,
    });
    Ok(())
  }

  pub fn remove(&mut self, start: usize, end: usize) -> Result<(), BundleError> {
    self.overwrite(start, end, "", OverwriteOptions::default())
  }

  pub fn prepend(&mut self, text: &str) {
    self.intro.insert_str(0, text);
  }

  pub fn append(&mut self, text: &str) {
    self.outro.push_str(text);
  }

  pub fn finish(self) -> Rendered {
    let mut code = String::with_capacity(self.source.len() + self.intro.len() + self.outro.len());
    code.push_str(&self.intro);
    let mut names = Vec::new();
    let mut cur = 0;
    for edit in self.edits.values() {
      code.push_str(&self.source[cur..edit.start]);
      code.push_str(&edit.text);
      if edit.store_name {
        names.push(StoredName {
          loc: Loc(edit.start, edit.end),
          original: self.source[edit.start..edit.end].to_string(),
          renamed: edit.text.clone(),
        });
      }
      cur = edit.end;
    }
    code.push_str(&self.source[cur..]);
    code.push_str(&self.outro);
    Rendered {
      code,
      edits: self.edits.into_values().collect(),
      names,
    }
  }
}
