use crate::Diagnostic;
use crate::FileId;
use crate::Severity;
use crate::TextRange;
use std::fmt::Write;

const DEFAULT_TAB_WIDTH: usize = 2;

const ANSI_RESET: &str = "\u{1b}[0m";
const ANSI_BOLD_RED: &str = "\u{1b}[1;31m";
const ANSI_BOLD_YELLOW: &str = "\u{1b}[1;33m";
const ANSI_BOLD_BLUE: &str = "\u{1b}[1;34m";

/// Provides access to source text for rendering diagnostics.
pub trait SourceProvider {
  fn file_name(&self, file: FileId) -> Option<&str>;
  fn file_text(&self, file: FileId) -> Option<&str>;
}

/// Options to control diagnostic rendering.
#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
  pub color: bool,
  pub tab_width: usize,
}

impl Default for RenderOptions {
  fn default() -> Self {
    Self {
      color: false,
      tab_width: DEFAULT_TAB_WIDTH,
    }
  }
}

/// Render a diagnostic into a human-readable string with caret highlighting.
pub fn render_diagnostic(provider: &dyn SourceProvider, diagnostic: &Diagnostic) -> String {
  render_diagnostic_with_options(provider, diagnostic, RenderOptions::default())
}

/// Render a diagnostic with explicit options.
pub fn render_diagnostic_with_options(
  provider: &dyn SourceProvider,
  diagnostic: &Diagnostic,
  options: RenderOptions,
) -> String {
  let mut output = String::new();

  write_severity(&mut output, diagnostic.severity, options.color);
  let _ = writeln!(output, "[{}]: {}", diagnostic.code, diagnostic.message);

  let mut highlights = vec![Highlight {
    file: diagnostic.primary.file,
    range: diagnostic.primary.range,
    message: &diagnostic.message,
    is_primary: true,
  }];
  highlights.extend(diagnostic.labels.iter().map(|label| Highlight {
    file: label.span.file,
    range: label.span.range,
    message: &label.message,
    is_primary: false,
  }));

  let mut current_file = None;
  for highlight in &highlights {
    if current_file != Some(highlight.file) {
      current_file = Some(highlight.file);
      render_location(provider, &mut output, highlight, &options);
    }
    render_highlight(provider, &mut output, highlight, &options);
  }

  for note in &diagnostic.notes {
    let _ = writeln!(output, "  = note: {}", note);
  }
  if let Some(url) = diagnostic.url {
    let _ = writeln!(output, "  = see: {}", url);
  }

  output
}

struct Highlight<'a> {
  file: FileId,
  range: TextRange,
  message: &'a str,
  is_primary: bool,
}

fn render_location(
  provider: &dyn SourceProvider,
  output: &mut String,
  highlight: &Highlight<'_>,
  options: &RenderOptions,
) {
  let name = provider.file_name(highlight.file).unwrap_or("<unknown file>");
  match provider.file_text(highlight.file) {
    Some(text) => {
      let cache = LineCache::new(text);
      let offset = clamp_offset_to_char_boundary(text, highlight.range.start as usize);
      let (line, col) = line_and_column(&cache, offset, options.tab_width);
      let _ = writeln!(output, " --> {}:{}:{}", name, line, col);
    }
    None => {
      let _ = writeln!(output, " --> {}:?:?", name);
    }
  }
}

fn render_highlight(
  provider: &dyn SourceProvider,
  output: &mut String,
  highlight: &Highlight<'_>,
  options: &RenderOptions,
) {
  let Some(text) = provider.file_text(highlight.file) else {
    let _ = writeln!(output, "  | (source unavailable)");
    return;
  };
  let cache = LineCache::new(text);
  let start = clamp_offset_to_char_boundary(text, highlight.range.start as usize);
  let end = clamp_offset_to_char_boundary(text, (highlight.range.end as usize).max(start));
  let line_idx = cache.line_index_at_offset(start);
  let (line_start, line_end) = cache.line_bounds(line_idx);
  let line_text = &text[line_start..line_end];

  let gutter_width = (line_idx + 1).to_string().len();
  let start_col = display_column(line_text, start - line_start, options.tab_width);
  let end_col = display_column(line_text, end.min(line_end) - line_start, options.tab_width);
  let len = end_col.saturating_sub(start_col).max(1);
  let marker = if highlight.is_primary { '^' } else { '-' };

  let _ = writeln!(output, "{:>width$} |", "", width = gutter_width);
  let _ = writeln!(
    output,
    "{:>width$} | {}",
    line_idx + 1,
    expand_tabs(line_text, options.tab_width),
    width = gutter_width
  );

  let mut underline = format!("{:>width$} | ", "", width = gutter_width);
  underline.push_str(&" ".repeat(start_col));
  let run = std::iter::repeat(marker).take(len).collect::<String>();
  if options.color {
    underline.push_str(if highlight.is_primary {
      ANSI_BOLD_RED
    } else {
      ANSI_BOLD_BLUE
    });
    underline.push_str(&run);
    underline.push_str(ANSI_RESET);
  } else {
    underline.push_str(&run);
  }
  if !highlight.message.is_empty() {
    underline.push(' ');
    underline.push_str(highlight.message);
  }
  let _ = writeln!(output, "{}", underline);
}

fn write_severity(output: &mut String, severity: Severity, color: bool) {
  if !color {
    let _ = write!(output, "{severity}");
    return;
  }
  let code = match severity {
    Severity::Error => ANSI_BOLD_RED,
    Severity::Warning => ANSI_BOLD_YELLOW,
    Severity::Note => ANSI_BOLD_BLUE,
  };
  output.push_str(code);
  let _ = write!(output, "{severity}");
  output.push_str(ANSI_RESET);
}

fn expand_tabs(line: &str, tab_width: usize) -> String {
  let tab = " ".repeat(tab_width.max(1));
  line.replace('\t', &tab)
}

fn clamp_offset_to_char_boundary(text: &str, offset: usize) -> usize {
  let mut offset = offset.min(text.len());
  while offset > 0 && !text.is_char_boundary(offset) {
    offset -= 1;
  }
  offset
}

fn display_column(line_text: &str, offset_in_line: usize, tab_width: usize) -> usize {
  let target = offset_in_line.min(line_text.len());
  line_text
    .char_indices()
    .take_while(|(idx, ch)| idx + ch.len_utf8() <= target)
    .map(|(_, ch)| if ch == '\t' { tab_width.max(1) } else { 1 })
    .sum()
}

fn line_and_column(cache: &LineCache<'_>, offset: usize, tab_width: usize) -> (usize, usize) {
  let line_idx = cache.line_index_at_offset(offset);
  let (line_start, line_end) = cache.line_bounds(line_idx);
  let col = display_column(
    &cache.text[line_start..line_end],
    offset.saturating_sub(line_start),
    tab_width,
  );
  (line_idx + 1, col + 1)
}

struct LineCache<'a> {
  text: &'a str,
  starts: Vec<usize>,
}

impl<'a> LineCache<'a> {
  fn new(text: &'a str) -> Self {
    let mut starts = vec![0];
    for (idx, ch) in text.char_indices() {
      if ch == '\n' {
        starts.push(idx + 1);
      }
    }
    Self { text, starts }
  }

  fn line_bounds(&self, line_idx: usize) -> (usize, usize) {
    let start = *self.starts.get(line_idx).unwrap_or(&self.text.len());
    let end = if line_idx + 1 < self.starts.len() {
      self.starts[line_idx + 1].saturating_sub(1)
    } else {
      self.text.len()
    };
    (start, end.max(start))
  }

  fn line_index_at_offset(&self, offset: usize) -> usize {
    let clamped = offset.min(self.text.len());
    match self.starts.binary_search(&clamped) {
      Ok(idx) => idx,
      Err(0) => 0,
      Err(idx) => idx - 1,
    }
  }
}
