use crate::ast::Loc;

/// Build-fatal errors. Recoverable problems (such as a namespace member that
/// is not exported) are reported as warning diagnostics instead.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BundleError {
  #[error("circular re-export of '{name}' through '{module}'")]
  CircularReexport { module: String, name: String },
  #[error("'{name}' is not exported by '{exporter}' (imported by '{importer}')")]
  MissingImport {
    importer: String,
    exporter: String,
    name: String,
  },
  #[error("duplicate export '{name}' in '{module}'")]
  DuplicateExport { module: String, name: String },
  #[error("'{name}' is exported by '{module}' but never declared")]
  UndeclaredExport { module: String, name: String },
  #[error("duplicate declaration '{name}' in '{module}'")]
  DuplicateBinding { module: String, name: String },
  #[error("edit at {start}..{end} overlaps existing edit at {existing:?}")]
  OverlappingEdit {
    start: usize,
    end: usize,
    existing: Loc,
  },
  #[error("invalid edit range {start}..{end} for source of length {len}")]
  InvalidEditRange { start: usize, end: usize, len: usize },
}
