use serde::Deserialize;
use serde::Serialize;
use std::str::FromStr;

/// Module wrapper convention of the emitted bundle. Declaration names can
/// depend on it: external bindings are plain identifiers in `es` output but
/// property accesses on the required module object in `cjs` output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
  #[default]
  Es,
  Cjs,
}

impl OutputFormat {
  pub fn is_es(self) -> bool {
    self == OutputFormat::Es
  }
}

impl FromStr for OutputFormat {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "es" | "esm" | "module" => Ok(OutputFormat::Es),
      "cjs" | "commonjs" => Ok(OutputFormat::Cjs),
      _ => Err(()),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BundleOptions {
  pub format: OutputFormat,
  /// Module ids under this directory are shown relative to it in diagnostics.
  pub cwd: Option<String>,
  /// Wrap synthesized namespace objects in `Object.freeze`.
  pub freeze_namespaces: bool,
}

impl Default for BundleOptions {
  fn default() -> Self {
    Self {
      format: OutputFormat::Es,
      cwd: None,
      freeze_namespaces: true,
    }
  }
}

impl BundleOptions {
  pub fn new(format: OutputFormat) -> Self {
    Self {
      format,
      ..Self::default()
    }
  }

  pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  pub fn with_freeze_namespaces(mut self, freeze: bool) -> Self {
    self.freeze_namespaces = freeze;
    self
  }

  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }
}
