//! Central registry of modules, external modules and declarations.
//!
//! Every cross-module relation in the engine is an id into this registry: AST
//! nodes refer to [`DeclId`]s, declarations refer to their owning module by
//! [`ModuleRef`], and export tables map names to [`ExportEntry`]s. The registry
//! is the single owner; nothing else holds a declaration by value.
//!
//! ## Export tracing
//!
//! [`Registry::trace_export`] follows `export { a as b } from`, `export * as
//! ns from` and `export * from` chains until it reaches the declaring module.
//! Tracing keeps the current chain of `(module, name)` requests on a stack:
//! - revisiting a request through an explicit re-export is a
//!   [`BundleError::CircularReexport`];
//! - revisiting a request through `export *` only means that branch does not
//!   provide the name, matching how star exports may form cycles legally.
use crate::ast::NodeId;
use crate::err::BundleError;
use ahash::HashMap;
use ahash::HashSet;
use diagnostics::FileId;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

impl ModuleId {
  pub fn file(self) -> FileId {
    FileId(self.0)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleRef {
  Internal(ModuleId),
  External(ExternalId),
}

impl From<ModuleId> for ModuleRef {
  fn from(value: ModuleId) -> Self {
    ModuleRef::Internal(value)
  }
}

impl From<ExternalId> for ModuleRef {
  fn from(value: ExternalId) -> Self {
    ModuleRef::External(value)
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclKind {
  /// Declared by a statement in its owning module.
  Local { statement: NodeId },
  /// An import binding; `target` is filled in when the graph is linked.
  /// `imported` is `*` for namespace imports.
  Imported {
    source: ModuleRef,
    imported: String,
    target: Option<DeclId>,
  },
  /// The namespace object of `module`, as created by `import * as` or
  /// `export * as`.
  Namespace { module: ModuleId },
  /// A binding provided by a module outside the bundle.
  External { module: ExternalId, imported: String },
  /// A name no scope declares, e.g. a global such as `console`.
  Unresolved,
}

impl DeclKind {
  pub fn is_namespace(&self) -> bool {
    matches!(self, DeclKind::Namespace { .. })
  }

  pub fn is_external(&self) -> bool {
    matches!(self, DeclKind::External { .. })
  }

  pub fn is_unresolved(&self) -> bool {
    matches!(self, DeclKind::Unresolved)
  }
}

#[derive(Clone, Debug)]
pub struct Declaration {
  pub name: String,
  pub owner: Option<ModuleRef>,
  pub kind: DeclKind,
  pub(crate) included: bool,
  pub(crate) safe_name: Option<String>,
}

impl Declaration {
  pub fn is_included(&self) -> bool {
    self.included
  }

  /// Whether member accesses on this declaration address another module's
  /// exports: namespace objects of bundled modules and `*` bindings of
  /// external modules.
  pub fn is_namespace(&self) -> bool {
    match &self.kind {
      DeclKind::Namespace { .. } => true,
      DeclKind::External { imported, .. } => imported == "*",
      _ => false,
    }
  }

  pub fn is_external(&self) -> bool {
    self.kind.is_external()
  }

  /// The module that owns this declaration. For a namespace this is the
  /// module whose exports it proxies.
  pub fn module(&self) -> Option<ModuleRef> {
    match &self.kind {
      DeclKind::Namespace { module } => Some(ModuleRef::Internal(*module)),
      DeclKind::External { module, .. } => Some(ModuleRef::External(*module)),
      _ => self.owner,
    }
  }

  /// Flips the inclusion flag. Returns whether it was previously unset.
  pub(crate) fn mark_included(&mut self) -> bool {
    !std::mem::replace(&mut self.included, true)
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportEntry {
  Local(DeclId),
  /// `export { imported as name } from source`; `imported` is `*` for
  /// `export * as name from source`.
  ReExport { source: ModuleRef, imported: String },
}

#[derive(Debug)]
pub struct Module {
  pub id: String,
  pub source: String,
  pub body: Vec<NodeId>,
  pub namespace: DeclId,
  exports: BTreeMap<String, ExportEntry>,
  export_all: Vec<ModuleRef>,
  resolved_exports: BTreeMap<String, DeclId>,
}

impl Module {
  /// Every export name (including those gained through `export *`) mapped to
  /// its traced declaration. Populated by [`Registry::link`].
  pub fn resolved_exports(&self) -> &BTreeMap<String, DeclId> {
    &self.resolved_exports
  }
}

#[derive(Debug)]
pub struct ExternalModule {
  pub id: String,
  name: String,
  suggestions: HashMap<String, u32>,
  best_suggestion: u32,
  pub(crate) safe_name: Option<String>,
  pub(crate) declarations: BTreeMap<String, DeclId>,
  pub(crate) used: bool,
}

impl ExternalModule {
  /// The identifier the module object is bound to in the output.
  pub fn name(&self) -> &str {
    self.safe_name.as_deref().unwrap_or(&self.name)
  }

  pub fn is_used(&self) -> bool {
    self.used
  }

  pub fn declarations(&self) -> &BTreeMap<String, DeclId> {
    &self.declarations
  }
}

#[derive(Debug, Default)]
pub struct Registry {
  modules: Vec<Module>,
  externals: Vec<ExternalModule>,
  declarations: Vec<Declaration>,
  globals: HashMap<String, DeclId>,
}

impl Registry {
  pub fn add_module(&mut self, id: &str) -> ModuleId {
    let module = ModuleId(self.modules.len() as u32);
    let namespace = self.add_declaration(
      &identifier_from_id(id),
      Some(module.into()),
      DeclKind::Namespace { module },
    );
    self.modules.push(Module {
      id: id.to_string(),
      source: String::new(),
      body: Vec::new(),
      namespace,
      exports: BTreeMap::new(),
      export_all: Vec::new(),
      resolved_exports: BTreeMap::new(),
    });
    module
  }

  pub fn add_external(&mut self, id: &str) -> ExternalId {
    let external = ExternalId(self.externals.len() as u32);
    self.externals.push(ExternalModule {
      id: id.to_string(),
      name: identifier_from_id(id),
      suggestions: HashMap::default(),
      best_suggestion: 0,
      safe_name: None,
      declarations: BTreeMap::new(),
      used: false,
    });
    external
  }

  pub fn add_declaration(&mut self, name: &str, owner: Option<ModuleRef>, kind: DeclKind) -> DeclId {
    let decl = DeclId(self.declarations.len() as u32);
    self.declarations.push(Declaration {
      name: name.to_string(),
      owner,
      kind,
      included: false,
      safe_name: None,
    });
    decl
  }

  pub fn module(&self, id: ModuleId) -> &Module {
    &self.modules[id.0 as usize]
  }

  pub fn module_for_file(&self, file: FileId) -> Option<&Module> {
    self.modules.get(file.0 as usize)
  }

  pub(crate) fn module_mut(&mut self, id: ModuleId) -> &mut Module {
    &mut self.modules[id.0 as usize]
  }

  pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> + '_ {
    self
      .modules
      .iter()
      .enumerate()
      .map(|(idx, module)| (ModuleId(idx as u32), module))
  }

  pub fn module_ids(&self) -> Vec<ModuleId> {
    (0..self.modules.len() as u32).map(ModuleId).collect()
  }

  pub fn external(&self, id: ExternalId) -> &ExternalModule {
    &self.externals[id.0 as usize]
  }

  pub(crate) fn external_mut(&mut self, id: ExternalId) -> &mut ExternalModule {
    &mut self.externals[id.0 as usize]
  }

  pub fn externals(&self) -> impl Iterator<Item = (ExternalId, &ExternalModule)> + '_ {
    self
      .externals
      .iter()
      .enumerate()
      .map(|(idx, module)| (ExternalId(idx as u32), module))
  }

  pub fn declaration(&self, id: DeclId) -> &Declaration {
    &self.declarations[id.0 as usize]
  }

  pub(crate) fn declaration_mut(&mut self, id: DeclId) -> &mut Declaration {
    &mut self.declarations[id.0 as usize]
  }

  pub fn declarations(&self) -> impl Iterator<Item = (DeclId, &Declaration)> + '_ {
    self
      .declarations
      .iter()
      .enumerate()
      .map(|(idx, decl)| (DeclId(idx as u32), decl))
  }

  /// Display id of a module or external module.
  pub fn module_label(&self, module: ModuleRef) -> &str {
    match module {
      ModuleRef::Internal(id) => &self.module(id).id,
      ModuleRef::External(id) => &self.external(id).id,
    }
  }

  /// The shared declaration for an unbound name.
  pub fn global(&mut self, name: &str) -> DeclId {
    if let Some(decl) = self.globals.get(name) {
      return *decl;
    }
    let decl = self.add_declaration(name, None, DeclKind::Unresolved);
    self.globals.insert(name.to_string(), decl);
    decl
  }

  pub fn namespace_of(&mut self, module: ModuleRef) -> DeclId {
    match module {
      ModuleRef::Internal(id) => self.module(id).namespace,
      ModuleRef::External(id) => self.external_declaration(id, "*"),
    }
  }

  /// The declaration for `name` imported from an external module, created on
  /// first use.
  pub fn external_declaration(&mut self, module: ExternalId, name: &str) -> DeclId {
    if let Some(decl) = self.external(module).declarations.get(name) {
      return *decl;
    }
    let local = if name == "*" || name == "default" {
      self.external(module).name.clone()
    } else {
      name.to_string()
    };
    let decl = self.add_declaration(&local, Some(module.into()), DeclKind::External {
      module,
      imported: name.to_string(),
    });
    self
      .external_mut(module)
      .declarations
      .insert(name.to_string(), decl);
    decl
  }

  pub fn add_export(
    &mut self,
    module: ModuleId,
    name: &str,
    entry: ExportEntry,
  ) -> Result<(), BundleError> {
    let target = self.module_mut(module);
    if target.exports.contains_key(name) {
      return Err(BundleError::DuplicateExport {
        module: target.id.clone(),
        name: name.to_string(),
      });
    }
    target.exports.insert(name.to_string(), entry);
    Ok(())
  }

  pub fn add_export_all(&mut self, module: ModuleId, source: ModuleRef) {
    self.module_mut(module).export_all.push(source);
  }

  /// Records `hint` as a candidate display name for an external module. The
  /// most frequently suggested name wins; ties keep the earlier winner.
  pub fn suggest_name(&mut self, module: ExternalId, hint: &str) {
    let external = self.external_mut(module);
    let count = external.suggestions.entry(hint.to_string()).or_insert(0);
    *count += 1;
    if *count > external.best_suggestion {
      external.best_suggestion = *count;
      external.name = hint.to_string();
    }
  }

  /// Follows a binding through its import to the declaration it denotes.
  pub fn resolve_binding(&self, decl: DeclId) -> DeclId {
    match &self.declaration(decl).kind {
      DeclKind::Imported {
        target: Some(target),
        ..
      } => *target,
      _ => decl,
    }
  }

  /// Finds the declaration `module` exports as `name`, following re-exports
  /// transitively. Returns `Ok(None)` if no such export exists.
  pub fn trace_export(
    &mut self,
    module: ModuleRef,
    name: &str,
  ) -> Result<Option<DeclId>, BundleError> {
    let mut stack = Vec::new();
    self.trace_export_inner(module, name, false, &mut stack)
  }

  fn trace_export_inner(
    &mut self,
    module: ModuleRef,
    name: &str,
    via_star: bool,
    stack: &mut Vec<(ModuleRef, String)>,
  ) -> Result<Option<DeclId>, BundleError> {
    let module_id = match module {
      ModuleRef::External(id) => return Ok(Some(self.external_declaration(id, name))),
      ModuleRef::Internal(id) => id,
    };
    if stack.iter().any(|(m, n)| *m == module && n == name) {
      if via_star {
        return Ok(None);
      }
      return Err(BundleError::CircularReexport {
        module: self.module(module_id).id.clone(),
        name: name.to_string(),
      });
    }
    stack.push((module, name.to_string()));
    let result = self.trace_in_module(module_id, name, stack);
    stack.pop();
    result
  }

  fn trace_in_module(
    &mut self,
    module: ModuleId,
    name: &str,
    stack: &mut Vec<(ModuleRef, String)>,
  ) -> Result<Option<DeclId>, BundleError> {
    match self.module(module).exports.get(name).cloned() {
      Some(ExportEntry::Local(decl)) => return self.follow_binding(decl, stack),
      Some(ExportEntry::ReExport { source, imported }) => {
        if imported == "*" {
          return Ok(Some(self.namespace_of(source)));
        }
        return self.trace_export_inner(source, &imported, false, stack);
      }
      None => {}
    }
    // `export *` never forwards a default export.
    if name == "default" {
      return Ok(None);
    }
    for source in self.module(module).export_all.clone() {
      if let Some(decl) = self.trace_export_inner(source, name, true, stack)? {
        return Ok(Some(decl));
      }
    }
    Ok(None)
  }

  fn follow_binding(
    &mut self,
    decl: DeclId,
    stack: &mut Vec<(ModuleRef, String)>,
  ) -> Result<Option<DeclId>, BundleError> {
    let (source, imported) = match &self.declaration(decl).kind {
      DeclKind::Imported {
        target: Some(target),
        ..
      } => return Ok(Some(*target)),
      DeclKind::Imported {
        source, imported, ..
      } => (*source, imported.clone()),
      _ => return Ok(Some(decl)),
    };
    if imported == "*" {
      return Ok(Some(self.namespace_of(source)));
    }
    self.trace_export_inner(source, &imported, false, stack)
  }

  /// All names `module` exports, including names gained through `export *`
  /// (which never forwards `default`).
  pub fn export_names(&self, module: ModuleId) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut visited = HashSet::default();
    self.collect_export_names(module, true, &mut visited, &mut names);
    names
  }

  fn collect_export_names(
    &self,
    module: ModuleId,
    include_default: bool,
    visited: &mut HashSet<ModuleId>,
    names: &mut BTreeSet<String>,
  ) {
    if !visited.insert(module) {
      return;
    }
    let data = self.module(module);
    for name in data.exports.keys() {
      if include_default || name != "default" {
        names.insert(name.clone());
      }
    }
    for source in &data.export_all {
      if let ModuleRef::Internal(source) = source {
        self.collect_export_names(*source, false, visited, names);
      }
    }
  }

  /// Resolves every import binding to its target declaration and computes
  /// each module's resolved export table.
  pub fn link(&mut self) -> Result<(), BundleError> {
    let mut idx = 0;
    while idx < self.declarations.len() {
      let decl = DeclId(idx as u32);
      idx += 1;
      let DeclKind::Imported {
        source,
        imported,
        target: None,
      } = self.declaration(decl).kind.clone()
      else {
        continue;
      };
      let mut stack = Vec::new();
      let resolved = self.follow_binding(decl, &mut stack)?;
      let Some(resolved) = resolved else {
        let importer = self
          .declaration(decl)
          .owner
          .map(|owner| self.module_label(owner).to_string())
          .unwrap_or_default();
        return Err(BundleError::MissingImport {
          importer,
          exporter: self.module_label(source).to_string(),
          name: imported,
        });
      };
      if let DeclKind::Imported { target, .. } = &mut self.declaration_mut(decl).kind {
        *target = Some(resolved);
      }
    }

    for module in self.module_ids() {
      let mut resolved = BTreeMap::new();
      for name in self.export_names(module) {
        if let Some(decl) = self.trace_export(module.into(), &name)? {
          resolved.insert(name, decl);
        }
      }
      self.module_mut(module).resolved_exports = resolved;
    }
    Ok(())
  }
}

// Keywords and strict-mode reserved words that cannot name a binding.
const RESERVED_WORDS: &[&str] = &[
  "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
  "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
  "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let", "new",
  "null", "package", "private", "protected", "public", "return", "static", "super", "switch",
  "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Derives a valid identifier from a module id: the file stem with
/// non-identifier characters replaced by `_`, prefixed with `_` if it would
/// start with a digit or is a reserved word.
pub fn identifier_from_id(id: &str) -> String {
  let base = id.rsplit(['/', '\\']).next().unwrap_or(id);
  let stem = match base.find('.') {
    Some(0) | None => base,
    Some(dot) => &base[..dot],
  };
  let mut out: String = stem
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
        c
      } else {
        '_'
      }
    })
    .collect();
  if out.is_empty()
    || out.starts_with(|c: char| c.is_ascii_digit())
    || RESERVED_WORDS.contains(&out.as_str())
  {
    out.insert(0, '_');
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn local(registry: &mut Registry, module: ModuleId, name: &str) -> DeclId {
    // Statement ids are irrelevant to tracing.
    registry.add_declaration(name, Some(module.into()), DeclKind::Unresolved)
  }

  #[test]
  fn identifiers_from_ids() {
    assert_eq!(identifier_from_id("/src/b.js"), "b");
    assert_eq!(identifier_from_id("lodash-es"), "lodash_es");
    assert_eq!(identifier_from_id("C:\\x\\3d.min.js"), "_3d");
    assert_eq!(identifier_from_id(".hidden"), "_hidden");
    assert_eq!(identifier_from_id("src/new.js"), "_new");
    assert_eq!(identifier_from_id("delete"), "_delete");
    assert_eq!(identifier_from_id("lib/await.mjs"), "_await");
    assert_eq!(identifier_from_id("newer.js"), "newer");
  }

  #[test]
  fn traces_through_named_and_star_reexports() {
    let mut registry = Registry::default();
    let b = registry.add_module("b.js");
    let a = registry.add_module("a.js");
    let c = registry.add_module("c.js");
    let x = local(&mut registry, b, "x");
    registry.add_export(b, "x", ExportEntry::Local(x)).unwrap();
    registry
      .add_export(a, "renamed", ExportEntry::ReExport {
        source: b.into(),
        imported: "x".into(),
      })
      .unwrap();
    registry.add_export_all(c, a.into());

    assert_eq!(registry.trace_export(a.into(), "renamed").unwrap(), Some(x));
    assert_eq!(registry.trace_export(c.into(), "renamed").unwrap(), Some(x));
    assert_eq!(registry.trace_export(c.into(), "x").unwrap(), None);
  }

  #[test]
  fn namespace_reexport_yields_namespace_declaration() {
    let mut registry = Registry::default();
    let b = registry.add_module("b.js");
    let a = registry.add_module("a.js");
    registry
      .add_export(a, "ns", ExportEntry::ReExport {
        source: b.into(),
        imported: "*".into(),
      })
      .unwrap();
    let ns = registry.trace_export(a.into(), "ns").unwrap().unwrap();
    assert!(registry.declaration(ns).kind.is_namespace());
    assert_eq!(registry.declaration(ns).module(), Some(ModuleRef::Internal(b)));
  }

  #[test]
  fn explicit_reexport_cycle_is_fatal() {
    let mut registry = Registry::default();
    let a = registry.add_module("a.js");
    let b = registry.add_module("b.js");
    registry
      .add_export(a, "x", ExportEntry::ReExport {
        source: b.into(),
        imported: "x".into(),
      })
      .unwrap();
    registry
      .add_export(b, "x", ExportEntry::ReExport {
        source: a.into(),
        imported: "x".into(),
      })
      .unwrap();
    let err = registry.trace_export(a.into(), "x").unwrap_err();
    assert_eq!(
      err,
      BundleError::CircularReexport {
        module: "a.js".into(),
        name: "x".into(),
      }
    );
  }

  #[test]
  fn star_cycle_and_diamond_are_not_errors() {
    let mut registry = Registry::default();
    let a = registry.add_module("a.js");
    let b = registry.add_module("b.js");
    let c = registry.add_module("c.js");
    let d = registry.add_module("d.js");
    registry.add_export_all(a, b.into());
    registry.add_export_all(b, a.into());
    assert_eq!(registry.trace_export(a.into(), "missing").unwrap(), None);

    registry.add_export_all(a, c.into());
    registry.add_export_all(b, d.into());
    registry.add_export_all(c, d.into());
    let v = local(&mut registry, d, "v");
    registry.add_export(d, "v", ExportEntry::Local(v)).unwrap();
    assert_eq!(registry.trace_export(a.into(), "v").unwrap(), Some(v));
    assert_eq!(registry.trace_export(c.into(), "nope").unwrap(), None);
  }

  #[test]
  fn star_export_skips_default() {
    let mut registry = Registry::default();
    let b = registry.add_module("b.js");
    let a = registry.add_module("a.js");
    let def = local(&mut registry, b, "value");
    registry.add_export(b, "default", ExportEntry::Local(def)).unwrap();
    registry.add_export_all(a, b.into());
    assert_eq!(registry.trace_export(a.into(), "default").unwrap(), None);
    assert!(registry.export_names(a).is_empty());
    assert_eq!(
      registry.export_names(b).into_iter().collect::<Vec<_>>(),
      vec!["default".to_string()]
    );
  }

  #[test]
  fn external_modules_provide_any_name() {
    let mut registry = Registry::default();
    let fs = registry.add_external("fs");
    let a = registry.add_module("a.js");
    registry.add_export_all(a, fs.into());
    let read = registry.trace_export(a.into(), "readFile").unwrap().unwrap();
    assert!(registry.declaration(read).kind.is_external());
    assert_eq!(registry.external_declaration(fs, "readFile"), read);
  }

  #[test]
  fn link_resolves_imports_and_reports_missing_ones() {
    let mut registry = Registry::default();
    let b = registry.add_module("b.js");
    let main = registry.add_module("main.js");
    let x = local(&mut registry, b, "x");
    registry.add_export(b, "x", ExportEntry::Local(x)).unwrap();
    let imported = registry.add_declaration("y", Some(main.into()), DeclKind::Imported {
      source: b.into(),
      imported: "x".into(),
      target: None,
    });
    let ns = registry.add_declaration("ns", Some(main.into()), DeclKind::Imported {
      source: b.into(),
      imported: "*".into(),
      target: None,
    });
    registry.link().unwrap();
    assert_eq!(registry.resolve_binding(imported), x);
    assert_eq!(registry.resolve_binding(ns), registry.module(b).namespace);
    assert_eq!(registry.module(b).resolved_exports().get("x"), Some(&x));

    registry.add_declaration("z", Some(main.into()), DeclKind::Imported {
      source: b.into(),
      imported: "z".into(),
      target: None,
    });
    assert_eq!(
      registry.link().unwrap_err(),
      BundleError::MissingImport {
        importer: "main.js".into(),
        exporter: "b.js".into(),
        name: "z".into(),
      }
    );
  }

  #[test]
  fn suggestions_pick_most_common() {
    let mut registry = Registry::default();
    let fs = registry.add_external("node:fs");
    assert_eq!(registry.external(fs).name(), "node_fs");
    registry.suggest_name(fs, "fs");
    registry.suggest_name(fs, "files");
    assert_eq!(registry.external(fs).name(), "fs");
    registry.suggest_name(fs, "files");
    assert_eq!(registry.external(fs).name(), "files");
  }
}
