//! Output-scope naming.
//!
//! All bundled modules share a single top-level scope in the output, so
//! declarations that collide get a `$n` suffix. Names claimed first win:
//! globals referenced by included code, then names introduced by the output
//! format's wrapper, then external module bindings, then module declarations
//! in execution order.
use crate::graph::Graph;
use crate::options::BundleOptions;
use crate::options::OutputFormat;
use crate::registry::DeclId;
use crate::registry::DeclKind;
use crate::registry::ExternalId;
use crate::registry::ModuleRef;
use crate::registry::Registry;
use ahash::HashMap;
use ahash::HashSet;
use tracing::debug;
use tracing::debug_span;

const CJS_RESERVED: &[&str] = &["exports", "module", "require"];

#[derive(Default)]
struct UsedNames(HashSet<String>);

impl UsedNames {
  fn reserve(&mut self, name: &str) {
    self.0.insert(name.to_string());
  }

  fn claim(&mut self, base: &str) -> String {
    if self.0.insert(base.to_string()) {
      return base.to_string();
    }
    let mut n = 1;
    loop {
      let candidate = format!("{base}${n}");
      if self.0.insert(candidate.clone()) {
        return candidate;
      }
      n += 1;
    }
  }
}

impl Graph {
  /// Assigns final output names to every included declaration and used
  /// external module.
  pub fn deconflict(&mut self, options: &BundleOptions) {
    let span = debug_span!("deconflict", format = ?options.format);
    let _guard = span.enter();
    let mut used = UsedNames::default();

    for (_, decl) in self.registry.declarations() {
      if decl.kind.is_unresolved() && decl.is_included() {
        used.reserve(&decl.name);
      }
    }
    if options.freeze_namespaces {
      used.reserve("Object");
    }
    if !options.format.is_es() {
      for name in CJS_RESERVED {
        used.reserve(name);
      }
    }

    let externals: Vec<ExternalId> = self
      .registry
      .externals()
      .filter(|(_, ext)| ext.is_used())
      .map(|(id, _)| id)
      .collect();
    for ext in externals {
      self.deconflict_external(ext, options.format, &mut used);
    }

    let mut by_module: HashMap<ModuleRef, Vec<DeclId>> = HashMap::default();
    for (id, decl) in self.registry.declarations() {
      let owned = matches!(decl.kind, DeclKind::Local { .. } | DeclKind::Namespace { .. });
      if owned && decl.is_included() {
        if let Some(owner) = decl.owner {
          by_module.entry(owner).or_default().push(id);
        }
      }
    }
    for module in self.order.clone() {
      for decl in by_module.remove(&ModuleRef::from(module)).unwrap_or_default() {
        let name = self.registry.declaration(decl).name.clone();
        let safe = used.claim(&name);
        if safe != name {
          debug!(%name, %safe, "renamed declaration");
        }
        self.registry.declaration_mut(decl).safe_name = Some(safe);
      }
    }
  }

  fn deconflict_external(
    &mut self,
    ext: ExternalId,
    format: OutputFormat,
    used: &mut UsedNames,
  ) {
    let base = self.registry.external(ext).name().to_string();
    let module_name = used.claim(&base);
    self.registry.external_mut(ext).safe_name = Some(module_name.clone());
    if self.registry.default_needs_alias(ext, format) {
      used.reserve(&format!("{module_name}__default"));
    }
    if format.is_es() {
      let decls: Vec<(String, DeclId)> = self
        .registry
        .external(ext)
        .declarations()
        .iter()
        .map(|(name, decl)| (name.clone(), *decl))
        .collect();
      for (imported, decl) in decls {
        let is_binding = imported != "*" && imported != "default";
        if !is_binding || !self.registry.declaration(decl).is_included() {
          continue;
        }
        let safe = used.claim(&imported);
        self.registry.declaration_mut(decl).safe_name = Some(safe);
      }
    }
  }
}

impl Registry {
  /// The name `decl` is referred to by in output of the given format.
  pub fn get_name(&self, decl: DeclId, format: OutputFormat) -> String {
    let declaration = self.declaration(decl);
    match &declaration.kind {
      DeclKind::Local { .. } | DeclKind::Namespace { .. } => declaration
        .safe_name
        .clone()
        .unwrap_or_else(|| declaration.name.clone()),
      DeclKind::Imported {
        target: Some(target),
        ..
      } => self.get_name(*target, format),
      DeclKind::Imported { target: None, .. } | DeclKind::Unresolved => declaration.name.clone(),
      DeclKind::External { module, imported } => {
        let ext = self.external(*module);
        match imported.as_str() {
          "*" => ext.name().to_string(),
          "default" if self.default_needs_alias(*module, format) => {
            format!("{}__default", ext.name())
          }
          "default" => ext.name().to_string(),
          _ if format.is_es() => declaration
            .safe_name
            .clone()
            .unwrap_or_else(|| imported.clone()),
          _ => format!("{}.{}", ext.name(), imported),
        }
      }
    }
  }

  /// Whether the default import of `ext` needs its own binding instead of the
  /// module binding: ES output also importing the namespace, or CommonJS
  /// output also reading named exports off the module object.
  pub fn default_needs_alias(&self, ext: ExternalId, format: OutputFormat) -> bool {
    let external = self.external(ext);
    let included = |name: &str| {
      external
        .declarations()
        .get(name)
        .map_or(false, |decl| self.declaration(*decl).is_included())
    };
    if !included("default") {
      return false;
    }
    if included("*") {
      return true;
    }
    !format.is_es()
      && external
        .declarations()
        .keys()
        .any(|name| name != "*" && name != "default" && included(name.as_str()))
  }
}

#[cfg(test)]
mod tests {
  use super::UsedNames;
  use crate::build::ident;
  use crate::build::num;
  use crate::build::GraphBuilder;
  use crate::options::BundleOptions;
  use crate::options::OutputFormat;

  #[test]
  fn claims_suffix_on_collision() {
    let mut used = UsedNames::default();
    used.reserve("x");
    assert_eq!(used.claim("x"), "x$1");
    assert_eq!(used.claim("x"), "x$2");
    assert_eq!(used.claim("y"), "y");
  }

  #[test]
  fn colliding_module_locals_are_renamed_in_execution_order() {
    let mut g = GraphBuilder::new();
    let b = g.module("b.js");
    let bx = g.export_const(b, "x", num(1.0)).unwrap();
    let main = g.module("main.js");
    g.import_named(main, b, "x", "other").unwrap();
    let mx = g.declare_const(main, "x", num(2.0)).unwrap();
    g.expr_stmt(main, ident("log").call(vec![ident("x"), ident("other")]))
      .unwrap();
    let mut graph = g.build(main).unwrap();
    let options = BundleOptions::default();
    graph.link().unwrap();
    graph.bind(&options).unwrap();
    graph.mark();
    graph.deconflict(&options);

    let registry = graph.registry();
    assert_eq!(registry.get_name(bx, OutputFormat::Es), "x");
    assert_eq!(registry.get_name(mx, OutputFormat::Es), "x$1");
  }

  #[test]
  fn external_names_depend_on_format() {
    let cases = [
      (OutputFormat::Es, "readFile"),
      (OutputFormat::Cjs, "fs.readFile"),
    ];
    for (format, expected) in cases {
      let mut g = GraphBuilder::new();
      let fs = g.external("fs");
      let main = g.module("main.js");
      let read = g.import_named(main, fs, "readFile", "read").unwrap();
      g.expr_stmt(main, ident("read").call(vec![])).unwrap();
      let mut graph = g.build(main).unwrap();
      let options = BundleOptions::new(format);
      graph.link().unwrap();
      graph.bind(&options).unwrap();
      graph.mark();
      graph.deconflict(&options);
      assert_eq!(graph.registry().get_name(read, format), expected);
    }
  }
}
