//! Binding of identifiers and member access chains.
//!
//! A member chain whose root names a namespace (`ns.sub.value`) is resolved
//! statically: each property is traced through the namespace's module
//! exports, hopping into nested namespaces, until the path is consumed. The
//! node then denotes the traced declaration directly and its children are
//! never bound, so the namespace object itself is not referenced. A property
//! the module doesn't export produces a `MISSING_EXPORT` warning and the
//! access is replaced by `undefined`.
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::ast::Resolution;
use crate::err::BundleError;
use crate::graph::Graph;
use crate::keypath::Keypath;
use crate::keypath::KeypathPart;
use crate::options::BundleOptions;
use crate::registry::DeclKind;
use crate::registry::ModuleRef;
use diagnostics::paths::relative_id;
use diagnostics::Diagnostic;
use diagnostics::Span;
use tracing::debug_span;
use tracing::trace;
use tracing::warn;

pub const MISSING_EXPORT: &str = "MISSING_EXPORT";
pub const MISSING_EXPORT_URL: &str =
  "https://github.com/rollup/rollup/wiki/Troubleshooting#name-is-not-exported-by-module";

impl Graph {
  /// Binds every node of every module in execution order. Binding is
  /// idempotent: nodes already bound are skipped.
  pub fn bind(&mut self, options: &BundleOptions) -> Result<(), BundleError> {
    for module in self.order.clone() {
      let span = debug_span!("bind", module = %self.registry.module(module).id);
      let _guard = span.enter();
      for statement in self.registry.module(module).body.clone() {
        self.bind_node(statement, options)?;
      }
    }
    Ok(())
  }

  pub fn bind_node(&mut self, node: NodeId, options: &BundleOptions) -> Result<(), BundleError> {
    if std::mem::replace(&mut self.ast[node].bound, true) {
      return Ok(());
    }
    let kind = &self.ast[node].kind;
    if kind.is_member_access() {
      return self.bind_member(node, options);
    }
    if let NodeKind::Id { .. } = kind {
      self.bind_identifier(node);
      return Ok(());
    }
    self.bind_children(node, options)
  }

  fn bind_children(&mut self, node: NodeId, options: &BundleOptions) -> Result<(), BundleError> {
    for child in self.ast[node].kind.children() {
      self.bind_node(child, options)?;
    }
    Ok(())
  }

  fn bind_identifier(&mut self, node: NodeId) {
    let NodeKind::Id { name } = &self.ast[node].kind else {
      return;
    };
    let name = name.clone();
    let decl = self
      .scopes
      .find_declaration(&mut self.registry, self.ast[node].scope, &name);
    let decl = self.registry.resolve_binding(decl);
    self.set_resolution(node, Resolution::Declaration(decl));
  }

  fn bind_member(&mut self, node: NodeId, options: &BundleOptions) -> Result<(), BundleError> {
    let keypath = Keypath::extract(&self.ast, node);
    let root_name = match keypath.root_name(&self.ast) {
      Some(name) if !keypath.computed => name.to_string(),
      _ => return self.bind_fallback(node, options),
    };

    let scope = self.ast[node].scope;
    let decl = self
      .scopes
      .find_declaration(&mut self.registry, scope, &root_name);
    let mut decl = self.registry.resolve_binding(decl);
    let mut parts = keypath.parts;
    while !parts.is_empty() && self.registry.declaration(decl).is_namespace() {
      let Some(module) = self.registry.declaration(decl).module() else {
        break;
      };
      let name = parts[0].name.clone();
      match self.registry.trace_export(module, &name)? {
        Some(next) => {
          trace!(%name, "traced namespace member");
          decl = next;
          parts.pop_front();
        }
        None => {
          self.warn_missing_export(node, module, &parts[0], options);
          self.set_resolution(node, Resolution::Replacement("undefined"));
          return Ok(());
        }
      }
    }

    // Not (entirely) a namespace reference.
    if !parts.is_empty() {
      return self.bind_fallback(node, options);
    }
    self.set_resolution(node, Resolution::Declaration(decl));
    let external = match self.registry.declaration(decl).kind {
      DeclKind::External { module, .. } => Some(module),
      _ => None,
    };
    if let Some(module) = external {
      self.registry.suggest_name(module, &root_name);
    }
    Ok(())
  }

  fn bind_fallback(&mut self, node: NodeId, options: &BundleOptions) -> Result<(), BundleError> {
    self.set_resolution(node, Resolution::Fallback);
    self.bind_children(node, options)
  }

  fn set_resolution(&self, node: NodeId, resolution: Resolution) {
    // `bound` guards against a second write.
    let _ = self.ast[node].resolution.set(resolution);
  }

  fn warn_missing_export(
    &mut self,
    node: NodeId,
    exporter: ModuleRef,
    part: &KeypathPart,
    options: &BundleOptions,
  ) {
    let cwd = options.cwd.as_deref();
    let module = self.ast[node].module;
    let importer = relative_id(&self.registry.module(module).id, cwd);
    let exporter = relative_id(self.registry.module_label(exporter), cwd);
    let message = format!("'{}' is not exported by '{}'", part.name, exporter);
    warn!(missing = %part.name, %importer, %exporter, "{message}");
    let diagnostic = Diagnostic::warning(
      MISSING_EXPORT,
      message,
      Span::new(module.file(), part.loc.to_range()),
    )
    .with_url(MISSING_EXPORT_URL)
    .with_field("missing", part.name.clone())
    .with_field("importer", importer)
    .with_field("exporter", exporter);
    self.warnings.push(diagnostic);
  }
}

#[cfg(test)]
mod tests {
  use crate::ast::Resolution;
  use crate::build::ident;
  use crate::build::num;
  use crate::build::GraphBuilder;
  use crate::options::BundleOptions;

  #[test]
  fn resolves_nested_namespace_chain() {
    let mut g = GraphBuilder::new();
    let c = g.module("c.js");
    let value = g.export_const(c, "value", num(1.0)).unwrap();
    let b = g.module("b.js");
    g.export_namespace_from(b, c, "sub").unwrap();
    let main = g.module("main.js");
    g.import_namespace(main, b, "ns").unwrap();
    let access = g
      .expr_stmt(main, ident("ns").dot("sub").dot("value"))
      .unwrap();
    let mut graph = g.build(main).unwrap();
    graph.link().unwrap();
    graph.bind(&BundleOptions::default()).unwrap();

    assert_eq!(graph.ast()[access].resolution(), Some(Resolution::Declaration(value)));
    assert!(graph.warnings().is_empty());
  }

  #[test]
  fn missing_member_is_replaced_and_warned_once() {
    let mut g = GraphBuilder::new();
    let b = g.module("/proj/b.js");
    g.export_const(b, "x", num(1.0)).unwrap();
    let main = g.module("/proj/main.js");
    g.import_namespace(main, b, "ns").unwrap();
    let access = g.expr_stmt(main, ident("ns").dot("y")).unwrap();
    let mut graph = g.build(main).unwrap();
    let options = BundleOptions::default().with_cwd("/proj");
    graph.link().unwrap();
    graph.bind(&options).unwrap();
    graph.bind(&options).unwrap();

    assert_eq!(graph.ast()[access].resolution(), Some(Resolution::Replacement("undefined")));
    assert_eq!(graph.warnings().len(), 1);
    let warning = &graph.warnings()[0];
    assert_eq!(warning.code, super::MISSING_EXPORT);
    assert_eq!(warning.message, "'y' is not exported by 'b.js'");
    assert_eq!(warning.field("importer"), Some("main.js"));
    assert_eq!(warning.field("exporter"), Some("b.js"));
    assert_eq!(warning.url, Some(super::MISSING_EXPORT_URL));
  }

  #[test]
  fn non_namespace_roots_fall_back() {
    let mut g = GraphBuilder::new();
    let main = g.module("main.js");
    g.declare_const(main, "obj", num(1.0)).unwrap();
    let access = g.expr_stmt(main, ident("obj").dot("prop")).unwrap();
    let mut graph = g.build(main).unwrap();
    graph.link().unwrap();
    graph.bind(&BundleOptions::default()).unwrap();
    assert_eq!(graph.ast()[access].resolution(), Some(Resolution::Fallback));
  }
}
