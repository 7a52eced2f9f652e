use crate::ast::Ast;
use crate::ast::NodeKind;
use crate::err::BundleError;
use crate::registry::ModuleId;
use crate::registry::ModuleRef;
use crate::registry::Registry;
use crate::scope::Scopes;
use ahash::HashSet;
use diagnostics::render::SourceProvider;
use diagnostics::Diagnostic;
use diagnostics::FileId;
use tracing::debug;
use tracing::debug_span;

/// A fully constructed module graph: the node arena, lexical scopes and the
/// declaration registry, plus warnings accumulated while analysing it.
///
/// Built with [`crate::build::GraphBuilder`] and consumed by
/// [`crate::bundle::bundle`]. The analysis phases (`link`, `bind`, `mark`,
/// `deconflict`, `render`) are methods on this type and must run in that
/// order.
#[derive(Debug)]
pub struct Graph {
  pub(crate) ast: Ast,
  pub(crate) scopes: Scopes,
  pub(crate) registry: Registry,
  pub(crate) entry: ModuleId,
  pub(crate) order: Vec<ModuleId>,
  pub(crate) warnings: Vec<Diagnostic>,
}

impl Graph {
  pub fn ast(&self) -> &Ast {
    &self.ast
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  pub fn entry(&self) -> ModuleId {
    self.entry
  }

  /// Modules reachable from the entry, dependencies first. Empty until
  /// [`Graph::link`] has run.
  pub fn order(&self) -> &[ModuleId] {
    &self.order
  }

  pub fn warnings(&self) -> &[Diagnostic] {
    &self.warnings
  }

  pub fn module_by_id(&self, id: &str) -> Option<ModuleId> {
    self
      .registry
      .modules()
      .find(|(_, module)| module.id == id)
      .map(|(module, _)| module)
  }

  /// Resolves every import to its target declaration, computes export
  /// tables and the module execution order.
  pub fn link(&mut self) -> Result<(), BundleError> {
    let span = debug_span!("link", entry = %self.registry.module(self.entry).id);
    let _guard = span.enter();
    self.registry.link()?;
    let mut visited = HashSet::default();
    let mut order = Vec::new();
    self.visit_module(self.entry, &mut visited, &mut order);
    debug!(modules = order.len(), "linked module graph");
    self.order = order;
    Ok(())
  }

  fn visit_module(
    &self,
    module: ModuleId,
    visited: &mut HashSet<ModuleId>,
    order: &mut Vec<ModuleId>,
  ) {
    if !visited.insert(module) {
      return;
    }
    for &statement in &self.registry.module(module).body {
      match &self.ast[statement].kind {
        NodeKind::Import {
          source: ModuleRef::Internal(dep),
        }
        | NodeKind::ExportFrom {
          source: ModuleRef::Internal(dep),
        } => self.visit_module(*dep, visited, order),
        _ => {}
      }
    }
    order.push(module);
  }
}

impl SourceProvider for Graph {
  fn file_name(&self, file: FileId) -> Option<&str> {
    self.registry.module_for_file(file).map(|m| m.id.as_str())
  }

  fn file_text(&self, file: FileId) -> Option<&str> {
    self.registry.module_for_file(file).map(|m| m.source.as_str())
  }
}

#[cfg(test)]
mod tests {
  use crate::build::ident;
  use crate::build::num;
  use crate::build::GraphBuilder;

  #[test]
  fn execution_order_puts_dependencies_first() {
    let mut g = GraphBuilder::new();
    let main = g.module("main.js");
    let a = g.module("a.js");
    let b = g.module("b.js");
    let unreachable = g.module("unreachable.js");
    g.export_const(b, "x", num(1.0)).unwrap();
    g.import_named(a, b, "x", "x").unwrap();
    g.export_from(a, b, "x", "y").unwrap();
    // Cycle back to `a`.
    g.import_named(b, a, "y", "y").unwrap();
    g.import_named(main, a, "y", "y").unwrap();
    g.expr_stmt(main, ident("y")).unwrap();
    g.export_const(unreachable, "z", num(2.0)).unwrap();

    let mut graph = g.build(main).unwrap();
    graph.link().unwrap();
    assert_eq!(graph.order(), &[b, a, main]);
    assert_eq!(graph.module_by_id("unreachable.js"), Some(unreachable));
  }
}
