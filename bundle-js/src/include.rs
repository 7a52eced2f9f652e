//! Inclusion marking (tree-shaking).
//!
//! Inclusion flags on nodes and declarations only ever flip from unset to set,
//! so marking passes can be repeated freely; [`Graph::mark`] repeats them until
//! a pass includes nothing new.
use crate::ast::NodeId;
use crate::graph::Graph;
use crate::registry::DeclId;
use crate::registry::DeclKind;
use tracing::debug;
use tracing::debug_span;
use tracing::trace;

impl Graph {
  /// Includes `node` and its subtree, and forces inclusion of every
  /// declaration the subtree refers to. Returns whether anything was newly
  /// included.
  pub fn include_in_bundle(&mut self, node: NodeId) -> bool {
    let mut added = !std::mem::replace(&mut self.ast[node].included, true);
    if let Some(decl) = self.ast[node].declaration() {
      if self.include_declaration(decl) {
        added = true;
      }
    }
    for child in self.ast[node].kind.children() {
      if self.include_in_bundle(child) {
        added = true;
      }
    }
    added
  }

  /// Includes `decl` and everything needed to define it. Returns whether the
  /// declaration was newly included.
  pub fn include_declaration(&mut self, decl: DeclId) -> bool {
    if !self.registry.declaration_mut(decl).mark_included() {
      return false;
    }
    debug!(name = %self.registry.declaration(decl).name, "including declaration");
    match self.registry.declaration(decl).kind.clone() {
      DeclKind::Local { statement } => {
        self.include_in_bundle(statement);
      }
      DeclKind::Imported {
        target: Some(target),
        ..
      } => {
        self.include_declaration(target);
      }
      DeclKind::Namespace { module } => {
        // The synthesized namespace object references every export.
        let exports: Vec<DeclId> = self
          .registry
          .module(module)
          .resolved_exports()
          .values()
          .copied()
          .collect();
        for export in exports {
          self.include_declaration(export);
        }
      }
      DeclKind::External { module, .. } => {
        self.registry.external_mut(module).used = true;
      }
      DeclKind::Imported { target: None, .. } | DeclKind::Unresolved => {}
    }
    true
  }

  /// Includes everything the entry module exports.
  pub fn include_entry_exports(&mut self) {
    let exports: Vec<DeclId> = self
      .registry
      .module(self.entry)
      .resolved_exports()
      .values()
      .copied()
      .collect();
    for decl in exports {
      self.include_declaration(decl);
    }
  }

  /// Repeats marking passes over every top-level statement until a pass
  /// includes nothing new. A statement is included if it has effects or is
  /// already included (its subtree may now reach further declarations).
  /// Returns the number of passes run.
  pub fn mark(&mut self) -> usize {
    let span = debug_span!("mark");
    let _guard = span.enter();
    let mut passes = 0;
    loop {
      passes += 1;
      let mut added = false;
      for module in self.order.clone() {
        for statement in self.registry.module(module).body.clone() {
          if (self.ast[statement].included || self.has_effects(statement))
            && self.include_in_bundle(statement)
          {
            added = true;
          }
        }
      }
      trace!(pass = passes, added, "mark pass");
      if !added {
        break;
      }
    }
    debug!(passes, "inclusion reached fixed point");
    passes
  }
}
