//! Conservative side-effect and value analysis.
//!
//! Nothing here performs alias or purity analysis. When in doubt an
//! expression has effects and its value is unknown.
use crate::ast::LitValue;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::ast::Resolution;
use crate::ast::VarDeclMode;
use crate::graph::Graph;
use crate::registry::DeclId;
use crate::registry::DeclKind;
use ahash::HashSet;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PossibleValue {
  Unknown,
  Literal(LitValue),
}

impl Graph {
  /// Whether evaluating `node` may be observable.
  pub fn has_effects(&self, node: NodeId) -> bool {
    let n = &self.ast[node];
    match &n.kind {
      NodeKind::Import { .. } | NodeKind::ExportList | NodeKind::ExportFrom { .. } => false,
      NodeKind::Id { .. } | NodeKind::Lit(_) => false,
      NodeKind::Call { .. } => true,
      NodeKind::Assign { target, value } => {
        self.has_effects(*value) || self.has_effects_when_assigned(*target)
      }
      NodeKind::Member { .. } | NodeKind::ComputedMember { .. } => match n.resolution() {
        // Statically resolved reads are plain binding references.
        Some(Resolution::Declaration(_) | Resolution::Replacement(_)) => false,
        _ => n.kind.children().into_iter().any(|c| self.has_effects(c)),
      },
      NodeKind::ExprStmt { .. } | NodeKind::VarDecl { .. } => {
        n.kind.children().into_iter().any(|c| self.has_effects(c))
      }
    }
  }

  /// Whether assigning to `node` (as the target of `=`) may be observable.
  pub fn has_effects_when_assigned(&self, node: NodeId) -> bool {
    let n = &self.ast[node];
    match &n.kind {
      // A property write may hit a setter or mutate shared state.
      NodeKind::Member { object, .. } | NodeKind::ComputedMember { object, .. } => {
        self.has_effects_when_mutated(*object)
      }
      NodeKind::Id { .. } => match n.declaration() {
        Some(decl) => {
          let decl = self.registry.declaration(decl);
          !matches!(decl.kind, DeclKind::Local { .. }) || decl.is_included()
        }
        None => true,
      },
      _ => true,
    }
  }

  /// Whether mutating the value `node` evaluates to is observable. Without
  /// alias analysis any object may be shared, so this always holds.
  pub fn has_effects_when_mutated(&self, _node: NodeId) -> bool {
    true
  }

  /// Adds every value `node` may evaluate to into `values`.
  pub fn gather_possible_values(&self, node: NodeId, values: &mut HashSet<PossibleValue>) {
    let mut visiting = HashSet::default();
    self.gather_values_inner(node, values, &mut visiting);
  }

  fn gather_values_inner(
    &self,
    node: NodeId,
    values: &mut HashSet<PossibleValue>,
    visiting: &mut HashSet<DeclId>,
  ) {
    let n = &self.ast[node];
    match &n.kind {
      NodeKind::Lit(value) => {
        values.insert(PossibleValue::Literal(value.clone()));
      }
      NodeKind::Assign { value, .. } => self.gather_values_inner(*value, values, visiting),
      NodeKind::Id { .. } => match n.declaration() {
        Some(decl) => self.gather_declaration_values(decl, values, visiting),
        None => {
          values.insert(PossibleValue::Unknown);
        }
      },
      // Member results, call results and anything else are not tracked.
      _ => {
        values.insert(PossibleValue::Unknown);
      }
    }
  }

  fn gather_declaration_values(
    &self,
    decl: DeclId,
    values: &mut HashSet<PossibleValue>,
    visiting: &mut HashSet<DeclId>,
  ) {
    let init = match self.registry.declaration(decl).kind {
      DeclKind::Local { statement } => match self.ast[statement].kind {
        NodeKind::VarDecl {
          mode: VarDeclMode::Const,
          init,
          ..
        } => init,
        _ => None,
      },
      _ => None,
    };
    match init {
      Some(init) if visiting.insert(decl) => {
        self.gather_values_inner(init, values, visiting);
        visiting.remove(&decl);
      }
      _ => {
        values.insert(PossibleValue::Unknown);
      }
    }
  }
}
