//! Arena-allocated syntax tree for the subset of module syntax the engine
//! reasons about.
//!
//! Nodes are addressed by [`NodeId`] and never move once allocated. Child
//! links (`object`, `callee`, ...) are ids into the same arena, so analyses can
//! revisit shared subtrees without borrowing the tree exclusively. Per-node
//! analysis state (bound, included, resolution) lives next to the syntax but is
//! only written by the engine.
use crate::registry::DeclId;
use crate::registry::ModuleId;
use crate::registry::ModuleRef;
use crate::scope::ScopeId;
use diagnostics::TextRange;
use once_cell::unsync::OnceCell;
use serde::Serialize;
use std::hash::Hash;
use std::hash::Hasher;
use std::ops::Index;
use std::ops::IndexMut;

/// Half-open byte range `[start, end)` into a module's source text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize)]
pub struct Loc(pub usize, pub usize);

impl Loc {
  pub fn len(&self) -> usize {
    self.1.saturating_sub(self.0)
  }

  pub fn is_empty(&self) -> bool {
    self.0 >= self.1
  }

  pub fn to_range(self) -> TextRange {
    TextRange::from_offsets(self.0, self.1)
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId(u32);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VarDeclMode {
  Const,
  Let,
  Var,
}

impl VarDeclMode {
  pub fn keyword(self) -> &'static str {
    match self {
      VarDeclMode::Const => "const",
      VarDeclMode::Let => "let",
      VarDeclMode::Var => "var",
    }
  }
}

#[derive(Clone, Debug)]
pub enum LitValue {
  Str(String),
  Num(f64),
  Bool(bool),
  Null,
}

impl PartialEq for LitValue {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (LitValue::Str(a), LitValue::Str(b)) => a == b,
      (LitValue::Num(a), LitValue::Num(b)) => a.to_bits() == b.to_bits(),
      (LitValue::Bool(a), LitValue::Bool(b)) => a == b,
      (LitValue::Null, LitValue::Null) => true,
      _ => false,
    }
  }
}

impl Eq for LitValue {}

impl Hash for LitValue {
  fn hash<H: Hasher>(&self, state: &mut H) {
    std::mem::discriminant(self).hash(state);
    match self {
      LitValue::Str(v) => v.hash(state),
      LitValue::Num(v) => v.to_bits().hash(state),
      LitValue::Bool(v) => v.hash(state),
      LitValue::Null => {}
    }
  }
}

/// What a member access or identifier was bound to. Set at most once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
  /// The access statically denotes this declaration.
  Declaration(DeclId),
  /// The access is replaced by a literal token (e.g. a missing namespace
  /// export becomes `undefined`).
  Replacement(&'static str),
  /// Not statically resolvable; children were bound individually.
  Fallback,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
  // Statements.
  ExprStmt {
    expr: NodeId,
  },
  VarDecl {
    mode: VarDeclMode,
    /// Range of the leading `export ` keyword, if any.
    export_keyword: Option<Loc>,
    name: NodeId,
    init: Option<NodeId>,
  },
  Import {
    source: ModuleRef,
  },
  ExportList,
  ExportFrom {
    source: ModuleRef,
  },

  // Expressions.
  Id {
    name: String,
  },
  Lit(LitValue),
  Member {
    object: NodeId,
    property: String,
    property_loc: Loc,
  },
  ComputedMember {
    object: NodeId,
    member: NodeId,
  },
  Call {
    callee: NodeId,
    arguments: Vec<NodeId>,
  },
  Assign {
    target: NodeId,
    value: NodeId,
  },
}

impl NodeKind {
  /// Child nodes in source order.
  pub fn children(&self) -> Vec<NodeId> {
    match self {
      NodeKind::ExprStmt { expr } => vec![*expr],
      NodeKind::VarDecl { name, init, .. } => std::iter::once(*name).chain(*init).collect(),
      NodeKind::Import { .. }
      | NodeKind::ExportList
      | NodeKind::ExportFrom { .. }
      | NodeKind::Id { .. }
      | NodeKind::Lit(_) => Vec::new(),
      NodeKind::Member { object, .. } => vec![*object],
      NodeKind::ComputedMember { object, member } => vec![*object, *member],
      NodeKind::Call { callee, arguments } => {
        std::iter::once(*callee).chain(arguments.iter().copied()).collect()
      }
      NodeKind::Assign { target, value } => vec![*target, *value],
    }
  }

  pub fn is_member_access(&self) -> bool {
    matches!(self, NodeKind::Member { .. } | NodeKind::ComputedMember { .. })
  }

  /// Statements that only carry module linkage and never survive bundling.
  pub fn is_module_syntax(&self) -> bool {
    matches!(
      self,
      NodeKind::Import { .. } | NodeKind::ExportList | NodeKind::ExportFrom { .. }
    )
  }
}

#[derive(Debug)]
pub struct Node {
  pub loc: Loc,
  pub module: ModuleId,
  pub scope: ScopeId,
  pub kind: NodeKind,
  pub(crate) bound: bool,
  pub(crate) included: bool,
  pub(crate) resolution: OnceCell<Resolution>,
}

impl Node {
  pub fn is_included(&self) -> bool {
    self.included
  }

  pub fn resolution(&self) -> Option<Resolution> {
    self.resolution.get().copied()
  }

  /// The declaration this node statically refers to, if bound to one.
  pub fn declaration(&self) -> Option<DeclId> {
    match self.resolution() {
      Some(Resolution::Declaration(decl)) => Some(decl),
      _ => None,
    }
  }
}

#[derive(Debug, Default)]
pub struct Ast {
  nodes: Vec<Node>,
}

impl Ast {
  pub fn alloc(&mut self, loc: Loc, module: ModuleId, scope: ScopeId, kind: NodeKind) -> NodeId {
    let id = NodeId(self.nodes.len() as u32);
    self.nodes.push(Node {
      loc,
      module,
      scope,
      kind,
      bound: false,
      included: false,
      resolution: OnceCell::new(),
    });
    id
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
    self
      .nodes
      .iter()
      .enumerate()
      .map(|(idx, node)| (NodeId(idx as u32), node))
  }
}

impl Index<NodeId> for Ast {
  type Output = Node;

  fn index(&self, id: NodeId) -> &Node {
    &self.nodes[id.0 as usize]
  }
}

impl IndexMut<NodeId> for Ast {
  fn index_mut(&mut self, id: NodeId) -> &mut Node {
    &mut self.nodes[id.0 as usize]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ahash::HashSet;

  #[test]
  fn lit_values_hash_by_content() {
    let mut set = HashSet::default();
    set.insert(LitValue::Num(1.0));
    set.insert(LitValue::Num(1.0));
    set.insert(LitValue::Str("1".into()));
    set.insert(LitValue::Null);
    set.insert(LitValue::Null);
    assert_eq!(set.len(), 3);
    assert_ne!(LitValue::Bool(true), LitValue::Bool(false));
  }

  #[test]
  fn children_follow_source_order() {
    let call = NodeKind::Call {
      callee: NodeId(0),
      arguments: vec![NodeId(1), NodeId(2)],
    };
    assert_eq!(call.children(), vec![NodeId(0), NodeId(1), NodeId(2)]);

    let decl = NodeKind::VarDecl {
      mode: VarDeclMode::Const,
      export_keyword: None,
      name: NodeId(4),
      init: None,
    };
    assert_eq!(decl.children(), vec![NodeId(4)]);
    assert!(NodeKind::ExportList.is_module_syntax());
    assert!(!NodeKind::ExportList.is_member_access());
  }

  #[test]
  fn loc_converts_to_text_range() {
    let loc = Loc(3, 9);
    assert_eq!(loc.len(), 6);
    assert_eq!(loc.to_range(), TextRange::new(3, 9));
    assert!(Loc(4, 4).is_empty());
  }
}
