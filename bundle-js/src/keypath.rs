use crate::ast::Ast;
use crate::ast::LitValue;
use crate::ast::Loc;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use std::collections::VecDeque;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeypathPart {
  pub name: String,
  /// Range of the property token (or bracketed key) in source.
  pub loc: Loc,
}

/// A member access chain flattened into its root expression and the
/// properties accessed on it, outermost first: `a.b['c']` has root `a` and
/// parts `[b, c]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keypath {
  pub root: NodeId,
  pub parts: VecDeque<KeypathPart>,
  /// The chain contains a dynamic key; `parts` is incomplete and must be
  /// ignored.
  pub computed: bool,
}

impl Keypath {
  pub fn extract(ast: &Ast, node: NodeId) -> Keypath {
    let mut parts = VecDeque::new();
    let mut current = node;
    loop {
      match &ast[current].kind {
        NodeKind::Member {
          object,
          property,
          property_loc,
        } => {
          parts.push_front(KeypathPart {
            name: property.clone(),
            loc: *property_loc,
          });
          current = *object;
        }
        NodeKind::ComputedMember { object, member } => {
          let key = match &ast[*member].kind {
            NodeKind::Lit(LitValue::Str(key)) if is_valid_prop(key) => key,
            _ => {
              return Keypath {
                root: current,
                parts,
                computed: true,
              }
            }
          };
          parts.push_front(KeypathPart {
            name: key.clone(),
            loc: ast[*member].loc,
          });
          current = *object;
        }
        _ => break,
      }
    }
    Keypath {
      root: current,
      parts,
      computed: false,
    }
  }

  pub fn root_name<'a>(&self, ast: &'a Ast) -> Option<&'a str> {
    match &ast[self.root].kind {
      NodeKind::Id { name } => Some(name),
      _ => None,
    }
  }
}

/// `^[a-zA-Z_$][a-zA-Z_$0-9]*$`
pub fn is_valid_prop(name: &str) -> bool {
  let mut chars = name.chars();
  let Some(first) = chars.next() else {
    return false;
  };
  (first.is_ascii_alphabetic() || first == '_' || first == '$')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::Registry;
  use crate::scope::Scopes;

  struct Fixture {
    ast: Ast,
    registry: Registry,
    scopes: Scopes,
  }

  impl Fixture {
    fn new() -> Self {
      Self {
        ast: Ast::default(),
        registry: Registry::default(),
        scopes: Scopes::default(),
      }
    }

    fn node(&mut self, loc: Loc, kind: NodeKind) -> NodeId {
      let first = self.registry.modules().next().map(|(id, _)| id);
      let module = match first {
        Some(id) => id,
        None => self.registry.add_module("main.js"),
      };
      let scope = self.scopes.create(None, module);
      self.ast.alloc(loc, module, scope, kind)
    }
  }

  #[test]
  fn collects_parts_outermost_first() {
    // ns.sub["value"]
    let mut f = Fixture::new();
    let ns = f.node(Loc(0, 2), NodeKind::Id { name: "ns".into() });
    let sub = f.node(Loc(0, 6), NodeKind::Member {
      object: ns,
      property: "sub".into(),
      property_loc: Loc(3, 6),
    });
    let key = f.node(Loc(7, 14), NodeKind::Lit(LitValue::Str("value".into())));
    let outer = f.node(Loc(0, 15), NodeKind::ComputedMember {
      object: sub,
      member: key,
    });

    let keypath = Keypath::extract(&f.ast, outer);
    assert!(!keypath.computed);
    assert_eq!(keypath.root, ns);
    assert_eq!(keypath.root_name(&f.ast), Some("ns"));
    let names: Vec<_> = keypath.parts.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["sub", "value"]);
    assert_eq!(keypath.parts[1].loc, Loc(7, 14));
  }

  #[test]
  fn dynamic_keys_mark_path_computed() {
    let mut f = Fixture::new();
    let ns = f.node(Loc(0, 2), NodeKind::Id { name: "ns".into() });
    let callee = f.node(Loc(3, 13), NodeKind::Id {
      name: "computeKey".into(),
    });
    let call = f.node(Loc(3, 15), NodeKind::Call {
      callee,
      arguments: Vec::new(),
    });
    let access = f.node(Loc(0, 16), NodeKind::ComputedMember {
      object: ns,
      member: call,
    });
    assert!(Keypath::extract(&f.ast, access).computed);

    let key = f.node(Loc(3, 8), NodeKind::Lit(LitValue::Str("a-b".into())));
    let access = f.node(Loc(0, 9), NodeKind::ComputedMember {
      object: ns,
      member: key,
    });
    assert!(Keypath::extract(&f.ast, access).computed);
  }

  #[test]
  fn non_identifier_root() {
    let mut f = Fixture::new();
    let callee = f.node(Loc(0, 1), NodeKind::Id { name: "f".into() });
    let call = f.node(Loc(0, 3), NodeKind::Call {
      callee,
      arguments: Vec::new(),
    });
    let access = f.node(Loc(0, 5), NodeKind::Member {
      object: call,
      property: "x".into(),
      property_loc: Loc(4, 5),
    });
    let keypath = Keypath::extract(&f.ast, access);
    assert_eq!(keypath.root, call);
    assert_eq!(keypath.root_name(&f.ast), None);
  }

  #[test]
  fn valid_props() {
    assert!(is_valid_prop("x"));
    assert!(is_valid_prop("_$a9"));
    assert!(!is_valid_prop(""));
    assert!(!is_valid_prop("9a"));
    assert!(!is_valid_prop("a-b"));
    assert!(!is_valid_prop("é"));
  }
}
