//! Programmatic construction of module graphs.
//!
//! [`GraphBuilder`] stands in for a parser: every statement added to a module
//! is printed into that module's source text and allocated in the arena with
//! exact byte ranges, so rendering and diagnostics work against real source.
//! Modules may be created up front and filled in any order, which allows
//! cyclic imports.
use crate::ast::Ast;
use crate::ast::LitValue;
use crate::ast::Loc;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::ast::VarDeclMode;
use crate::err::BundleError;
use crate::graph::Graph;
use crate::registry::DeclId;
use crate::registry::DeclKind;
use crate::registry::ExportEntry;
use crate::registry::ExternalId;
use crate::registry::ModuleId;
use crate::registry::ModuleRef;
use crate::registry::Registry;
use crate::scope::ScopeId;
use crate::scope::Scopes;

/// Expression description, lowered into the arena by [`GraphBuilder`].
#[derive(Clone, Debug)]
pub enum Expr {
  Id(String),
  Lit(LitValue),
  Member {
    object: Box<Expr>,
    property: String,
  },
  Computed {
    object: Box<Expr>,
    key: Box<Expr>,
  },
  Call {
    callee: Box<Expr>,
    arguments: Vec<Expr>,
  },
  Assign {
    target: Box<Expr>,
    value: Box<Expr>,
  },
}

pub fn ident(name: &str) -> Expr {
  Expr::Id(name.to_string())
}

pub fn str_lit(value: &str) -> Expr {
  Expr::Lit(LitValue::Str(value.to_string()))
}

pub fn num(value: f64) -> Expr {
  Expr::Lit(LitValue::Num(value))
}

pub fn null() -> Expr {
  Expr::Lit(LitValue::Null)
}

impl Expr {
  /// `self.property`
  pub fn dot(self, property: &str) -> Expr {
    Expr::Member {
      object: Box::new(self),
      property: property.to_string(),
    }
  }

  /// `self[key]`
  pub fn index(self, key: Expr) -> Expr {
    Expr::Computed {
      object: Box::new(self),
      key: Box::new(key),
    }
  }

  pub fn call(self, arguments: Vec<Expr>) -> Expr {
    Expr::Call {
      callee: Box::new(self),
      arguments,
    }
  }

  pub fn assign(self, value: Expr) -> Expr {
    Expr::Assign {
      target: Box::new(self),
      value: Box::new(value),
    }
  }
}

fn lit_source(value: &LitValue) -> String {
  match value {
    LitValue::Str(v) => serde_json::Value::String(v.clone()).to_string(),
    LitValue::Num(v) if v.is_nan() => "NaN".to_string(),
    LitValue::Num(v) if v.is_infinite() => {
      if v.is_sign_positive() {
        "Infinity".to_string()
      } else {
        "-Infinity".to_string()
      }
    }
    LitValue::Num(v) => v.to_string(),
    LitValue::Bool(v) => v.to_string(),
    LitValue::Null => "null".to_string(),
  }
}

#[derive(Debug, Default)]
pub struct GraphBuilder {
  ast: Ast,
  scopes: Scopes,
  registry: Registry,
  module_scopes: Vec<ScopeId>,
  // (module, local, exported), resolved once every declaration exists.
  local_exports: Vec<(ModuleId, String, String)>,
}

impl GraphBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn module(&mut self, id: &str) -> ModuleId {
    let module = self.registry.add_module(id);
    let scope = self.scopes.create(None, module);
    self.module_scopes.push(scope);
    module
  }

  pub fn external(&mut self, id: &str) -> ExternalId {
    self.registry.add_external(id)
  }

  fn scope(&self, module: ModuleId) -> ScopeId {
    self.module_scopes[module.file().0 as usize]
  }

  fn offset(&self, module: ModuleId) -> usize {
    self.registry.module(module).source.len()
  }

  fn write(&mut self, module: ModuleId, text: &str) {
    self.registry.module_mut(module).source.push_str(text);
  }

  fn alloc(&mut self, module: ModuleId, start: usize, kind: NodeKind) -> NodeId {
    let loc = Loc(start, self.offset(module));
    let scope = self.scope(module);
    self.ast.alloc(loc, module, scope, kind)
  }

  fn quoted(&self, source: ModuleRef) -> String {
    serde_json::Value::String(self.registry.module_label(source).to_string()).to_string()
  }

  fn lower(&mut self, module: ModuleId, expr: Expr) -> NodeId {
    let start = self.offset(module);
    let kind = match expr {
      Expr::Id(name) => {
        self.write(module, &name);
        NodeKind::Id { name }
      }
      Expr::Lit(value) => {
        self.write(module, &lit_source(&value));
        NodeKind::Lit(value)
      }
      Expr::Member { object, property } => {
        let object = self.lower_operand(module, *object);
        self.write(module, ".");
        let property_start = self.offset(module);
        self.write(module, &property);
        NodeKind::Member {
          object,
          property_loc: Loc(property_start, property_start + property.len()),
          property,
        }
      }
      Expr::Computed { object, key } => {
        let object = self.lower_operand(module, *object);
        self.write(module, "[");
        let member = self.lower(module, *key);
        self.write(module, "]");
        NodeKind::ComputedMember { object, member }
      }
      Expr::Call { callee, arguments } => {
        let callee = self.lower_operand(module, *callee);
        self.write(module, "(");
        let mut lowered = Vec::with_capacity(arguments.len());
        for (i, argument) in arguments.into_iter().enumerate() {
          if i > 0 {
            self.write(module, ", ");
          }
          lowered.push(self.lower(module, argument));
        }
        self.write(module, ")");
        NodeKind::Call {
          callee,
          arguments: lowered,
        }
      }
      Expr::Assign { target, value } => {
        let target = self.lower(module, *target);
        self.write(module, " = ");
        let value = self.lower(module, *value);
        NodeKind::Assign { target, value }
      }
    };
    self.alloc(module, start, kind)
  }

  // Objects and callees bind tighter than assignment.
  fn lower_operand(&mut self, module: ModuleId, expr: Expr) -> NodeId {
    if let Expr::Assign { .. } = expr {
      self.write(module, "(");
      let node = self.lower(module, expr);
      self.write(module, ")");
      return node;
    }
    self.lower(module, expr)
  }

  fn finish_statement(&mut self, module: ModuleId, start: usize, kind: NodeKind) -> NodeId {
    self.write(module, ";");
    let statement = self.alloc(module, start, kind);
    self.registry.module_mut(module).body.push(statement);
    self.write(module, "\n");
    statement
  }

  fn text_statement(&mut self, module: ModuleId, text: &str, kind: NodeKind) -> NodeId {
    let start = self.offset(module);
    self.write(module, text);
    self.finish_statement(module, start, kind)
  }

  /// Adds `expr;` to `module` and returns the expression's node.
  pub fn expr_stmt(&mut self, module: ModuleId, expr: Expr) -> Result<NodeId, BundleError> {
    let start = self.offset(module);
    let expr = self.lower(module, expr);
    self.finish_statement(module, start, NodeKind::ExprStmt { expr });
    Ok(expr)
  }

  pub fn declare(
    &mut self,
    module: ModuleId,
    mode: VarDeclMode,
    name: &str,
    init: Option<Expr>,
    exported: bool,
  ) -> Result<DeclId, BundleError> {
    let start = self.offset(module);
    let export_keyword = if exported {
      self.write(module, "export ");
      Some(Loc(start, self.offset(module)))
    } else {
      None
    };
    self.write(module, mode.keyword());
    self.write(module, " ");
    let name_node = self.lower(module, ident(name));
    let init = init.map(|init| {
      self.write(module, " = ");
      self.lower(module, init)
    });
    let statement = self.finish_statement(module, start, NodeKind::VarDecl {
      mode,
      export_keyword,
      name: name_node,
      init,
    });
    let decl = self
      .registry
      .add_declaration(name, Some(module.into()), DeclKind::Local { statement });
    let scope = self.scope(module);
    self.scopes.declare(&self.registry, scope, name, decl)?;
    if exported {
      self
        .registry
        .add_export(module, name, ExportEntry::Local(decl))?;
    }
    Ok(decl)
  }

  pub fn declare_const(
    &mut self,
    module: ModuleId,
    name: &str,
    init: Expr,
  ) -> Result<DeclId, BundleError> {
    self.declare(module, VarDeclMode::Const, name, Some(init), false)
  }

  pub fn declare_let(
    &mut self,
    module: ModuleId,
    name: &str,
    init: Option<Expr>,
  ) -> Result<DeclId, BundleError> {
    self.declare(module, VarDeclMode::Let, name, init, false)
  }

  /// `export const name = init;`
  pub fn export_const(
    &mut self,
    module: ModuleId,
    name: &str,
    init: Expr,
  ) -> Result<DeclId, BundleError> {
    self.declare(module, VarDeclMode::Const, name, Some(init), true)
  }

  /// `export { local as exported };`. `local` may be declared later.
  pub fn export_local(&mut self, module: ModuleId, local: &str, exported: &str) {
    let text = if local == exported {
      format!("export {{ {local} }}")
    } else {
      format!("export {{ {local} as {exported} }}")
    };
    self.text_statement(module, &text, NodeKind::ExportList);
    self
      .local_exports
      .push((module, local.to_string(), exported.to_string()));
  }

  fn import(
    &mut self,
    module: ModuleId,
    source: ModuleRef,
    imported: &str,
    local: &str,
  ) -> Result<DeclId, BundleError> {
    let from = self.quoted(source);
    let text = match imported {
      "*" => format!("import * as {local} from {from}"),
      "default" => format!("import {local} from {from}"),
      _ if imported == local => format!("import {{ {local} }} from {from}"),
      _ => format!("import {{ {imported} as {local} }} from {from}"),
    };
    self.text_statement(module, &text, NodeKind::Import { source });
    let decl = self.registry.add_declaration(local, Some(module.into()), DeclKind::Imported {
      source,
      imported: imported.to_string(),
      target: None,
    });
    let scope = self.scope(module);
    self.scopes.declare(&self.registry, scope, local, decl)?;
    if let ModuleRef::External(ext) = source {
      if imported == "*" || imported == "default" {
        self.registry.suggest_name(ext, local);
      }
    }
    Ok(decl)
  }

  /// `import { imported as local } from source;`
  pub fn import_named(
    &mut self,
    module: ModuleId,
    source: impl Into<ModuleRef>,
    imported: &str,
    local: &str,
  ) -> Result<DeclId, BundleError> {
    self.import(module, source.into(), imported, local)
  }

  pub fn import_default(
    &mut self,
    module: ModuleId,
    source: impl Into<ModuleRef>,
    local: &str,
  ) -> Result<DeclId, BundleError> {
    self.import(module, source.into(), "default", local)
  }

  /// `import * as local from source;`
  pub fn import_namespace(
    &mut self,
    module: ModuleId,
    source: impl Into<ModuleRef>,
    local: &str,
  ) -> Result<DeclId, BundleError> {
    self.import(module, source.into(), "*", local)
  }

  /// `export { imported as exported } from source;`
  pub fn export_from(
    &mut self,
    module: ModuleId,
    source: impl Into<ModuleRef>,
    imported: &str,
    exported: &str,
  ) -> Result<(), BundleError> {
    let source = source.into();
    let from = self.quoted(source);
    let text = if imported == exported {
      format!("export {{ {imported} }} from {from}")
    } else {
      format!("export {{ {imported} as {exported} }} from {from}")
    };
    self.text_statement(module, &text, NodeKind::ExportFrom { source });
    self.registry.add_export(module, exported, ExportEntry::ReExport {
      source,
      imported: imported.to_string(),
    })
  }

  /// `export * as exported from source;`
  pub fn export_namespace_from(
    &mut self,
    module: ModuleId,
    source: impl Into<ModuleRef>,
    exported: &str,
  ) -> Result<(), BundleError> {
    let source = source.into();
    let from = self.quoted(source);
    let text = format!("export * as {exported} from {from}");
    self.text_statement(module, &text, NodeKind::ExportFrom { source });
    self.registry.add_export(module, exported, ExportEntry::ReExport {
      source,
      imported: "*".to_string(),
    })
  }

  /// `export * from source;`
  pub fn export_all_from(&mut self, module: ModuleId, source: impl Into<ModuleRef>) {
    let source = source.into();
    let text = format!("export * from {}", self.quoted(source));
    self.text_statement(module, &text, NodeKind::ExportFrom { source });
    self.registry.add_export_all(module, source);
  }

  pub fn build(mut self, entry: ModuleId) -> Result<Graph, BundleError> {
    for (module, local, exported) in std::mem::take(&mut self.local_exports) {
      let Some(decl) = self.scopes.scope(self.scope(module)).get(&local) else {
        return Err(BundleError::UndeclaredExport {
          module: self.registry.module(module).id.clone(),
          name: local,
        });
      };
      self
        .registry
        .add_export(module, &exported, ExportEntry::Local(decl))?;
    }
    Ok(Graph {
      ast: self.ast,
      scopes: self.scopes,
      registry: self.registry,
      entry,
      order: Vec::new(),
      warnings: Vec::new(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prints_source_with_exact_locations() {
    let mut g = GraphBuilder::new();
    let b = g.module("b.js");
    let fs = g.external("node:fs");
    let main = g.module("main.js");
    g.import_namespace(main, b, "ns").unwrap();
    g.import_default(main, fs, "files").unwrap();
    let access = g
      .expr_stmt(main, ident("use").call(vec![ident("ns").dot("x"), str_lit("a\"b")]))
      .unwrap();
    g.export_const(main, "n", num(1.5)).unwrap();
    g.export_local(main, "n", "default");
    let graph = g.build(main).unwrap();

    let source = &graph.registry().module(main).source;
    assert_eq!(
      source,
      "import * as ns from \"b.js\";\nimport files from \"node:fs\";\nuse(ns.x, \"a\\\"b\");\nexport const n = 1.5;\nexport { n as default };\n"
    );
    let NodeKind::Call { arguments, .. } = &graph.ast()[access].kind else {
      panic!("expected call");
    };
    let member = &graph.ast()[arguments[0]];
    assert_eq!(&source[member.loc.0..member.loc.1], "ns.x");
    let NodeKind::Member { property_loc, .. } = &member.kind else {
      panic!("expected member");
    };
    assert_eq!(&source[property_loc.0..property_loc.1], "x");
    assert_eq!(graph.registry().external(fs).name(), "files");
    assert_eq!(graph.registry().module(main).body.len(), 5);
  }

  #[test]
  fn parenthesizes_assignment_operands() {
    let mut g = GraphBuilder::new();
    let main = g.module("main.js");
    g.expr_stmt(main, ident("a").assign(ident("b")).dot("c"))
      .unwrap();
    let graph = g.build(main).unwrap();
    assert_eq!(graph.registry().module(main).source, "(a = b).c;\n");
  }

  #[test]
  fn local_exports_must_be_declared() {
    let mut g = GraphBuilder::new();
    let main = g.module("main.js");
    g.export_local(main, "later", "later");
    g.declare_const(main, "later", null()).unwrap();
    assert!(g.build(main).is_ok());

    let mut g = GraphBuilder::new();
    let main = g.module("main.js");
    g.export_local(main, "missing", "x");
    assert_eq!(
      g.build(main).unwrap_err(),
      BundleError::UndeclaredExport {
        module: "main.js".into(),
        name: "missing".into(),
      }
    );
  }

  #[test]
  fn literal_printing() {
    assert_eq!(lit_source(&LitValue::Num(1.0)), "1");
    assert_eq!(lit_source(&LitValue::Num(-0.25)), "-0.25");
    assert_eq!(lit_source(&LitValue::Num(f64::INFINITY)), "Infinity");
    assert_eq!(lit_source(&LitValue::Bool(false)), "false");
    assert_eq!(lit_source(&LitValue::Str("it's".into())), "\"it's\"");
  }
}
