use crate::ast::Loc;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::ast::Resolution;
use crate::edit::Edit;
use crate::edit::EditBuffer;
use crate::edit::OverwriteOptions;
use crate::edit::StoredName;
use crate::err::BundleError;
use crate::graph::Graph;
use crate::keypath::is_valid_prop;
use crate::options::BundleOptions;
use crate::options::OutputFormat;
use crate::registry::ModuleId;
use itertools::Itertools;
use serde::Serialize;
use tracing::debug_span;
use tracing::trace;

/// A module's code after tree-shaking and renaming, with the edits applied to
/// its source and the names they changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedModule {
  pub id: String,
  pub code: String,
  pub edits: Vec<Edit>,
  pub names: Vec<StoredName>,
}

impl Graph {
  pub fn render_module(
    &self,
    module: ModuleId,
    options: &BundleOptions,
  ) -> Result<RenderedModule, BundleError> {
    let data = self.registry.module(module);
    let span = debug_span!("render", module = %data.id);
    let _guard = span.enter();
    let mut buffer = EditBuffer::new(&data.source);
    for &statement in &data.body {
      let node = &self.ast[statement];
      if !node.included || node.kind.is_module_syntax() {
        remove_statement(&mut buffer, node.loc)?;
        continue;
      }
      if let NodeKind::VarDecl {
        export_keyword: Some(keyword),
        ..
      } = &node.kind
      {
        buffer.remove(keyword.0, keyword.1)?;
      }
      self.render_node(statement, &mut buffer, options.format)?;
    }
    if self.registry.declaration(data.namespace).is_included() {
      buffer.append(&self.namespace_object(module, options));
    }
    let rendered = buffer.finish();
    Ok(RenderedModule {
      id: data.id.clone(),
      code: rendered.code,
      edits: rendered.edits,
      names: rendered.names,
    })
  }

  /// Emits the rename (or literal replacement) for `node`, then renders its
  /// children. Nodes whose output text already matches produce no edit.
  pub fn render_node(
    &self,
    node: NodeId,
    buffer: &mut EditBuffer,
    format: OutputFormat,
  ) -> Result<(), BundleError> {
    let n = &self.ast[node];
    let replacement = match n.resolution() {
      Some(Resolution::Declaration(decl)) => Some(self.registry.get_name(decl, format)),
      Some(Resolution::Replacement(token)) => Some(token.to_string()),
      Some(Resolution::Fallback) | None => None,
    };
    if let Some(text) = replacement {
      if buffer.slice(n.loc) != Some(text.as_str()) {
        trace!(from = ?buffer.slice(n.loc), to = %text, "rename");
        buffer.overwrite(n.loc.0, n.loc.1, &text, OverwriteOptions::rename())?;
      }
      // The replacement covers the whole chain.
      return Ok(());
    }
    for child in n.kind.children() {
      self.render_node(child, buffer, format)?;
    }
    Ok(())
  }

  fn namespace_object(&self, module: ModuleId, options: &BundleOptions) -> String {
    let data = self.registry.module(module);
    let members = data
      .resolved_exports()
      .iter()
      .map(|(name, decl)| {
        let key = if is_valid_prop(name) {
          name.clone()
        } else {
          serde_json::Value::String(name.clone()).to_string()
        };
        format!("  {}: {}", key, self.registry.get_name(*decl, options.format))
      })
      .join(",\n");
    let object = if members.is_empty() {
      "{}".to_string()
    } else {
      format!("{{\n{members}\n}}")
    };
    let init = if options.freeze_namespaces {
      format!("Object.freeze({object})")
    } else {
      object
    };
    format!(
      "\nconst {} = {};\n",
      self.registry.get_name(data.namespace, options.format),
      init
    )
  }
}

/// Removes a statement along with the line break that follows it.
fn remove_statement(buffer: &mut EditBuffer, loc: Loc) -> Result<(), BundleError> {
  let end = if buffer.source()[loc.1..].starts_with('\n') {
    loc.1 + 1
  } else {
    loc.1
  };
  buffer.remove(loc.0, end)
}
