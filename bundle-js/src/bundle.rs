use crate::err::BundleError;
use crate::graph::Graph;
use crate::options::BundleOptions;
use crate::options::OutputFormat;
use crate::registry::DeclId;
use crate::registry::ExternalId;
use crate::render::RenderedModule;
use diagnostics::Diagnostic;
use itertools::Itertools;
use serde::Serialize;
use tracing::debug_span;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BundleOutput {
  pub code: String,
  pub modules: Vec<RenderedModule>,
  pub warnings: Vec<Diagnostic>,
}

/// Links, analyses, tree-shakes and renders `graph` into a single module.
///
/// Modules are emitted in execution order (dependencies first). Statements
/// that were not included, and all import and re-export statements, are
/// dropped. Bindings from external modules become imports (`es`) or
/// `require` calls (`cjs`), and the entry module's exports become the
/// bundle's exports.
///
/// # Examples
///
/// ```
/// use bundle_js::build::{ident, num};
/// use bundle_js::{bundle, BundleOptions, GraphBuilder};
///
/// let mut g = GraphBuilder::new();
/// let b = g.module("b.js");
/// g.export_const(b, "x", num(1.0)).unwrap();
/// g.export_const(b, "unused", num(2.0)).unwrap();
/// let main = g.module("main.js");
/// g.import_namespace(main, b, "ns").unwrap();
/// g.expr_stmt(main, ident("use").call(vec![ident("ns").dot("x"), ident("ns").dot("y")]))
///   .unwrap();
///
/// let mut graph = g.build(main).unwrap();
/// let out = bundle(&mut graph, &BundleOptions::default()).unwrap();
/// assert_eq!(out.code, "const x = 1;\n\nuse(x, undefined);\n");
/// assert_eq!(out.warnings[0].field("missing"), Some("y"));
/// ```
pub fn bundle(graph: &mut Graph, options: &BundleOptions) -> Result<BundleOutput, BundleError> {
  let span = debug_span!("bundle", format = ?options.format);
  let _guard = span.enter();

  graph.link()?;
  graph.bind(options)?;
  graph.include_entry_exports();
  graph.mark();
  graph.deconflict(options);

  let modules = graph
    .order
    .iter()
    .map(|module| graph.render_module(*module, options))
    .collect::<Result<Vec<_>, _>>()?;

  let mut sections = Vec::new();
  let header = render_header(graph, options.format);
  if !header.is_empty() {
    sections.push(header);
  }
  sections.extend(
    modules
      .iter()
      .map(|module| module.code.trim().to_string())
      .filter(|code| !code.is_empty()),
  );
  let footer = render_footer(graph, options.format);
  if !footer.is_empty() {
    sections.push(footer);
  }
  let mut code = sections.join("\n\n");
  code.push('\n');

  info!(
    modules = modules.len(),
    warnings = graph.warnings.len(),
    "bundle complete"
  );
  Ok(BundleOutput {
    code,
    modules,
    warnings: graph.warnings.clone(),
  })
}

fn used_externals(graph: &Graph) -> Vec<ExternalId> {
  graph
    .registry
    .externals()
    .filter(|(_, ext)| ext.is_used())
    .map(|(id, _)| id)
    .collect()
}

fn included_binding(graph: &Graph, ext: ExternalId, name: &str) -> Option<DeclId> {
  graph
    .registry
    .external(ext)
    .declarations()
    .get(name)
    .copied()
    .filter(|decl| graph.registry.declaration(*decl).is_included())
}

fn render_header(graph: &Graph, format: OutputFormat) -> String {
  let registry = &graph.registry;
  let mut lines = Vec::new();
  if !format.is_es() {
    lines.push("'use strict';\n".to_string());
  }
  for ext in used_externals(graph) {
    let external = registry.external(ext);
    let from = serde_json::Value::String(external.id.clone()).to_string();
    let default = included_binding(graph, ext, "default");
    match format {
      OutputFormat::Es => {
        if let Some(ns) = included_binding(graph, ext, "*") {
          lines.push(format!(
            "import * as {} from {from};",
            registry.get_name(ns, format)
          ));
        }
        let named = external
          .declarations()
          .iter()
          .filter(|(name, _)| name.as_str() != "*" && name.as_str() != "default")
          .filter(|(_, decl)| registry.declaration(**decl).is_included())
          .map(|(name, decl)| {
            let local = registry.get_name(*decl, format);
            if &local == name {
              local
            } else {
              format!("{name} as {local}")
            }
          })
          .collect_vec();
        let mut clause = Vec::new();
        if let Some(default) = default {
          clause.push(registry.get_name(default, format));
        }
        if !named.is_empty() {
          clause.push(format!("{{ {} }}", named.join(", ")));
        }
        if !clause.is_empty() {
          lines.push(format!("import {} from {from};", clause.join(", ")));
        }
      }
      OutputFormat::Cjs => {
        let name = external.name();
        lines.push(format!("var {name} = require({from});"));
        if let Some(default) = default {
          let alias = registry.get_name(default, format);
          if alias != name {
            lines.push(format!(
              "var {alias} = 'default' in {name} ? {name}['default'] : {name};"
            ));
          }
        }
      }
    }
  }
  lines.join("\n").trim_end().to_string()
}

fn render_footer(graph: &Graph, format: OutputFormat) -> String {
  let registry = &graph.registry;
  let exports = registry.module(graph.entry).resolved_exports();
  match format {
    OutputFormat::Es => {
      if exports.is_empty() {
        return String::new();
      }
      let specifiers = exports
        .iter()
        .map(|(exported, decl)| {
          let local = registry.get_name(*decl, format);
          if &local == exported {
            local
          } else {
            format!("{local} as {exported}")
          }
        })
        .join(", ");
      format!("export {{ {specifiers} }};")
    }
    OutputFormat::Cjs => exports
      .iter()
      .map(|(exported, decl)| {
        format!("exports.{exported} = {};", registry.get_name(*decl, format))
      })
      .join("\n"),
  }
}
