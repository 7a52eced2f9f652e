use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;

use bundle_js::build::{ident, num};
use bundle_js::{bundle, BundleOptions, GraphBuilder};

#[derive(Clone, Default)]
struct SharedWriter {
  buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
  fn into_inner(self) -> Vec<u8> {
    match Arc::try_unwrap(self.buffer) {
      Ok(buffer) => buffer.into_inner().unwrap(),
      Err(arc) => arc.lock().unwrap().clone(),
    }
  }
}

struct SharedWriterGuard<'a> {
  buffer: &'a Arc<Mutex<Vec<u8>>>,
}

impl<'a> io::Write for SharedWriterGuard<'a> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.buffer.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl<'a> MakeWriter<'a> for SharedWriter {
  type Writer = SharedWriterGuard<'a>;

  fn make_writer(&'a self) -> Self::Writer {
    SharedWriterGuard {
      buffer: &self.buffer,
    }
  }
}

#[test]
fn bundling_emits_phase_spans_and_missing_export_warning() {
  let writer = SharedWriter::default();
  let subscriber = tracing_subscriber::fmt()
    .with_span_events(FmtSpan::CLOSE)
    .with_max_level(tracing::Level::DEBUG)
    .with_ansi(false)
    .with_writer(writer.clone())
    .finish();
  let _guard = tracing::subscriber::set_default(subscriber);

  let mut g = GraphBuilder::new();
  let b = g.module("b.js");
  g.export_const(b, "x", num(1.0)).unwrap();
  let main = g.module("main.js");
  g.import_namespace(main, b, "ns").unwrap();
  g.expr_stmt(main, ident("use").call(vec![ident("ns").dot("y")]))
    .unwrap();
  let mut graph = g.build(main).unwrap();
  let out = bundle(&mut graph, &BundleOptions::default()).unwrap();
  assert_eq!(out.warnings.len(), 1);

  drop(_guard);
  let output = String::from_utf8(writer.into_inner()).unwrap();
  assert!(
    output.contains("bind{module=main.js}"),
    "expected bind span output, got: {output}"
  );
  assert!(output.contains("mark"), "expected mark span output, got: {output}");
  assert!(
    output.contains("inclusion reached fixed point"),
    "expected mark summary event, got: {output}"
  );
  assert!(
    output.contains("WARN") && output.contains("'y' is not exported by 'b.js'"),
    "expected MISSING_EXPORT warning event, got: {output}"
  );
}
