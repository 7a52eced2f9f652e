//! Static resolution and tree-shaking core of a JavaScript module bundler.
//!
//! A [`Graph`] of modules is linked, bound, marked and rendered by
//! [`bundle`]. Member chains through namespace re-exports are resolved to the
//! declaration they denote, only declarations reachable from the entry
//! module's exports or from statements with effects are kept, and the result
//! is emitted as a list of source edits per module.
pub use build::GraphBuilder;
pub use bundle::bundle;
pub use bundle::BundleOutput;
pub use err::BundleError;
pub use graph::Graph;
pub use options::BundleOptions;
pub use options::OutputFormat;

pub mod ast;
pub mod build;
pub mod bundle;
pub mod edit;
pub mod effects;
mod err;
pub mod graph;
pub mod include;
pub mod keypath;
pub mod naming;
pub mod options;
pub mod registry;
pub mod render;
pub mod resolve;
pub mod scope;
