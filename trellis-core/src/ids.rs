//! Deterministic Ids
//!
//! Node and unit ids are derived from source positions only, so that the
//! same source text yields the same ids on every run, in every session, and
//! in both execution modes.
//!
//! - Node ids read `atom_{line:05}_{col:03}_{kind}`. The zero padding makes
//!   string order match source order.
//! - Unit ids read `{kind}-{hash8}` where `hash8` is a blake3 digest prefix
//!   over the file name, the anchoring top-level statement, the call site
//!   and an occurrence counter. The counter separates units emitted by the
//!   same call site more than once, e.g. inside a loop.

use crate::graph::NodeId;
use crate::render::UnitId;
use crate::script::Span;

/// Id of the graph node wrapping the top-level statement at `span`.
pub fn node_id(kind: &str, span: Span) -> NodeId {
    NodeId::new(format!("atom_{:05}_{:03}_{}", span.line, span.col, kind))
}

/// Where a unit was emitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Callsite<'a> {
    pub filename: &'a str,
    /// The top-level statement being executed.
    pub anchor: Span,
    /// The component call itself.
    pub call: Span,
    /// How many times this call site already emitted under this anchor.
    pub occurrence: u32,
}

/// Id of a unit of `kind` emitted at `site`.
pub fn unit_id(kind: &str, site: &Callsite<'_>) -> UnitId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.as_bytes());
    hasher.update(&[0]);
    hasher.update(site.filename.as_bytes());
    hasher.update(&[0]);
    for n in [
        site.anchor.line,
        site.anchor.col,
        site.call.line,
        site.call.col,
        site.occurrence,
    ] {
        hasher.update(&n.to_le_bytes());
    }
    let hex = hasher.finalize().to_hex();
    UnitId::new(format!("{}-{}", kind, &hex.as_str()[..8]))
}
