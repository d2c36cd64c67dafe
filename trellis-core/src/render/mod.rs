//! Rendering
//!
//! Everything between a node emitting output and that output crossing the
//! display boundary:
//!
//! - `unit`: output units and their stable ids
//! - `diff`: the render diff buffer that drops unobservable updates
//! - `layout`: the row packer

mod diff;
mod layout;
mod unit;

pub use diff::RenderBuffer;
pub use layout::{LayoutPacker, PlacedUnit, Row};
pub use unit::{InputTable, OutputUnit, UnitId, ROW_BREAK_KIND};
