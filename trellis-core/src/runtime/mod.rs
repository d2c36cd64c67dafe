//! Session Runtime
//!
//! Everything that runs a script for a client:
//!
//! - `runner`: the run orchestrator and its state machine
//! - `session`: per-session ids and owned state
//! - `view`: the on-screen units grouped by producing node
//! - `outbound`: messages for observers and the transport seam
//! - `handle`: the tokio actor that serializes work on a session
//! - `registry`: the concurrent session map

mod handle;
mod outbound;
mod registry;
mod runner;
mod session;
mod view;

pub use handle::SessionHandle;
pub use outbound::{ErrorKind, ErrorPayload, Outbound, Outbox, OutboxTransport, Transport};
pub use registry::SessionRegistry;
pub use runner::{interpret, ExecutionMode, ObserverId, RerunOutcome, RunState, ScriptRunner};
pub use session::{SessionContext, SessionId};
pub use view::{ViewState, SCRIPT_SEGMENT};
