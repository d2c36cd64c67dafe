//! Run Orchestrator
//!
//! A [`ScriptRunner`] drives one session: the initial run of a script, the
//! incremental reruns triggered by input changes, and the run-state
//! machine.
//!
//! # States
//!
//! ```text
//! Initial --start--> Running --rerun--> Running
//!                       |--stop--> Stopped
//!                       `--script error--> Error
//! Stopped / Error --restart--> Running
//! ```
//!
//! # Execution modes
//!
//! - Incremental: the script was split into graph nodes; a rerun recomputes
//!   only the nodes reachable from the producers of the changed inputs.
//! - Full rerun: the transformer rejected the script, so every rerun
//!   reinterprets the whole script top to bottom.
//!
//! Every run ends the same way: emitted units go through the render diff
//! buffer, the view is packed into rows, and the tree is transmitted only if
//! some unit changed.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::outbound::{ErrorPayload, Outbound, Transport};
use super::session::{SessionContext, SessionId};
use super::view::SCRIPT_SEGMENT;
use crate::config::EngineConfig;
use crate::error::{RunnerError, ScriptError};
use crate::graph::{panic_message, ExecutionReport, GraphPayload, NodeId, Workflow};
use crate::render::{InputTable, LayoutPacker, OutputUnit, Row, UnitId};
use crate::script::{parse, Evaluator, FunctionTable, Host, Module, ScriptSource};
use crate::transform::{InstrumentedProgram, Transformer};
use crate::value::Value;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Initial,
    Running,
    Stopped,
    Error,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Initial => "initial",
            RunState::Running => "running",
            RunState::Stopped => "stopped",
            RunState::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Incremental,
    FullRerun,
}

/// What a rerun request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RerunOutcome {
    /// No input actually changed.
    Unchanged,
    /// A run completed too recently; nothing was applied.
    Debounced,
    /// Only the affected nodes ran.
    Incremental { affected: BTreeSet<NodeId> },
    /// The whole script ran again.
    FullRerun,
}

/// Handle for detaching an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// Host for a whole-script run.
struct ScriptHost<'s> {
    inputs: &'s InputTable,
    emitted: Vec<OutputUnit>,
    printed: Vec<String>,
}

impl Host for ScriptHost<'_> {
    fn global(&mut self, _name: &str) -> Option<Value> {
        None
    }

    fn input_state(&self, unit: &UnitId) -> Option<Value> {
        self.inputs.get(unit).cloned()
    }

    fn emit(&mut self, unit: OutputUnit) {
        self.emitted.push(unit);
    }

    fn print(&mut self, line: String) {
        self.printed.push(line);
    }
}

/// Run a parsed script top to bottom without a graph, returning the units
/// it emitted.
pub fn interpret(
    module: &Module,
    filename: &str,
    inputs: &InputTable,
    recursion_limit: usize,
) -> Result<Vec<OutputUnit>, ScriptError> {
    run_script(module, filename, inputs, recursion_limit).1
}

/// Like [`interpret`], also returning the lines printed before the run
/// ended. A panic in the evaluator becomes [`ScriptError::Panicked`].
fn run_script(
    module: &Module,
    filename: &str,
    inputs: &InputTable,
    recursion_limit: usize,
) -> (Vec<String>, Result<Vec<OutputUnit>, ScriptError>) {
    let mut host = ScriptHost {
        inputs,
        emitted: Vec::new(),
        printed: Vec::new(),
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut evaluator = Evaluator::new(Cow::Owned(FunctionTable::new()), filename, recursion_limit);
        evaluator.run_module(module, &mut host)
    }));
    let result = match outcome {
        Ok(Ok(())) => Ok(host.emitted),
        Ok(Err(err)) => Err(ScriptError::Runtime(err)),
        Err(payload) => Err(ScriptError::Panicked(panic_message(payload.as_ref()))),
    };
    (host.printed, result)
}

/// Drives script execution for one session.
pub struct ScriptRunner {
    id: SessionId,
    config: EngineConfig,
    state: RunState,
    mode: ExecutionMode,
    source: Option<ScriptSource>,
    program: Option<InstrumentedProgram>,
    module: Option<Arc<Module>>,
    workflow: Workflow,
    session: SessionContext,
    layout: Vec<Row>,
    observers: Vec<(ObserverId, Box<dyn Transport>)>,
    next_observer: u64,
    last_run: Option<Instant>,
    run_count: u64,
}

impl ScriptRunner {
    pub fn new(id: SessionId, config: EngineConfig) -> Self {
        Self {
            id,
            workflow: Workflow::with_config(&config),
            config,
            state: RunState::Initial,
            mode: ExecutionMode::Incremental,
            source: None,
            program: None,
            module: None,
            session: SessionContext::new(),
            layout: Vec::new(),
            observers: Vec::new(),
            next_observer: 0,
            last_run: None,
            run_count: 0,
        }
    }

    // ---- Observers ----

    /// Attach an observer. If a tree has already been rendered, the
    /// observer receives it right away.
    pub fn attach(&mut self, transport: impl Transport + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;

        if self.run_count > 0 {
            let changed = self
                .layout
                .iter()
                .flatten()
                .map(|placed| placed.unit.id.clone())
                .collect();
            transport.deliver(&Outbound::Components {
                rows: self.layout.clone(),
                changed,
            });
        }

        self.observers.push((id, Box::new(transport)));
        debug!(session = %self.id, observer = id.0, "observer attached");
        id
    }

    pub fn detach(&mut self, observer: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(id, _)| *id != observer);
        before != self.observers.len()
    }

    fn broadcast(&mut self, message: &Outbound, skip: Option<ObserverId>) {
        let session = &self.id;
        self.observers.retain(|(id, transport)| {
            if Some(*id) == skip {
                return true;
            }
            let delivered = transport.deliver(message);
            if !delivered {
                debug!(session = %session, observer = id.0, "observer disconnected");
            }
            delivered
        });
    }

    // ---- Lifecycle ----

    /// Load `source` and run it once.
    pub fn start(&mut self, source: ScriptSource) -> Result<(), RunnerError> {
        if self.state != RunState::Initial {
            return Err(RunnerError::AlreadyStarted);
        }
        self.load(source)
    }

    /// Reload the current script from scratch. Input state is kept.
    pub fn restart(&mut self) -> Result<(), RunnerError> {
        let source = self.source.clone().ok_or(RunnerError::NoScript)?;
        info!(session = %self.id, "restarting script");
        self.load(source)
    }

    pub fn stop(&mut self) -> Result<(), RunnerError> {
        if self.state != RunState::Running {
            return Err(RunnerError::NotRunning(self.state));
        }
        self.state = RunState::Stopped;
        info!(session = %self.id, "script stopped");
        Ok(())
    }

    fn load(&mut self, source: ScriptSource) -> Result<(), RunnerError> {
        self.workflow = Workflow::with_config(&self.config);
        self.program = None;
        self.module = None;
        self.session.reset_render();
        self.source = Some(source.clone());

        if self.config.incremental {
            match self.install(&source) {
                Ok(program) => {
                    self.program = Some(program);
                    self.mode = ExecutionMode::Incremental;
                }
                Err(err) => {
                    warn!(session = %self.id, error = %err, "script cannot run incrementally; falling back to full reruns");
                    self.workflow.reset();
                }
            }
        }

        if self.program.is_none() {
            match parse(&source.text) {
                Ok(module) => {
                    self.module = Some(Arc::new(module));
                    self.mode = ExecutionMode::FullRerun;
                }
                Err(err) => return Err(self.fail(ScriptError::Parse(err))),
            }
        }

        self.state = RunState::Running;
        info!(session = %self.id, mode = ?self.mode, file = %source.filename, "script started");

        match self.mode {
            ExecutionMode::Incremental => {
                let report = self.workflow.execute(None, &self.session.inputs);
                self.apply_report(report);
            }
            ExecutionMode::FullRerun => self.run_full()?,
        }
        self.finish_run(true);
        Ok(())
    }

    fn install(&mut self, source: &ScriptSource) -> Result<InstrumentedProgram, crate::error::TransformError> {
        let program = Transformer::new(Arc::clone(&source.filename)).transform(&source.text)?;
        program.install(&mut self.workflow, self.config.recursion_limit)?;
        Ok(program)
    }

    // ---- Reruns ----

    /// Apply a batch of input changes and rerun what they affect.
    pub fn rerun(&mut self, changes: IndexMap<UnitId, Value>) -> Result<RerunOutcome, RunnerError> {
        self.rerun_from(None, changes)
    }

    /// Like [`rerun`](Self::rerun), on behalf of `origin`, which does not
    /// receive the resulting state updates.
    pub fn rerun_from(
        &mut self,
        origin: Option<ObserverId>,
        changes: IndexMap<UnitId, Value>,
    ) -> Result<RerunOutcome, RunnerError> {
        if self.state != RunState::Running {
            return Err(RunnerError::NotRunning(self.state));
        }
        if let Some(at) = self.next_rerun_at() {
            if Instant::now() < at {
                debug!(session = %self.id, "rerun debounced");
                return Ok(RerunOutcome::Debounced);
            }
        }

        let accepted: IndexMap<UnitId, Value> = changes
            .into_iter()
            .filter(|(id, value)| self.session.input_buffer.should_render(id, value.to_json()))
            .collect();
        if accepted.is_empty() {
            debug!(session = %self.id, "no input changed");
            return Ok(RerunOutcome::Unchanged);
        }

        for (unit_id, value) in &accepted {
            self.session.inputs.insert(unit_id.clone(), value.clone());
            let update = Outbound::StateUpdate {
                unit_id: unit_id.clone(),
                value: value.clone(),
            };
            self.broadcast(&update, origin);
        }
        debug!(session = %self.id, changes = accepted.len(), "rerunning");

        let outcome = match self.mode {
            ExecutionMode::FullRerun => {
                self.run_full()?;
                RerunOutcome::FullRerun
            }
            ExecutionMode::Incremental => self.run_incremental(accepted.keys())?,
        };
        self.finish_run(false);
        Ok(outcome)
    }

    fn run_incremental<'a>(
        &mut self,
        changed: impl Iterator<Item = &'a UnitId>,
    ) -> Result<RerunOutcome, RunnerError> {
        let mut producers = BTreeSet::new();
        for unit in changed {
            match self.workflow.producer_of(unit) {
                Some(node) => {
                    producers.insert(node.clone());
                }
                None => warn!(session = %self.id, unit = %unit, "no producer for changed unit; skipping"),
            }
        }

        let affected = self.workflow.affected(producers.iter());
        if affected.is_empty() {
            warn!(session = %self.id, "no nodes affected; rerunning from scratch");
            self.cold_rerun()?;
            return Ok(RerunOutcome::FullRerun);
        }

        let report = self.workflow.execute(Some(&affected), &self.session.inputs);
        debug!(
            session = %self.id,
            affected = affected.len(),
            invoked = report.invoked(),
            "incremental rerun finished"
        );
        self.apply_report(report);
        Ok(RerunOutcome::Incremental { affected })
    }

    /// Reset the graph, reinstall the program and run every node.
    fn cold_rerun(&mut self) -> Result<(), RunnerError> {
        let Some(program) = self.program.clone() else {
            return self.run_full();
        };
        self.workflow.reset();
        self.session.view.clear();
        if let Err(err) = program.install(&mut self.workflow, self.config.recursion_limit) {
            warn!(session = %self.id, error = %err, "reinstall failed; falling back to full reruns");
            self.workflow.reset();
            self.program = None;
            let source = self.source.clone().ok_or(RunnerError::NoScript)?;
            let module = parse(&source.text).map_err(|err| self.fail(ScriptError::Parse(err)))?;
            self.module = Some(Arc::new(module));
            self.mode = ExecutionMode::FullRerun;
            return self.run_full();
        }
        let report = self.workflow.execute(None, &self.session.inputs);
        self.apply_report(report);
        Ok(())
    }

    fn run_full(&mut self) -> Result<(), RunnerError> {
        let (Some(module), Some(source)) = (self.module.clone(), self.source.as_ref()) else {
            return Err(RunnerError::NoScript);
        };
        let filename = Arc::clone(&source.filename);
        let (printed, result) = run_script(&module, &filename, &self.session.inputs, self.config.recursion_limit);
        for line in printed {
            self.broadcast(&Outbound::Output { content: line, node: None }, None);
        }
        match result {
            Ok(units) => {
                self.session.view.clear();
                self.session.view.replace(NodeId::from(SCRIPT_SEGMENT), units);
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn apply_report(&mut self, report: ExecutionReport) {
        for (node, lines) in &report.printed {
            for line in lines {
                let message = Outbound::Output {
                    content: line.clone(),
                    node: Some(node.clone()),
                };
                self.broadcast(&message, None);
            }
        }
        for node in report.invalidated() {
            self.session.view.remove(node);
        }
        for (node, units) in report.outputs {
            self.session.view.replace(node, units);
        }
    }

    /// Diff the view against what was transmitted, pack it, and send it if
    /// anything changed or `force` is set.
    fn finish_run(&mut self, force: bool) {
        self.last_run = Some(Instant::now());
        self.run_count += 1;

        let order = self.workflow.order();
        let units = self.session.view.units(&order);

        let mut changed = Vec::new();
        for unit in &units {
            if self.session.unit_buffer.should_render(&unit.id, unit.snapshot()) {
                changed.push(unit.id.clone());
            }
        }
        let present: HashSet<&UnitId> = units.iter().map(|unit| &unit.id).collect();
        let removed = self
            .session
            .unit_buffer
            .retain(|id| present.contains(id));

        self.layout = LayoutPacker::pack(units);

        if changed.is_empty() && removed == 0 && !force {
            debug!(session = %self.id, "no visible change; nothing transmitted");
            return;
        }
        let message = Outbound::Components {
            rows: self.layout.clone(),
            changed,
        };
        self.broadcast(&message, None);
    }

    fn fail(&mut self, err: ScriptError) -> RunnerError {
        error!(session = %self.id, error = %err, "script failed");
        self.state = RunState::Error;
        let message = Outbound::Error {
            content: ErrorPayload::from(&err),
        };
        self.broadcast(&message, None);
        RunnerError::Script(err)
    }

    // ---- Introspection ----

    /// The graph payload for visualization.
    pub fn introspect(&self) -> GraphPayload {
        self.workflow.snapshot()
    }

    /// Send the graph payload to every observer.
    pub fn publish_graph(&mut self) {
        let message = Outbound::Graph {
            graph: self.introspect(),
        };
        self.broadcast(&message, None);
    }

    /// The current packed tree.
    pub fn layout(&self) -> &[Row] {
        &self.layout
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Whether reruns are incremental or reinterpret the whole script.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Id of the session this runner drives.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The engine configuration the runner was created with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of completed runs, the initial one included.
    pub fn run_count(&self) -> u64 {
        self.run_count
    }

    /// The dependency graph of the loaded script.
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// The instrumented program, if the script runs incrementally.
    pub fn program(&self) -> Option<&InstrumentedProgram> {
        self.program.as_ref()
    }

    /// Current values of all input units.
    pub fn inputs(&self) -> &InputTable {
        &self.session.inputs
    }

    /// Earliest time a rerun will not be debounced.
    pub fn next_rerun_at(&self) -> Option<Instant> {
        if self.config.debounce.is_zero() {
            return None;
        }
        self.last_run.map(|at| at + self.config.debounce)
    }
}
