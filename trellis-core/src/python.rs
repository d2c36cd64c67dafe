//! Python Bindings
//!
//! Exposes a synchronous session to Python. Outbound messages are buffered
//! and handed over as JSON or MessagePack on request, so the Python side
//! decides how to ship them to clients.

use indexmap::IndexMap;
use parking_lot::Mutex;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;

use crate::config::EngineConfig;
use crate::render::UnitId;
use crate::runtime::{Outbox, RerunOutcome, ScriptRunner, SessionId};
use crate::script::ScriptSource;
use crate::value::Value;

/// Python-exposed script session.
#[pyclass(name = "Session")]
pub struct PySession {
    runner: Mutex<ScriptRunner>,
    outbox: Outbox,
}

#[pymethods]
impl PySession {
    /// Create a session. `config_json` uses the same keys as the engine
    /// config file.
    #[new]
    #[pyo3(signature = (session_id, config_json=None))]
    fn new(session_id: String, config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => EngineConfig::from_json(json)
                .map_err(|e| PyValueError::new_err(format!("Config error: {}", e)))?,
            None => EngineConfig::default(),
        };
        let mut runner = ScriptRunner::new(SessionId::new(session_id), config);
        let outbox = Outbox::new();
        runner.attach(outbox.transport());
        Ok(Self {
            runner: Mutex::new(runner),
            outbox,
        })
    }

    /// Load and run a script.
    fn start(&self, py: Python<'_>, filename: &str, text: &str) -> PyResult<()> {
        let source = ScriptSource::new(filename, text);
        py.allow_threads(|| self.runner.lock().start(source))
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    /// Apply input changes given as a JSON object of unit id to value.
    /// Returns what the rerun did: "unchanged", "debounced", "incremental"
    /// or "full".
    fn rerun(&self, py: Python<'_>, changes_json: &str) -> PyResult<&'static str> {
        let changes: IndexMap<UnitId, Value> = serde_json::from_str(changes_json)
            .map_err(|e| PyValueError::new_err(format!("Invalid changes: {}", e)))?;
        let outcome = py
            .allow_threads(|| self.runner.lock().rerun(changes))
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        Ok(match outcome {
            RerunOutcome::Unchanged => "unchanged",
            RerunOutcome::Debounced => "debounced",
            RerunOutcome::Incremental { .. } => "incremental",
            RerunOutcome::FullRerun => "full",
        })
    }

    fn restart(&self, py: Python<'_>) -> PyResult<()> {
        py.allow_threads(|| self.runner.lock().restart())
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    fn stop(&self) -> PyResult<()> {
        self.runner
            .lock()
            .stop()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    /// Pending outbound messages as JSON strings.
    fn drain_json(&self) -> PyResult<Vec<String>> {
        self.outbox
            .drain()
            .iter()
            .map(|message| {
                message
                    .to_json()
                    .map_err(|e| PyRuntimeError::new_err(format!("Encode error: {}", e)))
            })
            .collect()
    }

    /// Pending outbound messages as MessagePack frames.
    fn drain_msgpack<'py>(&self, py: Python<'py>) -> PyResult<Vec<Bound<'py, PyBytes>>> {
        self.outbox
            .drain()
            .iter()
            .map(|message| {
                message
                    .encode()
                    .map(|bytes| PyBytes::new_bound(py, &bytes))
                    .map_err(|e| PyRuntimeError::new_err(format!("Encode error: {}", e)))
            })
            .collect()
    }

    /// The dependency graph with timings, as JSON.
    fn graph_json(&self) -> PyResult<String> {
        let payload = self.runner.lock().introspect();
        serde_json::to_string(&payload).map_err(|e| PyRuntimeError::new_err(format!("Encode error: {}", e)))
    }

    #[getter]
    fn state(&self) -> String {
        self.runner.lock().state().to_string()
    }

    #[getter]
    fn session_id(&self) -> String {
        self.runner.lock().id().to_string()
    }

    fn __repr__(&self) -> String {
        let runner = self.runner.lock();
        format!(
            "Session(id={}, state={}, runs={})",
            runner.id(),
            runner.state(),
            runner.run_count()
        )
    }
}

/// Python module definition.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySession>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
