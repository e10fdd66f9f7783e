//! Capturing emitter for testing.
//!
//! Records every graph it is handed instead of synthesizing anything, and
//! can be told to fail so error propagation can be checked.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::emitter::GraphEmitter;
use crate::error::{TopologyError, TopologyResult};
use crate::graph::StackGraph;

#[derive(Clone, Default)]
pub struct CaptureEmitter {
    /// Graphs received so far.
    graphs: Arc<RwLock<Vec<StackGraph>>>,
    /// Simulated failure to return (as a message for `TopologyError::Emit`).
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl CaptureEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a failure to simulate.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    /// Get all captured graphs.
    pub fn graphs(&self) -> Vec<StackGraph> {
        self.graphs.read().clone()
    }

    /// Get the most recent graph.
    pub fn last(&self) -> Option<StackGraph> {
        self.graphs.read().last().cloned()
    }

    pub fn emit_count(&self) -> usize {
        self.graphs.read().len()
    }

    pub fn clear(&self) {
        self.graphs.write().clear();
    }
}

impl GraphEmitter for CaptureEmitter {
    fn emit(&self, graph: &StackGraph) -> TopologyResult<()> {
        if let Some(msg) = self.simulate_failure.read().clone() {
            return Err(TopologyError::Emit(msg));
        }
        self.graphs.write().push(graph.clone());
        Ok(())
    }
}
