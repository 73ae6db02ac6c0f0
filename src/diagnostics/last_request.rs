//! Last-request memory.
//!
//! A single overwritable slot holding metadata of the most recently started
//! dispatch. Written only in debug mode, read by the snapshot assembler.
//! Writes are atomic pointer swaps with no ordering between concurrent
//! dispatches; the last writer wins.

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Metadata of one dispatched call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LastRequestRecord {
    pub handler_type: String,
    pub operation_name: String,
    pub path_info: String,
}

#[derive(Debug, Default)]
pub struct LastRequestMemory {
    slot: ArcSwapOption<LastRequestRecord>,
}

static PROCESS: OnceLock<Arc<LastRequestMemory>> = OnceLock::new();

impl LastRequestMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide slot. Lives until process exit.
    pub fn process() -> Arc<LastRequestMemory> {
        PROCESS.get_or_init(|| Arc::new(Self::new())).clone()
    }

    pub fn remember(&self, record: LastRequestRecord) {
        self.slot.store(Some(Arc::new(record)));
    }

    pub fn get(&self) -> Option<LastRequestRecord> {
        self.slot.load_full().map(|r| (*r).clone())
    }
}
