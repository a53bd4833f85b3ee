//! Application-level orchestration utilities.
//!
//! This module owns the run service (one simulator run at a time), the UI run
//! controller, and post-run processing such as auto-save and exports. UI/CLI
//! layers call into this module to keep responsibilities separated.

mod controller;
mod post_process;

#[cfg(feature = "tui")]
pub(crate) use controller::{run_controller, UiCommand};
pub(crate) use controller::SimulationService;
pub(crate) use post_process::process_run_completion;
