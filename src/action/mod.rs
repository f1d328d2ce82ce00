//! Runner integration
//!
//! The action runs as two steps of the same job: the main step (setup) and
//! the post step (teardown). The runner supplies inputs and saved state
//! through environment variables and reads workflow commands back from
//! stdout.

pub mod commands;
pub mod inputs;

pub use commands::{Workflow, WorkflowError};
pub use inputs::{ActionInputs, InputError, PostState};
