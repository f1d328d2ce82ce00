//! WireGuard config handling

pub mod transform;

pub use transform::{transform, OverrideOutcome, TransformOptions, TransformReport};
