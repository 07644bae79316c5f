//! Step registry: the static declaration of every pipeline step.

pub mod registry;

pub use registry::{spec, InputRequirement, StepSpec};
