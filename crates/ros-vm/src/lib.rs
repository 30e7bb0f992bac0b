//! The ROS virtual machine: scope and value resolution, operator
//! dispatch, the function registry, module import, and the line-addressed
//! execution engine itself.
//!
//! [`Machine`] is the entry point. It executes a main source buffer
//! against an allow-list of importable files and writes program output,
//! fault reports, and the exit banner to its sink.

pub mod fault;
pub mod loader;
pub mod machine;
pub mod ops;
pub mod registry;
pub mod scope;
pub mod trust;

pub use fault::FaultReport;
pub use loader::import_module;
pub use machine::{Machine, MachineConfig};
pub use ops::MathOps;
pub use registry::{find_endfunc, FuncEntry, FunctionRegistry};
pub use scope::{resolve, Scope};
pub use trust::stable_hash;
