//! Counterexample reconstruction
//!
//! A target found by a block-modular run sits at the end of an ARG path whose
//! summary edges hide whole nested analyses. Reconstruction replaces every
//! summary edge with the path through the nested set that produced the exit,
//! recursively, yielding a path over ordinary CFA edges only.

mod path;
mod reconstructor;

pub use path::{CounterexamplePath, PathStep};
pub use reconstructor::CounterexampleReconstructor;
