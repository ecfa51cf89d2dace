// Transition Engine - generic (state, transition) -> state table
// No domain knowledge lives here; the proposal workflow is built on top of it.

pub mod machine;

pub use machine::{EngineError, EnterHook, ExitHook, Guard, TransitionEngine, TransitionInfo};
