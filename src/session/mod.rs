//! Per-identity conversation state: the FSM step set and flow drafts.

pub mod model;
pub mod step;

pub use model::*;
pub use step::Step;
