//! Type definitions for the UKG reasoner
//!
//! Knowledge items with their axis values, and the task vocabulary shared by
//! the task manager and its callers.

mod item;
mod task;

pub use item::*;
pub use task::*;
