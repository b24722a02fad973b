//! Statement atomicity
//!
//! The dialect has no multi-statement transactions; each statement is
//! atomic on its own through an undo log.

mod undo;

pub use undo::{UndoEntry, UndoLog};
