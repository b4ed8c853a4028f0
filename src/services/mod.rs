//! Service layer
//!
//! High-level operations UI collaborators call into, built on the
//! repository and the sync remote.

pub mod notes;

pub use notes::{CreateNoteOptions, CreateNoteOutcome, NotesService};
