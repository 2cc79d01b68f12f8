//! Survey session state, section editing, and the submit flow.

pub mod controller;
pub mod editors;
pub mod session;

pub use controller::{SessionController, SubmitOutcome};
pub use editors::{EditError, SectionEditor};
pub use session::{SessionError, SessionState};
