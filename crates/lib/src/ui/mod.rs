//! UI state shared by the desktop app and tests: the screen state machine, the screen
//! components, and the result reveal. No rendering here.

mod reveal;
mod screens;
mod shell;

pub use reveal::{ResultReveal, DEFAULT_REVEAL_INTERVAL};
pub use screens::{CourseBackend, CourseTokenEntry, QuerySubmission, ValidationError};
pub use shell::{AppShell, AuthStatus, Screen, Session, ShellError};
