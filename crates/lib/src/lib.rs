//! canvasqa core library: identity, backend client, message relay, local storage, and UI
//! state shared by the CLI and desktop applications.

pub mod api;
pub mod config;
pub mod identity;
pub mod init;
pub mod relay;
pub mod storage;
pub mod ui;
