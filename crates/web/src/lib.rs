//! AutoTest control panel
//!
//! Web front end for launching intercom test suites, editing the stored
//! device configuration, browsing run logs and managing firmware uploads.

pub mod error;
pub mod firmware;
pub mod html;
pub mod logs;
pub mod runner;
pub mod server;
pub mod sessions;
pub mod settings;
pub mod static_files;

pub use error::{ApiError, ApiResult};
pub use firmware::{firmware_routes, FirmwareStore};
pub use logs::{logs_routes, LogEntry, LogStore};
pub use runner::{CommandRunner, RunManager, StopOutcome, SuiteRunner};
pub use server::WebServer;
pub use sessions::{editor_routes, EditorState};
pub use settings::{PanelConfig, SuiteCommands};
