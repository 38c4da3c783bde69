//! AutoTest Common Library
//!
//! Configuration document model, editor session state and the types shared
//! between the control panel and the test runners.

pub mod devices;
pub mod document;
pub mod editor;
pub mod error;
pub mod progress;
pub mod view;

// Re-export commonly used types
pub use devices::{DeviceConfig, FirmwareVersion};
pub use document::{parse, serialize, Document, Group, Pair, SEPARATOR};
pub use editor::{Editor, GroupHeader};
pub use error::{Error, Result};
pub use progress::{ProgressEvent, Suite};
pub use view::{EditorView, TreeBuilder};

/// AutoTest version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default name of the stored configuration file
pub const DEFAULT_CONFIG_FILE: &str = "config.txt";

/// Default directory for run logs
pub const DEFAULT_LOGS_DIR: &str = "logs";
