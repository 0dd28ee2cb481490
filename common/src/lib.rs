// Tapegauge common library - main library exports

pub mod commands;
pub mod messages;
pub mod settings;
pub mod types;

// Flattened re-exports
pub use self::types::*;
