//! Engine module: rendering, command line, progress display

pub mod arg_parser;
pub mod cli;
pub mod progress;
pub mod render;

// Re-export commonly used items
pub use arg_parser::{Cli, Commands};
pub use cli::handle_run;
pub use render::{QrRenderer, RenderError, Renderer};
