pub mod color;
pub mod config;
pub mod logger;
pub mod qrbulk_toml;
pub mod tempfiles;

pub use color::{HexColor, contrast_ratio, is_contrast_sufficient};
pub use config::*;
pub use logger::{Colors, setup_logging};
pub use tempfiles::write_atomic;
