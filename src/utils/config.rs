//! Application configuration constants.
//! Limits, defaults and archive names in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    archive_filename: String,
    manifest_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
                archive_filename: "qr-codes.zip".to_string(),
                manifest_filename: "manifest.csv".to_string(),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Optional per-directory config file (e.g. `.qrbulk.toml`).
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Default name of the bulk output container.
    pub fn archive_filename(&self) -> &str {
        &self.archive_filename
    }

    /// Fixed name of the manifest entry inside the archive.
    pub fn manifest_filename(&self) -> &str {
        &self.manifest_filename
    }
}

// ---- Batch limits ----

/// Hard cap on items scheduled in one batch run. Longer inputs are truncated to this prefix.
pub const MAX_BATCH_SIZE: usize = 500;

/// Items dispatched together per chunk. The chunk boundary is the only cancellation checkpoint.
pub const CHUNK_SIZE: usize = 5;

// ---- Preview ----

/// Preview thumbnail tuning.
pub struct PreviewConsts;

impl PreviewConsts {
    /// Number of leading items rendered as thumbnails.
    pub const COUNT: usize = 5;
    /// Thumbnail edge in pixels.
    pub const SIZE: u32 = 80;
    /// Thumbnail quiet zone in modules.
    pub const MARGIN: u32 = 2;
    /// Separator used when building the preview identity key.
    pub const KEY_SEPARATOR: &'static str = "|||";
}

// ---- Render defaults ----

/// Defaults for [`RenderOptions`](crate::RenderOptions) when neither config file nor CLI set a field.
pub struct RenderDefaults;

impl RenderDefaults {
    pub const SIZE: u32 = 300;
    pub const MARGIN: u32 = 4;
    /// Minimum WCAG contrast ratio between foreground and background before the CLI warns.
    pub const MIN_CONTRAST: f64 = 3.0;
}

// ---- Filenames ----

/// Max characters kept from the payload for content-derived filenames.
pub const CONTENT_FILENAME_MAX_LEN: usize = 40;
