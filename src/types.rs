//! Public types shared by the formatter, normalizer, renderer and batch pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::utils::color::HexColor;
use crate::utils::config::RenderDefaults;

/// Payload types the generator understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrType {
    Url,
    Text,
    Wifi,
    Vcard,
    Email,
    Sms,
    Whatsapp,
    Crypto,
    Calendar,
    Geo,
}

impl QrType {
    pub const ALL: [QrType; 10] = [
        QrType::Url,
        QrType::Text,
        QrType::Wifi,
        QrType::Vcard,
        QrType::Email,
        QrType::Sms,
        QrType::Whatsapp,
        QrType::Crypto,
        QrType::Calendar,
        QrType::Geo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QrType::Url => "url",
            QrType::Text => "text",
            QrType::Wifi => "wifi",
            QrType::Vcard => "vcard",
            QrType::Email => "email",
            QrType::Sms => "sms",
            QrType::Whatsapp => "whatsapp",
            QrType::Crypto => "crypto",
            QrType::Calendar => "calendar",
            QrType::Geo => "geo",
        }
    }
}

impl fmt::Display for QrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QrType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        QrType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| anyhow::anyhow!("unknown QR type {:?}", s))
    }
}

/// Error-correction level of the QR symbol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L,
    #[default]
    M,
    Q,
    H,
}

impl FromStr for ErrorCorrection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(Self::L),
            "M" => Ok(Self::M),
            "Q" => Ok(Self::Q),
            "H" => Ok(Self::H),
            _ => anyhow::bail!("unknown error correction level {:?} (expected L, M, Q or H)", s),
        }
    }
}

/// Shape drawn for each dark data module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DotStyle {
    #[default]
    Square,
    Dots,
    Rounded,
    Classy,
    ClassyRounded,
    ExtraRounded,
}

impl FromStr for DotStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "square" => Ok(Self::Square),
            "dots" => Ok(Self::Dots),
            "rounded" => Ok(Self::Rounded),
            "classy" => Ok(Self::Classy),
            "classy-rounded" => Ok(Self::ClassyRounded),
            "extra-rounded" => Ok(Self::ExtraRounded),
            _ => anyhow::bail!("unknown dot style {:?}", s),
        }
    }
}

/// Shape drawn for the three finder patterns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CornerStyle {
    #[default]
    Square,
    Dot,
    ExtraRounded,
}

impl FromStr for CornerStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "square" => Ok(Self::Square),
            "dot" => Ok(Self::Dot),
            "extra-rounded" => Ok(Self::ExtraRounded),
            _ => anyhow::bail!("unknown corner style {:?}", s),
        }
    }
}

/// Style applied uniformly to every item of one run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub fg_color: HexColor,
    pub bg_color: HexColor,
    pub dot_style: DotStyle,
    pub corner_style: CornerStyle,
    pub error_correction: ErrorCorrection,
    /// Quiet zone in modules.
    pub margin: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: RenderDefaults::SIZE,
            height: RenderDefaults::SIZE,
            fg_color: HexColor::BLACK,
            bg_color: HexColor::WHITE,
            dot_style: DotStyle::default(),
            corner_style: CornerStyle::default(),
            error_correction: ErrorCorrection::default(),
            margin: RenderDefaults::MARGIN,
        }
    }
}

impl RenderOptions {
    /// Same style at a different square size and margin (used for thumbnails).
    pub fn resized(&self, size: u32, margin: u32) -> Self {
        Self {
            width: size,
            height: size,
            margin,
            ..self.clone()
        }
    }
}

/// How archive entries are named.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilenamePolicy {
    /// `qr-001.png`, `qr-002.png`, ...
    #[default]
    Sequential,
    /// Sanitized payload text, e.g. `qr-https___example_com.png`.
    #[serde(alias = "content")]
    ContentDerived,
}

impl FromStr for FilenamePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "content" | "contentderived" | "content-derived" => Ok(Self::ContentDerived),
            _ => anyhow::bail!("unknown filename pattern {:?} (expected sequential or content)", s),
        }
    }
}

/// Encoding of a single exported image. Bulk archives are always PNG.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    /// Flattened onto white; JPEG has no alpha.
    #[serde(alias = "jpg")]
    Jpeg,
    /// Vector output of the module grid.
    Svg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Svg => "svg",
        }
    }

    /// Format implied by a file extension, if it names one.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "svg" => Ok(Self::Svg),
            _ => anyhow::bail!("unknown output format {:?} (expected png, jpeg or svg)", s),
        }
    }
}

/// Input interpretation for a bulk run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkMode {
    Csv,
    Text,
}

impl FromStr for BulkMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "text" => Ok(Self::Text),
            _ => anyhow::bail!("unknown mode {:?} (expected csv or text)", s),
        }
    }
}

/// Rendered image bytes keyed by input index. Written once per index per run.
pub type ResultMap = BTreeMap<usize, Vec<u8>>;

/// Scheduler lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Mutable record of one batch run. Reset when a new run starts.
#[derive(Clone, Debug, Default)]
pub struct GenerationState {
    pub active: bool,
    pub phase: RunPhase,
    /// Items whose chunk has settled (successes and failures).
    pub current: usize,
    /// Scheduled item count (`min(len, MAX_BATCH_SIZE)`).
    pub total: usize,
    pub start_time: Option<Instant>,
    /// Set when the run reaches a terminal phase.
    pub finish_time: Option<Instant>,
    /// Per-item render failures in this run.
    pub failed: usize,
    pub results: ResultMap,
}

impl GenerationState {
    /// Wall time of the run: frozen once it has finished, live while it runs.
    pub fn elapsed(&self) -> Duration {
        match (self.start_time, self.finish_time) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }
}

/// Full bulk configuration (CLI and config file).
#[derive(Clone, Debug)]
pub struct BulkOpts {
    /// `None`: chosen from the input file extension.
    pub mode: Option<BulkMode>,
    pub qr_type: Option<QrType>,
    /// User overrides of the logical-field → CSV-column mapping.
    pub column_overrides: BTreeMap<String, String>,
    pub render: RenderOptions,
    pub filename_policy: FilenamePolicy,
    /// Run the chunk loop on a dedicated worker thread.
    pub use_worker: bool,
    pub verbose: bool,
}

impl Default for BulkOpts {
    fn default() -> Self {
        Self {
            mode: None,
            qr_type: None,
            column_overrides: BTreeMap::new(),
            render: RenderOptions::default(),
            filename_policy: FilenamePolicy::default(),
            use_worker: false,
            verbose: false,
        }
    }
}
