use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::utils::color::HexColor;
use crate::{BulkMode, CornerStyle, DotStyle, ErrorCorrection, FilenamePolicy, OutputFormat, QrType};

struct DefaultArgs;

impl DefaultArgs {
    pub const PREVIEW_DIR: &'static str = ".";
    pub const SINGLE_STEM: &'static str = "qrcode";
}

/// Bulk QR-code generator: CSV or line input to a zip of PNGs with a manifest.
#[derive(Clone, Parser)]
#[command(name = "qrbulk")]
#[command(about = "Generate QR codes in bulk from CSV or text, or one at a time.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Render every input item and package the images into a zip with manifest.csv.
    Bulk(BulkArgs),
    /// Render thumbnails of the first five items.
    Preview(PreviewArgs),
    /// Validate, format and render one QR code from key=value fields.
    Single(SingleArgs),
}

/// Style flags shared by every command. Unset flags fall back to `.qrbulk.toml`, then defaults.
#[derive(Clone, Args)]
pub struct StyleArgs {
    /// Image edge in pixels.
    #[arg(long, short = 'w')]
    pub width: Option<u32>,

    /// Foreground color (#rgb or #rrggbb).
    #[arg(long)]
    pub fg: Option<HexColor>,

    /// Background color (#rgb or #rrggbb).
    #[arg(long)]
    pub bg: Option<HexColor>,

    /// square | dots | rounded | classy | classy-rounded | extra-rounded
    #[arg(long)]
    pub dot_style: Option<DotStyle>,

    /// square | dot | extra-rounded
    #[arg(long)]
    pub corner_style: Option<CornerStyle>,

    /// Error-correction level: L, M, Q or H.
    #[arg(long)]
    pub ec: Option<ErrorCorrection>,

    /// Quiet zone in modules.
    #[arg(long)]
    pub margin: Option<u32>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

/// Where items come from and how rows are interpreted.
#[derive(Clone, Args)]
pub struct InputArgs {
    /// Input file, or `-` for stdin.
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// csv | text. Default: csv for `.csv` files, text otherwise.
    #[arg(long)]
    pub mode: Option<BulkMode>,

    /// QR type for CSV rows. Default: detected from headers.
    #[arg(long = "type", value_name = "TYPE")]
    pub qr_type: Option<QrType>,

    /// Column mapping override, `field=column`. Repeatable.
    #[arg(long = "map", value_name = "FIELD=COLUMN", value_parser = parse_key_val)]
    pub map: Vec<(String, String)>,
}

#[derive(Clone, Args)]
pub struct BulkArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output archive path. Default: qr-codes.zip.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Entry naming: sequential | content.
    #[arg(long)]
    pub filenames: Option<FilenamePolicy>,

    /// Run generation on a dedicated worker thread.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub worker: Option<bool>,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub style: StyleArgs,
}

#[derive(Clone, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Directory for preview-N.png files.
    #[arg(long, default_value = DefaultArgs::PREVIEW_DIR)]
    pub out: PathBuf,

    #[command(flatten)]
    pub style: StyleArgs,
}

#[derive(Clone, Args)]
pub struct SingleArgs {
    /// Payload type.
    #[arg(long = "type", value_name = "TYPE")]
    pub qr_type: QrType,

    /// Field value, `key=value` (e.g. ssid=Home). Repeatable.
    #[arg(long = "field", short = 'f', value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub fields: Vec<(String, String)>,

    /// Output path. Default: qrcode.<format>.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// png | jpeg | svg. Default: from the output extension, else png.
    #[arg(long)]
    pub format: Option<OutputFormat>,

    #[command(flatten)]
    pub style: StyleArgs,
}

impl SingleArgs {
    /// Output path and format: explicit `--format` wins, then the `-o` extension, then PNG.
    pub fn target(&self) -> (PathBuf, OutputFormat) {
        let format = self
            .format
            .or_else(|| self.output.as_deref().and_then(OutputFormat::from_path))
            .unwrap_or_default();
        let path = self.output.clone().unwrap_or_else(|| {
            PathBuf::from(format!("{}.{}", DefaultArgs::SINGLE_STEM, format.extension()))
        });
        (path, format)
    }
}

/// Parse `key=value`; the value may itself contain `=`.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    let k = k.trim();
    if k.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((k.to_string(), v.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("url=a=b").unwrap(),
            ("url".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_bulk_flags_parse() {
        let cli = Cli::try_parse_from([
            "qrbulk", "bulk", "in.csv", "--type", "wifi", "--map", "ssid=Network", "--fg", "#111",
            "--dot-style", "classy-rounded", "--ec", "H", "--filenames", "content", "--worker", "-v",
        ])
        .unwrap();
        let Commands::Bulk(args) = cli.command else {
            panic!("expected bulk");
        };
        assert_eq!(args.input.qr_type, Some(QrType::Wifi));
        assert_eq!(args.input.map, vec![("ssid".to_string(), "Network".to_string())]);
        assert_eq!(args.style.dot_style, Some(DotStyle::ClassyRounded));
        assert_eq!(args.style.ec, Some(ErrorCorrection::H));
        assert_eq!(args.filenames, Some(FilenamePolicy::ContentDerived));
        assert_eq!(args.worker, Some(true));
        assert_eq!(args.style.verbose, Some(true));
    }

    fn single(args: &[&str]) -> SingleArgs {
        let argv = ["qrbulk", "single", "--type", "url", "-f", "url=a.b"]
            .iter()
            .chain(args)
            .copied();
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Single(a) => a,
            _ => panic!("expected single"),
        }
    }

    #[test]
    fn test_single_target_resolution() {
        assert_eq!(
            single(&[]).target(),
            (PathBuf::from("qrcode.png"), OutputFormat::Png)
        );
        assert_eq!(
            single(&["--format", "svg"]).target(),
            (PathBuf::from("qrcode.svg"), OutputFormat::Svg)
        );
        assert_eq!(
            single(&["-o", "out/code.JPG"]).target(),
            (PathBuf::from("out/code.JPG"), OutputFormat::Jpeg)
        );
        assert_eq!(
            single(&["-o", "code.bin", "--format", "jpeg"]).target(),
            (PathBuf::from("code.bin"), OutputFormat::Jpeg)
        );
        assert_eq!(single(&["-o", "code.bin"]).target().1, OutputFormat::Png);
        assert!(Cli::try_parse_from(["qrbulk", "single", "--type", "url", "--format", "gif"]).is_err());
    }

    #[test]
    fn test_single_requires_type() {
        assert!(Cli::try_parse_from(["qrbulk", "single", "--field", "url=x"]).is_err());
    }
}
