//! Load `.qrbulk.toml` from a directory (CLI only). File values apply before CLI flags, which win.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::utils::color::HexColor;
use crate::utils::config::PackagePaths;
use crate::{BulkMode, BulkOpts, CornerStyle, DotStyle, ErrorCorrection, FilenamePolicy};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QrbulkToml {
    #[serde(default)]
    render: RenderSection,
    #[serde(default)]
    bulk: BulkSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RenderSection {
    width: Option<u32>,
    fg_color: Option<HexColor>,
    bg_color: Option<HexColor>,
    dot_style: Option<DotStyle>,
    corner_style: Option<CornerStyle>,
    error_correction: Option<ErrorCorrection>,
    margin: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BulkSection {
    mode: Option<BulkMode>,
    filename_pattern: Option<FilenamePolicy>,
    worker: Option<bool>,
    verbose: Option<bool>,
}

/// Load the config file from `dir`. `Ok(None)` if absent; parse errors carry the file path.
pub(crate) fn load_qrbulk_toml(dir: &Path) -> Result<Option<QrbulkToml>> {
    let path = dir.join(PackagePaths::get().config_filename());
    let Ok(s) = std::fs::read_to_string(&path) else {
        return Ok(None);
    };
    parse_qrbulk_toml(&s)
        .map(Some)
        .with_context(|| format!("{}", path.display()))
}

pub(crate) fn parse_qrbulk_toml(s: &str) -> std::result::Result<QrbulkToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $($opts_field:ident).+) => {
        if let Some(v) = $sec.$sec_field {
            $opts.$($opts_field).+ = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI.
pub(crate) fn apply_file_to_opts(file: &QrbulkToml, opts: &mut BulkOpts) {
    let render = &file.render;
    if let Some(w) = render.width {
        opts.render.width = w;
        opts.render.height = w;
    }
    apply_file_opt!(render, opts, fg_color => render.fg_color);
    apply_file_opt!(render, opts, bg_color => render.bg_color);
    apply_file_opt!(render, opts, dot_style => render.dot_style);
    apply_file_opt!(render, opts, corner_style => render.corner_style);
    apply_file_opt!(render, opts, error_correction => render.error_correction);
    apply_file_opt!(render, opts, margin => render.margin);

    let bulk = &file.bulk;
    if let Some(mode) = bulk.mode {
        opts.mode = Some(mode);
    }
    apply_file_opt!(bulk, opts, filename_pattern => filename_policy);
    apply_file_opt!(bulk, opts, worker => use_worker);
    apply_file_opt!(bulk, opts, verbose => verbose);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sets_only_present_fields() {
        let file = parse_qrbulk_toml(
            r##"
[render]
width = 512
fg_color = "#112233"
dot_style = "classy-rounded"
error_correction = "H"

[bulk]
filename_pattern = "content"
worker = true
"##,
        )
        .unwrap();
        let mut opts = BulkOpts::default();
        apply_file_to_opts(&file, &mut opts);
        assert_eq!((opts.render.width, opts.render.height), (512, 512));
        assert_eq!(opts.render.fg_color.to_string(), "#112233");
        assert_eq!(opts.render.bg_color, HexColor::WHITE);
        assert_eq!(opts.render.dot_style, DotStyle::ClassyRounded);
        assert_eq!(opts.render.error_correction, ErrorCorrection::H);
        assert_eq!(opts.filename_policy, FilenamePolicy::ContentDerived);
        assert!(opts.use_worker);
        assert_eq!(opts.mode, None);
    }

    #[test]
    fn test_bad_color_is_parse_error() {
        assert!(parse_qrbulk_toml("[render]\nfg_color = \"#zz\"\n").is_err());
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_qrbulk_toml(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_unparsable_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".qrbulk.toml"),
            "[render]\nwidth = \"wide\"\n",
        )
        .unwrap();
        assert!(load_qrbulk_toml(dir.path()).is_err());
    }
}
