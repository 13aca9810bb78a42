//! CLI command handlers: bulk (default workflow), preview thumbnails, single code.

use anyhow::{Context, Result};
use kdam::Animation;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::engine::arg_parser::{BulkArgs, Cli, Commands, InputArgs, PreviewArgs, SingleArgs, StyleArgs};
use crate::engine::progress::{ProgressBarConfig, create_progress_bar, finish_bar, progress_hook};
use crate::engine::render::{QrRenderer, Renderer};
use crate::pipeline::{BatchScheduler, PreviewOutcome, PreviewSampler, RunSummary};
use crate::utils::color::contrast_ratio;
use crate::utils::config::{PackagePaths, RenderDefaults};
use crate::utils::logger::{Colors, setup_logging};
use crate::utils::qrbulk_toml::{apply_file_to_opts, load_qrbulk_toml};
use crate::utils::tempfiles::write_atomic;
use crate::{BulkMode, BulkOpts, QrData, RenderOptions, generate_archive, prepare_input};

/// Config file, then CLI flags. Logging is initialized here, before any warning is emitted.
fn setup_opts(style: &StyleArgs) -> BulkOpts {
    let mut opts = BulkOpts::default();
    let file = std::env::current_dir()
        .context("resolve working directory")
        .and_then(|dir| load_qrbulk_toml(&dir));
    if let Ok(Some(ref f)) = file {
        apply_file_to_opts(f, &mut opts);
    }
    apply_style_args(style, &mut opts.render);
    if let Some(v) = style.verbose {
        opts.verbose = v;
    }
    setup_logging(opts.verbose);
    if let Err(e) = file {
        warn!("Ignoring config file: {:#}", e);
    }
    opts
}

fn apply_style_args(style: &StyleArgs, render: &mut RenderOptions) {
    if let Some(w) = style.width {
        render.width = w;
        render.height = w;
    }
    if let Some(c) = style.fg {
        render.fg_color = c;
    }
    if let Some(c) = style.bg {
        render.bg_color = c;
    }
    if let Some(s) = style.dot_style {
        render.dot_style = s;
    }
    if let Some(s) = style.corner_style {
        render.corner_style = s;
    }
    if let Some(ec) = style.ec {
        render.error_correction = ec;
    }
    if let Some(m) = style.margin {
        render.margin = m;
    }
}

fn apply_input_args(input: &InputArgs, opts: &mut BulkOpts) {
    if input.mode.is_some() {
        opts.mode = input.mode;
    }
    if opts.mode.is_none() {
        let is_csv = Path::new(&input.input)
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        opts.mode = Some(if is_csv { BulkMode::Csv } else { BulkMode::Text });
    }
    opts.qr_type = input.qr_type;
    opts.column_overrides = input.map.iter().cloned().collect();
}

fn warn_low_contrast(render: &RenderOptions) {
    let ratio = contrast_ratio(render.fg_color, render.bg_color);
    if ratio < RenderDefaults::MIN_CONTRAST {
        warn!(
            "Low contrast between {} and {} ({:.2}:1, want >= {}:1); codes may not scan",
            render.fg_color,
            render.bg_color,
            ratio,
            RenderDefaults::MIN_CONTRAST
        );
    }
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut s = String::new();
        std::io::stdin()
            .read_to_string(&mut s)
            .context("read input from stdin")?;
        Ok(s)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("read input file {input}"))
    }
}

fn print_summary(summary: &RunSummary, out: &Path, json: bool) -> Result<()> {
    let line = format!(
        "{} | {}",
        Colors::colorize(Colors::SUCCEEDED, &format!("Generated: {}", summary.succeeded)),
        Colors::colorize(Colors::FAILED, &format!("Failed: {}", summary.failed)),
    );
    info!("{} of {} in {:.2?} -> {}", line, summary.total, summary.elapsed, out.display());
    if summary.cancelled {
        warn!(
            "{}",
            Colors::colorize(Colors::CANCELLED, "Generation cancelled; archive holds the partial result")
        );
    }
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(summary).context("serialize run summary")?
        );
    }
    Ok(())
}

fn handle_bulk(args: &BulkArgs) -> Result<()> {
    let mut opts = setup_opts(&args.style);
    apply_input_args(&args.input, &mut opts);
    if let Some(p) = args.filenames {
        opts.filename_policy = p;
    }
    if let Some(w) = args.worker {
        opts.use_worker = w;
    }
    warn_low_contrast(&opts.render);

    let text = read_input(&args.input.input)?;
    let prepared = prepare_input(&text, &opts)?;
    if let Some(ref plan) = prepared.plan {
        info!("CSV as {} with mapping {:?}", plan.qr_type, plan.mapping);
    }
    let input = &prepared.input;
    if input.is_truncated() {
        warn!(
            "Input has {} items; only the first {} will be generated",
            input.total,
            input.scheduled_count()
        );
    }

    let renderer: Arc<dyn Renderer> = Arc::new(QrRenderer::new());
    let scheduler = BatchScheduler::new(renderer);
    let cancel = scheduler.cancel_handle();
    ctrlc::set_handler(move || {
        cancel.cancel();
        log::info!("Cancelling after the current chunk...");
    })
    .context("set Ctrl+C handler")?;

    let bar = (input.scheduled_count() > 0).then(|| {
        create_progress_bar(ProgressBarConfig::new(
            input.scheduled_count(),
            "Generating",
            Animation::Classic,
        ))
    });
    let report = generate_archive(&scheduler, input, &opts, Some(progress_hook(bar.clone())))?;
    if let Some(ref b) = bar {
        finish_bar(b);
    }

    let out = args
        .output
        .clone()
        .unwrap_or_else(|| PackagePaths::get().archive_filename().into());
    write_atomic(&out, &report.archive)
        .with_context(|| format!("write archive {}", out.display()))?;

    match report.outcome.summary() {
        Some(summary) => print_summary(summary, &out, args.json)?,
        None => info!("No items to generate; wrote manifest-only archive to {}", out.display()),
    }
    Ok(())
}

fn handle_preview(args: &PreviewArgs) -> Result<()> {
    let mut opts = setup_opts(&args.style);
    apply_input_args(&args.input, &mut opts);
    warn_low_contrast(&opts.render);

    let text = read_input(&args.input.input)?;
    let prepared = prepare_input(&text, &opts)?;
    let sampler = PreviewSampler::new(Arc::new(QrRenderer::new()));
    match sampler.request(&prepared.input.items, &opts.render) {
        PreviewOutcome::Rendered(n) => debug!("Rendered {} previews", n),
        other => debug!("Preview request: {:?}", other),
    }
    let thumbs = sampler.thumbnails();
    for (index, bytes) in &thumbs {
        let path = args.out.join(format!("preview-{}.png", index + 1));
        write_atomic(&path, bytes).with_context(|| format!("write {}", path.display()))?;
    }
    info!("Wrote {} previews to {}", thumbs.len(), args.out.display());
    sampler.clear();
    Ok(())
}

fn handle_single(args: &SingleArgs) -> Result<()> {
    let opts = setup_opts(&args.style);
    warn_low_contrast(&opts.render);

    let fields: BTreeMap<String, String> = args.fields.iter().cloned().collect();
    let data = QrData::from_fields(args.qr_type, &fields)?;
    let payload = data.to_payload().map_err(|errors| {
        let msgs: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::anyhow!("invalid {} fields: {}", args.qr_type, msgs.join("; "))
    })?;
    debug!("Payload: {:?}", payload);

    let (output, format) = args.target();
    let bytes = QrRenderer::new()
        .encode(&payload, &opts.render, format)
        .context("render QR code")?;
    write_atomic(&output, &bytes).with_context(|| format!("write {}", output.display()))?;
    info!("Wrote {} ({})", output.display(), format.extension());
    Ok(())
}

/// Dispatch the parsed command line.
pub fn handle_run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Bulk(args) => handle_bulk(args),
        Commands::Preview(args) => handle_preview(args),
        Commands::Single(args) => handle_single(args),
    }
}
