//! Render text into PNG cards.
//!
//! Reads INPUT (or stdin), lays it out with the chosen style and writes
//! `text-card-N.png` files into the output directory.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use textcard::{
    ASPECT_RATIOS, AspectRatio, Color, DateStamp, FONT_CHOICES, GRADIENT_BASES, GradientBase,
    LineHeightMode, PRESET_TEMPLATES, StyleConfig, StyleTemplate, TextCard, clamp_font_size,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "textcard", version, about = "Render text into PNG cards")]
struct Cli {
    /// Text file to render; stdin when omitted
    input: Option<PathBuf>,

    /// Output directory for text-card-N.png files
    #[arg(short = 'o', long = "out", value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Color template (see --list-templates)
    #[arg(long, value_name = "NAME")]
    template: Option<String>,

    /// Gradient base (see --list-templates)
    #[arg(long, value_name = "NAME")]
    base: Option<String>,

    /// Aspect ratio as W:H
    #[arg(long, value_name = "W:H")]
    ratio: Option<AspectRatio>,

    /// Font family; also the first system face tried as fallback
    #[arg(long, value_name = "FAMILY")]
    font: Option<String>,

    /// Base font size, clamped to 18..=72
    #[arg(long, value_name = "N")]
    font_size: Option<f32>,

    #[arg(long, value_name = "HEX")]
    text_color: Option<String>,

    #[arg(long = "background", value_name = "HEX")]
    background_color: Option<String>,

    #[arg(long, value_name = "F")]
    line_spacing: Option<f32>,

    /// Give every line the body line height, headings included
    #[arg(long, action = ArgAction::SetTrue)]
    uniform_line_height: bool,

    /// Render only the first card and drop the rest of the text
    #[arg(long, action = ArgAction::SetTrue)]
    no_split: bool,

    /// Card width in pixels
    #[arg(long, value_name = "PX")]
    width: Option<f32>,

    /// Font file to register (repeatable)
    #[arg(long = "font-file", value_name = "FILE")]
    font_files: Vec<PathBuf>,

    /// Font directory to register (repeatable)
    #[arg(long = "font-dir", value_name = "DIR")]
    font_dirs: Vec<PathBuf>,

    /// Do not load an installed font for unregistered families
    #[arg(long, action = ArgAction::SetTrue)]
    no_system_fonts: bool,

    /// Fixed date stamp, YYYY-MM-DD
    #[arg(long, value_name = "DATE", conflicts_with = "no_date")]
    date: Option<NaiveDate>,

    #[arg(long, action = ArgAction::SetTrue)]
    no_date: bool,

    /// Footer watermark; an empty string hides it
    #[arg(long, value_name = "TEXT")]
    watermark: Option<String>,

    /// JSON-lines timing log
    #[arg(long, value_name = "FILE")]
    perf_log: Option<PathBuf>,

    /// Print templates, gradient bases, ratios and fonts, then exit
    #[arg(long, action = ArgAction::SetTrue)]
    list_templates: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("textcard=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.list_templates {
        list_templates();
        return Ok(());
    }

    let style = build_style(&cli)?;
    let text = read_input(cli.input.as_ref())?;

    let mut builder = TextCard::builder().date_stamp(if cli.no_date {
        DateStamp::Hidden
    } else if let Some(date) = cli.date {
        DateStamp::Fixed(date)
    } else {
        DateStamp::Today
    });
    for dir in &cli.font_dirs {
        builder = builder.register_font_dir(dir);
    }
    for file in &cli.font_files {
        builder = builder.register_font_file(file);
    }
    builder = builder.system_fallback(!cli.no_system_fonts);
    if let Some(family) = &cli.font {
        builder = builder.fallback_family(family);
    }
    if let Some(width) = cli.width {
        builder = builder.base_width(width);
    }
    if let Some(watermark) = &cli.watermark {
        builder = builder.watermark_text(watermark);
    }
    if let Some(path) = &cli.perf_log {
        builder = builder.perf_log(path);
    }
    let engine = builder.build().context("failed to configure renderer")?;

    let coverage = engine.glyph_coverage(&text, &style);
    for missing in coverage.missing() {
        tracing::warn!(
            ch = %missing.ch,
            count = missing.count,
            fonts = ?missing.fonts_tried,
            "glyph missing from font"
        );
    }

    let batch = engine
        .generate(&text, &style, !cli.no_split)
        .context("failed to render cards")?;

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("failed to create {}", cli.out_dir.display()))?;
    for card in &batch.cards {
        let path = cli.out_dir.join(card.file_name());
        fs::write(&path, &card.png)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!(
            "{} {}x{} words={} lines={} sha256={}",
            path.display(),
            card.width,
            card.height,
            card.word_count,
            card.line_count,
            card.fingerprint()
        );
    }
    for failure in &batch.failures {
        eprintln!("card {} failed: {}", failure.index + 1, failure.error);
    }
    if batch.truncated {
        eprintln!(
            "warning: text did not fit one card; {} chars dropped (omit --no-split to keep them)",
            batch.leftover.chars().count()
        );
    }
    println!(
        "{} card(s), {} words, layout {:.1}ms, render {:.1}ms",
        batch.cards.len(),
        batch.total_word_count(),
        batch.metrics.layout_ms,
        batch.metrics.total_render_ms
    );

    if !batch.failures.is_empty() {
        bail!("{} card(s) failed to render", batch.failures.len());
    }
    Ok(())
}

fn build_style(cli: &Cli) -> Result<StyleConfig> {
    let mut style = StyleConfig::default();
    if let Some(name) = &cli.template {
        let Some(template) = StyleTemplate::by_name(name) else {
            bail!("unknown template '{name}' (see --list-templates)");
        };
        style = template.apply(&style);
    }
    if let Some(name) = &cli.base {
        let Some(base) = GradientBase::by_name(name) else {
            bail!("unknown gradient base '{name}' (see --list-templates)");
        };
        style = base.apply(&style);
    }
    if let Some(ratio) = cli.ratio {
        style = style.with_aspect_ratio(ratio);
    }
    if let Some(family) = &cli.font {
        style = style.with_font_family(family.clone());
    }
    if let Some(size) = cli.font_size {
        style = style.with_font_size(clamp_font_size(size));
    }
    if let Some(hex) = &cli.text_color {
        style = style.with_text_color(Color::from_hex(hex)?);
    }
    if let Some(hex) = &cli.background_color {
        style = style.with_background_color(Color::from_hex(hex)?);
    }
    if let Some(spacing) = cli.line_spacing {
        style = style.with_line_spacing(spacing);
    }
    if cli.uniform_line_height {
        style = style.with_line_height_mode(LineHeightMode::Uniform);
    }
    style.validate()?;
    Ok(style)
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

fn list_templates() {
    println!("templates:");
    for template in &PRESET_TEMPLATES {
        println!(
            "  {:<14} background {} text {}",
            template.name,
            template.background_color.to_hex(),
            template.text_color.to_hex()
        );
    }
    println!("gradient bases:");
    for base in &GRADIENT_BASES {
        let stops: Vec<String> = base.colors.iter().map(|color| color.to_hex()).collect();
        println!("  {:<18} {}", base.name, stops.join(" "));
    }
    println!("aspect ratios:");
    for (name, _) in &ASPECT_RATIOS {
        println!("  {name}");
    }
    println!("fonts:");
    for choice in &FONT_CHOICES {
        println!("  {:<22} {}", choice.family, choice.label);
    }
}
