//! inkpress - EPUB to XTC converter

use std::process::ExitCode;

use clap::Parser;

use inkpress::{
    Align, BitDepth, FontSource, Orientation, Pipeline, TypographyConfig, read_epub,
};

#[derive(Parser)]
#[command(name = "inkpress")]
#[command(version, about = "EPUB to XTC converter for e-ink readers", long_about = None)]
#[command(after_help = "EXAMPLES:
    inkpress book.epub book.xtc                 Convert with defaults (480x800, 1-bit)
    inkpress book.epub book.xtc --font-size 26  Larger type
    inkpress book.epub book.xtc --font my.ttf   Custom typeface
    inkpress -i book.epub                       Show book structure")]
struct Cli {
    /// Input EPUB file
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output XTC file
    #[arg(value_name = "OUTPUT", required_unless_present = "info")]
    output: Option<String>,

    /// Show book structure without converting
    #[arg(short, long)]
    info: bool,

    /// Emit --info output as JSON
    #[arg(long, requires = "info")]
    json: bool,

    /// Suppress output messages
    #[arg(short, long)]
    quiet: bool,

    /// Font size in pixels
    #[arg(long, default_value_t = 22.0)]
    font_size: f32,

    /// Font weight (100-900)
    #[arg(long, default_value_t = 400)]
    font_weight: u16,

    /// Line height factor
    #[arg(long, default_value_t = 1.4)]
    line_height: f32,

    /// Side margin in pixels
    #[arg(long, default_value_t = 20)]
    margin: u32,

    /// Top padding in pixels
    #[arg(long, default_value_t = 15)]
    top_pad: u32,

    /// Bottom padding in pixels
    #[arg(long, default_value_t = 15)]
    bottom_pad: u32,

    /// Page orientation
    #[arg(long, value_parser = ["portrait", "landscape"], default_value = "portrait")]
    orientation: String,

    /// Text alignment
    #[arg(long, value_parser = ["justify", "left"], default_value = "justify")]
    align: String,

    /// Render at 2-bit grayscale instead of 1-bit
    #[arg(long)]
    gray2: bool,

    /// Custom TTF font file
    #[arg(long, value_name = "PATH")]
    font: Option<String>,

    /// Bold variant of the custom font
    #[arg(long, value_name = "PATH", requires = "font")]
    font_bold: Option<String>,

    /// Skip table-of-contents pages
    #[arg(long)]
    no_toc: bool,

    /// Hyphenation language override (BCP-47 tag, e.g. "de")
    #[arg(long, value_name = "TAG")]
    language: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = if cli.info {
        show_info(&cli)
    } else {
        convert(&cli)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(serde::Serialize)]
struct BookInfo<'a> {
    file: &'a str,
    title: &'a str,
    authors: &'a [String],
    language: &'a str,
    chapters: Vec<ChapterInfo<'a>>,
}

#[derive(serde::Serialize)]
struct ChapterInfo<'a> {
    id: &'a str,
    title: &'a str,
    blocks: usize,
    text_chars: usize,
    has_image: bool,
}

fn show_info(cli: &Cli) -> Result<(), String> {
    let book = read_epub(&cli.input).map_err(|e| e.to_string())?;

    if cli.json {
        let info = BookInfo {
            file: &cli.input,
            title: &book.metadata.title,
            authors: &book.metadata.authors,
            language: &book.metadata.language,
            chapters: book
                .chapters
                .iter()
                .map(|c| ChapterInfo {
                    id: &c.id,
                    title: &c.title,
                    blocks: c.blocks.len(),
                    text_chars: c.text_len(),
                    has_image: c.has_image(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&info).map_err(|e| e.to_string())?);
        return Ok(());
    }

    println!("File: {}", cli.input);
    println!("Title: {}", book.metadata.title);
    if !book.metadata.authors.is_empty() {
        println!("Authors: {}", book.metadata.authors.join(", "));
    }
    if !book.metadata.language.is_empty() {
        println!("Language: {}", book.metadata.language);
    }
    println!("Chapters: {}", book.chapters.len());
    for chapter in &book.chapters {
        println!(
            "  {} - {} ({} blocks, {} chars{})",
            chapter.id,
            chapter.title,
            chapter.blocks.len(),
            chapter.text_len(),
            if chapter.has_image() { ", images" } else { "" },
        );
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<TypographyConfig, String> {
    let font = match &cli.font {
        None => FontSource::Builtin,
        Some(path) => {
            let regular = std::fs::read(path).map_err(|e| format!("{path}: {e}"))?;
            let bold = match &cli.font_bold {
                Some(path) => Some(std::fs::read(path).map_err(|e| format!("{path}: {e}"))?),
                None => None,
            };
            FontSource::Ttf { regular, bold }
        }
    };

    Ok(TypographyConfig {
        font_size: cli.font_size,
        font_weight: cli.font_weight.clamp(100, 900),
        line_height: cli.line_height,
        margin: cli.margin,
        top_padding: cli.top_pad,
        bottom_padding: cli.bottom_pad,
        orientation: if cli.orientation == "landscape" {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        },
        align: if cli.align == "left" {
            Align::Left
        } else {
            Align::Justify
        },
        bit_depth: if cli.gray2 {
            BitDepth::Gray2
        } else {
            BitDepth::Mono1
        },
        generate_toc: !cli.no_toc,
        language_hint: cli.language.clone(),
        font,
        ..TypographyConfig::default()
    })
}

fn convert(cli: &Cli) -> Result<(), String> {
    let output = cli.output.as_deref().expect("output required");
    let config = build_config(cli)?;

    let book = read_epub(&cli.input).map_err(|e| e.to_string())?;
    let pipeline = Pipeline::run(&book, &config).map_err(|e| e.to_string())?;

    if !cli.quiet {
        for warning in pipeline.warnings() {
            eprintln!("warning: {warning}");
        }
    }

    let blob = pipeline.encode().map_err(|e| e.to_string())?;
    std::fs::write(output, &blob).map_err(|e| e.to_string())?;

    if !cli.quiet {
        println!(
            "{} -> {} ({} pages, {} bytes)",
            cli.input,
            output,
            pipeline.page_count(),
            blob.len()
        );
    }
    Ok(())
}
