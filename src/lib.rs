//! # inkpress
//!
//! Converts EPUB e-books into the XTC binary container consumed by
//! e-ink reader devices: fixed-size, pre-rasterized pages with a
//! table of contents and a per-page progress bar baked in.
//!
//! ## Pipeline
//!
//! EPUB parsing produces a [`Book`] (chapters of text and image blocks).
//! The [`Pipeline`] hyphenates the text, reflows it into pages under a
//! [`TypographyConfig`], rasterizes pages on demand (Floyd-Steinberg
//! dithering for images, threshold rendering for text at 1-bit depth),
//! derives TOC pages and progress overlays from chapter visibility, and
//! serializes everything into the XTC container.
//!
//! ## Quick Start
//!
//! ```no_run
//! use inkpress::{read_epub, Pipeline, TypographyConfig};
//!
//! let book = read_epub("input.epub")?;
//! let pipeline = Pipeline::run(&book, &TypographyConfig::default())?;
//! std::fs::write("output.xtc", pipeline.encode()?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Previewing and visibility
//!
//! Pages are rendered independently, so a UI can preview any page
//! without exporting the container:
//!
//! ```no_run
//! # use inkpress::{read_epub, Pipeline, TypographyConfig};
//! # let book = read_epub("input.epub")?;
//! let mut pipeline = Pipeline::run(&book, &TypographyConfig::default())?;
//! let first = pipeline.render_page(0)?;
//! assert_eq!(first.width, 480);
//!
//! // Hiding a chapter re-derives navigation only; no re-layout happens
//! // and no pages are dropped.
//! pipeline.set_chapter_visibility("ch2", false);
//! # Ok::<(), inkpress::Error>(())
//! ```

pub mod book;
pub mod config;
pub mod epub;
pub mod error;
pub mod font;
pub mod hyphen;
pub mod imaging;
pub mod layout;
pub mod nav;
pub mod pipeline;
pub mod raster;
pub mod xtc;

pub use book::{Block, BlockKind, Book, Chapter, ImageBlock, Metadata, TextBlock, TextRun};
pub use config::{Align, BitDepth, ChapterBreak, FontSource, Orientation, TypographyConfig};
pub use epub::{read_epub, read_epub_from_reader};
pub use error::{Error, Result, Warning, WarningKind};
pub use pipeline::Pipeline;
pub use raster::PageBitmap;
pub use xtc::{ContainerNav, decode, encode};
