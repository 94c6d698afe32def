//! The conversion pipeline: hyphenate, lay out, navigate, rasterize,
//! encode.
//!
//! [`Pipeline::run`] takes immutable snapshots of the book and the
//! typography config and performs the one inherently sequential step,
//! layout, exactly once. Everything afterwards is derived: page bitmaps
//! are rendered on demand from the laid-out pages, and navigation state
//! is a pure function of the chapter index and the current visibility
//! flags, so toggling a chapter never re-runs layout.

use crate::book::{Block, Book, Chapter};
use crate::config::{FontSource, Orientation, TypographyConfig};
use crate::error::{Error, Result, Warning, WarningKind};
use crate::font::FontSet;
use crate::hyphen::Hyphenator;
use crate::layout::{self, LaidOutPage};
use crate::nav::{ChapterIndex, NavigationIndex, render_toc_page, stamp_overlay};
use crate::raster::{self, PageBitmap};
use crate::xtc::{self, ContainerNav, META_FLAG_HIDDEN, META_FLAG_TOC, NO_CHAPTER, PageMeta, TocRecord};

/// A laid-out book ready for preview rendering and container export.
pub struct Pipeline {
    config: TypographyConfig,
    fonts: FontSet,
    pages: Vec<LaidOutPage>,
    index: ChapterIndex,
    visible: Vec<bool>,
    nav: NavigationIndex,
    warnings: Vec<Warning>,
    source_digest: u64,
}

impl Pipeline {
    /// Lay out `book` under `config`.
    ///
    /// The book stays owned by the caller and is not modified; chapter
    /// visibility is snapshotted and can be toggled later with
    /// [`set_chapter_visibility`](Self::set_chapter_visibility).
    /// Recoverable degradations (font fallback, undecodable images,
    /// missing hyphenation dictionary) are collected as warnings.
    pub fn run(book: &Book, config: &TypographyConfig) -> Result<Self> {
        config.content_box()?;
        let mut warnings = Vec::new();

        let fonts = match &config.font {
            FontSource::Builtin => FontSet::builtin(),
            FontSource::Ttf { regular, bold } => {
                match FontSet::from_ttf(regular, bold.as_deref()) {
                    Ok(fonts) => fonts,
                    Err(detail) => {
                        warnings.push(Warning::new(WarningKind::BadFont, detail));
                        FontSet::builtin()
                    }
                }
            }
        };

        let language = match &config.language_hint {
            Some(hint) => hint.as_str(),
            None if book.metadata.language.is_empty() => "en",
            None => &book.metadata.language,
        };
        let hyphenator = Hyphenator::for_language(language);
        if !hyphenator.is_available() {
            warnings.push(Warning::new(
                WarningKind::NoHyphenDict,
                format!("no dictionary for language '{language}'"),
            ));
        }
        let hyphenated = hyphenate_book(book, &hyphenator);

        let layout_result = layout::layout(&hyphenated, config, &fonts)?;
        for warning in &layout_result.warnings {
            log::warn!("{warning}");
        }
        warnings.extend(layout_result.warnings.iter().cloned());

        let index = ChapterIndex::build(book, &layout_result);
        let visible: Vec<bool> = book.chapters.iter().map(|c| c.visible).collect();
        let nav = NavigationIndex::derive(&index, &visible, config);

        let digest = book.content_digest();
        let source_digest = u64::from_le_bytes(digest[..8].try_into().expect("sha1 is 20 bytes"));

        Ok(Self {
            config: config.clone(),
            fonts,
            pages: layout_result.pages,
            index,
            visible,
            nav,
            warnings,
            source_digest,
        })
    }

    /// Total pages, TOC pages included.
    pub fn page_count(&self) -> usize {
        self.nav.total_pages()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn navigation(&self) -> &NavigationIndex {
        &self.nav
    }

    pub fn source_digest(&self) -> u64 {
        self.source_digest
    }

    /// Render one page (TOC or content) at the device bit depth, with the
    /// progress overlay stamped. Random access; no other page is touched.
    pub fn render_page(&self, page: usize) -> Result<PageBitmap> {
        if page >= self.page_count() {
            return Err(Error::PageOutOfRange(page));
        }
        let mut canvas = match page.checked_sub(self.nav.toc_page_count) {
            None => render_toc_page(&self.nav, page, &self.config, &self.fonts),
            Some(content) => raster::rasterize(&self.pages[content], &self.config, &self.fonts),
        };
        stamp_overlay(&mut canvas, &self.nav, &self.index, page, &self.config, &self.fonts);
        Ok(raster::quantize(&canvas, self.config.bit_depth))
    }

    /// Toggle a chapter in or out of the TOC and progress accounting.
    ///
    /// Pages are neither dropped nor reordered; only navigation state is
    /// re-derived. Returns false for an unknown chapter id.
    pub fn set_chapter_visibility(&mut self, chapter_id: &str, visible: bool) -> bool {
        let Some(ordinal) = self.index.ordinal_of_id(chapter_id) else {
            return false;
        };
        self.visible[ordinal] = visible;
        self.nav = NavigationIndex::derive(&self.index, &self.visible, &self.config);
        true
    }

    /// Serialize the whole book into an XTC container.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let total = self.page_count();
        let mut bitmaps = Vec::with_capacity(total);
        let mut page_meta = Vec::with_capacity(total);

        for page in 0..total {
            bitmaps.push(self.render_page(page)?);
            page_meta.push(self.page_meta(page));
        }

        let toc = self
            .nav
            .entries
            .iter()
            .map(|entry| TocRecord {
                chapter: entry.chapter as u32,
                target_page: entry.target_page as u16,
                id: self
                    .index
                    .chapter_id(entry.chapter)
                    .unwrap_or_default()
                    .to_string(),
                title: entry.title.clone(),
            })
            .collect();

        let nav = ContainerNav {
            page_meta,
            toc,
            toc_page_count: self.nav.toc_page_count as u16,
            orientation: match self.config.orientation {
                Orientation::Portrait => 0,
                Orientation::Landscape => 1,
            },
            source_digest: self.source_digest,
        };
        xtc::encode(&bitmaps, &nav)
    }

    fn page_meta(&self, page: usize) -> PageMeta {
        match page.checked_sub(self.nav.toc_page_count) {
            None => PageMeta {
                chapter: NO_CHAPTER,
                progress_permille: 0,
                flags: META_FLAG_TOC,
            },
            Some(content) => {
                let nav_page = self.nav.pages[content];
                let permille = if self.nav.visible_total == 0 {
                    0
                } else {
                    (nav_page.numerator as u64 * 1000 / self.nav.visible_total as u64).min(1000)
                        as u16
                };
                PageMeta {
                    chapter: nav_page.chapter as u32,
                    progress_permille: permille,
                    flags: if nav_page.hidden { META_FLAG_HIDDEN } else { 0 },
                }
            }
        }
    }
}

/// Working copy of the book with soft hyphens inserted. The caller's
/// book is left untouched.
fn hyphenate_book(book: &Book, hyphenator: &Hyphenator) -> Book {
    if !hyphenator.is_available() {
        return book.clone();
    }
    Book {
        metadata: book.metadata.clone(),
        chapters: book
            .chapters
            .iter()
            .map(|chapter| Chapter {
                id: chapter.id.clone(),
                title: chapter.title.clone(),
                visible: chapter.visible,
                blocks: chapter
                    .blocks
                    .iter()
                    .map(|block| match block {
                        Block::Text(text) => Block::Text(hyphenator.hyphenate_block(text)),
                        Block::Image(img) => Block::Image(img.clone()),
                    })
                    .collect(),
            })
            .collect(),
    }
}
