//! Reflows a book into fixed-size pages.
//!
//! The engine threads a cursor through the content box, packing words
//! greedily. At line overflow it prefers a soft-hyphen break when one
//! lands within the configured tolerance of the line end, then a break at
//! the last space, then a forced mid-word break as the last resort.
//! Finished lines (except the last of a block) are justified by widening
//! word gaps; gaps never shrink below the natural space width. Images are
//! atomic: they either fit in the remaining vertical space or start a new
//! page, and are never taller than one content area.

use crate::book::{Block, BlockKind, Book, TextBlock};
use crate::config::{Align, ChapterBreak, ContentBox, TypographyConfig};
use crate::error::{Error, Result, Warning, WarningKind};
use crate::font::FontSet;
use crate::hyphen::SOFT_HYPHEN;
use crate::imaging::{FitMode, ImageProcessor, ProcessedImage};

/// One positioned word (or word fragment) on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub x: i32,
    /// Baseline y in page coordinates.
    pub baseline: i32,
    pub text: String,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
}

/// One placed image block.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFragment {
    pub x: i32,
    pub y: i32,
    pub image: ProcessedImage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(TextFragment),
    Image(ImageFragment),
}

/// A fully laid-out page. Belongs to exactly one chapter; the overlay
/// region is stamped later by the navigation builder.
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutPage {
    /// Ordinal of the owning chapter in `Book::chapters`.
    pub chapter: usize,
    pub fragments: Vec<Fragment>,
}

pub struct LayoutResult {
    pub pages: Vec<LaidOutPage>,
    /// First page index of each chapter, in chapter order. With
    /// continuous packing a chapter may start on a page owned by its
    /// predecessor; this map is what navigation targets.
    pub chapter_first_page: Vec<usize>,
    pub warnings: Vec<Warning>,
}

/// Lay out the whole book. The book is read-only; hyphenation has
/// already been applied to the text runs.
pub fn layout(book: &Book, config: &TypographyConfig, fonts: &FontSet) -> Result<LayoutResult> {
    let content = config.content_box()?;
    let mut engine = Engine::new(config, fonts, content);
    for (ordinal, chapter) in book.chapters.iter().enumerate() {
        engine.begin_chapter(ordinal);
        for block in &chapter.blocks {
            match block {
                Block::Text(text) => engine.push_text_block(text),
                Block::Image(img) => engine.push_image_block(&img.data, img.width, img.height),
            }
        }
        engine.end_chapter(&chapter.id)?;
    }
    Ok(engine.finish())
}

struct PendingWord {
    text: String,
    width: f32,
    bold: bool,
    italic: bool,
}

#[derive(Default)]
struct LineBuf {
    words: Vec<PendingWord>,
    /// Natural width: word widths plus one space per gap.
    width: f32,
    centered: bool,
}

impl LineBuf {
    fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

struct Engine<'a> {
    config: &'a TypographyConfig,
    fonts: &'a FontSet,
    content: ContentBox,
    line_advance: i32,
    ascent: i32,
    paragraph_gap: i32,

    pages: Vec<LaidOutPage>,
    chapter_first_page: Vec<usize>,
    warnings: Vec<Warning>,
    fragments: Vec<Fragment>,
    cursor_y: i32,
    chapter: usize,
    /// Pages already emitted for the current chapter.
    chapter_pages: usize,
    line: LineBuf,
}

impl<'a> Engine<'a> {
    fn new(config: &'a TypographyConfig, fonts: &'a FontSet, content: ContentBox) -> Self {
        let metrics = fonts.line_metrics(config.font_size);
        let line_advance = config.line_height_px() as i32;
        Self {
            config,
            fonts,
            content,
            line_advance,
            ascent: metrics.ascent.round() as i32,
            paragraph_gap: line_advance / 2,
            pages: Vec::new(),
            chapter_first_page: Vec::new(),
            warnings: Vec::new(),
            fragments: Vec::new(),
            cursor_y: content.y as i32,
            chapter: 0,
            chapter_pages: 0,
            line: LineBuf::default(),
        }
    }

    fn content_bottom(&self) -> i32 {
        (self.content.y + self.content.height) as i32
    }

    fn max_line_width(&self) -> f32 {
        self.content.width as f32
    }

    fn begin_chapter(&mut self, ordinal: usize) {
        if self.config.chapter_break == ChapterBreak::NewPage && !self.fragments.is_empty() {
            self.close_page();
        }
        if self.fragments.is_empty() {
            self.chapter = ordinal;
        }
        self.chapter_first_page.push(self.pages.len());
        self.chapter_pages = 0;
    }

    fn end_chapter(&mut self, chapter_id: &str) -> Result<()> {
        if self.content.height < self.line_advance as u32 {
            return Err(Error::LayoutOverflow {
                chapter: chapter_id.to_string(),
                detail: format!(
                    "content area of {} px cannot hold a {} px line",
                    self.content.height, self.line_advance
                ),
            });
        }
        self.flush_line(true);
        match self.config.chapter_break {
            ChapterBreak::NewPage => {
                // Empty chapters still get their own (empty) page.
                if !self.fragments.is_empty() || self.chapter_pages == 0 {
                    self.close_page();
                }
            }
            ChapterBreak::Continuous => {
                if self.chapter_pages == 0 && self.fragments.is_empty() {
                    self.close_page();
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> LayoutResult {
        self.flush_line(true);
        if !self.fragments.is_empty() {
            self.close_page();
        }
        LayoutResult {
            pages: self.pages,
            chapter_first_page: self.chapter_first_page,
            warnings: self.warnings,
        }
    }

    fn close_page(&mut self) {
        self.pages.push(LaidOutPage {
            chapter: self.chapter,
            fragments: std::mem::take(&mut self.fragments),
        });
        self.chapter_pages += 1;
        self.cursor_y = self.content.y as i32;
    }

    // --- text -----------------------------------------------------------

    fn push_text_block(&mut self, block: &TextBlock) {
        let heading = matches!(block.kind, BlockKind::Heading(_));
        if heading {
            self.advance_gap(self.paragraph_gap);
        }
        self.line.centered = heading;
        let base_bold = self.config.font_weight > 500;
        let heading_bold = heading && self.config.heading_weight() > 500;
        for run in &block.runs {
            let bold = run.bold || base_bold || heading_bold;
            for word in run.text.split_whitespace() {
                self.push_word(word, bold, run.italic);
            }
        }
        self.flush_line(true);
        self.advance_gap(self.paragraph_gap);
    }

    fn measure(&self, text: &str, bold: bool) -> f32 {
        self.fonts.measure(text, self.config.font_size, bold)
    }

    fn space_width(&self, bold: bool) -> f32 {
        self.fonts.space_width(self.config.font_size, bold)
    }

    fn push_word(&mut self, word: &str, bold: bool, italic: bool) {
        if word.is_empty() {
            return;
        }
        let visible: String = word.chars().filter(|&c| c != SOFT_HYPHEN).collect();
        let word_width = self.measure(&visible, bold);
        let space = if self.line.is_empty() {
            0.0
        } else {
            self.space_width(bold)
        };

        if self.line.width + space + word_width <= self.max_line_width() {
            self.append_word(visible, word_width, bold, italic, space);
            return;
        }

        // Overflow: a soft-hyphen break within tolerance beats wrapping
        // the whole word to the next line.
        if word.contains(SOFT_HYPHEN)
            && self.try_hyphen_break(word, bold, italic, space, self.config.hyphen_tolerance_px())
        {
            return;
        }

        if !self.line.is_empty() {
            // Break at the last space: wrap the whole word.
            self.flush_line(false);
            self.push_word(word, bold, italic);
            return;
        }

        // Alone on an empty line and still too wide. Any fitting hyphen
        // prefix is acceptable now; a forced mid-word break is last.
        if word.contains(SOFT_HYPHEN)
            && self.try_hyphen_break(word, bold, italic, 0.0, f32::INFINITY)
        {
            return;
        }
        self.force_break(&visible, bold, italic);
    }

    fn append_word(&mut self, text: String, width: f32, bold: bool, italic: bool, space: f32) {
        self.line.width += space + width;
        self.line.words.push(PendingWord {
            text,
            width,
            bold,
            italic,
        });
    }

    /// Break `word` at its best soft hyphen: the longest prefix that fits
    /// the line. Accepted only when the broken line ends within
    /// `tolerance` px of the right edge.
    fn try_hyphen_break(
        &mut self,
        word: &str,
        bold: bool,
        italic: bool,
        space: f32,
        tolerance: f32,
    ) -> bool {
        let parts: Vec<&str> = word.split(SOFT_HYPHEN).collect();
        if parts.len() < 2 {
            return false;
        }
        let max_width = self.max_line_width();
        let mut best: Option<(String, String, f32)> = None;
        for i in 1..parts.len() {
            let candidate = format!("{}-", parts[..i].concat());
            let width = self.measure(&candidate, bold);
            if self.line.width + space + width <= max_width {
                let remainder = parts[i..].join("\u{00AD}");
                best = Some((candidate, remainder, width));
            } else {
                break;
            }
        }
        let Some((candidate, remainder, width)) = best else {
            return false;
        };
        let slack = max_width - (self.line.width + space + width);
        if slack > tolerance {
            return false;
        }
        self.append_word(candidate, width, bold, italic, space);
        self.flush_line(false);
        self.push_word(&remainder, bold, italic);
        true
    }

    /// Mid-word break for a word wider than the whole line: emit maximal
    /// fitting pieces, each alone on its line. Nothing is dropped; a
    /// single glyph is always placed even if it overflows a degenerate
    /// content box.
    fn force_break(&mut self, visible: &str, bold: bool, italic: bool) {
        let mut rest = visible;
        while !rest.is_empty() {
            let mut fit_end = 0;
            for (offset, ch) in rest.char_indices() {
                let next = offset + ch.len_utf8();
                if self.measure(&rest[..next], bold) > self.max_line_width() {
                    break;
                }
                fit_end = next;
            }
            let take = if fit_end == 0 {
                rest.chars().next().map(|c| c.len_utf8()).unwrap_or(rest.len())
            } else {
                fit_end
            };
            let piece = &rest[..take];
            let width = self.measure(piece, bold);
            self.append_word(piece.to_string(), width, bold, italic, 0.0);
            rest = &rest[take..];
            if !rest.is_empty() {
                self.flush_line(false);
            }
        }
    }

    /// Position the buffered words and emit them as fragments.
    fn flush_line(&mut self, last_in_block: bool) {
        if self.line.is_empty() {
            return;
        }
        if self.cursor_y + self.line_advance > self.content_bottom() {
            self.close_page();
        }
        let line = std::mem::take(&mut self.line);
        let gaps = line.words.len().saturating_sub(1);

        let (start_x, extra_per_gap) = if line.centered {
            let slack = (self.max_line_width() - line.width).max(0.0);
            (self.content.x as f32 + slack / 2.0, 0.0)
        } else if self.config.align == Align::Justify && !last_in_block && gaps > 0 {
            let extra = (self.max_line_width() - line.width).max(0.0);
            (self.content.x as f32, extra / gaps as f32)
        } else {
            (self.content.x as f32, 0.0)
        };

        let baseline = self.cursor_y + self.ascent;
        let mut pen = start_x;
        for (i, word) in line.words.iter().enumerate() {
            self.fragments.push(Fragment::Text(TextFragment {
                x: pen.round() as i32,
                baseline,
                text: word.text.clone(),
                size: self.config.font_size,
                bold: word.bold,
                italic: word.italic,
            }));
            pen += word.width;
            if i < gaps {
                pen += self.space_width(word.bold) + extra_per_gap;
            }
        }
        self.cursor_y += self.line_advance;
        // Continuation lines of a centered block stay centered.
        self.line.centered = line.centered;
    }

    /// Vertical whitespace between blocks. May push the cursor past the
    /// bottom; the next line or image triggers the actual page break.
    fn advance_gap(&mut self, gap: i32) {
        let at_page_top = self.fragments.is_empty() && self.cursor_y == self.content.y as i32;
        if gap <= 0 || at_page_top {
            return;
        }
        self.cursor_y += gap;
    }

    // --- images ---------------------------------------------------------

    fn push_image_block(&mut self, data: &[u8], intrinsic_w: u32, intrinsic_h: u32) {
        self.flush_line(true);
        let processor = ImageProcessor::new(self.config.bit_depth);
        let image =
            match processor.process(data, self.content.width, self.content.height, FitMode::Contain) {
                Ok(image) => image,
                Err(detail) => {
                    self.warnings.push(Warning::new(
                        WarningKind::BadImage,
                        format!("chapter {}: {detail}", self.chapter),
                    ));
                    let (w, h) = placeholder_size(intrinsic_w, intrinsic_h, &self.content);
                    processor.placeholder(w, h)
                }
            };

        let height = image.height as i32;
        let remaining = self.content_bottom() - self.cursor_y;
        if height > remaining && !self.fragments.is_empty() {
            self.close_page();
        }
        let x = self.content.x as i32 + (self.content.width as i32 - image.width as i32) / 2;
        self.fragments.push(Fragment::Image(ImageFragment {
            x,
            y: self.cursor_y,
            image,
        }));
        self.cursor_y += height;
        self.advance_gap(self.paragraph_gap);
    }
}

fn placeholder_size(intrinsic_w: u32, intrinsic_h: u32, content: &ContentBox) -> (u32, u32) {
    if intrinsic_w == 0 || intrinsic_h == 0 {
        return (content.width, (content.height / 4).max(1));
    }
    let scale = (content.width as f64 / intrinsic_w as f64)
        .min(content.height as f64 / intrinsic_h as f64)
        .min(1.0);
    (
        ((intrinsic_w as f64 * scale) as u32).max(1),
        ((intrinsic_h as f64 * scale) as u32).max(1),
    )
}
