//! Navigation: table-of-contents pages and the progress overlay.
//!
//! Page-to-chapter ownership is recorded once at layout time in a
//! [`ChapterIndex`]. Everything navigation-related — TOC entries, TOC
//! page count, per-page progress fractions — is re-derived from that
//! index plus the current visibility flags by [`NavigationIndex::derive`],
//! a pure function. Hiding or unhiding a chapter therefore never touches
//! layout: pages keep their position and numbering, they only drop out of
//! the TOC and the progress denominator.

use crate::book::Book;
use crate::config::TypographyConfig;
use crate::font::FontSet;
use crate::layout::LayoutResult;
use crate::raster::Canvas;

/// Progress bar geometry (page-bottom overlay).
const BAR_INSET: i32 = 10;
const BAR_HEIGHT: i32 = 4;
const BAR_FROM_BOTTOM: i32 = 20;
const FOOTER_FROM_BOTTOM: i32 = 45;
const FOOTER_FONT_SIZE: f32 = 16.0;
const FOOTER_TITLE_X: i32 = 100;
const FOOTER_TITLE_MAX_CHARS: usize = 35;

/// TOC page geometry.
const TOC_SIDE_MARGIN: i32 = 40;
const TOC_COLUMN_GAP: i32 = 20;
const TOC_HEADER_SPACE: u32 = 100;

#[derive(Debug, Clone)]
struct ChapterMeta {
    id: String,
    title: String,
}

/// Stable page-to-chapter ownership, built once per layout.
#[derive(Debug, Clone)]
pub struct ChapterIndex {
    chapters: Vec<ChapterMeta>,
    /// Content page index -> owning chapter ordinal.
    page_chapter: Vec<usize>,
    /// Chapter ordinal -> first content page index.
    chapter_first_page: Vec<usize>,
}

impl ChapterIndex {
    pub fn build(book: &Book, layout: &LayoutResult) -> Self {
        Self {
            chapters: book
                .chapters
                .iter()
                .map(|c| ChapterMeta {
                    id: c.id.clone(),
                    title: c.title.clone(),
                })
                .collect(),
            page_chapter: layout.pages.iter().map(|p| p.chapter).collect(),
            chapter_first_page: layout.chapter_first_page.clone(),
        }
    }

    pub fn content_page_count(&self) -> usize {
        self.page_chapter.len()
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn chapter_of_page(&self, content_page: usize) -> Option<usize> {
        self.page_chapter.get(content_page).copied()
    }

    pub fn chapter_id(&self, ordinal: usize) -> Option<&str> {
        self.chapters.get(ordinal).map(|c| c.id.as_str())
    }

    pub fn chapter_title(&self, ordinal: usize) -> Option<&str> {
        self.chapters.get(ordinal).map(|c| c.title.as_str())
    }

    pub fn ordinal_of_id(&self, id: &str) -> Option<usize> {
        self.chapters.iter().position(|c| c.id == id)
    }
}

/// One visible chapter's TOC row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub chapter: usize,
    pub title: String,
    /// 0-based global page index (TOC pages included).
    pub target_page: usize,
}

/// Per-content-page progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNav {
    pub chapter: usize,
    pub hidden: bool,
    /// 1-based position among visible pages, or the count of visible
    /// pages passed so far for pages of hidden chapters.
    pub numerator: u32,
}

/// Everything derived from (ChapterIndex, visibility flags).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationIndex {
    pub entries: Vec<TocEntry>,
    pub toc_page_count: usize,
    pub pages: Vec<PageNav>,
    /// Progress denominator: total pages of visible chapters.
    pub visible_total: u32,
}

impl NavigationIndex {
    /// Derive navigation state. Pure: same index + flags + config always
    /// produce the same result, with no re-layout.
    pub fn derive(index: &ChapterIndex, visible: &[bool], config: &TypographyConfig) -> Self {
        let is_visible =
            |ordinal: usize| -> bool { visible.get(ordinal).copied().unwrap_or(true) };

        let mut pages = Vec::with_capacity(index.content_page_count());
        let mut seen_visible = 0u32;
        for &chapter in &index.page_chapter {
            let hidden = !is_visible(chapter);
            if !hidden {
                seen_visible += 1;
            }
            pages.push(PageNav {
                chapter,
                hidden,
                numerator: seen_visible,
            });
        }
        let visible_total = seen_visible;

        let visible_chapters: Vec<usize> =
            (0..index.chapter_count()).filter(|&c| is_visible(c)).collect();
        let toc_page_count = if config.generate_toc && !visible_chapters.is_empty() {
            visible_chapters.len().div_ceil(toc_rows_per_page(config))
        } else {
            0
        };

        let entries = visible_chapters
            .into_iter()
            .map(|chapter| TocEntry {
                chapter,
                title: index.chapter_title(chapter).unwrap_or("").to_string(),
                target_page: index.chapter_first_page[chapter] + toc_page_count,
            })
            .collect();

        Self {
            entries,
            toc_page_count,
            pages,
            visible_total,
        }
    }

    /// Total pages including TOC pages.
    pub fn total_pages(&self) -> usize {
        self.toc_page_count + self.pages.len()
    }

    /// Progress numerator for a global page index (0 on TOC pages).
    pub fn numerator(&self, global_page: usize) -> u32 {
        global_page
            .checked_sub(self.toc_page_count)
            .and_then(|content| self.pages.get(content))
            .map(|p| p.numerator)
            .unwrap_or(0)
    }

    /// Progress fill fraction for a global page index.
    pub fn fraction(&self, global_page: usize) -> f32 {
        if self.visible_total == 0 {
            return 0.0;
        }
        self.numerator(global_page) as f32 / self.visible_total as f32
    }
}

/// TOC rows that fit one page, derived from the font size and the page
/// height left over under the header block.
pub fn toc_rows_per_page(config: &TypographyConfig) -> usize {
    let row_height = (config.font_size * config.line_height * 1.2).max(1.0) as u32;
    let header_space = TOC_HEADER_SPACE + config.top_padding;
    let (_, page_height) = config.page_size();
    let available = page_height.saturating_sub(config.bottom_padding + header_space);
    (available / row_height).max(1) as usize
}

/// Render one TOC page (by index within the TOC block) onto a canvas.
pub fn render_toc_page(
    nav: &NavigationIndex,
    toc_page: usize,
    config: &TypographyConfig,
    fonts: &FontSet,
) -> Canvas {
    let (page_width, page_height) = config.page_size();
    let mut canvas = Canvas::new(page_width, page_height);

    let main_size = config.font_size;
    let header_size = config.font_size * 1.2;
    let header_bold = config.font_weight > 400;
    let row_bold = config.font_weight > 500;
    let row_height = (config.font_size * config.line_height * 1.2).max(1.0) as i32;

    let header_text = "TABLE OF CONTENTS";
    let header_width = fonts.measure(header_text, header_size, header_bold);
    let header_y = 40 + config.top_padding as i32;
    canvas.draw_text(
        fonts,
        header_text,
        ((page_width as f32 - header_width) / 2.0) as i32,
        header_y + header_size as i32,
        header_size,
        header_bold,
    );

    let rule_y = header_y + (header_size * 1.5) as i32;
    canvas.hline(TOC_SIDE_MARGIN, page_width as i32 - TOC_SIDE_MARGIN, rule_y, 0);

    let per_page = toc_rows_per_page(config);
    let start = toc_page * per_page;
    let chunk = nav.entries.iter().skip(start).take(per_page);

    let mut y = rule_y + (main_size * 1.2) as i32;
    for entry in chunk {
        let baseline = y + main_size as i32;
        let page_label = (entry.target_page + 1).to_string();
        let label_width = fonts.measure(&page_label, main_size, row_bold);
        let max_title_width =
            page_width as f32 - (2 * TOC_SIDE_MARGIN + TOC_COLUMN_GAP) as f32 - label_width;

        let title = truncate_to_width(fonts, &entry.title, main_size, row_bold, max_title_width);
        canvas.draw_text(fonts, &title, TOC_SIDE_MARGIN, baseline, main_size, row_bold);

        // Dot leaders between the title and the page number.
        let title_end = TOC_SIDE_MARGIN as f32 + fonts.measure(&title, main_size, row_bold) + 5.0;
        let label_x = page_width as f32 - TOC_SIDE_MARGIN as f32 - label_width;
        let dots_end = label_x - 10.0;
        let dot_width = fonts.advance('.', main_size, false);
        if dots_end > title_end && dot_width > 0.0 {
            let count = ((dots_end - title_end) / dot_width) as usize;
            let dots = ".".repeat(count);
            canvas.draw_text(fonts, &dots, title_end as i32, baseline, main_size, false);
        }

        canvas.draw_text(fonts, &page_label, label_x as i32, baseline, main_size, row_bold);
        y += row_height;
    }

    canvas
}

/// Stamp the shared overlay region (progress bar + footer) onto a page
/// canvas.
pub fn stamp_overlay(
    canvas: &mut Canvas,
    nav: &NavigationIndex,
    index: &ChapterIndex,
    global_page: usize,
    config: &TypographyConfig,
    fonts: &FontSet,
) {
    let (page_width, page_height) = config.page_size();
    let width = page_width as i32;
    let total = nav.total_pages().max(1);

    let bar_top = page_height as i32 - BAR_FROM_BOTTOM;
    let bar_span = width - 2 * BAR_INSET;

    // Bar trough: clear with a black outline.
    canvas.fill_rect(BAR_INSET, bar_top, bar_span, BAR_HEIGHT, 255);
    canvas.stroke_rect(BAR_INSET, bar_top, bar_span, BAR_HEIGHT, 0);

    // Tick mark at each visible chapter start.
    for entry in &nav.entries {
        let mx = BAR_INSET + (entry.target_page as i64 * bar_span as i64 / total as i64) as i32;
        canvas.vline(mx, bar_top - 4, bar_top, 0);
    }

    // Fill: fraction of visible content completed.
    let fill = (nav.fraction(global_page) * bar_span as f32) as i32;
    if fill > 0 {
        canvas.fill_rect(BAR_INSET, bar_top, fill.min(bar_span), BAR_HEIGHT, 0);
    }

    // Footer: "page/total" plus the owning chapter title.
    let footer_y = page_height as i32 - FOOTER_FROM_BOTTOM;
    let baseline = footer_y + FOOTER_FONT_SIZE as i32;
    let label = format!("{}/{}", global_page + 1, total);
    canvas.draw_text(fonts, &label, 15, baseline, FOOTER_FONT_SIZE, false);

    if let Some(content) = global_page.checked_sub(nav.toc_page_count)
        && let Some(chapter) = index.chapter_of_page(content)
        && let Some(title) = index.chapter_title(chapter)
        && !title.is_empty()
    {
        let mut text = format!("| {title}");
        if text.chars().count() > FOOTER_TITLE_MAX_CHARS {
            text = text.chars().take(FOOTER_TITLE_MAX_CHARS).collect();
        }
        canvas.draw_text(fonts, &text, FOOTER_TITLE_X, baseline, FOOTER_FONT_SIZE, false);
    }
}

fn truncate_to_width(
    fonts: &FontSet,
    title: &str,
    size: f32,
    bold: bool,
    max_width: f32,
) -> String {
    if fonts.measure(title, size, bold) <= max_width {
        return title.to_string();
    }
    let mut truncated: String = title.to_string();
    while !truncated.is_empty()
        && fonts.measure(&format!("{truncated}..."), size, bold) > max_width
    {
        truncated.pop();
    }
    format!("{truncated}...")
}
