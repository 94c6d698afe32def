use std::collections::HashMap;

/// Intermediate representation of a parsed book.
/// The EPUB reader produces this; the layout pipeline treats it as
/// read-only input.
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub metadata: Metadata,
    pub chapters: Vec<Chapter>,
}

/// Book metadata (Dublin Core subset)
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: String,
    pub authors: Vec<String>,
    /// BCP-47 language tag, e.g. "en" or "de-DE". Drives hyphenation.
    pub language: String,
    pub identifier: String,
}

/// One reading-order unit: a spine item that survived content filtering.
#[derive(Debug, Clone)]
pub struct Chapter {
    /// Stable identifier (the EPUB manifest id of the spine item).
    pub id: String,
    pub title: String,
    /// Hidden chapters keep their pages in the flow but are excluded
    /// from the TOC and the progress denominator.
    pub visible: bool,
    pub blocks: Vec<Block>,
}

/// A block-level content unit within a chapter.
#[derive(Debug, Clone)]
pub enum Block {
    Text(TextBlock),
    Image(ImageBlock),
}

/// Paragraph-like run sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub kind: BlockKind,
    pub runs: Vec<TextRun>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    /// Heading level 1..=6. Headings render centered and bolder.
    Heading(u8),
}

/// A styled span of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

/// Raw image bytes plus intrinsic pixel dimensions.
///
/// Dimensions are `(0, 0)` when the data could not be probed; the image
/// processor degrades such blocks to a blank placeholder.
#[derive(Debug, Clone)]
pub struct ImageBlock {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chapter and return a mutable reference to it.
    pub fn add_chapter(&mut self, id: impl Into<String>, title: impl Into<String>) -> &mut Chapter {
        self.chapters.push(Chapter {
            id: id.into(),
            title: title.into(),
            visible: true,
            blocks: Vec::new(),
        });
        self.chapters.last_mut().expect("just pushed")
    }

    pub fn chapter_by_id(&self, id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }

    /// Map from chapter id to ordinal position.
    pub fn chapter_ordinals(&self) -> HashMap<&str, usize> {
        self.chapters
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.as_str(), i))
            .collect()
    }

    /// SHA-1 digest over all content that affects layout.
    ///
    /// Callers can memoize pipeline runs keyed by
    /// `(content_digest, TypographyConfig, visibility flags)`; visibility
    /// is deliberately excluded here since toggling it does not require
    /// re-layout.
    pub fn content_digest(&self) -> [u8; 20] {
        let mut sha = sha1_smol::Sha1::new();
        sha.update(self.metadata.title.as_bytes());
        sha.update(self.metadata.language.as_bytes());
        for chapter in &self.chapters {
            sha.update(chapter.id.as_bytes());
            sha.update(chapter.title.as_bytes());
            for block in &chapter.blocks {
                match block {
                    Block::Text(text) => {
                        let tag: u8 = match text.kind {
                            BlockKind::Paragraph => 0,
                            BlockKind::Heading(level) => level,
                        };
                        sha.update(&[1, tag]);
                        for run in &text.runs {
                            sha.update(&[run.bold as u8, run.italic as u8]);
                            sha.update(run.text.as_bytes());
                        }
                    }
                    Block::Image(img) => {
                        sha.update(&[2]);
                        sha.update(&img.width.to_le_bytes());
                        sha.update(&img.height.to_le_bytes());
                        sha.update(&img.data);
                    }
                }
            }
        }
        sha.digest().bytes()
    }
}

impl Chapter {
    /// Append a paragraph made of a single unstyled run.
    pub fn add_paragraph(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Text(TextBlock {
            kind: BlockKind::Paragraph,
            runs: vec![TextRun::plain(text)],
        }));
    }

    pub fn add_heading(&mut self, level: u8, text: impl Into<String>) {
        self.blocks.push(Block::Text(TextBlock {
            kind: BlockKind::Heading(level.clamp(1, 6)),
            runs: vec![TextRun::plain(text)],
        }));
    }

    pub fn add_image(&mut self, data: Vec<u8>, width: u32, height: u32) {
        self.blocks.push(Block::Image(ImageBlock {
            data,
            width,
            height,
        }));
    }

    /// Total characters of visible text, used by the EPUB reader to skip
    /// structural spine items (cover wrappers, blank separators).
    pub fn text_len(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| match b {
                Block::Text(t) => t.runs.iter().map(|r| r.text.trim().len()).sum(),
                Block::Image(_) => 0,
            })
            .sum()
    }

    pub fn has_image(&self) -> bool {
        self.blocks.iter().any(|b| matches!(b, Block::Image(_)))
    }
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
        }
    }

    pub fn styled(text: impl Into<String>, bold: bool, italic: bool) -> Self {
        Self {
            text: text.into(),
            bold,
            italic,
        }
    }
}
