//! XHTML content extraction: spine documents into text/image blocks.
//!
//! A deliberately flat view of the markup: paragraph-level elements become
//! [`TextBlock`]s with bold/italic runs, `<img>` elements become image
//! references, everything else is treated as a transparent container.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::book::{BlockKind, TextBlock, TextRun};
use crate::error::{Error, Result};

/// A block before image resolution: image sources are still hrefs
/// relative to the content document.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBlock {
    Text(TextBlock),
    Image { src: String },
}

/// Elements whose text content is never rendered.
fn is_ignored(name: &[u8]) -> bool {
    matches!(name, b"head" | b"script" | b"style" | b"title" | b"template")
}

fn heading_level(name: &[u8]) -> Option<u8> {
    match name {
        b"h1" => Some(1),
        b"h2" => Some(2),
        b"h3" => Some(3),
        b"h4" => Some(4),
        b"h5" => Some(5),
        b"h6" => Some(6),
        _ => None,
    }
}

fn starts_block(name: &[u8]) -> bool {
    matches!(
        name,
        b"p" | b"li" | b"blockquote" | b"dd" | b"dt" | b"pre" | b"figcaption" | b"td" | b"th"
    )
}

struct BlockBuilder {
    blocks: Vec<RawBlock>,
    kind: BlockKind,
    runs: Vec<TextRun>,
    text: String,
    bold_depth: u32,
    italic_depth: u32,
    ignore_depth: u32,
}

impl BlockBuilder {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            kind: BlockKind::Paragraph,
            runs: Vec::new(),
            text: String::new(),
            bold_depth: 0,
            italic_depth: 0,
            ignore_depth: 0,
        }
    }

    fn push_text(&mut self, raw: &str) {
        if self.ignore_depth > 0 {
            return;
        }
        // Non-breaking spaces confuse the line breaker's word split.
        let cleaned = raw.replace('\u{00A0}', " ");
        if cleaned.is_empty() {
            return;
        }
        self.text.push_str(&cleaned);
    }

    /// Close the current run when styling changes.
    fn seal_run(&mut self) {
        if self.text.trim().is_empty() {
            if !self.text.is_empty() && !self.runs.is_empty() {
                // Keep inter-run whitespace by folding it into the
                // previous run.
                if let Some(last) = self.runs.last_mut() {
                    last.text.push(' ');
                }
            }
            self.text.clear();
            return;
        }
        let text = std::mem::take(&mut self.text);
        self.runs.push(TextRun::styled(
            text,
            self.bold_depth > 0,
            self.italic_depth > 0,
        ));
    }

    fn flush_block(&mut self) {
        self.seal_run();
        if self.runs.is_empty() {
            self.kind = BlockKind::Paragraph;
            return;
        }
        self.blocks.push(RawBlock::Text(TextBlock {
            kind: self.kind,
            runs: std::mem::take(&mut self.runs),
        }));
        self.kind = BlockKind::Paragraph;
    }
}

/// Parse one content document into raw blocks.
pub fn parse_blocks(xhtml: &str) -> Result<Vec<RawBlock>> {
    let mut reader = Reader::from_str(xhtml);
    reader.config_mut().check_end_names = false;

    let mut builder = BlockBuilder::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref()).to_ascii_lowercase();
                if is_ignored(&local) {
                    builder.ignore_depth += 1;
                } else if let Some(level) = heading_level(&local) {
                    builder.flush_block();
                    builder.kind = BlockKind::Heading(level);
                } else if starts_block(&local) {
                    builder.flush_block();
                } else {
                    match local.as_slice() {
                        b"b" | b"strong" => {
                            builder.seal_run();
                            builder.bold_depth += 1;
                        }
                        b"i" | b"em" => {
                            builder.seal_run();
                            builder.italic_depth += 1;
                        }
                        b"br" => builder.push_text(" "),
                        b"img" => {
                            if let Some(src) = attr_value(&e, b"src") {
                                builder.flush_block();
                                builder.blocks.push(RawBlock::Image { src });
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref()).to_ascii_lowercase();
                match local.as_slice() {
                    b"img" => {
                        if let Some(src) = attr_value(&e, b"src") {
                            builder.flush_block();
                            builder.blocks.push(RawBlock::Image { src });
                        }
                    }
                    b"br" => builder.push_text(" "),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref()).to_ascii_lowercase();
                if is_ignored(&local) {
                    builder.ignore_depth = builder.ignore_depth.saturating_sub(1);
                } else if heading_level(&local).is_some() || starts_block(&local) {
                    builder.flush_block();
                } else {
                    match local.as_slice() {
                        b"b" | b"strong" => {
                            builder.seal_run();
                            builder.bold_depth = builder.bold_depth.saturating_sub(1);
                        }
                        b"i" | b"em" => {
                            builder.seal_run();
                            builder.italic_depth = builder.italic_depth.saturating_sub(1);
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(e.as_ref()).into_owned();
                builder.push_text(&raw);
            }
            Ok(Event::GeneralRef(e)) => {
                let entity = String::from_utf8_lossy(e.as_ref()).into_owned();
                builder.push_text(resolve_entity(&entity).as_ref());
            }
            Ok(Event::CData(e)) => {
                let raw = String::from_utf8_lossy(e.as_ref()).into_owned();
                builder.push_text(&raw);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    builder.flush_block();
    Ok(builder.blocks)
}

/// Resolve the named and numeric entities that show up in real EPUBs.
fn resolve_entity(entity: &str) -> std::borrow::Cow<'static, str> {
    match entity {
        "apos" => "'".into(),
        "quot" => "\"".into(),
        "lt" => "<".into(),
        "gt" => ">".into(),
        "amp" => "&".into(),
        "nbsp" => " ".into(),
        "shy" => "\u{00AD}".to_string().into(),
        "mdash" => "\u{2014}".to_string().into(),
        "ndash" => "\u{2013}".to_string().into(),
        "hellip" => "\u{2026}".to_string().into(),
        _ => {
            let code = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()));
            match code.and_then(char::from_u32) {
                Some(ch) => ch.to_string().into(),
                None => "".into(),
            }
        }
    }
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| String::from_utf8(attr.value.to_vec()).ok())
}

/// Extract local name from potentially namespaced XML name
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(block: &RawBlock) -> String {
        match block {
            RawBlock::Text(t) => t
                .runs
                .iter()
                .map(|r| r.text.as_str())
                .collect::<Vec<_>>()
                .join("|"),
            RawBlock::Image { src } => format!("[img {src}]"),
        }
    }

    #[test]
    fn paragraphs_and_headings_become_blocks() {
        let blocks = parse_blocks(
            "<html><body><h1>Title</h1><p>First paragraph.</p><p>Second.</p></body></html>",
        )
        .unwrap();
        assert_eq!(blocks.len(), 3);
        let RawBlock::Text(heading) = &blocks[0] else {
            panic!("expected text block");
        };
        assert_eq!(heading.kind, BlockKind::Heading(1));
        assert_eq!(text_of(&blocks[1]), "First paragraph.");
    }

    #[test]
    fn emphasis_splits_runs() {
        let blocks =
            parse_blocks("<p>plain <b>bold</b> and <i>italic</i> text</p>").unwrap();
        let RawBlock::Text(block) = &blocks[0] else {
            panic!("expected text block");
        };
        let styles: Vec<(bool, bool)> = block.runs.iter().map(|r| (r.bold, r.italic)).collect();
        assert_eq!(styles, vec![(false, false), (true, false), (false, false), (false, true), (false, false)]);
        assert_eq!(block.runs[1].text, "bold");
    }

    #[test]
    fn nested_emphasis_combines() {
        let blocks = parse_blocks("<p><strong><em>both</em></strong></p>").unwrap();
        let RawBlock::Text(block) = &blocks[0] else {
            panic!("expected text block");
        };
        assert_eq!(block.runs.len(), 1);
        assert!(block.runs[0].bold && block.runs[0].italic);
    }

    #[test]
    fn images_are_extracted_with_src() {
        let blocks =
            parse_blocks("<p>before</p><img src=\"images/pic.png\" alt=\"x\"/><p>after</p>")
                .unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1], RawBlock::Image { src: "images/pic.png".into() });
    }

    #[test]
    fn style_and_script_content_is_dropped() {
        let blocks = parse_blocks(
            "<html><head><title>x</title><style>p { color: red }</style></head>\
             <body><p>kept</p><script>var dropped = 1;</script></body></html>",
        )
        .unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(text_of(&blocks[0]), "kept");
    }

    #[test]
    fn entities_are_resolved() {
        let blocks = parse_blocks("<p>Don&apos;t &amp; won&#x2019;t</p>").unwrap();
        assert_eq!(text_of(&blocks[0]), "Don't & won\u{2019}t");
    }

    #[test]
    fn namespaced_tags_are_recognized() {
        let blocks = parse_blocks(
            "<html xmlns=\"http://www.w3.org/1999/xhtml\"><body><xhtml:p>ns text</xhtml:p></body></html>",
        )
        .unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn bare_text_in_divs_still_surfaces() {
        let blocks = parse_blocks("<div>loose text<p>para</p></div>").unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(text_of(&blocks[0]), "loose text");
    }
}
