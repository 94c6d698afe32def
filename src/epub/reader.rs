use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

use crate::book::{Block, Book, Chapter, ImageBlock, Metadata};
use crate::error::{Error, Result};
use crate::imaging;

use super::content::{self, RawBlock, local_name};

/// Spine items with less visible text than this, no image, and no TOC
/// entry are treated as structural filler (cover wrappers, separators)
/// and skipped.
const MIN_CHAPTER_TEXT: usize = 50;

/// Parsed OPF content
struct OpfData {
    metadata: Metadata,
    /// Maps manifest id -> (href, media_type)
    manifest: HashMap<String, (String, String)>,
    spine_ids: Vec<String>,
    ncx_href: Option<String>,
}

/// Read an EPUB file from disk into a [`Book`].
///
/// Extracts metadata, the reading order, chapter titles (from the NCX
/// table of contents where present), text blocks with emphasis runs, and
/// embedded images with their intrinsic dimensions.
///
/// # Example
///
/// ```no_run
/// use inkpress::read_epub;
///
/// let book = read_epub("path/to/book.epub")?;
/// println!("Title: {}", book.metadata.title);
/// # Ok::<(), inkpress::Error>(())
/// ```
pub fn read_epub<P: AsRef<Path>>(path: P) -> Result<Book> {
    let file = std::fs::File::open(path)?;
    read_epub_from_reader(file)
}

/// Read an EPUB from any [`Read`] + [`Seek`] source.
///
/// Useful for reading from memory buffers or upload streams.
pub fn read_epub_from_reader<R: Read + Seek>(reader: R) -> Result<Book> {
    let mut archive = ZipArchive::new(reader)?;

    // 1. Find the OPF file path from container.xml
    let opf_path = find_opf_path(&mut archive)?;
    let opf_dir = parent_dir(&opf_path);

    // 2. Parse the OPF file
    let opf_content = read_archive_file(&mut archive, &opf_path)?;
    let OpfData {
        mut metadata,
        manifest,
        spine_ids,
        ncx_href,
    } = parse_opf(&opf_content)?;
    if metadata.language.is_empty() {
        metadata.language = "en".to_string();
    }

    // 3. Chapter titles from the NCX, keyed by fragment-free href.
    let mut toc_titles: HashMap<String, String> = HashMap::new();
    if let Some(ncx_href) = ncx_href {
        let ncx_path = resolve_href(&opf_dir, &ncx_href);
        if let Ok(ncx_content) = read_archive_file(&mut archive, &ncx_path) {
            toc_titles = parse_ncx_titles(&ncx_content)?;
        }
    }

    // 4. Walk the spine, extracting blocks per content document.
    let mut book = Book::new();
    book.metadata = metadata;
    for id in spine_ids {
        let Some((href, media_type)) = manifest.get(&id) else {
            continue;
        };
        if media_type != "application/xhtml+xml" && media_type != "text/html" {
            continue;
        }
        let doc_path = resolve_href(&opf_dir, href);
        let bytes = match read_archive_file_bytes(&mut archive, &doc_path) {
            Ok(bytes) => bytes,
            Err(_) => {
                log::warn!("spine item {href} missing from archive, skipped");
                continue;
            }
        };
        let xhtml = decode_text(&bytes);
        let raw_blocks = content::parse_blocks(&xhtml)?;

        let doc_dir = parent_dir(&doc_path);
        let blocks = resolve_blocks(&mut archive, raw_blocks, &doc_dir);

        let toc_title = toc_titles.get(strip_fragment(href)).cloned();
        let chapter = build_chapter(&id, blocks, toc_title.clone(), book.chapters.len());

        // Structural filler gets no page of its own.
        if toc_title.is_none() && chapter.text_len() < MIN_CHAPTER_TEXT && !chapter.has_image() {
            continue;
        }
        book.chapters.push(chapter);
    }

    if book.chapters.is_empty() {
        return Err(Error::InvalidEpub("no readable spine content".into()));
    }
    Ok(book)
}

fn build_chapter(
    id: &str,
    blocks: Vec<Block>,
    toc_title: Option<String>,
    ordinal: usize,
) -> Chapter {
    let title = toc_title
        .or_else(|| {
            blocks.iter().find_map(|block| match block {
                Block::Text(text) if matches!(text.kind, crate::book::BlockKind::Heading(1 | 2)) => {
                    let joined: String = text
                        .runs
                        .iter()
                        .map(|r| r.text.as_str())
                        .collect::<Vec<_>>()
                        .join(" ");
                    let trimmed = joined.split_whitespace().collect::<Vec<_>>().join(" ");
                    (!trimmed.is_empty()).then_some(trimmed)
                }
                _ => None,
            })
        })
        .unwrap_or_else(|| format!("Section {}", ordinal + 1));
    Chapter {
        id: id.to_string(),
        title,
        visible: true,
        blocks,
    }
}

/// Turn raw blocks into model blocks, pulling image bytes out of the
/// archive and probing their dimensions.
fn resolve_blocks<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    raw: Vec<RawBlock>,
    doc_dir: &str,
) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(raw.len());
    for block in raw {
        match block {
            RawBlock::Text(text) => blocks.push(Block::Text(text)),
            RawBlock::Image { src } => {
                let resolved = resolve_href(doc_dir, strip_fragment(&src));
                match read_archive_file_bytes(archive, &resolved) {
                    Ok(data) => {
                        let (width, height) = imaging::probe_dimensions(&data).unwrap_or((0, 0));
                        blocks.push(Block::Image(ImageBlock {
                            data,
                            width,
                            height,
                        }));
                    }
                    Err(_) => {
                        log::warn!("image {src} not found in archive, skipped");
                    }
                }
            }
        }
    }
    blocks
}

fn find_opf_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let container = read_archive_file(archive, "META-INF/container.xml")?;

    let mut reader = Reader::from_str(&container);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"rootfile" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        return Ok(String::from_utf8(attr.value.to_vec())?);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Err(Error::InvalidEpub(
        "No rootfile found in container.xml".into(),
    ))
}

fn parse_opf(content: &str) -> Result<OpfData> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut metadata = Metadata::default();
    let mut manifest: HashMap<String, (String, String)> = HashMap::new();
    let mut spine_ids: Vec<String> = Vec::new();
    let mut ncx_href: Option<String> = None;
    let mut toc_id: Option<String> = None;

    let mut in_metadata = false;
    let mut current_element: Option<String> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local_name = local_name(name.as_ref());

                match local_name {
                    b"metadata" => in_metadata = true,
                    b"title" | b"creator" | b"language" | b"identifier" => {
                        if in_metadata {
                            current_element = Some(String::from_utf8_lossy(local_name).to_string());
                            buf_text.clear();
                        }
                    }
                    b"spine" => {
                        // Get toc attribute for NCX reference
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"toc" {
                                toc_id = Some(String::from_utf8(attr.value.to_vec())?);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                let local_name = local_name(name.as_ref());

                match local_name {
                    b"item" => {
                        let mut id = String::new();
                        let mut href = String::new();
                        let mut media_type = String::new();

                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"id" => id = String::from_utf8(attr.value.to_vec())?,
                                b"href" => href = String::from_utf8(attr.value.to_vec())?,
                                b"media-type" => {
                                    media_type = String::from_utf8(attr.value.to_vec())?
                                }
                                _ => {}
                            }
                        }

                        if !id.is_empty() {
                            manifest.insert(id, (href, media_type));
                        }
                    }
                    b"itemref" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"idref" {
                                spine_ids.push(String::from_utf8(attr.value.to_vec())?);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if current_element.is_some() {
                    let raw = String::from_utf8_lossy(e.as_ref());
                    buf_text.push_str(&raw);
                }
            }
            Ok(Event::GeneralRef(e)) => {
                // Handle entity references like &apos; &lt; etc
                if current_element.is_some() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    let resolved = match entity.as_ref() {
                        "apos" => "'",
                        "quot" => "\"",
                        "lt" => "<",
                        "gt" => ">",
                        "amp" => "&",
                        _ => "",
                    };
                    buf_text.push_str(resolved);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local_name = local_name(name.as_ref());

                if local_name == b"metadata" {
                    in_metadata = false;
                }

                if let Some(ref elem) = current_element {
                    match elem.as_str() {
                        "title" => metadata.title = buf_text.clone(),
                        "creator" => metadata.authors.push(buf_text.clone()),
                        "language" => metadata.language = buf_text.clone(),
                        "identifier" => {
                            if metadata.identifier.is_empty() {
                                metadata.identifier = buf_text.clone();
                            }
                        }
                        _ => {}
                    }
                    current_element = None;
                    buf_text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    // Resolve NCX href from toc_id
    if let Some(toc_id) = toc_id
        && let Some((href, _)) = manifest.get(&toc_id)
    {
        ncx_href = Some(href.clone());
    }

    Ok(OpfData {
        metadata,
        manifest,
        spine_ids,
        ncx_href,
    })
}

/// Flatten the NCX into a fragment-free href -> title map. The first
/// entry for an href wins, matching reading order.
fn parse_ncx_titles(content: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut titles: HashMap<String, String> = HashMap::new();
    let mut in_text = false;
    let mut pending_text: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"text" {
                    in_text = true;
                    pending_text = Some(String::new());
                }
            }
            Ok(Event::Text(e)) => {
                if in_text && let Some(text) = pending_text.as_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text && let Some(text) = pending_text.as_mut() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    let resolved = match entity.as_ref() {
                        "apos" => "'",
                        "quot" => "\"",
                        "lt" => "<",
                        "gt" => ">",
                        "amp" => "&",
                        _ => "",
                    };
                    text.push_str(resolved);
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"content" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"src"
                            && let Some(title) = pending_text.take()
                        {
                            let src = String::from_utf8(attr.value.to_vec())?;
                            let key = strip_fragment(&src).to_string();
                            titles.entry(key).or_insert(title);
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"text" {
                    in_text = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(titles)
}

fn read_archive_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let bytes = read_archive_file_bytes(archive, path)?;
    Ok(decode_text(&bytes))
}

fn read_archive_file_bytes<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<u8>> {
    // Try direct lookup first
    match archive.by_name(path) {
        Ok(mut file) => {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            return Ok(contents);
        }
        Err(zip::result::ZipError::FileNotFound) => {}
        Err(e) => return Err(e.into()),
    }

    // Fallback: try percent-decoded path (handles malformed EPUBs)
    let decoded = percent_encoding::percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| Error::InvalidEpub(format!("Invalid UTF-8 in path: {}", path)))?;

    let mut file = archive.by_name(&decoded)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

/// Decode document bytes: UTF-8 with BOM handling, falling back to
/// Windows-1252 for legacy books.
fn decode_text(bytes: &[u8]) -> String {
    let stripped = strip_bom(bytes);
    match std::str::from_utf8(stripped) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(stripped);
            decoded.into_owned()
        }
    }
}

/// Strip UTF-8 BOM (byte order mark) if present
fn strip_bom(data: &[u8]) -> &[u8] {
    // UTF-8 BOM: EF BB BF
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

fn strip_fragment(href: &str) -> &str {
    href.split(['#', '?']).next().unwrap_or(href)
}

fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

/// Join an href onto a base directory and collapse `.`/`..` segments.
fn resolve_href(base: &str, href: &str) -> String {
    let joined = if base.is_empty() || href.starts_with('/') {
        href.trim_start_matches('/').to_string()
    } else {
        format!("{}/{}", base, href)
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"dc:title"), b"title");
        assert_eq!(local_name(b"title"), b"title");
        assert_eq!(local_name(b"opf:meta"), b"meta");
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("OEBPS", "ch1.xhtml"), "OEBPS/ch1.xhtml");
        assert_eq!(resolve_href("OEBPS/text", "../images/a.png"), "OEBPS/images/a.png");
        assert_eq!(resolve_href("", "ch1.xhtml"), "ch1.xhtml");
        assert_eq!(resolve_href("OEBPS", "/root.xhtml"), "root.xhtml");
        assert_eq!(resolve_href("a/b", "./c.xhtml"), "a/b/c.xhtml");
    }

    #[test]
    fn test_strip_fragment() {
        assert_eq!(strip_fragment("ch1.xhtml#sec2"), "ch1.xhtml");
        assert_eq!(strip_fragment("ch1.xhtml?x=1"), "ch1.xhtml");
        assert_eq!(strip_fragment("ch1.xhtml"), "ch1.xhtml");
    }

    #[test]
    fn test_decode_text_fallback() {
        assert_eq!(decode_text("caf\u{e9}".as_bytes()), "caf\u{e9}");
        // 0xE9 alone is not valid UTF-8; Windows-1252 maps it to e-acute.
        assert_eq!(decode_text(&[b'c', b'a', b'f', 0xE9]), "caf\u{e9}");
    }

    #[test]
    fn test_parse_ncx_titles() {
        let ncx = r#"<?xml version="1.0"?>
            <ncx xmlns="http://www.daisy.org/z3986/2005/ncx/">
              <navMap>
                <navPoint id="n1" playOrder="1">
                  <navLabel><text>Chapter One</text></navLabel>
                  <content src="ch1.xhtml"/>
                </navPoint>
                <navPoint id="n2" playOrder="2">
                  <navLabel><text>Chapter Two</text></navLabel>
                  <content src="ch2.xhtml#start"/>
                </navPoint>
              </navMap>
            </ncx>"#;
        let titles = parse_ncx_titles(ncx).unwrap();
        assert_eq!(titles.get("ch1.xhtml").map(String::as_str), Some("Chapter One"));
        assert_eq!(titles.get("ch2.xhtml").map(String::as_str), Some("Chapter Two"));
    }
}
