//! EPUB reading tests against a synthetic book assembled in memory.

use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use inkpress::{Block, BlockKind, Pipeline, TypographyConfig, read_epub, read_epub_from_reader};

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

const CONTENT_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Test Book</dc:title>
    <dc:creator>Test Author</dc:creator>
    <dc:language>en</dc:language>
    <dc:identifier id="BookId">test-id-12345</dc:identifier>
  </metadata>
  <manifest>
    <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="pic" href="images/pic.png" media-type="image/png"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="cover"/>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#;

const TOC_NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="n1" playOrder="1">
      <navLabel><text>The First Chapter</text></navLabel>
      <content src="text/ch1.xhtml"/>
    </navPoint>
    <navPoint id="n2" playOrder="2">
      <navLabel><text>The Second Chapter</text></navLabel>
      <content src="text/ch2.xhtml#top"/>
    </navPoint>
  </navMap>
</ncx>"#;

// Short, imageless, and absent from the NCX: should be filtered out.
const COVER_XHTML: &str = r#"<html><body><p>Cover</p></body></html>"#;

const CH1_XHTML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>One</title></head>
<body>
  <h1>The First Chapter</h1>
  <p>It was a <b>dark</b> and <i>stormy</i> night, full of long sentences
  that give the line breaker something to chew on.</p>
  <p><img src="../images/pic.png" alt="scene"/></p>
</body></html>"#;

const CH2_XHTML: &str = r#"<html><body>
  <h2>The Second Chapter</h2>
  <p>A second chapter follows the first one, with enough prose to pass the
  structural filler threshold comfortably.</p>
</body></html>"#;

fn test_png() -> Vec<u8> {
    let mut png = Vec::new();
    image::GrayImage::from_fn(40, 30, |x, y| image::Luma([((x + y) * 4 % 256) as u8]))
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    png
}

fn build_epub() -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let deflated =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    zip.start_file("META-INF/container.xml", deflated).unwrap();
    zip.write_all(CONTAINER_XML.as_bytes()).unwrap();
    zip.start_file("OEBPS/content.opf", deflated).unwrap();
    zip.write_all(CONTENT_OPF.as_bytes()).unwrap();
    zip.start_file("OEBPS/toc.ncx", deflated).unwrap();
    zip.write_all(TOC_NCX.as_bytes()).unwrap();
    zip.start_file("OEBPS/cover.xhtml", deflated).unwrap();
    zip.write_all(COVER_XHTML.as_bytes()).unwrap();
    zip.start_file("OEBPS/text/ch1.xhtml", deflated).unwrap();
    zip.write_all(CH1_XHTML.as_bytes()).unwrap();
    zip.start_file("OEBPS/text/ch2.xhtml", deflated).unwrap();
    zip.write_all(CH2_XHTML.as_bytes()).unwrap();
    zip.start_file("OEBPS/images/pic.png", deflated).unwrap();
    zip.write_all(&test_png()).unwrap();

    zip.finish().unwrap().into_inner()
}

#[test]
fn reads_metadata_and_chapters() {
    let book = read_epub_from_reader(Cursor::new(build_epub())).unwrap();

    assert_eq!(book.metadata.title, "Test Book");
    assert_eq!(book.metadata.authors, vec!["Test Author"]);
    assert_eq!(book.metadata.language, "en");

    // The cover wrapper is structural filler and gets dropped.
    assert_eq!(book.chapters.len(), 2);
    assert_eq!(book.chapters[0].id, "ch1");
    assert_eq!(book.chapters[0].title, "The First Chapter");
    assert_eq!(book.chapters[1].title, "The Second Chapter");
    assert!(book.chapters.iter().all(|c| c.visible));
}

#[test]
fn styled_runs_survive_extraction() {
    let book = read_epub_from_reader(Cursor::new(build_epub())).unwrap();
    let chapter = &book.chapters[0];

    let heading = chapter
        .blocks
        .iter()
        .find_map(|b| match b {
            Block::Text(t) if matches!(t.kind, BlockKind::Heading(1)) => Some(t),
            _ => None,
        })
        .expect("h1 block");
    assert_eq!(heading.runs[0].text, "The First Chapter");

    let paragraph = chapter
        .blocks
        .iter()
        .find_map(|b| match b {
            Block::Text(t) if t.kind == BlockKind::Paragraph => Some(t),
            _ => None,
        })
        .expect("paragraph block");
    assert!(paragraph.runs.iter().any(|r| r.bold && r.text.contains("dark")));
    assert!(paragraph.runs.iter().any(|r| r.italic && r.text.contains("stormy")));
}

#[test]
fn images_resolve_relative_paths_and_dimensions() {
    let book = read_epub_from_reader(Cursor::new(build_epub())).unwrap();
    let image = book.chapters[0]
        .blocks
        .iter()
        .find_map(|b| match b {
            Block::Image(img) => Some(img),
            _ => None,
        })
        .expect("image block");
    assert_eq!((image.width, image.height), (40, 30));
    assert!(!image.data.is_empty());
}

#[test]
fn reads_from_disk_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.epub");
    std::fs::write(&path, build_epub()).unwrap();
    let book = read_epub(&path).unwrap();
    assert_eq!(book.chapters.len(), 2);
}

#[test]
fn garbage_input_is_a_parse_error() {
    assert!(read_epub_from_reader(Cursor::new(b"not a zip at all".to_vec())).is_err());
}

#[test]
fn synthetic_epub_converts_end_to_end() {
    let book = read_epub_from_reader(Cursor::new(build_epub())).unwrap();
    let config = TypographyConfig {
        screen_width: 240,
        screen_height: 320,
        font_size: 10.0,
        ..TypographyConfig::default()
    };
    let pipeline = Pipeline::run(&book, &config).unwrap();
    assert!(pipeline.warnings().is_empty(), "{:?}", pipeline.warnings());
    assert!(pipeline.page_count() > 2);

    let blob = pipeline.encode().unwrap();
    let (pages, nav) = inkpress::decode(&blob).unwrap();
    assert_eq!(pages.len(), pipeline.page_count());
    assert_eq!(nav.toc.len(), 2);
}
