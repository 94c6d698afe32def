//! XTC container round-trip guarantees, including property-based checks
//! over arbitrary page content.

use inkpress::raster::PageBitmap;
use inkpress::xtc::{self, ContainerNav, NO_CHAPTER, META_FLAG_TOC, PageMeta, TocRecord};
use inkpress::{BitDepth, Book, Pipeline, TypographyConfig};
use proptest::prelude::*;

fn small_config() -> TypographyConfig {
    TypographyConfig {
        screen_width: 160,
        screen_height: 120,
        margin: 8,
        top_padding: 8,
        bottom_padding: 8,
        font_size: 8.0,
        generate_toc: false,
        ..TypographyConfig::default()
    }
}

fn small_book() -> Book {
    let mut book = Book::new();
    book.metadata.title = "Container".into();
    book.metadata.language = "en".into();
    book.add_chapter("a", "First")
        .add_paragraph("some words to fill a line or two of the page");
    book.add_chapter("b", "Second")
        .add_paragraph("and a second chapter with more words in it");
    book
}

#[test]
fn full_pipeline_container_round_trips() {
    let pipeline = Pipeline::run(&small_book(), &small_config()).unwrap();
    let blob = pipeline.encode().unwrap();
    let (pages, nav) = xtc::decode(&blob).unwrap();

    assert_eq!(pages.len(), pipeline.page_count());
    assert_eq!(nav.toc.len(), 2);
    assert_eq!(nav.toc[0].id, "a");
    assert_eq!(nav.toc[0].title, "First");
    assert_eq!(nav.page_meta.len(), pages.len());
    // Progress reaches full scale on the last page.
    assert_eq!(nav.page_meta.last().unwrap().progress_permille, 1000);

    // Byte-identical re-encode of the decoded content.
    assert_eq!(xtc::encode(&pages, &nav).unwrap(), blob);
}

#[test]
fn encode_is_reproducible_across_runs() {
    let book = small_book();
    let config = small_config();
    let a = Pipeline::run(&book, &config).unwrap().encode().unwrap();
    let b = Pipeline::run(&book, &config).unwrap().encode().unwrap();
    assert_eq!(a, b);
}

#[test]
fn header_reports_page_geometry() {
    let pipeline = Pipeline::run(&small_book(), &small_config()).unwrap();
    let blob = pipeline.encode().unwrap();
    assert_eq!(&blob[0..4], &0x0043_5458u32.to_le_bytes());
    assert_eq!(u16::from_le_bytes([blob[4], blob[5]]), 0x0100);
    assert_eq!(
        u16::from_le_bytes([blob[6], blob[7]]) as usize,
        pipeline.page_count()
    );
    assert_eq!(u16::from_le_bytes([blob[8], blob[9]]), 160);
    assert_eq!(u16::from_le_bytes([blob[10], blob[11]]), 120);
    assert_eq!(blob[12], 1); // 1-bit
}

fn arb_depth() -> impl Strategy<Value = BitDepth> {
    prop_oneof![Just(BitDepth::Mono1), Just(BitDepth::Gray2)]
}

proptest! {
    #[test]
    fn arbitrary_containers_round_trip(
        depth in arb_depth(),
        width in 1u32..64,
        height in 1u32..32,
        page_seeds in prop::collection::vec(any::<u8>(), 1..6),
        digest in any::<u64>(),
    ) {
        let pages: Vec<PageBitmap> = page_seeds
            .iter()
            .map(|&seed| {
                let len = PageBitmap::expected_len(width, height, depth);
                PageBitmap {
                    width,
                    height,
                    bit_depth: depth,
                    data: (0..len).map(|i| (i as u8).wrapping_add(seed)).collect(),
                }
            })
            .collect();
        let nav = ContainerNav {
            page_meta: page_seeds
                .iter()
                .enumerate()
                .map(|(i, &seed)| PageMeta {
                    chapter: if seed == 0 { NO_CHAPTER } else { i as u32 },
                    progress_permille: (seed as u16) * 3,
                    flags: if seed == 0 { META_FLAG_TOC } else { 0 },
                })
                .collect(),
            toc: vec![TocRecord {
                chapter: 0,
                target_page: 0,
                id: "ch-0".into(),
                title: format!("seeded {digest:x}"),
            }],
            toc_page_count: 0,
            orientation: (digest & 1) as u8,
            source_digest: digest,
        };

        let blob = xtc::encode(&pages, &nav).unwrap();
        let (decoded_pages, decoded_nav) = xtc::decode(&blob).unwrap();
        prop_assert_eq!(decoded_pages, pages);
        prop_assert_eq!(decoded_nav, nav);
    }

    #[test]
    fn decoder_never_panics_on_mutation(
        flip_at in 0usize..512,
        flip_bits in 1u8..=255,
    ) {
        let pipeline = Pipeline::run(&small_book(), &small_config()).unwrap();
        let mut blob = pipeline.encode().unwrap();
        let idx = flip_at % blob.len();
        blob[idx] ^= flip_bits;
        // Result may be Ok (flip in pixel data) or Err, but never a panic.
        let _ = xtc::decode(&blob);
    }
}
