//! Property-based checks: layout bounds, dithering determinism,
//! hyphenation idempotence.

use inkpress::font::FontSet;
use inkpress::hyphen::Hyphenator;
use inkpress::imaging;
use inkpress::layout::{self, Fragment};
use inkpress::{BitDepth, Book, TextBlock, TextRun, TypographyConfig};
use proptest::prelude::*;

fn arb_config() -> impl Strategy<Value = TypographyConfig> {
    (
        120u32..400,   // screen width
        100u32..300,   // screen height
        5u32..20,      // margin
        5u32..20,      // paddings
        8.0f32..16.0,  // font size
    )
        .prop_map(|(width, height, margin, pad, font_size)| TypographyConfig {
            screen_width: width,
            screen_height: height,
            margin,
            top_padding: pad,
            bottom_padding: pad,
            font_size,
            ..TypographyConfig::default()
        })
}

fn arb_words() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zA-Z]{1,18}", 1..60)
}

proptest! {
    #[test]
    fn layout_never_escapes_the_content_box(config in arb_config(), words in arb_words()) {
        let content = config.content_box().unwrap();
        let fonts = FontSet::builtin();

        let mut book = Book::new();
        book.add_chapter("c", "C").add_paragraph(words.join(" "));
        let result = layout::layout(&book, &config, &fonts).unwrap();

        prop_assert!(!result.pages.is_empty());
        for page in &result.pages {
            for fragment in &page.fragments {
                let Fragment::Text(text) = fragment else { continue };
                prop_assert!(text.x >= content.x as i32);
                prop_assert!(text.baseline >= content.y as i32);
                prop_assert!(text.baseline <= (content.y + content.height) as i32);
                let right = text.x as f32 + fonts.measure(&text.text, text.size, text.bold);
                // Rounding may land a justified line a pixel past the edge.
                prop_assert!(
                    right <= (content.x + content.width) as f32 + 2.0,
                    "fragment {:?} ends at {right}, box ends at {}",
                    text.text,
                    content.x + content.width
                );
            }
        }
    }

    #[test]
    fn layout_words_are_never_dropped(config in arb_config(), words in arb_words()) {
        let fonts = FontSet::builtin();
        let mut book = Book::new();
        book.add_chapter("c", "C").add_paragraph(words.join(" "));
        let result = layout::layout(&book, &config, &fonts).unwrap();

        let mut placed = String::new();
        for page in &result.pages {
            for fragment in &page.fragments {
                if let Fragment::Text(text) = fragment {
                    placed.push_str(text.text.trim_end_matches('-'));
                }
            }
        }
        // Force-broken pieces concatenate back to the input characters.
        let expected: String = words.concat();
        prop_assert_eq!(placed, expected);
    }

    #[test]
    fn dithering_is_deterministic_and_level_bound(
        pixels in prop::collection::vec(any::<u8>(), 1..256),
        width in 1usize..32,
        depth in prop_oneof![Just(BitDepth::Mono1), Just(BitDepth::Gray2)],
    ) {
        let height = pixels.len() / width;
        prop_assume!(height > 0);
        let pixels = &pixels[..width * height];

        let first = imaging::dither(pixels, width, depth.levels());
        let second = imaging::dither(pixels, width, depth.levels());
        prop_assert_eq!(&first, &second);
        prop_assert!(first.iter().all(|v| depth.levels().contains(v)));
    }

    #[test]
    fn hyphenation_is_idempotent_on_arbitrary_text(
        words in prop::collection::vec("[a-zA-Z]{1,20}", 1..20),
    ) {
        let hyphenator = Hyphenator::for_language("en");
        let block = TextBlock {
            kind: inkpress::BlockKind::Paragraph,
            runs: vec![TextRun::plain(words.join(" "))],
        };
        let once = hyphenator.hyphenate_block(&block);
        let twice = hyphenator.hyphenate_block(&once);
        prop_assert_eq!(once.runs, twice.runs);
    }

    #[test]
    fn hyphenation_only_inserts_soft_hyphens(
        words in prop::collection::vec("[a-zA-Z]{1,20}", 1..20),
    ) {
        let hyphenator = Hyphenator::for_language("en");
        let text = words.join(" ");
        let block = TextBlock {
            kind: inkpress::BlockKind::Paragraph,
            runs: vec![TextRun::plain(text.clone())],
        };
        let out = hyphenator.hyphenate_block(&block);
        let stripped: String = out.runs[0]
            .text
            .chars()
            .filter(|&c| c != '\u{00AD}')
            .collect();
        prop_assert_eq!(stripped, text);
    }
}
