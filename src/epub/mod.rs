mod content;
mod reader;

pub use content::{RawBlock, parse_blocks};
pub use reader::{read_epub, read_epub_from_reader};
