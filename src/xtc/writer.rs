use crate::error::{Error, Result};
use crate::raster::PageBitmap;

use super::{
    CONTAINER_MAGIC, ContainerNav, FORMAT_VERSION, HEADER_LEN, INDEX_ENTRY_LEN, PAGE_HEADER_LEN,
    PAGE_MAGIC,
};

/// Serialize pages and navigation metadata into an XTC blob.
///
/// Fails on internal inconsistencies (mismatched page dimensions, a meta
/// table that does not cover every page) rather than writing a truncated
/// container.
pub fn encode(pages: &[PageBitmap], nav: &ContainerNav) -> Result<Vec<u8>> {
    if pages.is_empty() {
        return Err(Error::Encode("container needs at least one page".into()));
    }
    if pages.len() > u16::MAX as usize {
        return Err(Error::Encode(format!("too many pages: {}", pages.len())));
    }
    if nav.page_meta.len() != pages.len() {
        return Err(Error::Encode(format!(
            "meta table covers {} pages, container has {}",
            nav.page_meta.len(),
            pages.len()
        )));
    }
    let first = &pages[0];
    for (i, page) in pages.iter().enumerate() {
        if page.width != first.width || page.height != first.height {
            return Err(Error::Encode(format!(
                "page {i} is {}x{}, container is {}x{}",
                page.width, page.height, first.width, first.height
            )));
        }
        if page.bit_depth != first.bit_depth {
            return Err(Error::Encode(format!("page {i} has a different bit depth")));
        }
        let expected = PageBitmap::expected_len(page.width, page.height, page.bit_depth);
        if page.data.len() != expected {
            return Err(Error::Encode(format!(
                "page {i} holds {} bytes, expected {expected}",
                page.data.len()
            )));
        }
    }

    let index_offset = HEADER_LEN as u64;
    let data_offset = index_offset + (INDEX_ENTRY_LEN * pages.len()) as u64;

    let mut index = Vec::with_capacity(INDEX_ENTRY_LEN * pages.len());
    let mut blob: Vec<u8> = Vec::new();
    for page in pages {
        let record_len = PAGE_HEADER_LEN + page.data.len();
        index.extend_from_slice(&(data_offset + blob.len() as u64).to_le_bytes());
        index.extend_from_slice(&(record_len as u32).to_le_bytes());
        index.extend_from_slice(&(page.width as u16).to_le_bytes());
        index.extend_from_slice(&(page.height as u16).to_le_bytes());

        blob.extend_from_slice(&PAGE_MAGIC.to_le_bytes());
        blob.extend_from_slice(&(page.width as u16).to_le_bytes());
        blob.extend_from_slice(&(page.height as u16).to_le_bytes());
        blob.push(page.bit_depth.bits() as u8);
        blob.push(0); // flags
        blob.extend_from_slice(&(page.data.len() as u32).to_le_bytes());
        blob.extend_from_slice(&0u64.to_le_bytes());
        blob.extend_from_slice(&page.data);
    }

    let meta_offset = data_offset + blob.len() as u64;
    let mut meta = Vec::with_capacity(2 + 8 * nav.page_meta.len());
    meta.extend_from_slice(&(nav.page_meta.len() as u16).to_le_bytes());
    for entry in &nav.page_meta {
        meta.extend_from_slice(&entry.chapter.to_le_bytes());
        meta.extend_from_slice(&entry.progress_permille.to_le_bytes());
        meta.extend_from_slice(&entry.flags.to_le_bytes());
    }

    let toc_offset = meta_offset + meta.len() as u64;
    let mut toc = Vec::new();
    toc.extend_from_slice(&(nav.toc.len() as u16).to_le_bytes());
    for record in &nav.toc {
        toc.extend_from_slice(&record.chapter.to_le_bytes());
        toc.extend_from_slice(&record.target_page.to_le_bytes());
        toc.push(1); // listed as visible
        toc.push(0);
        write_string(&mut toc, &record.id);
        write_string(&mut toc, &record.title);
    }

    let mut out = Vec::with_capacity(
        HEADER_LEN + index.len() + blob.len() + meta.len() + toc.len(),
    );
    out.extend_from_slice(&CONTAINER_MAGIC.to_le_bytes());
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(pages.len() as u16).to_le_bytes());
    out.extend_from_slice(&(first.width as u16).to_le_bytes());
    out.extend_from_slice(&(first.height as u16).to_le_bytes());
    out.push(first.bit_depth.bits() as u8);
    out.push(nav.orientation);
    out.extend_from_slice(&nav.toc_page_count.to_le_bytes());
    out.extend_from_slice(&index_offset.to_le_bytes());
    out.extend_from_slice(&data_offset.to_le_bytes());
    out.extend_from_slice(&meta_offset.to_le_bytes());
    out.extend_from_slice(&toc_offset.to_le_bytes());
    out.extend_from_slice(&nav.source_digest.to_le_bytes());
    debug_assert_eq!(out.len(), HEADER_LEN);

    out.extend_from_slice(&index);
    out.extend_from_slice(&blob);
    out.extend_from_slice(&meta);
    out.extend_from_slice(&toc);
    Ok(out)
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}
