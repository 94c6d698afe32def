use crate::config::BitDepth;
use crate::error::{Error, Result};
use crate::raster::PageBitmap;

use super::{
    CONTAINER_MAGIC, ContainerNav, FORMAT_VERSION, PAGE_HEADER_LEN, PAGE_MAGIC, PageMeta,
    TocRecord,
};

/// Decode an XTC blob back into its pages and navigation metadata.
///
/// Inverse of [`encode`](super::encode): for any container produced by
/// it, `decode(encode(pages, nav)) == (pages, nav)`.
pub fn decode(data: &[u8]) -> Result<(Vec<PageBitmap>, ContainerNav)> {
    let mut header = Cursor::new(data);
    if header.u32()? != CONTAINER_MAGIC {
        return Err(Error::InvalidContainer("bad magic".into()));
    }
    let version = header.u16()?;
    if version != FORMAT_VERSION {
        return Err(Error::InvalidContainer(format!(
            "unsupported version {version:#06x}"
        )));
    }
    let page_count = header.u16()? as usize;
    let width = header.u16()? as u32;
    let height = header.u16()? as u32;
    let bit_depth = match header.u8()? {
        1 => BitDepth::Mono1,
        2 => BitDepth::Gray2,
        other => {
            return Err(Error::InvalidContainer(format!("bad bit depth {other}")));
        }
    };
    let orientation = header.u8()?;
    let toc_page_count = header.u16()?;
    let index_offset = header.u64()? as usize;
    let _data_offset = header.u64()?;
    let meta_offset = header.u64()? as usize;
    let toc_offset = header.u64()? as usize;
    let source_digest = header.u64()?;

    // Pages via the index.
    let mut pages = Vec::with_capacity(page_count);
    let mut index = Cursor::at(data, index_offset)?;
    for page_no in 0..page_count {
        let offset = index.u64()? as usize;
        let length = index.u32()? as usize;
        let index_width = index.u16()? as u32;
        let index_height = index.u16()? as u32;
        if length < PAGE_HEADER_LEN {
            return Err(Error::InvalidContainer(format!(
                "page {page_no} record is {length} bytes"
            )));
        }

        let mut record = Cursor::at(data, offset)?;
        if record.u32()? != PAGE_MAGIC {
            return Err(Error::InvalidContainer(format!("page {page_no} bad magic")));
        }
        let page_width = record.u16()? as u32;
        let page_height = record.u16()? as u32;
        let page_bits = record.u8()?;
        let _flags = record.u8()?;
        let data_len = record.u32()? as usize;
        let _reserved = record.u64()?;
        if page_width != width || page_height != height || page_width != index_width
            || page_height != index_height
        {
            return Err(Error::InvalidContainer(format!(
                "page {page_no} dimensions disagree with header"
            )));
        }
        if page_bits != bit_depth.bits() as u8 {
            return Err(Error::InvalidContainer(format!(
                "page {page_no} bit depth disagrees with header"
            )));
        }
        let expected = PageBitmap::expected_len(width, height, bit_depth);
        if data_len != expected || length != PAGE_HEADER_LEN + data_len {
            return Err(Error::InvalidContainer(format!(
                "page {page_no} pixel payload is {data_len} bytes, expected {expected}"
            )));
        }
        pages.push(PageBitmap {
            width,
            height,
            bit_depth,
            data: record.bytes(data_len)?.to_vec(),
        });
    }

    // Per-page metadata table.
    let mut meta = Cursor::at(data, meta_offset)?;
    let meta_count = meta.u16()? as usize;
    if meta_count != page_count {
        return Err(Error::InvalidContainer(format!(
            "meta table covers {meta_count} pages, container has {page_count}"
        )));
    }
    let mut page_meta = Vec::with_capacity(meta_count);
    for _ in 0..meta_count {
        page_meta.push(PageMeta {
            chapter: meta.u32()?,
            progress_permille: meta.u16()?,
            flags: meta.u16()?,
        });
    }

    // TOC jump table.
    let mut toc_cursor = Cursor::at(data, toc_offset)?;
    let toc_count = toc_cursor.u16()? as usize;
    let mut toc = Vec::with_capacity(toc_count);
    for _ in 0..toc_count {
        let chapter = toc_cursor.u32()?;
        let target_page = toc_cursor.u16()?;
        let _visible = toc_cursor.u8()?;
        let _pad = toc_cursor.u8()?;
        let id_len = toc_cursor.u32()? as usize;
        let id = String::from_utf8(toc_cursor.bytes(id_len)?.to_vec())?;
        let title_len = toc_cursor.u32()? as usize;
        let title = String::from_utf8(toc_cursor.bytes(title_len)?.to_vec())?;
        toc.push(TocRecord {
            chapter,
            target_page,
            id,
            title,
        });
    }

    Ok((
        pages,
        ContainerNav {
            page_meta,
            toc,
            toc_page_count,
            orientation,
            source_digest,
        },
    ))
}

/// Bounds-checked little-endian reads over the container blob.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn at(data: &'a [u8], pos: usize) -> Result<Self> {
        if pos > data.len() {
            return Err(Error::InvalidContainer(format!(
                "offset {pos} past end of {} byte container",
                data.len()
            )));
        }
        Ok(Self { data, pos })
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or_else(|| {
            Error::InvalidContainer("length overflow".into())
        })?;
        if end > self.data.len() {
            return Err(Error::InvalidContainer(format!(
                "truncated container: need {end} bytes, have {}",
                self.data.len()
            )));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.bytes(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.bytes(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.bytes(8)?.try_into().unwrap()))
    }
}
