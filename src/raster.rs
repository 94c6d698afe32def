//! Page rasterization: laid-out fragments onto a pixel buffer.
//!
//! Rendering happens on an 8-bit grayscale canvas; quantization to the
//! device depth is the last step. Glyph coverage is alpha-blended as ink
//! over white; image fragments arrive pre-dithered from the image
//! processor and pass through quantization unchanged. Everything here is
//! deterministic.

use crate::config::{BitDepth, TypographyConfig};
use crate::font::FontSet;
use crate::imaging::ProcessedImage;
use crate::layout::{Fragment, LaidOutPage};

/// Grayscale threshold separating ink from paper at 1-bit depth.
const MONO_THRESHOLD: u8 = 140;

/// 8-bit working surface, white-initialized.
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![255u8; (width * height) as usize],
        }
    }

    fn blend_ink(&mut self, x: i32, y: i32, coverage: u8) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = (y as u32 * self.width + x as u32) as usize;
        let dst = self.pixels[idx] as u32;
        self.pixels[idx] = (dst * (255 - coverage as u32) / 255) as u8;
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, value: u8) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        self.pixels[(y as u32 * self.width + x as u32) as usize] = value;
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, value: u8) {
        for yy in y..y + h {
            for xx in x..x + w {
                self.set_pixel(xx, yy, value);
            }
        }
    }

    /// 1-px rectangle outline.
    pub fn stroke_rect(&mut self, x: i32, y: i32, w: i32, h: i32, value: u8) {
        if w <= 0 || h <= 0 {
            return;
        }
        self.fill_rect(x, y, w, 1, value);
        self.fill_rect(x, y + h - 1, w, 1, value);
        self.fill_rect(x, y, 1, h, value);
        self.fill_rect(x + w - 1, y, 1, h, value);
    }

    pub fn hline(&mut self, x0: i32, x1: i32, y: i32, value: u8) {
        self.fill_rect(x0.min(x1), y, (x1 - x0).abs() + 1, 1, value);
    }

    pub fn vline(&mut self, x: i32, y0: i32, y1: i32, value: u8) {
        self.fill_rect(x, y0.min(y1), 1, (y1 - y0).abs() + 1, value);
    }

    /// Draw one string at a baseline; returns the advance in pixels.
    pub fn draw_text(
        &mut self,
        fonts: &FontSet,
        text: &str,
        x: i32,
        baseline: i32,
        size: f32,
        bold: bool,
    ) -> i32 {
        let mut pen = x as f32;
        for ch in text.chars() {
            let glyph = fonts.rasterize(ch, size, bold);
            let left = pen.round() as i32 + glyph.xmin;
            let top = baseline - glyph.height as i32 - glyph.ymin;
            for gy in 0..glyph.height {
                for gx in 0..glyph.width {
                    let coverage = glyph.coverage[gy * glyph.width + gx];
                    if coverage > 0 {
                        self.blend_ink(left + gx as i32, top + gy as i32, coverage);
                    }
                }
            }
            pen += glyph.advance;
        }
        pen.round() as i32 - x
    }

    /// Copy a pre-dithered image block onto the canvas.
    pub fn blit_image(&mut self, image: &ProcessedImage, x: i32, y: i32) {
        for iy in 0..image.height {
            for ix in 0..image.width {
                let v = image.pixels[(iy * image.width + ix) as usize];
                self.set_pixel(x + ix as i32, y + iy as i32, v);
            }
        }
    }
}

/// A packed fixed-size pixel buffer at the device bit depth.
///
/// Mono1: one bit per pixel, MSB first, 1 = paper, 0 = ink.
/// Gray2: two bits per pixel, four pixels per byte, high bits first,
/// 0 = black .. 3 = white.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBitmap {
    pub width: u32,
    pub height: u32,
    pub bit_depth: BitDepth,
    pub data: Vec<u8>,
}

impl PageBitmap {
    pub fn row_bytes(&self) -> usize {
        self.bit_depth.row_bytes(self.width)
    }

    pub fn expected_len(width: u32, height: u32, depth: BitDepth) -> usize {
        depth.row_bytes(width) * height as usize
    }
}

/// Rasterize one laid-out page onto a fresh canvas. The overlay region is
/// stamped by the navigation builder before quantization.
pub fn rasterize(page: &LaidOutPage, config: &TypographyConfig, fonts: &FontSet) -> Canvas {
    let (width, height) = config.page_size();
    let mut canvas = Canvas::new(width, height);
    for fragment in &page.fragments {
        match fragment {
            Fragment::Text(text) => {
                canvas.draw_text(fonts, &text.text, text.x, text.baseline, text.size, text.bold);
            }
            Fragment::Image(image) => {
                canvas.blit_image(&image.image, image.x, image.y);
            }
        }
    }
    canvas
}

/// Quantize and pack a canvas at the target depth.
pub fn quantize(canvas: &Canvas, depth: BitDepth) -> PageBitmap {
    let row_bytes = depth.row_bytes(canvas.width);
    let mut data = vec![0u8; row_bytes * canvas.height as usize];
    match depth {
        BitDepth::Mono1 => {
            for y in 0..canvas.height as usize {
                let row = &mut data[y * row_bytes..(y + 1) * row_bytes];
                for x in 0..canvas.width as usize {
                    let v = canvas.pixels[y * canvas.width as usize + x];
                    if v > MONO_THRESHOLD {
                        row[x / 8] |= 0x80 >> (x % 8);
                    }
                }
            }
        }
        BitDepth::Gray2 => {
            for y in 0..canvas.height as usize {
                let row = &mut data[y * row_bytes..(y + 1) * row_bytes];
                for x in 0..canvas.width as usize {
                    let v = canvas.pixels[y * canvas.width as usize + x] as u32;
                    let level = ((v + 42) / 85).min(3) as u8;
                    row[x / 4] |= level << (6 - 2 * (x % 4));
                }
            }
        }
    }
    PageBitmap {
        width: canvas.width,
        height: canvas.height,
        bit_depth: depth,
        data,
    }
}
