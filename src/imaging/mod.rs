//! Image preparation for e-ink pages: decode, scale, contrast, dither.
//!
//! Processing order is resize first (Lanczos3 sees original values), then
//! brightness/contrast, then Floyd-Steinberg error diffusion down to the
//! target depth's gray levels. Every step is deterministic; identical
//! input bytes and settings produce identical output bytes.

use std::io::Cursor;

use image::imageops::FilterType;

use crate::config::BitDepth;

/// How an image is fitted into its reserved area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    /// Shrink to fit inside the box, keeping aspect ratio. Output keeps
    /// the scaled dimensions; centering is the placer's job.
    Contain,
    /// Exact box size with white letterbox bars around the scaled image.
    Letterbox,
    /// Fill the box completely, center-cropping the overflow.
    Crop,
}

/// A decoded, scaled, dithered image ready for blitting.
///
/// Pixels are gray8 values restricted to the target depth's level set,
/// row-major, top-down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Settings for the decode-scale-enhance-dither chain.
#[derive(Debug, Clone, Copy)]
pub struct ImageProcessor {
    pub bit_depth: BitDepth,
    /// Multiplicative brightness applied before contrast.
    pub brightness: f32,
    /// Midpoint-anchored contrast factor; 1.0 is identity.
    pub contrast: f32,
    /// Never enlarge beyond this factor.
    pub max_upscale: f32,
}

impl ImageProcessor {
    pub fn new(bit_depth: BitDepth) -> Self {
        Self {
            bit_depth,
            brightness: 1.15,
            contrast: 1.4,
            max_upscale: 2.0,
        }
    }

    /// Decode and prepare `data` for a `max_width` x `max_height` box.
    ///
    /// Fails only on undecodable data; callers degrade that to
    /// [`placeholder`](Self::placeholder) plus a warning.
    pub fn process(
        &self,
        data: &[u8],
        max_width: u32,
        max_height: u32,
        fit: FitMode,
    ) -> std::result::Result<ProcessedImage, String> {
        if max_width == 0 || max_height == 0 {
            return Err("zero-sized target box".to_string());
        }
        let decoded = image::load_from_memory(data).map_err(|e| e.to_string())?;
        let (src_w, src_h) = (decoded.width().max(1), decoded.height().max(1));

        let fit_scale = |cover: bool| -> f64 {
            let sx = max_width as f64 / src_w as f64;
            let sy = max_height as f64 / src_h as f64;
            let s = if cover { sx.max(sy) } else { sx.min(sy) };
            s.min(self.max_upscale as f64)
        };

        let (scaled, out_w, out_h, off_x, off_y) = match fit {
            FitMode::Contain => {
                let s = fit_scale(false);
                let tw = ((src_w as f64 * s).round() as u32).max(1);
                let th = ((src_h as f64 * s).round() as u32).max(1);
                (decoded.resize_exact(tw, th, FilterType::Lanczos3), tw, th, 0, 0)
            }
            FitMode::Letterbox => {
                let s = fit_scale(false);
                let tw = ((src_w as f64 * s).round() as u32).max(1).min(max_width);
                let th = ((src_h as f64 * s).round() as u32).max(1).min(max_height);
                let scaled = decoded.resize_exact(tw, th, FilterType::Lanczos3);
                (scaled, max_width, max_height, (max_width - tw) / 2, (max_height - th) / 2)
            }
            FitMode::Crop => {
                let s = fit_scale(true);
                let tw = ((src_w as f64 * s).round() as u32).max(max_width);
                let th = ((src_h as f64 * s).round() as u32).max(max_height);
                let scaled = decoded
                    .resize_exact(tw, th, FilterType::Lanczos3)
                    .crop_imm((tw - max_width) / 2, (th - max_height) / 2, max_width, max_height);
                (scaled, max_width, max_height, 0, 0)
            }
        };

        let gray = scaled.to_luma8();
        let mut pixels = vec![255u8; (out_w * out_h) as usize];
        for (x, y, pixel) in gray.enumerate_pixels() {
            let v = self.tone_remap(pixel.0[0]);
            let dst_x = x + off_x;
            let dst_y = y + off_y;
            if dst_x < out_w && dst_y < out_h {
                pixels[(dst_y * out_w + dst_x) as usize] = v;
            }
        }

        let pixels = dither(&pixels, out_w as usize, self.bit_depth.levels());
        Ok(ProcessedImage {
            width: out_w,
            height: out_h,
            pixels,
        })
    }

    /// Blank white block standing in for undecodable image data.
    pub fn placeholder(&self, width: u32, height: u32) -> ProcessedImage {
        let width = width.max(1);
        let height = height.max(1);
        ProcessedImage {
            width,
            height,
            pixels: vec![255u8; (width * height) as usize],
        }
    }

    /// Monotonic brightness + midpoint-anchored contrast curve, clamped
    /// to the representable range.
    fn tone_remap(&self, v: u8) -> u8 {
        let v = (v as f32 * self.brightness).clamp(0.0, 255.0);
        let v = 128.0 + (v - 128.0) * self.contrast;
        v.clamp(0.0, 255.0).round() as u8
    }
}

/// Probe intrinsic dimensions without a full decode.
pub fn probe_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Floyd-Steinberg error diffusion onto the given level set.
///
/// Raster order, canonical weights (7/16 right, 3/16 below-left, 5/16
/// below, 1/16 below-right); error falling outside the image is dropped.
pub fn dither(pixels: &[u8], width: usize, levels: &[u8]) -> Vec<u8> {
    if width == 0 || pixels.is_empty() {
        return Vec::new();
    }
    let height = pixels.len() / width;
    let mut buf: Vec<i32> = pixels.iter().map(|&v| v as i32).collect();
    let mut out = vec![0u8; pixels.len()];

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let old = buf[idx].clamp(0, 255);
            let new = nearest_level(old, levels);
            out[idx] = new;
            let err = old - new as i32;

            if x + 1 < width {
                buf[idx + 1] += err * 7 / 16;
            }
            if y + 1 < height {
                if x > 0 {
                    buf[idx + width - 1] += err * 3 / 16;
                }
                buf[idx + width] += err * 5 / 16;
                if x + 1 < width {
                    buf[idx + width + 1] += err / 16;
                }
            }
        }
    }
    out
}

fn nearest_level(value: i32, levels: &[u8]) -> u8 {
    let mut best = levels[0];
    let mut best_dist = (value - best as i32).abs();
    for &level in &levels[1..] {
        let dist = (value - level as i32).abs();
        if dist < best_dist {
            best = level;
            best_dist = dist;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> Vec<u8> {
        (0..width * height)
            .map(|i| ((i * 255) / (width * height - 1).max(1)) as u8)
            .collect()
    }

    #[test]
    fn dither_is_deterministic() {
        let pixels = gradient(32, 32);
        let a = dither(&pixels, 32, BitDepth::Mono1.levels());
        let b = dither(&pixels, 32, BitDepth::Mono1.levels());
        assert_eq!(a, b);
    }

    #[test]
    fn dither_output_restricted_to_levels() {
        let pixels = gradient(16, 16);
        for depth in [BitDepth::Mono1, BitDepth::Gray2] {
            let out = dither(&pixels, 16, depth.levels());
            assert!(out.iter().all(|v| depth.levels().contains(v)));
        }
    }

    #[test]
    fn dither_preserves_solid_extremes() {
        let black = vec![0u8; 64];
        let white = vec![255u8; 64];
        assert_eq!(dither(&black, 8, BitDepth::Mono1.levels()), black);
        assert_eq!(dither(&white, 8, BitDepth::Mono1.levels()), white);
    }

    #[test]
    fn dither_mid_gray_approximates_half_coverage() {
        let pixels = vec![128u8; 64 * 64];
        let out = dither(&pixels, 64, BitDepth::Mono1.levels());
        let black = out.iter().filter(|&&v| v == 0).count();
        let ratio = black as f64 / out.len() as f64;
        assert!((0.4..=0.6).contains(&ratio), "black ratio {ratio}");
    }

    #[test]
    fn tone_remap_is_monotonic_and_clamped() {
        let proc = ImageProcessor::new(BitDepth::Mono1);
        let mut prev = 0u8;
        for v in 0..=255u8 {
            let mapped = proc.tone_remap(v);
            assert!(mapped >= prev);
            prev = mapped;
        }
    }

    #[test]
    fn corrupt_data_is_an_error_not_a_panic() {
        let proc = ImageProcessor::new(BitDepth::Mono1);
        assert!(proc.process(b"definitely not an image", 100, 100, FitMode::Contain).is_err());
    }

    #[test]
    fn placeholder_is_blank() {
        let proc = ImageProcessor::new(BitDepth::Mono1);
        let img = proc.placeholder(10, 5);
        assert_eq!(img.pixels, vec![255u8; 50]);
    }

    #[test]
    fn process_contain_respects_box() {
        let mut png = Vec::new();
        image::GrayImage::from_pixel(100, 40, image::Luma([90u8]))
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let proc = ImageProcessor::new(BitDepth::Mono1);
        let out = proc.process(&png, 50, 50, FitMode::Contain).unwrap();
        assert_eq!(out.width, 50);
        assert_eq!(out.height, 20);
    }

    #[test]
    fn process_letterbox_pads_to_exact_box() {
        let mut png = Vec::new();
        image::GrayImage::from_pixel(100, 40, image::Luma([0u8]))
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let proc = ImageProcessor::new(BitDepth::Mono1);
        let out = proc.process(&png, 60, 60, FitMode::Letterbox).unwrap();
        assert_eq!((out.width, out.height), (60, 60));
        // top rows are letterbox bars
        assert!(out.pixels[..60].iter().all(|&v| v == 255));
    }

    #[test]
    fn upscale_capped_at_factor_two() {
        let mut png = Vec::new();
        image::GrayImage::from_pixel(10, 10, image::Luma([128u8]))
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let proc = ImageProcessor::new(BitDepth::Mono1);
        let out = proc.process(&png, 400, 400, FitMode::Contain).unwrap();
        assert_eq!((out.width, out.height), (20, 20));
    }
}
