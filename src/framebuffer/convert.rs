//! Pixel format conversion
//!
//! Turns a decoded bitmap into the byte layout of a particular framebuffer so it
//! can be handed to [`super::Framebuffer::write_raw`] unchanged.
//!
//! Supported layouts:
//! - 1 bpp: MSB-first bits, 1 = white, scanlines padded to `line_length` with
//!   white
//! - 16 bpp true-color: RGB565 native-endian words
//! - 24/32 bpp true-color: channels placed per the reported bitfields
//!
//! Anything else gets the decoded bitmap's raw bytes, which is only correct when
//! the source already happens to match the device.

use image::imageops::{self, BiLevel};
use image::{DynamicImage, GenericImageView};
use tracing::{debug, warn};

use super::sys::{FbBitField, Visual};

/// Everything the converter needs to know about the target device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    /// Bytes per scanline
    pub line_length: u32,
    pub visual: Visual,
    pub red: FbBitField,
    pub green: FbBitField,
    pub blue: FbBitField,
    pub transp: FbBitField,
}

impl PixelFormat {
    /// Size of one full frame in bytes
    pub fn frame_len(&self) -> usize {
        self.line_length as usize * self.height as usize
    }

    /// Whether [`encode`] reformats for this layout instead of copying raw bytes
    pub fn is_supported(&self) -> bool {
        match (self.bits_per_pixel, self.visual) {
            (1, _) => true,
            (16 | 24 | 32, Visual::TrueColor) => true,
            _ => false,
        }
    }
}

/// Encode `image` into the native layout described by `format`.
///
/// For supported layouts the output is exactly [`PixelFormat::frame_len`] bytes.
/// Pixels outside the target resolution are dropped. Uncovered pixels are zero,
/// except on 1 bpp where they are white.
pub fn encode(image: &DynamicImage, format: &PixelFormat) -> Vec<u8> {
    match (format.bits_per_pixel, format.visual) {
        (1, _) => encode_mono(image, format),
        (16, Visual::TrueColor) => encode_rgb565(image, format),
        (24 | 32, Visual::TrueColor) => encode_truecolor(image, format),
        (bpp, visual) => {
            warn!(bpp = bpp, visual = ?visual, "Unsupported pixel format, copying raw bytes");
            image.as_bytes().to_vec()
        }
    }
}

/// Pack an 8-bit RGB triple into an RGB565 word
pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

fn clipped_size(image: &DynamicImage, format: &PixelFormat) -> (u32, u32) {
    let (w, h) = image.dimensions();
    if (w, h) != (format.width, format.height) {
        debug!(
            src_width = w,
            src_height = h,
            width = format.width,
            height = format.height,
            "Source size differs from framebuffer, clipping"
        );
    }
    (w.min(format.width), h.min(format.height))
}

fn encode_mono(image: &DynamicImage, format: &PixelFormat) -> Vec<u8> {
    let stride = format.line_length as usize;
    // Background (white) everywhere, including scanline padding
    let mut out = vec![0xFFu8; format.frame_len()];

    let mut luma = image.to_luma8();
    // Floyd-Steinberg; pure black/white input passes through untouched
    imageops::dither(&mut luma, &BiLevel);

    let (width, height) = clipped_size(image, format);
    for y in 0..height {
        let row = &mut out[y as usize * stride..(y as usize + 1) * stride];
        for x in 0..width {
            let byte = x as usize / 8;
            if byte >= stride {
                break;
            }
            if luma.get_pixel(x, y)[0] < 0x80 {
                row[byte] &= !(0x80 >> (x % 8));
            }
        }
    }

    out
}

fn encode_rgb565(image: &DynamicImage, format: &PixelFormat) -> Vec<u8> {
    let stride = format.line_length as usize;
    let mut out = vec![0u8; format.frame_len()];
    let rgb = image.to_rgb8();

    let (width, height) = clipped_size(image, format);
    for y in 0..height {
        let row = &mut out[y as usize * stride..(y as usize + 1) * stride];
        for x in 0..width {
            let offset = x as usize * 2;
            if offset + 2 > stride {
                break;
            }
            let [r, g, b] = rgb.get_pixel(x, y).0;
            row[offset..offset + 2].copy_from_slice(&rgb565(r, g, b).to_ne_bytes());
        }
    }

    out
}

fn scale_channel(value: u8, field: &FbBitField) -> u32 {
    match field.length {
        0 => 0,
        len if len >= 8 => (value as u32) << (len - 8).min(24),
        len => (value as u32) >> (8 - len),
    }
}

fn pack_truecolor(r: u8, g: u8, b: u8, format: &PixelFormat) -> u32 {
    let alpha = match format.transp.length {
        0 => 0,
        len if len >= 32 => u32::MAX,
        len => place((1u32 << len) - 1, format.transp.offset),
    };
    place(scale_channel(r, &format.red), format.red.offset)
        | place(scale_channel(g, &format.green), format.green.offset)
        | place(scale_channel(b, &format.blue), format.blue.offset)
        | alpha
}

/// Shift a channel into position; offsets past the word drop the channel
fn place(value: u32, offset: u32) -> u32 {
    value.checked_shl(offset).unwrap_or(0)
}

fn encode_truecolor(image: &DynamicImage, format: &PixelFormat) -> Vec<u8> {
    let stride = format.line_length as usize;
    let bytes_per_pixel = (format.bits_per_pixel / 8) as usize;
    let mut out = vec![0u8; format.frame_len()];
    let rgb = image.to_rgb8();

    let (width, height) = clipped_size(image, format);
    for y in 0..height {
        let row = &mut out[y as usize * stride..(y as usize + 1) * stride];
        for x in 0..width {
            let offset = x as usize * bytes_per_pixel;
            if offset + bytes_per_pixel > stride {
                break;
            }
            let [r, g, b] = rgb.get_pixel(x, y).0;
            let word = pack_truecolor(r, g, b, format).to_ne_bytes();
            let bytes = if cfg!(target_endian = "little") {
                &word[..bytes_per_pixel]
            } else {
                &word[4 - bytes_per_pixel..]
            };
            row[offset..offset + bytes_per_pixel].copy_from_slice(bytes);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn format(width: u32, height: u32, bpp: u32, line_length: u32, visual: Visual) -> PixelFormat {
        PixelFormat {
            width,
            height,
            bits_per_pixel: bpp,
            line_length,
            visual,
            red: FbBitField::new(16, 8),
            green: FbBitField::new(8, 8),
            blue: FbBitField::new(0, 8),
            transp: FbBitField::default(),
        }
    }

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn test_rgb565_is_bit_exact() {
        assert_eq!(rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(rgb565(0, 0, 0), 0x0000);
        assert_eq!(rgb565(248, 0, 0), 0xF800);
        assert_eq!(rgb565(0, 252, 0), 0x07E0);
        assert_eq!(rgb565(0, 0, 248), 0x001F);
        // Low bits below each channel's precision are dropped
        assert_eq!(rgb565(7, 3, 7), 0x0000);
    }

    #[test]
    fn test_mono_white_is_all_ones() {
        let fmt = format(16, 4, 1, 2, Visual::Mono01);
        let out = encode(&solid(16, 4, [255, 255, 255]), &fmt);
        assert_eq!(out.len(), 8);
        assert!(out.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_mono_black_is_all_zeros() {
        let fmt = format(16, 4, 1, 2, Visual::Mono01);
        let out = encode(&solid(16, 4, [0, 0, 0]), &fmt);
        assert_eq!(out.len(), 8);
        assert!(out.iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_mono_is_msb_first_with_white_padding() {
        // 178 px wide EV3 panel: 23 bytes of pixels, padded to 24
        let fmt = format(178, 2, 1, 24, Visual::Mono01);
        let mut img = GrayImage::from_pixel(178, 2, Luma([0]));
        img.put_pixel(0, 0, Luma([255]));
        img.put_pixel(9, 1, Luma([255]));
        img.put_pixel(177, 1, Luma([255]));

        let out = encode(&DynamicImage::ImageLuma8(img), &fmt);
        assert_eq!(out.len(), 48);
        assert_eq!(out[0], 0b1000_0000);
        assert_eq!(out[24 + 1], 0b0100_0000);
        // x = 176 black, x = 177 white, bits for x >= 178 are padding
        assert_eq!(out[24 + 22], 0b0111_1111);
        assert_eq!(out[22], 0b0011_1111);
        assert_eq!(out[23], 0xFF);
        assert_eq!(out[47], 0xFF);
    }

    #[test]
    fn test_mono_white_on_unaligned_panel_is_all_ones() {
        let fmt = format(178, 128, 1, 24, Visual::Mono01);
        let out = encode(&solid(178, 128, [255, 255, 255]), &fmt);
        assert_eq!(out.len(), 24 * 128);
        assert!(out.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_mono_smaller_source_leaves_remainder_white() {
        let fmt = format(16, 2, 1, 2, Visual::Mono01);
        let out = encode(&solid(8, 1, [0, 0, 0]), &fmt);
        assert_eq!(out, vec![0x00, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_mono_dithers_mid_grey() {
        let fmt = format(32, 32, 1, 4, Visual::Mono01);
        let out = encode(&solid(32, 32, [128, 128, 128]), &fmt);
        let ones: u32 = out.iter().map(|b| b.count_ones()).sum();
        // Roughly half the pixels end up white
        assert!(ones > 400 && ones < 624, "ones = {}", ones);
    }

    #[test]
    fn test_rgb565_frame_length_and_layout() {
        let fmt = format(320, 240, 16, 640, Visual::TrueColor);
        let out = encode(&solid(320, 240, [248, 0, 0]), &fmt);
        assert_eq!(out.len(), 320 * 240 * 2);
        assert_eq!(u16::from_ne_bytes([out[0], out[1]]), 0xF800);
        assert_eq!(u16::from_ne_bytes([out[out.len() - 2], out[out.len() - 1]]), 0xF800);
    }

    #[test]
    fn test_rgb565_respects_line_padding() {
        let fmt = format(3, 2, 16, 8, Visual::TrueColor);
        let out = encode(&solid(3, 2, [255, 255, 255]), &fmt);
        assert_eq!(out.len(), 16);
        assert_eq!(&out[..6], &[0xFF; 6]);
        assert_eq!(&out[6..8], &[0, 0]);
        assert_eq!(&out[8..14], &[0xFF; 6]);
    }

    #[test]
    fn test_smaller_source_leaves_remainder_blank() {
        let fmt = format(4, 4, 16, 8, Visual::TrueColor);
        let out = encode(&solid(2, 2, [255, 255, 255]), &fmt);
        assert_eq!(out.len(), 32);
        assert_eq!(&out[..4], &[0xFF; 4]);
        assert_eq!(&out[4..8], &[0; 4]);
        assert!(out[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_xrgb8888_uses_channel_offsets() {
        let mut fmt = format(2, 1, 32, 8, Visual::TrueColor);
        fmt.transp = FbBitField::new(24, 8);
        let out = encode(&solid(2, 1, [0x12, 0x34, 0x56]), &fmt);
        assert_eq!(u32::from_ne_bytes([out[0], out[1], out[2], out[3]]), 0xFF12_3456);
    }

    #[test]
    fn test_out_of_range_offsets_drop_the_channel() {
        let mut fmt = format(1, 1, 32, 4, Visual::TrueColor);
        fmt.red = FbBitField::new(40, 8);
        fmt.transp = FbBitField::new(32, 8);
        let out = encode(&solid(1, 1, [0x12, 0x34, 0x56]), &fmt);
        assert_eq!(u32::from_ne_bytes([out[0], out[1], out[2], out[3]]), 0x0000_3456);
    }

    #[test]
    fn test_bgr888_24bpp() {
        let mut fmt = format(1, 1, 24, 3, Visual::TrueColor);
        fmt.red = FbBitField::new(0, 8);
        fmt.blue = FbBitField::new(16, 8);
        let out = encode(&solid(1, 1, [0x12, 0x34, 0x56]), &fmt);
        if cfg!(target_endian = "little") {
            assert_eq!(out, vec![0x12, 0x34, 0x56]);
        }
    }

    #[test]
    fn test_unsupported_format_copies_raw_bytes() {
        let fmt = format(2, 1, 8, 2, Visual::PseudoColor);
        assert!(!fmt.is_supported());
        let img = solid(2, 1, [1, 2, 3]);
        assert_eq!(encode(&img, &fmt), vec![1, 2, 3, 1, 2, 3]);
    }
}
