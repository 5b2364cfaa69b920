//! Status screen rendering
//!
//! Draws centred text with embedded-graphics into an in-memory RGB image. The
//! result goes through the same pixel converter as captured photos, so one code
//! path serves every framebuffer depth.
//!
//! Mono fonts top out at 20 px, so large type (the countdown digits) is drawn at
//! native size and scaled up nearest-neighbour, which keeps edges crisp on 1 bpp
//! panels.

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Point, Size},
    mono_font::{ascii::FONT_10X20, MonoFont, MonoTextStyle},
    pixelcolor::{Rgb888, RgbColor},
    prelude::*,
    text::{Baseline, Text},
};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

use crate::framebuffer::{PixelFormat, Visual};

/// Font used for all status text
const FONT: &MonoFont<'static> = &FONT_10X20;

/// Type sizes in pixels
pub mod sizes {
    pub const PROMPT: u32 = 36;
    pub const COUNTDOWN: u32 = 96;
    pub const STATUS: u32 = 24;
}

/// Foreground/background pair for a display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Rgb888,
    pub foreground: Rgb888,
}

impl Palette {
    /// Black on white for monochrome panels, white on black otherwise
    pub fn for_format(format: &PixelFormat) -> Self {
        let mono = format.bits_per_pixel == 1
            || matches!(format.visual, Visual::Mono01 | Visual::Mono10);
        if mono {
            Self {
                background: Rgb888::WHITE,
                foreground: Rgb888::BLACK,
            }
        } else {
            Self {
                background: Rgb888::BLACK,
                foreground: Rgb888::WHITE,
            }
        }
    }
}

fn to_rgb(color: Rgb888) -> Rgb<u8> {
    Rgb([color.r(), color.g(), color.b()])
}

/// embedded-graphics draw target over an `RgbImage`
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgb888) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, to_rgb(background)),
        }
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            if coord.x >= 0
                && coord.y >= 0
                && (coord.x as u32) < self.image.width()
                && (coord.y as u32) < self.image.height()
            {
                self.image.put_pixel(coord.x as u32, coord.y as u32, to_rgb(color));
            }
        }
        Ok(())
    }
}

/// Integer scale factor for `text` at roughly `size_px`, shrunk to fit the screen
fn scale_for(text_width: u32, width: u32, height: u32, size_px: u32) -> u32 {
    let glyph_height = FONT.character_size.height;
    let wanted = (size_px / glyph_height).max(1);
    let fit_x = if text_width == 0 { wanted } else { width / text_width };
    let fit_y = height / glyph_height;
    wanted.min(fit_x).min(fit_y).max(1)
}

/// Render `text` centred on a `width` x `height` screen
pub fn render_text(
    width: u32,
    height: u32,
    text: &str,
    size_px: u32,
    palette: Palette,
) -> DynamicImage {
    let mut screen = RgbImage::from_pixel(width, height, to_rgb(palette.background));

    let char_width = FONT.character_size.width + FONT.character_spacing;
    let text_width = text.chars().count() as u32 * char_width;
    let text_height = FONT.character_size.height;
    if text_width == 0 {
        return DynamicImage::ImageRgb8(screen);
    }

    let mut glyphs = Canvas::new(text_width, text_height, palette.background);
    let style = MonoTextStyle::new(FONT, palette.foreground);
    // Drawing into a Canvas cannot fail
    let _ = Text::with_baseline(text, Point::zero(), style, Baseline::Top).draw(&mut glyphs);

    let scale = scale_for(text_width, width, height, size_px);
    let glyphs = glyphs.into_image();
    let scaled = if scale > 1 {
        imageops::resize(
            &glyphs,
            text_width * scale,
            text_height * scale,
            FilterType::Nearest,
        )
    } else {
        glyphs
    };

    let x = (width as i64 - scaled.width() as i64) / 2;
    let y = (height as i64 - scaled.height() as i64) / 2;
    imageops::overlay(&mut screen, &scaled, x, y);

    DynamicImage::ImageRgb8(screen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::FbBitField;

    fn format(bpp: u32, visual: Visual) -> PixelFormat {
        PixelFormat {
            width: 178,
            height: 128,
            bits_per_pixel: bpp,
            line_length: 24,
            visual,
            red: FbBitField::default(),
            green: FbBitField::default(),
            blue: FbBitField::default(),
            transp: FbBitField::default(),
        }
    }

    #[test]
    fn test_palette_follows_display_type() {
        let mono = Palette::for_format(&format(1, Visual::Mono01));
        assert_eq!(mono.background, Rgb888::WHITE);
        assert_eq!(mono.foreground, Rgb888::BLACK);

        let color = Palette::for_format(&format(16, Visual::TrueColor));
        assert_eq!(color.background, Rgb888::BLACK);
    }

    #[test]
    fn test_render_text_draws_centred_glyphs() {
        let palette = Palette::for_format(&format(16, Visual::TrueColor));
        let img = render_text(320, 240, "3", sizes::COUNTDOWN, palette).to_rgb8();

        assert_eq!(img.dimensions(), (320, 240));
        // Corners stay background
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(319, 239), &Rgb([0, 0, 0]));
        // Some foreground pixels near the middle
        let lit = (100..220)
            .flat_map(|x| (60..180).map(move |y| (x, y)))
            .filter(|&(x, y)| img.get_pixel(x, y) == &Rgb([255, 255, 255]))
            .count();
        assert!(lit > 0);
    }

    #[test]
    fn test_scale_shrinks_to_fit() {
        // 14 chars * 10 px = 140 px wide on a 178 px screen
        assert_eq!(scale_for(140, 178, 128, sizes::PROMPT), 1);
        assert_eq!(scale_for(10, 178, 128, sizes::COUNTDOWN), 4);
        assert_eq!(scale_for(10, 320, 240, sizes::COUNTDOWN), 4);
        assert_eq!(scale_for(400, 320, 240, sizes::STATUS), 1);
    }

    #[test]
    fn test_empty_text_is_blank_screen() {
        let palette = Palette::for_format(&format(1, Visual::Mono01));
        let img = render_text(16, 8, "", sizes::STATUS, palette).to_rgb8();
        assert!(img.pixels().all(|p| p == &Rgb([255, 255, 255])));
    }
}
