use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, GrayImage, Luma};
use rusttype::{point, Font, Scale};
use std::path::Path;

use super::bitmap::Bitmap;
use super::layout::Area;

/// Coverage above which a glyph pixel is drawn
const COVERAGE_THRESHOLD: f32 = 0.5;

/// Renders labels into display areas
pub struct TextRenderer {
    font: Font<'static>,
}

impl TextRenderer {
    /// Load a TrueType font file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).with_context(|| format!("Failed to read font {:?}", path))?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let font = Font::try_from_vec(data).ok_or_else(|| anyhow!("Failed to load font"))?;
        Ok(Self { font })
    }

    /// Width of `text` in pixels at `size`
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let scale = Scale::uniform(size);
        self.font
            .layout(text, scale, point(0.0, 0.0))
            .filter_map(|glyph| glyph.pixel_bounding_box())
            .map(|bb| bb.max.x as f32)
            .fold(0.0, f32::max)
    }

    /// Render a single line centred in an area
    ///
    /// The text is sized to the area height and shrunk until it fits the
    /// width. Black on white, or white on black when inverted.
    pub fn render(&self, text: &str, area: &Area, inverted: bool) -> Result<Bitmap> {
        let (width, height) = (u32::from(area.width), u32::from(area.height));
        let (background, foreground) = if inverted { (0, 255) } else { (255, 0) };
        let mut canvas = GrayImage::from_pixel(width, height, Luma([background]));

        let mut size = height as f32;
        let text_width = self.text_width(text, size);
        if text_width > width as f32 {
            size *= width as f32 / text_width;
        }

        let scale = Scale::uniform(size);
        let v_metrics = self.font.v_metrics(scale);
        let x = (width as f32 - self.text_width(text, size)) / 2.0;
        let y = (height as f32 - (v_metrics.ascent - v_metrics.descent)) / 2.0 + v_metrics.ascent;

        for glyph in self.font.layout(text, scale, point(x, y)) {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, coverage| {
                    let px = gx as i32 + bb.min.x;
                    let py = gy as i32 + bb.min.y;
                    if coverage > COVERAGE_THRESHOLD
                        && px >= 0
                        && py >= 0
                        && (px as u32) < width
                        && (py as u32) < height
                    {
                        canvas.put_pixel(px as u32, py as u32, Luma([foreground]));
                    }
                });
            }
        }

        Bitmap::from_image(&DynamicImage::ImageLuma8(canvas))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM_FONTS: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
    ];

    /// `INKKEYS_TEST_FONT` if set, else the first known system font
    fn system_font() -> Option<TextRenderer> {
        if let Ok(path) = std::env::var("INKKEYS_TEST_FONT") {
            return TextRenderer::load(Path::new(&path)).ok();
        }
        SYSTEM_FONTS
            .iter()
            .find_map(|path| TextRenderer::load(Path::new(path)).ok())
    }

    #[test]
    fn test_rejects_invalid_font() {
        assert!(TextRenderer::from_bytes(vec![0; 16]).is_err());
        assert!(TextRenderer::load(Path::new("/nonexistent/font.ttf")).is_err());
    }

    #[test]
    #[ignore = "needs a TrueType font: DejaVu Sans, Arial or INKKEYS_TEST_FONT"]
    fn test_render_fits_area() {
        let renderer = system_font().expect("no TrueType font found");
        let area = Area {
            x: 0,
            y: 284,
            width: 128,
            height: 12,
        };

        let plain = renderer.render("Default", &area, false).unwrap();
        assert_eq!((plain.width(), plain.height()), (128, 12));
        let black = 128 * 12 - plain.count_white();
        assert!(black > 0);

        let inverted = renderer.render("Default", &area, true).unwrap();
        assert_eq!(inverted.count_white(), black);

        let long = "a label far too long for the banner";
        assert!(renderer.text_width(long, 12.0) > 128.0);
        let fitted = renderer.render(long, &area, false).unwrap();
        assert!(fitted.count_white() < 128 * 12);
    }
}
