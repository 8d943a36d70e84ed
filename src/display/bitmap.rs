use anyhow::{anyhow, Context, Result};
use image::{imageops, DynamicImage, GrayImage, Luma};
use std::path::Path;

use super::layout::Area;
use crate::device::protocol::bitmap_len;

/// Luma threshold at or above which a pixel is white
const WHITE_THRESHOLD: u8 = 128;

/// 1-bit image packed MSB-first, rows padded to whole bytes, 1 = white
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u16,
    height: u16,
    data: Vec<u8>,
}

impl Bitmap {
    /// Uniformly white (or black) bitmap
    pub fn blank(width: u16, height: u16, white: bool) -> Self {
        let fill = if white { 0xff } else { 0x00 };
        Self {
            width,
            height,
            data: vec![fill; bitmap_len(width, height)],
        }
    }

    /// Wrap received payload bytes
    pub fn from_raw(width: u16, height: u16, data: Vec<u8>) -> Result<Self> {
        let expected = bitmap_len(width, height);
        if data.len() != expected {
            return Err(anyhow!(
                "Bitmap {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Threshold an image to 1 bit and rotate it 180° for the mounted display
    pub fn from_image(image: &DynamicImage) -> Result<Self> {
        let gray = imageops::rotate180(&image.to_luma8());
        Self::from_gray(&gray)
    }

    fn from_gray(gray: &GrayImage) -> Result<Self> {
        let width = u16::try_from(gray.width()).context("Image too wide")?;
        let height = u16::try_from(gray.height()).context("Image too tall")?;
        let mut bitmap = Self::blank(width, height, false);

        for (x, y, Luma([value])) in gray.enumerate_pixels() {
            if *value >= WHITE_THRESHOLD {
                bitmap.set(x as u16, y as u16, true);
            }
        }
        Ok(bitmap)
    }

    /// Load an icon and centre it on a canvas the size of `area`
    ///
    /// Icons larger than the area are scaled down, keeping their aspect
    /// ratio. Inverted icons are drawn white on black.
    pub fn load_icon(path: &Path, area: &Area, inverted: bool) -> Result<Self> {
        let icon = image::open(path)
            .with_context(|| format!("Failed to load icon {:?}", path))?;
        Self::compose(&icon, area, inverted)
    }

    fn compose(icon: &DynamicImage, area: &Area, inverted: bool) -> Result<Self> {
        let (width, height) = (u32::from(area.width), u32::from(area.height));
        let mut icon = if icon.width() > width || icon.height() > height {
            icon.resize(width, height, imageops::FilterType::Triangle)
                .to_luma8()
        } else {
            icon.to_luma8()
        };

        let background = if inverted { 0 } else { 255 };
        if inverted {
            imageops::invert(&mut icon);
        }

        let mut canvas = GrayImage::from_pixel(width, height, Luma([background]));
        let x = (width - icon.width()) / 2;
        let y = (height - icon.height()) / 2;
        imageops::overlay(&mut canvas, &icon, i64::from(x), i64::from(y));

        Self::from_image(&DynamicImage::ImageLuma8(canvas))
    }

    /// Scale to another size, nearest neighbour
    pub fn resize(&self, width: u16, height: u16) -> Result<Self> {
        let gray = GrayImage::from_fn(u32::from(self.width), u32::from(self.height), |x, y| {
            Luma([if self.get(x as u16, y as u16) { 255 } else { 0 }])
        });
        let scaled = imageops::resize(
            &gray,
            u32::from(width),
            u32::from(height),
            imageops::FilterType::Nearest,
        );
        Self::from_gray(&scaled)
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn stride(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }

    /// Pixel at (x, y), `true` for white. Out of range reads as black.
    pub fn get(&self, x: u16, y: u16) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let byte = self.data[y as usize * self.stride() + x as usize / 8];
        byte & (0x80 >> (x % 8)) != 0
    }

    pub fn set(&mut self, x: u16, y: u16, white: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = y as usize * self.stride() + x as usize / 8;
        let mask = 0x80 >> (x % 8);
        if white {
            self.data[index] |= mask;
        } else {
            self.data[index] &= !mask;
        }
    }

    /// Copy `other` into this bitmap at (x, y), clipping at the edges
    pub fn blit(&mut self, x: u16, y: u16, other: &Bitmap) {
        for dy in 0..other.height {
            for dx in 0..other.width {
                let (tx, ty) = (x.saturating_add(dx), y.saturating_add(dy));
                self.set(tx, ty, other.get(dx, dy));
            }
        }
    }

    /// Number of white pixels
    pub fn count_white(&self) -> usize {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .filter(|&(x, y)| self.get(x, y))
            .count()
    }
}
