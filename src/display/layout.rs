//! Display regions for the title, the encoder label and keys 2-9
//!
//! The display is mounted rotated, so in device coordinates the title
//! banner sits at the bottom, the encoder label at the top, keys 2-5 on
//! the right half (top to bottom) and keys 6-9 on the left half.

use crate::device::Settings;

/// Height of the title and encoder banners
pub const BANNER_HEIGHT: u16 = 12;

/// Something that owns a region on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Title,
    /// Key 1 (the encoder) through key 9
    Key(u8),
}

impl Slot {
    /// Every slot with a display area
    pub const ALL: [Slot; 10] = [
        Slot::Title,
        Slot::Key(1),
        Slot::Key(2),
        Slot::Key(3),
        Slot::Key(4),
        Slot::Key(5),
        Slot::Key(6),
        Slot::Key(7),
        Slot::Key(8),
        Slot::Key(9),
    ];
}

/// A rectangle in device coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Area {
    pub fn contains(&self, other: &Area) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }
}

/// Region of a slot
///
/// `None` for key numbers outside 1-9 and for displays too small (or too
/// large) to hold the layout.
pub fn area_for(slot: Slot, settings: &Settings) -> Option<Area> {
    let w = settings.disp_w;
    let h = settings.disp_h;
    let key_height = (h / 4).checked_sub(2 * BANNER_HEIGHT).filter(|&k| k > 0)?;
    // Top edge of the n-th quarter from the top
    let row = |n: u16| n.checked_mul(h).map(|y| y / 4 + BANNER_HEIGHT);

    let area = match slot {
        Slot::Title => Area {
            x: 0,
            y: h - BANNER_HEIGHT,
            width: w,
            height: BANNER_HEIGHT,
        },
        Slot::Key(1) => Area {
            x: 0,
            y: 0,
            width: w,
            height: BANNER_HEIGHT,
        },
        Slot::Key(n @ 2..=5) => Area {
            x: w / 2,
            y: row(5 - n as u16)?,
            width: w / 2,
            height: key_height,
        },
        Slot::Key(n @ 6..=9) => Area {
            x: 0,
            y: row(9 - n as u16)?,
            width: w / 2,
            height: key_height,
        },
        Slot::Key(_) => return None,
    };
    Some(area)
}
