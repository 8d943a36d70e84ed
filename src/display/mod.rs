mod bitmap;
pub mod layout;
mod text;

pub use bitmap::Bitmap;
pub use layout::{area_for, Area, Slot, BANNER_HEIGHT};
pub use text::TextRenderer;
