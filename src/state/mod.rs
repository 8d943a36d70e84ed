mod manager;

pub use manager::{dim, position_ring, AppState, Focus, LedState, LED_FADE, LED_HOLD};
