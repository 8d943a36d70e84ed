mod handler;
mod keystrokes;

pub use handler::{Dispatcher, HidBackend, KeyState, LogBackend};
pub use keystrokes::{hid_to_key, EnigoBackend};

#[cfg(test)]
pub(crate) use handler::recording;
