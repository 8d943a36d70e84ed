pub mod manager;
pub mod protocol;
pub mod settings;
pub mod virtual_device;

pub use manager::{find_ports, DeviceInfo, DeviceManager, InputEvent};
pub use protocol::{Command, ProtocolError, RefreshMode, Report};
pub use settings::Settings;
pub use virtual_device::{PhysicalInput, VirtualDevice};
