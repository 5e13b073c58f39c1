pub mod event;
pub mod format;
pub mod log;
pub mod settings;
pub mod socket;

pub use event::{FrameEvent, FrameType};
pub use log::ConnectionLog;
pub use settings::Settings;
pub use socket::Client;
