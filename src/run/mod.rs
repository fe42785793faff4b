mod controller;
mod session;

pub use controller::{ChannelSignal, ControllerStatus, RunController};
pub use session::{RunSession, SessionStatus};
