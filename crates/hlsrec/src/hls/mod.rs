mod playlist;
mod poller;

pub use playlist::*;
pub use poller::*;
