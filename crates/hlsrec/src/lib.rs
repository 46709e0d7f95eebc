pub mod decrypt;
pub mod dedup;
pub mod error;
pub mod hls;
pub mod pipeline;
pub mod recorder;
pub mod segment;
pub mod sink;
pub mod util;

pub use error::*;
pub use recorder::{Recorder, RecorderConfig};
pub use segment::ChunkJob;
pub use util::{duration::RecordLength, http::HttpClient};
