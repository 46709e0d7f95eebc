pub mod duration;
pub mod http;
