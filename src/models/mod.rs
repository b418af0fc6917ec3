pub mod message;
pub mod room;
pub mod vital_sample;

pub use message::*;
pub use room::*;
pub use vital_sample::*;
