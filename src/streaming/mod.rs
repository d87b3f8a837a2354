pub mod range;
pub mod streamer;

pub use range::{resolve, ByteRange, Decision, RangeError};
pub use streamer::{stream, MediaFile};
