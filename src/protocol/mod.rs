pub mod decoder;
pub mod encoder;
pub mod reply;

pub use decoder::{DecodeOutcome, Decoder};
pub use encoder::encode_command;
pub use reply::{Bulk, Reply};
