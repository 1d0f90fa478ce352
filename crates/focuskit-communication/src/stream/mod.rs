//! Command sequence streaming over the machine link

pub mod line_buffer;
pub mod link;
pub mod sequence;
pub mod streamer;

pub use line_buffer::LineAssembler;
pub use link::{connect, spawn_connect, LinkHandle, LinkId, LinkInput};
pub use sequence::CommandSequence;
pub use streamer::{CommandStreamer, LineSink, ACK_OK};
