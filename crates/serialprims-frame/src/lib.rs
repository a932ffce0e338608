//! Borrowed byte views, writer/reader ports and length-prefixed framing.
//!
//! Every frame crossing a serial session is handed around as a [`ByteView`]:
//! a `Copy`, non-owning view whose lifetime is tied to the buffer that
//! produced it. Transports plug in behind the [`Writer`] and [`Reader`]
//! ports; the [`Controller`] composes one of each into a session.
//!
//! On byte streams, frames are delimited with:
//! - A 2-byte magic number ("SP") for stream synchronization
//! - A 4-byte little-endian payload length

pub mod codec;
pub mod controller;
pub mod error;
pub mod loopback;
pub mod port;
pub mod reader;
pub mod view;
pub mod writer;

pub use codec::{
    complete_frame_len, decode_frame, encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use controller::Controller;
pub use error::{FrameError, Result};
pub use loopback::{loopback, LoopbackReader, LoopbackWriter};
pub use port::{Reader, Serial, Writer};
pub use reader::FrameReader;
pub use view::ByteView;
pub use writer::FrameWriter;
