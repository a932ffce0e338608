//! Zero-copy serial framing with verify-then-interpret envelopes.
//!
//! serialprims moves length-prefixed frames between a byte transport and a
//! request/response protocol without copying them, and refuses typed access to
//! any inbound message that has not passed verification.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain socket and TCP byte streams
//! - [`frame`]: byte views, writer/reader ports, the controller and framing
//! - [`schema`]: envelope verification, builders, request/response wrappers
//!   (behind the default `schema` feature)

/// Re-export transport types.
pub mod transport {
    pub use serialprims_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serialprims_frame::*;
}

/// Re-export schema types (requires `schema` feature).
#[cfg(feature = "schema")]
pub mod schema {
    pub use serialprims_schema::*;
}
