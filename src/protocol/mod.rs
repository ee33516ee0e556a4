//! Wire protocol
//!
//! Every message travels server → client as compact JSON followed by a
//! single newline:
//!
//! ```text
//! {"lap":1,"speed":301.4}\n{"lap":2,"speed":298.0}\n...
//! ```
//!
//! There is no length prefix and no client → server payload. The encoder
//! escapes control characters inside strings, so a raw `\n` can only ever
//! be a delimiter.

pub mod codec;

pub use codec::{
    encode, CodecError, EncodeError, FrameDecoder, DEFAULT_MAX_FRAME_SIZE, DELIMITER,
};

/// One unit of telemetry: a JSON object with arbitrary values
pub type Frame = serde_json::Map<String, serde_json::Value>;
