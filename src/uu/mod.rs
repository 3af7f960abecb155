//! uuencode binary encoding/decoding
//!
//! uuencode packs every 3 bytes into 4 printable characters, 45 bytes per
//! line, framed by a `begin <mode> <name>` header and an `end` trailer.

pub mod decode;
pub mod encode;
pub mod format;
pub mod home;
pub mod types;

pub use decode::{UuDecoder, create_target, decode, decode_all, decode_line, resolve_target};
pub use encode::{encode, encode_line, encode_stream, encoded_len};
pub use home::{HomeResolver, SystemHomeResolver};
pub use types::{StreamReport, UuDecoded, UuHeader};
