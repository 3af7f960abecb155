#![doc = include_str!("../README.md")]

mod config;
mod error;
/// uuencode binary encoding/decoding
pub mod uu;

pub use config::{EncodeConfig, default_mode};
pub use error::{Result, UuError};
pub use uu::{
    HomeResolver, StreamReport, SystemHomeResolver, UuDecoded, UuDecoder, UuHeader,
    decode as uu_decode, decode_all, encode as uu_encode, encode_stream,
};
