#![warn(missing_docs)]
//! Hitbox Update Protocol messages and their fixed-layout binary codec.

mod codec;
mod protocol;

pub use codec::{decode_request, decode_response, CodecError};
pub use protocol::{
    ErrorCode, Frame, Request, RequestOpcode, Response, ResponseOpcode, PROTOCOL_VERSION,
};
