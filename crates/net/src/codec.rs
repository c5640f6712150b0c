//! Fixed-layout message encoding and decoding.
//!
//! Frame format: `[opcode: u8][payload: opcode-specific fixed size]`. There
//! is no length prefix, so the decoder sizes each payload from its opcode and
//! performs no validation beyond that.

use crate::protocol::{ErrorCode, Frame, Request, RequestOpcode, Response, ResponseOpcode};
use thiserror::Error;

/// Framing failure while decoding.
///
/// None of these can be answered with a protocol error record; the stream
/// position is no longer trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// No bytes were available for an opcode.
    #[error("empty frame")]
    Empty,
    /// The buffer ended before the fixed payload did.
    #[error("malformed message: opcode {opcode} needs {expected} payload bytes, got {actual}")]
    Malformed {
        /// Opcode byte of the truncated message.
        opcode: u8,
        /// Payload bytes the opcode requires.
        expected: usize,
        /// Payload bytes available.
        actual: usize,
    },
    /// A response carried an opcode outside the protocol.
    #[error("unknown response opcode {0}")]
    UnknownResponseOpcode(u8),
    /// An error response carried an unknown error code.
    #[error("unknown error code {0}")]
    UnknownErrorCode(u8),
}

/// Little-endian cursor over a payload that is known to be long enough.
struct PayloadReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.position..self.position + N]);
        self.position += N;
        out
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }

    fn vec3(&mut self) -> [f32; 3] {
        [self.f32(), self.f32(), self.f32()]
    }
}

fn put_vec3(out: &mut Vec<u8>, v: [f32; 3]) {
    for component in v {
        out.extend_from_slice(&component.to_le_bytes());
    }
}

fn check_len(opcode: u8, expected: usize, payload: &[u8]) -> Result<(), CodecError> {
    if payload.len() < expected {
        return Err(CodecError::Malformed {
            opcode,
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

impl Request {
    /// Decode the fixed payload for `opcode` from the front of `payload`.
    ///
    /// Bytes past the record are ignored.
    pub fn decode(opcode: RequestOpcode, payload: &[u8]) -> Result<Self, CodecError> {
        check_len(opcode.as_u8(), opcode.payload_len(), payload)?;
        let mut r = PayloadReader::new(payload);
        let request = match opcode {
            RequestOpcode::ConfigureConnection => Request::ConfigureConnection { version: r.i32() },
            RequestOpcode::HitboxCreate => Request::HitboxCreate { hitbox_id: r.i32() },
            RequestOpcode::HitboxSetSize => Request::HitboxSetSize {
                hitbox_id: r.i32(),
                size: r.vec3(),
            },
            RequestOpcode::HitboxSetLocation => Request::HitboxSetLocation {
                hitbox_id: r.i32(),
                location: r.vec3(),
            },
            RequestOpcode::HitboxSetRotation => Request::HitboxSetRotation {
                hitbox_id: r.i32(),
                rotation: r.vec3(),
            },
            RequestOpcode::HitboxDestroy => Request::HitboxDestroy { hitbox_id: r.i32() },
            RequestOpcode::CastPoint => Request::CastPoint {
                point_id: r.i32(),
                origin: r.vec3(),
            },
            RequestOpcode::CastRay => Request::CastRay {
                ray_id: r.i32(),
                location: r.vec3(),
                vector: r.vec3(),
            },
        };
        Ok(request)
    }

    /// Append the opcode and payload to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let opcode = self.opcode();
        out.reserve(1 + opcode.payload_len());
        out.push(opcode.as_u8());
        match *self {
            Request::ConfigureConnection { version } => {
                out.extend_from_slice(&version.to_le_bytes())
            }
            Request::HitboxCreate { hitbox_id } | Request::HitboxDestroy { hitbox_id } => {
                out.extend_from_slice(&hitbox_id.to_le_bytes())
            }
            Request::HitboxSetSize {
                hitbox_id,
                size: v,
            }
            | Request::HitboxSetLocation {
                hitbox_id,
                location: v,
            }
            | Request::HitboxSetRotation {
                hitbox_id,
                rotation: v,
            } => {
                out.extend_from_slice(&hitbox_id.to_le_bytes());
                put_vec3(out, v);
            }
            Request::CastPoint { point_id, origin } => {
                out.extend_from_slice(&point_id.to_le_bytes());
                put_vec3(out, origin);
            }
            Request::CastRay {
                ray_id,
                location,
                vector,
            } => {
                out.extend_from_slice(&ray_id.to_le_bytes());
                put_vec3(out, location);
                put_vec3(out, vector);
            }
        }
    }

    /// Encode the opcode and payload into a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.opcode().payload_len());
        self.encode_into(&mut out);
        out
    }
}

impl Response {
    /// Decode the fixed payload for `opcode` from the front of `payload`.
    pub fn decode(opcode: ResponseOpcode, payload: &[u8]) -> Result<Self, CodecError> {
        check_len(opcode as u8, opcode.payload_len(), payload)?;
        let mut r = PayloadReader::new(payload);
        let response = match opcode {
            ResponseOpcode::Error => {
                let req_opcode = r.u8();
                let raw = r.u8();
                let err_code = ErrorCode::from_u8(raw).ok_or(CodecError::UnknownErrorCode(raw))?;
                Response::Error {
                    req_opcode,
                    err_code,
                }
            }
            ResponseOpcode::PointHit => Response::PointHit { point_id: r.i32() },
            ResponseOpcode::RayHit => Response::RayHit { ray_id: r.i32() },
        };
        Ok(response)
    }

    /// Append the opcode and payload to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.opcode() as u8);
        match *self {
            Response::Error {
                req_opcode,
                err_code,
            } => {
                out.push(req_opcode);
                out.push(err_code as u8);
            }
            Response::PointHit { point_id: id } | Response::RayHit { ray_id: id } => {
                out.extend_from_slice(&id.to_le_bytes())
            }
        }
    }

    /// Encode the opcode and payload into a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.opcode().payload_len());
        self.encode_into(&mut out);
        out
    }
}

/// Decode one request frame from the front of `buf`.
///
/// Returns the frame and the number of bytes it occupied. Unknown opcodes
/// consume only their opcode byte.
pub fn decode_request(buf: &[u8]) -> Result<(Frame, usize), CodecError> {
    let (&opcode, payload) = buf.split_first().ok_or(CodecError::Empty)?;
    match RequestOpcode::from_u8(opcode) {
        Some(op) => {
            let request = Request::decode(op, payload)?;
            Ok((Frame::Request(request), 1 + op.payload_len()))
        }
        None => Ok((Frame::Unknown(opcode), 1)),
    }
}

/// Decode one response frame from the front of `buf`.
pub fn decode_response(buf: &[u8]) -> Result<(Response, usize), CodecError> {
    let (&opcode, payload) = buf.split_first().ok_or(CodecError::Empty)?;
    let op = ResponseOpcode::from_u8(opcode).ok_or(CodecError::UnknownResponseOpcode(opcode))?;
    let response = Response::decode(op, payload)?;
    Ok((response, 1 + op.payload_len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_layout_is_little_endian() {
        let bytes = Request::ConfigureConnection { version: 1 }.encode();
        assert_eq!(bytes, vec![0, 1, 0, 0, 0]);
    }

    #[test]
    fn set_size_layout_is_packed() {
        let bytes = Request::HitboxSetSize {
            hitbox_id: -1,
            size: [1.0, 2.0, -0.5],
        }
        .encode();
        let mut expected = vec![2, 0xff, 0xff, 0xff, 0xff];
        expected.extend_from_slice(&1.0f32.to_le_bytes());
        expected.extend_from_slice(&2.0f32.to_le_bytes());
        expected.extend_from_slice(&(-0.5f32).to_le_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn decode_cast_ray() {
        let request = Request::CastRay {
            ray_id: 77,
            location: [-5.0, 0.0, 0.0],
            vector: [1.0, 0.0, 0.0],
        };
        let bytes = request.encode();
        assert_eq!(bytes.len(), 29);
        let (frame, used) = decode_request(&bytes).unwrap();
        assert_eq!(frame, Frame::Request(request));
        assert_eq!(used, 29);
    }

    #[test]
    fn decode_consumes_only_one_record() {
        let mut bytes = Request::HitboxCreate { hitbox_id: 3 }.encode();
        bytes.extend(Request::HitboxDestroy { hitbox_id: 3 }.encode());
        let (frame, used) = decode_request(&bytes).unwrap();
        assert_eq!(frame, Frame::Request(Request::HitboxCreate { hitbox_id: 3 }));
        let (frame, _) = decode_request(&bytes[used..]).unwrap();
        assert_eq!(frame, Frame::Request(Request::HitboxDestroy { hitbox_id: 3 }));
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let bytes = Request::CastPoint {
            point_id: 9,
            origin: [0.0; 3],
        }
        .encode();
        assert_eq!(
            decode_request(&bytes[..10]),
            Err(CodecError::Malformed {
                opcode: 6,
                expected: 16,
                actual: 9
            })
        );
    }

    #[test]
    fn empty_buffer_is_rejected() {
        assert_eq!(decode_request(&[]), Err(CodecError::Empty));
        assert_eq!(decode_response(&[]), Err(CodecError::Empty));
    }

    #[test]
    fn unknown_opcode_consumes_one_byte() {
        assert_eq!(decode_request(&[255, 1, 2]), Ok((Frame::Unknown(255), 1)));
    }

    #[test]
    fn error_response_layout() {
        let response = Response::error(255, ErrorCode::InvalidOpcode);
        let bytes = response.encode();
        assert_eq!(bytes, vec![0, 255, 3]);
        assert_eq!(decode_response(&bytes), Ok((response, 3)));
    }

    #[test]
    fn response_decoder_rejects_unknown_values() {
        assert_eq!(
            decode_response(&[9, 0, 0, 0, 0]),
            Err(CodecError::UnknownResponseOpcode(9))
        );
        assert_eq!(
            decode_response(&[0, 1, 42]),
            Err(CodecError::UnknownErrorCode(42))
        );
    }

    #[test]
    fn nan_payload_bits_survive() {
        let weird = f32::from_bits(0x7fc0_1234);
        let bytes = Request::CastPoint {
            point_id: i32::MIN,
            origin: [weird, f32::MAX, f32::MIN],
        }
        .encode();
        let (frame, _) = decode_request(&bytes).unwrap();
        let Frame::Request(Request::CastPoint { point_id, origin }) = frame else {
            panic!("unexpected frame {frame:?}");
        };
        assert_eq!(point_id, i32::MIN);
        assert_eq!(origin[0].to_bits(), 0x7fc0_1234);
        assert_eq!(origin[1], f32::MAX);
        assert_eq!(origin[2], f32::MIN);
    }
}
