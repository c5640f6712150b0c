#![warn(missing_docs)]
//! Test helpers for driving HBUP sessions with scripted request streams.

use anyhow::{Context, Result};
use hbup_net::{decode_response, Request, Response, PROTOCOL_VERSION};

/// Builder for a raw request byte stream.
///
/// ```
/// use hbup_testkit::RequestScript;
///
/// let bytes = RequestScript::new().configure().create(1).into_bytes();
/// assert_eq!(bytes.len(), 10);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestScript {
    bytes: Vec<u8>,
    frames: usize,
}

impl RequestScript {
    /// Start an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any request.
    pub fn push(mut self, request: Request) -> Self {
        request.encode_into(&mut self.bytes);
        self.frames += 1;
        self
    }

    /// Append raw bytes (unknown opcodes, truncated payloads).
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// CONFIGURE_CONNECTION with the server's protocol version.
    pub fn configure(self) -> Self {
        self.configure_version(PROTOCOL_VERSION)
    }

    /// CONFIGURE_CONNECTION with an explicit version.
    pub fn configure_version(self, version: i32) -> Self {
        self.push(Request::ConfigureConnection { version })
    }

    /// HITBOX_CREATE.
    pub fn create(self, hitbox_id: i32) -> Self {
        self.push(Request::HitboxCreate { hitbox_id })
    }

    /// HITBOX_SET_SIZE.
    pub fn set_size(self, hitbox_id: i32, size: [f32; 3]) -> Self {
        self.push(Request::HitboxSetSize { hitbox_id, size })
    }

    /// HITBOX_SET_LOCATION.
    pub fn set_location(self, hitbox_id: i32, location: [f32; 3]) -> Self {
        self.push(Request::HitboxSetLocation {
            hitbox_id,
            location,
        })
    }

    /// HITBOX_SET_ROTATION.
    pub fn set_rotation(self, hitbox_id: i32, rotation: [f32; 3]) -> Self {
        self.push(Request::HitboxSetRotation {
            hitbox_id,
            rotation,
        })
    }

    /// HITBOX_DESTROY.
    pub fn destroy(self, hitbox_id: i32) -> Self {
        self.push(Request::HitboxDestroy { hitbox_id })
    }

    /// CAST_POINT.
    pub fn cast_point(self, point_id: i32, origin: [f32; 3]) -> Self {
        self.push(Request::CastPoint { point_id, origin })
    }

    /// CAST_RAY.
    pub fn cast_ray(self, ray_id: i32, location: [f32; 3], vector: [f32; 3]) -> Self {
        self.push(Request::CastRay {
            ray_id,
            location,
            vector,
        })
    }

    /// Number of well-formed requests pushed (raw bytes are not counted).
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Borrow the encoded stream.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the encoded stream.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Decode a concatenated stream of server responses.
pub fn decode_responses(mut bytes: &[u8]) -> Result<Vec<Response>> {
    let mut responses = Vec::new();
    while !bytes.is_empty() {
        let (response, used) = decode_response(bytes)
            .with_context(|| format!("Failed to decode response #{}", responses.len()))?;
        responses.push(response);
        bytes = &bytes[used..];
    }
    Ok(responses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hbup_net::ErrorCode;

    #[test]
    fn script_counts_frames_but_not_raw_bytes() {
        let script = RequestScript::new()
            .configure()
            .create(1)
            .cast_ray(2, [0.0; 3], [1.0, 0.0, 0.0])
            .raw(&[255]);
        assert_eq!(script.frames(), 3);
        assert_eq!(script.bytes().len(), 5 + 5 + 29 + 1);
    }

    #[test]
    fn decodes_concatenated_responses() {
        let mut bytes = Response::PointHit { point_id: 3 }.encode();
        bytes.extend(Response::error(7, ErrorCode::InvalidOpcode).encode());
        assert_eq!(
            decode_responses(&bytes).unwrap(),
            vec![
                Response::PointHit { point_id: 3 },
                Response::error(7, ErrorCode::InvalidOpcode)
            ]
        );
        assert!(decode_responses(&bytes[..3]).is_err());
    }
}
