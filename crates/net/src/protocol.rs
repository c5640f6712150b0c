//! Protocol message definitions for client-server communication.
//!
//! Every message is a one-byte opcode followed by a packed, fixed-size
//! payload whose layout is implied by the opcode alone. Integers are `i32`,
//! floats are IEEE-754 `f32`, both little-endian.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version implemented by this server (HBUP v1.0).
pub const PROTOCOL_VERSION: i32 = 0;

/// Request discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RequestOpcode {
    /// Negotiate the protocol version.
    ConfigureConnection = 0,
    /// Create a hitbox.
    HitboxCreate = 1,
    /// Set hitbox size.
    HitboxSetSize = 2,
    /// Set hitbox location.
    HitboxSetLocation = 3,
    /// Set hitbox rotation.
    HitboxSetRotation = 4,
    /// Destroy a hitbox.
    HitboxDestroy = 5,
    /// Point containment query.
    CastPoint = 6,
    /// Ray intersection query.
    CastRay = 7,
}

impl RequestOpcode {
    /// All known request opcodes in wire order.
    pub const ALL: [Self; 8] = [
        Self::ConfigureConnection,
        Self::HitboxCreate,
        Self::HitboxSetSize,
        Self::HitboxSetLocation,
        Self::HitboxSetRotation,
        Self::HitboxDestroy,
        Self::CastPoint,
        Self::CastRay,
    ];

    /// Convert to the wire byte.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Try to convert from the wire byte.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ConfigureConnection),
            1 => Some(Self::HitboxCreate),
            2 => Some(Self::HitboxSetSize),
            3 => Some(Self::HitboxSetLocation),
            4 => Some(Self::HitboxSetRotation),
            5 => Some(Self::HitboxDestroy),
            6 => Some(Self::CastPoint),
            7 => Some(Self::CastRay),
            _ => None,
        }
    }

    /// Payload size in bytes, excluding the opcode byte.
    pub const fn payload_len(self) -> usize {
        match self {
            Self::ConfigureConnection | Self::HitboxCreate | Self::HitboxDestroy => 4,
            Self::HitboxSetSize
            | Self::HitboxSetLocation
            | Self::HitboxSetRotation
            | Self::CastPoint => 16,
            Self::CastRay => 28,
        }
    }

    /// Canonical name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigureConnection => "configure_connection",
            Self::HitboxCreate => "hitbox_create",
            Self::HitboxSetSize => "hitbox_set_size",
            Self::HitboxSetLocation => "hitbox_set_location",
            Self::HitboxSetRotation => "hitbox_set_rotation",
            Self::HitboxDestroy => "hitbox_destroy",
            Self::CastPoint => "cast_point",
            Self::CastRay => "cast_ray",
        }
    }
}

impl fmt::Display for RequestOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseOpcode {
    /// A request failed.
    Error = 0,
    /// A point cast hit a hitbox.
    PointHit = 1,
    /// A ray cast hit a hitbox.
    RayHit = 2,
}

impl ResponseOpcode {
    /// Try to convert from the wire byte.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Error),
            1 => Some(Self::PointHit),
            2 => Some(Self::RayHit),
            _ => None,
        }
    }

    /// Payload size in bytes, excluding the opcode byte.
    pub const fn payload_len(self) -> usize {
        match self {
            Self::Error => 2,
            Self::PointHit | Self::RayHit => 4,
        }
    }
}

/// Error codes carried by [`Response::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ErrorCode {
    /// Requested protocol version is not supported (or none was negotiated yet).
    InvalidProtocolVersion = 0,
    /// No hitbox with the requested ID exists.
    HitboxNotFound = 1,
    /// A hitbox with the requested ID already exists.
    IdAlreadyTaken = 2,
    /// The request opcode is not part of the protocol.
    InvalidOpcode = 3,
}

impl ErrorCode {
    /// Try to convert from the wire byte.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::InvalidProtocolVersion),
            1 => Some(Self::HitboxNotFound),
            2 => Some(Self::IdAlreadyTaken),
            3 => Some(Self::InvalidOpcode),
            _ => None,
        }
    }

    /// Canonical name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidProtocolVersion => "invalid_protocol_version",
            Self::HitboxNotFound => "hitbox_not_found",
            Self::IdAlreadyTaken => "id_already_taken",
            Self::InvalidOpcode => "invalid_opcode",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    /// Select the protocol version for this connection.
    ConfigureConnection {
        /// Requested protocol version.
        version: i32,
    },
    /// Create a hitbox with default geometry.
    HitboxCreate {
        /// Client-chosen ID.
        hitbox_id: i32,
    },
    /// Replace a hitbox's full extents.
    HitboxSetSize {
        /// Target hitbox.
        hitbox_id: i32,
        /// New (x, y, z) size.
        size: [f32; 3],
    },
    /// Replace a hitbox's center.
    HitboxSetLocation {
        /// Target hitbox.
        hitbox_id: i32,
        /// New (x, y, z) location.
        location: [f32; 3],
    },
    /// Replace a hitbox's Euler rotation.
    HitboxSetRotation {
        /// Target hitbox.
        hitbox_id: i32,
        /// New (x, y, z) rotation in radians.
        rotation: [f32; 3],
    },
    /// Remove a hitbox.
    HitboxDestroy {
        /// Target hitbox.
        hitbox_id: i32,
    },
    /// Ask whether a point lies inside any hitbox.
    CastPoint {
        /// Correlation ID echoed in [`Response::PointHit`].
        point_id: i32,
        /// Point to test.
        origin: [f32; 3],
    },
    /// Ask whether a ray strikes any hitbox.
    CastRay {
        /// Correlation ID echoed in [`Response::RayHit`].
        ray_id: i32,
        /// Ray origin.
        location: [f32; 3],
        /// Ray direction (need not be normalized).
        vector: [f32; 3],
    },
}

impl Request {
    /// Opcode that prefixes this request on the wire.
    pub fn opcode(&self) -> RequestOpcode {
        match self {
            Request::ConfigureConnection { .. } => RequestOpcode::ConfigureConnection,
            Request::HitboxCreate { .. } => RequestOpcode::HitboxCreate,
            Request::HitboxSetSize { .. } => RequestOpcode::HitboxSetSize,
            Request::HitboxSetLocation { .. } => RequestOpcode::HitboxSetLocation,
            Request::HitboxSetRotation { .. } => RequestOpcode::HitboxSetRotation,
            Request::HitboxDestroy { .. } => RequestOpcode::HitboxDestroy,
            Request::CastPoint { .. } => RequestOpcode::CastPoint,
            Request::CastRay { .. } => RequestOpcode::CastRay,
        }
    }
}

/// One unit read off the request stream.
///
/// Unknown opcodes carry no payload we could size, so they occupy a single
/// byte and are answered with [`ErrorCode::InvalidOpcode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame {
    /// A well-formed request.
    Request(Request),
    /// An opcode outside the protocol.
    Unknown(u8),
}

impl Frame {
    /// Raw opcode byte of this frame.
    pub fn opcode_byte(&self) -> u8 {
        match self {
            Frame::Request(request) => request.opcode().as_u8(),
            Frame::Unknown(opcode) => *opcode,
        }
    }
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// A request failed.
    Error {
        /// Opcode byte of the offending request.
        req_opcode: u8,
        /// Why it failed.
        err_code: ErrorCode,
    },
    /// A point cast hit a hitbox.
    PointHit {
        /// Correlation ID from the request.
        point_id: i32,
    },
    /// A ray cast hit a hitbox.
    RayHit {
        /// Correlation ID from the request.
        ray_id: i32,
    },
}

impl Response {
    /// Opcode that prefixes this response on the wire.
    pub fn opcode(&self) -> ResponseOpcode {
        match self {
            Response::Error { .. } => ResponseOpcode::Error,
            Response::PointHit { .. } => ResponseOpcode::PointHit,
            Response::RayHit { .. } => ResponseOpcode::RayHit,
        }
    }

    /// Build an error response for a request opcode byte.
    pub fn error(req_opcode: u8, err_code: ErrorCode) -> Self {
        Response::Error {
            req_opcode,
            err_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_opcodes_roundtrip_through_bytes() {
        for opcode in RequestOpcode::ALL {
            assert_eq!(RequestOpcode::from_u8(opcode.as_u8()), Some(opcode));
        }
        assert_eq!(RequestOpcode::from_u8(8), None);
        assert_eq!(RequestOpcode::from_u8(255), None);
    }

    #[test]
    fn payload_sizes_match_packed_layouts() {
        assert_eq!(RequestOpcode::ConfigureConnection.payload_len(), 4);
        assert_eq!(RequestOpcode::HitboxSetSize.payload_len(), 4 + 3 * 4);
        assert_eq!(RequestOpcode::CastRay.payload_len(), 4 + 6 * 4);
        assert_eq!(ResponseOpcode::Error.payload_len(), 2);
        assert_eq!(ResponseOpcode::RayHit.payload_len(), 4);
    }

    #[test]
    fn error_codes_use_wire_values() {
        assert_eq!(ErrorCode::InvalidProtocolVersion as u8, 0);
        assert_eq!(ErrorCode::HitboxNotFound as u8, 1);
        assert_eq!(ErrorCode::IdAlreadyTaken as u8, 2);
        assert_eq!(ErrorCode::InvalidOpcode as u8, 3);
        assert_eq!(ErrorCode::from_u8(4), None);
    }

    #[test]
    fn frame_reports_raw_opcode() {
        assert_eq!(Frame::Unknown(200).opcode_byte(), 200);
        let frame = Frame::Request(Request::CastPoint {
            point_id: 1,
            origin: [0.0; 3],
        });
        assert_eq!(frame.opcode_byte(), 6);
    }
}
