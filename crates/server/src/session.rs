//! Per-connection session state and request dispatch.
//!
//! A session starts unconfigured. Until a CONFIGURE_CONNECTION with the
//! server's protocol version succeeds, every other known request is rejected
//! with `INVALID_PROTOCOL_VERSION` (its payload is still consumed, so framing
//! stays intact). Re-configuring a configured session re-runs the version
//! check; a mismatch is reported but the earlier negotiation stays in force.
//!
//! Successful mutations and casts without a hit produce no response.

use hbup_core::{HitboxId, HitboxRegistry, RegistryError, Vec3};
use hbup_net::{
    decode_request, CodecError, ErrorCode, Frame, Request, RequestOpcode, Response,
    PROTOCOL_VERSION,
};
use hbup_physics::QueryEngine;
use tracing::{debug, warn};

/// State owned by one client connection.
#[derive(Debug, Default)]
pub struct Session {
    negotiated_version: Option<i32>,
    registry: HitboxRegistry,
}

impl Session {
    /// Create an unconfigured session with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether CONFIGURE_CONNECTION has succeeded.
    pub fn is_configured(&self) -> bool {
        self.negotiated_version.is_some()
    }

    /// Version agreed during configuration.
    pub fn negotiated_version(&self) -> Option<i32> {
        self.negotiated_version
    }

    /// Hitboxes owned by this session.
    pub fn registry(&self) -> &HitboxRegistry {
        &self.registry
    }

    /// Handle one decoded frame, returning the response to send (if any).
    pub fn handle(&mut self, frame: Frame) -> Option<Response> {
        match frame {
            Frame::Request(request) => self.handle_request(request),
            Frame::Unknown(opcode) => {
                debug!(opcode, "unknown opcode");
                Some(Response::error(opcode, ErrorCode::InvalidOpcode))
            }
        }
    }

    /// Handle one request, returning the response to send (if any).
    pub fn handle_request(&mut self, request: Request) -> Option<Response> {
        let opcode = request.opcode();
        debug!(%opcode, configured = self.is_configured(), "handling request");

        let result = match request {
            Request::ConfigureConnection { version } => return self.configure(version),
            _ if !self.is_configured() => {
                debug!(%opcode, "rejected before configuration");
                return Some(Response::error(
                    opcode.as_u8(),
                    ErrorCode::InvalidProtocolVersion,
                ));
            }
            Request::HitboxCreate { hitbox_id } => self.registry.create(HitboxId(hitbox_id)),
            Request::HitboxSetSize { hitbox_id, size } => self
                .registry
                .set_size(HitboxId(hitbox_id), Vec3::from_array(size)),
            Request::HitboxSetLocation {
                hitbox_id,
                location,
            } => self
                .registry
                .set_location(HitboxId(hitbox_id), Vec3::from_array(location)),
            Request::HitboxSetRotation {
                hitbox_id,
                rotation,
            } => self
                .registry
                .set_rotation(HitboxId(hitbox_id), Vec3::from_array(rotation)),
            Request::HitboxDestroy { hitbox_id } => {
                self.registry.destroy(HitboxId(hitbox_id)).map(|_| ())
            }
            Request::CastPoint { point_id, origin } => {
                let engine = QueryEngine::new(&self.registry);
                let hit = engine.first_point_hit(Vec3::from_array(origin));
                debug!(point_id, ?hit, "point cast");
                return hit.map(|_| Response::PointHit { point_id });
            }
            Request::CastRay {
                ray_id,
                location,
                vector,
            } => {
                let engine = QueryEngine::new(&self.registry);
                let hit =
                    engine.first_ray_hit(Vec3::from_array(location), Vec3::from_array(vector));
                debug!(ray_id, ?hit, "ray cast");
                return hit.map(|_| Response::RayHit { ray_id });
            }
        };

        match result {
            Ok(()) => None,
            Err(err) => {
                debug!(%opcode, %err, "request failed");
                Some(Response::error(opcode.as_u8(), registry_error_code(err)))
            }
        }
    }

    /// Decode and handle every frame in `bytes`, appending encoded responses
    /// to `out` in request order.
    ///
    /// Fails if `bytes` ends inside a payload. Responses for frames before
    /// the truncation are already in `out`; the caller must treat the
    /// connection as unrecoverable.
    pub fn process(&mut self, bytes: &[u8], out: &mut Vec<u8>) -> Result<usize, CodecError> {
        let mut offset = 0;
        let mut frames = 0;
        while offset < bytes.len() {
            let (frame, used) = decode_request(&bytes[offset..]).map_err(|err| {
                warn!(%err, offset, "framing error");
                err
            })?;
            offset += used;
            frames += 1;
            if let Some(response) = self.handle(frame) {
                response.encode_into(out);
            }
        }
        Ok(frames)
    }

    fn configure(&mut self, version: i32) -> Option<Response> {
        if version != PROTOCOL_VERSION {
            warn!(
                requested = version,
                supported = PROTOCOL_VERSION,
                "protocol version mismatch"
            );
            return Some(Response::error(
                RequestOpcode::ConfigureConnection.as_u8(),
                ErrorCode::InvalidProtocolVersion,
            ));
        }
        if self.negotiated_version.replace(version).is_some() {
            debug!(version, "connection re-negotiated");
        } else {
            debug!(version, "connection configured");
        }
        None
    }
}

fn registry_error_code(err: RegistryError) -> ErrorCode {
    match err {
        RegistryError::NotFound(_) => ErrorCode::HitboxNotFound,
        RegistryError::AlreadyTaken(_) => ErrorCode::IdAlreadyTaken,
    }
}
