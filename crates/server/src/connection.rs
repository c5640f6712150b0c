//! Per-connection request loop.
//!
//! Reads one opcode byte, then exactly the payload that opcode implies,
//! hands the frame to the connection's [`Session`] and writes the response
//! (if any) before reading the next request. A payload cut short by the peer
//! closing the stream is a framing error: the loop stops without answering.

use crate::replay::{ExchangeEntry, ExchangeLogger};
use crate::session::Session;
use anyhow::{Context, Result};
use hbup_net::{CodecError, Frame, Request, RequestOpcode, Response};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tracing::{debug, warn};

/// Largest request payload (CAST_RAY).
const MAX_PAYLOAD_LEN: usize = 28;

/// Why a connection loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// The peer closed the stream on a frame boundary.
    PeerClosed,
    /// The stream ended inside a payload.
    FramingError(CodecError),
}

/// Counters reported when a connection ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSummary {
    /// Frames decoded and handled.
    pub frames: u64,
    /// Response records written.
    pub responses: u64,
    /// How the loop ended.
    pub end: ConnectionEnd,
}

enum ReadOutcome {
    Frame(Frame, usize),
    Closed,
    Truncated(CodecError),
}

/// Serve HBUP requests on `stream` until the peer disconnects.
///
/// Stream I/O failures are returned as errors; framing errors are reported
/// through [`ConnectionSummary::end`]. A failing exchange log is dropped with a
/// warning and never ends the connection.
pub async fn serve_connection<S>(
    stream: S,
    mut exchange_log: Option<ExchangeLogger>,
) -> Result<ConnectionSummary>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufStream::new(stream);
    let mut session = Session::new();
    let mut buf = [0u8; 1 + MAX_PAYLOAD_LEN];
    let mut out = Vec::with_capacity(8);
    let mut summary = ConnectionSummary {
        frames: 0,
        responses: 0,
        end: ConnectionEnd::PeerClosed,
    };

    loop {
        let (frame, len) = match read_frame(&mut stream, &mut buf).await? {
            ReadOutcome::Frame(frame, len) => (frame, len),
            ReadOutcome::Closed => break,
            ReadOutcome::Truncated(err) => {
                warn!(%err, "framing error, closing connection");
                summary.end = ConnectionEnd::FramingError(err);
                break;
            }
        };

        let response = session.handle(frame);
        summary.frames += 1;

        if let Some(log) = exchange_log.as_mut() {
            let entry = exchange_entry(summary.frames - 1, frame, &buf[..len], response);
            if let Err(err) = log.log(&entry).await {
                warn!("exchange log write failed, recording stopped: {err:#}");
                exchange_log = None;
            }
        }

        if let Some(response) = response {
            out.clear();
            response.encode_into(&mut out);
            stream
                .write_all(&out)
                .await
                .context("Failed to write response")?;
            stream.flush().await.context("Failed to flush response")?;
            summary.responses += 1;
        }
    }

    if let Some(log) = exchange_log.as_mut() {
        if let Err(err) = log.flush().await {
            warn!("exchange log flush failed: {err:#}");
        }
    }
    debug!(
        frames = summary.frames,
        responses = summary.responses,
        "connection loop finished"
    );
    Ok(summary)
}

async fn read_frame<R>(reader: &mut R, buf: &mut [u8]) -> Result<ReadOutcome>
where
    R: AsyncRead + Unpin,
{
    let opcode = match reader.read_u8().await {
        Ok(byte) => byte,
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Ok(ReadOutcome::Closed)
        }
        Err(err) => return Err(err).context("Failed to read opcode"),
    };
    buf[0] = opcode;

    let Some(op) = RequestOpcode::from_u8(opcode) else {
        return Ok(ReadOutcome::Frame(Frame::Unknown(opcode), 1));
    };

    let expected = op.payload_len();
    let payload = &mut buf[1..1 + expected];
    let mut filled = 0;
    while filled < expected {
        let n = reader
            .read(&mut payload[filled..])
            .await
            .context("Failed to read payload")?;
        if n == 0 {
            return Ok(ReadOutcome::Truncated(CodecError::Malformed {
                opcode,
                expected,
                actual: filled,
            }));
        }
        filled += n;
    }

    let request = Request::decode(op, payload)?;
    Ok(ReadOutcome::Frame(Frame::Request(request), 1 + expected))
}

fn exchange_entry(
    seq: u64,
    frame: Frame,
    raw: &[u8],
    response: Option<Response>,
) -> ExchangeEntry {
    let op = match frame {
        Frame::Request(request) => Some(request.opcode()),
        Frame::Unknown(_) => None,
    };
    let error = match response {
        Some(Response::Error { err_code, .. }) => Some(err_code),
        _ => None,
    };
    ExchangeEntry {
        seq,
        op,
        error,
        request: raw.to_vec(),
        response: response.map(|r| r.encode()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hbup_net::{ErrorCode, Request};
    use tokio::io::duplex;

    #[tokio::test]
    async fn answers_requests_in_order_over_a_duplex() {
        let (mut client, server) = duplex(1024);
        let task = tokio::spawn(serve_connection(server, None));

        let mut bytes = Vec::new();
        Request::HitboxCreate { hitbox_id: 1 }.encode_into(&mut bytes);
        Request::ConfigureConnection { version: 0 }.encode_into(&mut bytes);
        Request::HitboxCreate { hitbox_id: 1 }.encode_into(&mut bytes);
        Request::HitboxDestroy { hitbox_id: 2 }.encode_into(&mut bytes);
        client.write_all(&bytes).await.unwrap();
        client.shutdown().await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();

        let mut expected = Vec::new();
        Response::error(1, ErrorCode::InvalidProtocolVersion).encode_into(&mut expected);
        Response::error(5, ErrorCode::HitboxNotFound).encode_into(&mut expected);
        assert_eq!(received, expected);

        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.responses, 2);
        assert_eq!(summary.end, ConnectionEnd::PeerClosed);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn failing_exchange_log_keeps_serving() {
        let log = ExchangeLogger::create("/dev/full").await.unwrap();
        let (mut client, server) = duplex(64 * 1024);
        let task = tokio::spawn(serve_connection(server, Some(log)));

        client.write_all(&[0xFF; 500]).await.unwrap();
        client.shutdown().await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        let mut expected = Vec::new();
        for _ in 0..500 {
            Response::error(0xFF, ErrorCode::InvalidOpcode).encode_into(&mut expected);
        }
        assert_eq!(received, expected);

        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.frames, 500);
        assert_eq!(summary.responses, 500);
        assert_eq!(summary.end, ConnectionEnd::PeerClosed);
    }

    #[tokio::test]
    async fn truncated_payload_ends_the_connection_silently() {
        let (mut client, server) = duplex(64);
        let task = tokio::spawn(serve_connection(server, None));

        client.write_all(&[0, 0, 0]).await.unwrap();
        client.shutdown().await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());

        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.frames, 0);
        assert_eq!(
            summary.end,
            ConnectionEnd::FramingError(CodecError::Malformed {
                opcode: 0,
                expected: 4,
                actual: 2,
            })
        );
    }
}
