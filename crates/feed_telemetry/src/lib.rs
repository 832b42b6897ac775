use std::net::SocketAddr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::info;

/// Largest payload we accept. The wire format is one short ASCII float,
/// so anything near this size is already garbage.
pub const MAX_DATAGRAM_BYTES: usize = 4096;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestConfig {
    pub bind_addr: SocketAddr,
    /// Optional SO_RCVBUF override; left to the OS default when absent.
    pub recv_buffer_bytes: Option<usize>,
}

/// Bind the telemetry ingest socket. Any failure here is fatal to the
/// process: the controller has no duty other than telemetry and control,
/// so there is nothing sensible to fall back to.
pub fn bind_telemetry_socket(cfg: &IngestConfig) -> Result<UdpSocket> {
    let domain = if cfg.bind_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .context("create telemetry UDP socket")?;

    if let Some(bytes) = cfg.recv_buffer_bytes {
        socket
            .set_recv_buffer_size(bytes)
            .with_context(|| format!("set SO_RCVBUF to {bytes}"))?;
    }
    socket
        .set_nonblocking(true)
        .context("set telemetry socket nonblocking")?;
    socket
        .bind(&cfg.bind_addr.into())
        .with_context(|| format!("bind telemetry UDP socket at {}", cfg.bind_addr))?;

    let socket =
        UdpSocket::from_std(socket.into()).context("register telemetry socket with tokio")?;
    info!(addr = %cfg.bind_addr, "telemetry listener started");
    Ok(socket)
}

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("payload is not UTF-8")]
    NotUtf8,
    #[error("payload is not a number: {0:?}")]
    NotANumber(String),
    #[error("latency out of range: {0}")]
    OutOfRange(f64),
}

/// Decode one datagram payload as a non-negative finite latency in
/// seconds. Failures are the caller's cue to drop the datagram and keep
/// running; a hostile sender must not be able to kill the loop.
pub fn decode_latency(payload: &[u8]) -> Result<f64, DecodeError> {
    let text = std::str::from_utf8(payload).map_err(|_| DecodeError::NotUtf8)?;
    let trimmed = text.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| DecodeError::NotANumber(preview(trimmed)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(DecodeError::OutOfRange(value));
    }
    Ok(value)
}

/// Bounded copy of a payload for error messages.
fn preview(text: &str) -> String {
    const LIMIT: usize = 32;
    if text.len() <= LIMIT {
        text.to_string()
    } else {
        let mut end = LIMIT;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_and_newline_terminated_floats() {
        assert_eq!(decode_latency(b"0.25"), Ok(0.25));
        assert_eq!(decode_latency(b"0.731\n"), Ok(0.731));
        assert_eq!(decode_latency(b"  1e-3 "), Ok(0.001));
        assert_eq!(decode_latency(b"0"), Ok(0.0));
    }

    #[test]
    fn rejects_non_numeric_payloads() {
        assert_eq!(
            decode_latency(b"abc"),
            Err(DecodeError::NotANumber("abc".to_string()))
        );
        assert_eq!(
            decode_latency(b""),
            Err(DecodeError::NotANumber(String::new()))
        );
        assert_eq!(decode_latency(&[0xff, 0xfe]), Err(DecodeError::NotUtf8));
    }

    #[test]
    fn rejects_values_outside_the_latency_domain() {
        assert!(matches!(
            decode_latency(b"-0.5"),
            Err(DecodeError::OutOfRange(_))
        ));
        assert!(matches!(
            decode_latency(b"nan"),
            Err(DecodeError::OutOfRange(_))
        ));
        assert!(matches!(
            decode_latency(b"inf"),
            Err(DecodeError::OutOfRange(_))
        ));
    }

    #[test]
    fn long_garbage_is_previewed_not_echoed() {
        let payload = vec![b'x'; 500];
        match decode_latency(&payload) {
            Err(DecodeError::NotANumber(p)) => assert!(p.len() <= 36),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
