//! SNMP reader for PDU power and energy counters
//!
//! One transient UDP session per read (bind, send, await the matching
//! response, drop). The reader returns the raw integer reported by the
//! device; unit scaling is the caller's business.

pub mod codec;

pub use codec::{Oid, Version};

use crate::config::SnmpConfig;
use async_trait::async_trait;
use codec::{Message, PduKind};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tracing::debug;

const MAX_DATAGRAM: usize = 65_535;

static NEXT_REQUEST_ID: AtomicI32 = AtomicI32::new(1);

#[derive(Debug, thiserror::Error)]
pub enum SnmpError {
    /// Transport or agent-level failure: unresolvable host, socket error, timeout.
    #[error("no usable answer from {target}: {reason}")]
    Indication { target: String, reason: String },
    /// The agent answered with an error-status or an exception value.
    #[error("{target} answered {status} for {oid}")]
    Status { target: String, oid: String, status: String },
    /// The answer could not be decoded or is not an integer.
    #[error("malformed answer from {target}: {reason}")]
    Malformed { target: String, reason: String },
}

/// Single-value SNMP read, the seam the aggregator polls the PDU through.
#[async_trait]
pub trait SnmpRead: Send + Sync {
    async fn read(&self, address: &str, community: &str, oid: &Oid) -> Result<i64, SnmpError>;
}

#[derive(Debug, Clone)]
pub struct SnmpReader {
    version: Version,
    port: u16,
    timeout: Duration,
    retries: u32,
}

impl SnmpReader {
    pub fn new(version: Version, port: u16, timeout: Duration, retries: u32) -> Self {
        Self { version, port, timeout, retries }
    }

    pub fn from_config(config: &SnmpConfig) -> Self {
        Self::new(
            config.version,
            config.port,
            Duration::from_millis(config.timeout_ms),
            config.retries,
        )
    }

    async fn open_session(&self, address: &str, target: &str) -> Result<UdpSocket, SnmpError> {
        let indication = |reason: String| SnmpError::Indication { target: target.to_string(), reason };

        let peer = lookup_host((address, self.port))
            .await
            .map_err(|e| indication(format!("cannot resolve address: {e}")))?
            .next()
            .ok_or_else(|| indication("address resolved to nothing".into()))?;

        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| indication(format!("bind failed: {e}")))?;
        socket
            .connect(peer)
            .await
            .map_err(|e| indication(format!("connect failed: {e}")))?;
        Ok(socket)
    }

    async fn await_response(
        socket: &UdpSocket,
        buf: &mut [u8],
        request_id: i32,
        target: &str,
    ) -> Result<Message, SnmpError> {
        loop {
            let len = socket.recv(buf).await.map_err(|e| SnmpError::Indication {
                target: target.to_string(),
                reason: format!("receive failed: {e}"),
            })?;

            let message = match Message::decode(&buf[..len]) {
                Ok(message) => message,
                Err(e) => {
                    debug!("Ignoring undecodable SNMP datagram from {}: {}", target, e);
                    continue;
                }
            };

            if message.pdu.kind == PduKind::Response && message.pdu.request_id == request_id {
                return Ok(message);
            }
            debug!(
                "Ignoring SNMP datagram from {} (request-id {}, expected {})",
                target, message.pdu.request_id, request_id
            );
        }
    }

    fn interpret(message: Message, target: &str, oid: &Oid) -> Result<i64, SnmpError> {
        let pdu = message.pdu;
        if pdu.error_status.is_error() {
            return Err(SnmpError::Status {
                target: target.to_string(),
                oid: oid.to_string(),
                status: format!("{} at index {}", pdu.error_status, pdu.error_index),
            });
        }

        let bind = pdu.varbinds.into_iter().next().ok_or_else(|| SnmpError::Malformed {
            target: target.to_string(),
            reason: "response carries no varbind".into(),
        })?;

        if let Some(exception) = bind.value.exception() {
            return Err(SnmpError::Status {
                target: target.to_string(),
                oid: oid.to_string(),
                status: exception.to_string(),
            });
        }

        bind.value.as_i64().ok_or_else(|| SnmpError::Malformed {
            target: target.to_string(),
            reason: format!("{} value is not an integer", bind.value.type_name()),
        })
    }
}

#[async_trait]
impl SnmpRead for SnmpReader {
    async fn read(&self, address: &str, community: &str, oid: &Oid) -> Result<i64, SnmpError> {
        let target = format!("{}:{}", address, self.port);
        let socket = self.open_session(address, &target).await?;

        let request_id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed) & 0x7fff_ffff;
        let request = Message::get_request(self.version, community, request_id, oid.clone()).encode();
        let mut buf = vec![0u8; MAX_DATAGRAM];

        for attempt in 0..=self.retries {
            socket.send(&request).await.map_err(|e| SnmpError::Indication {
                target: target.clone(),
                reason: format!("send failed: {e}"),
            })?;

            let pending = Self::await_response(&socket, &mut buf, request_id, &target);
            match tokio::time::timeout(self.timeout, pending).await {
                Ok(answer) => return Self::interpret(answer?, &target, oid),
                Err(_) => debug!("SNMP GET {} on {} timed out (attempt {})", oid, target, attempt + 1),
            }
        }

        Err(SnmpError::Indication {
            target,
            reason: format!(
                "request timed out after {} attempt(s) of {:?}",
                self.retries + 1,
                self.timeout
            ),
        })
    }
}
