/*!
Fake PDU SNMP agent

Answers GET requests on an ephemeral localhost UDP port using the agent's
own codec. Objects, error-status and silence can be changed while running.

- wrong community: datagram dropped (what real agents do)
- missing object: `noSuchName` under v1, `noSuchObject` varbind under v2c
*/

use anyhow::Result;
use clusterwatt::snmp::codec::{ErrorStatus, Message, PduKind, Value, VarBind};
use clusterwatt::snmp::Version;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct PduState {
    community: String,
    objects: HashMap<String, Value>,
    error_status: Option<ErrorStatus>,
    silent: bool,
    requests: usize,
}

pub struct FakePdu {
    port: u16,
    state: Arc<Mutex<PduState>>,
    task: JoinHandle<()>,
}

impl FakePdu {
    pub async fn start(community: &str) -> Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let port = socket.local_addr()?.port();
        let state = Arc::new(Mutex::new(PduState {
            community: community.to_string(),
            ..PduState::default()
        }));

        let shared = state.clone();
        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; 65_535];
            loop {
                let (len, peer) = match socket.recv_from(&mut buf).await {
                    Ok(received) => received,
                    Err(e) => {
                        log::error!("❌ Fake PDU receive failed: {}", e);
                        break;
                    }
                };
                let request = match Message::decode(&buf[..len]) {
                    Ok(request) => request,
                    Err(e) => {
                        log::warn!("⚠️ Fake PDU dropped undecodable datagram: {}", e);
                        continue;
                    }
                };

                let reply = {
                    let mut state = shared.lock();
                    state.requests += 1;
                    answer(&state, &request)
                };
                if let Some(reply) = reply {
                    if let Err(e) = socket.send_to(&reply.encode(), peer).await {
                        log::warn!("⚠️ Fake PDU send failed: {}", e);
                    }
                }
            }
        });

        log::info!("🧪 Fake PDU on 127.0.0.1:{}", port);
        Ok(Self { port, state, task })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_integer(&self, oid: &str, value: i64) {
        self.set_value(oid, Value::Integer(value));
    }

    pub fn set_value(&self, oid: &str, value: Value) {
        self.state.lock().objects.insert(oid.to_string(), value);
    }

    pub fn remove(&self, oid: &str) {
        self.state.lock().objects.remove(oid);
    }

    /// Answer every request with this error-status (`None` to stop).
    pub fn set_error_status(&self, status: Option<ErrorStatus>) {
        self.state.lock().error_status = status;
    }

    /// Stop answering, requests are received and counted but never replied to.
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// Datagrams decoded so far, answered or not.
    pub fn requests(&self) -> usize {
        self.state.lock().requests
    }
}

impl Drop for FakePdu {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn answer(state: &PduState, request: &Message) -> Option<Message> {
    if state.silent || request.pdu.kind != PduKind::GetRequest {
        return None;
    }
    if request.community != state.community.as_bytes() {
        log::debug!("Fake PDU ignoring request with wrong community");
        return None;
    }
    if let Some(status) = state.error_status {
        return Some(request.response(status, 1, request.pdu.varbinds.clone()));
    }

    let mut binds = Vec::with_capacity(request.pdu.varbinds.len());
    for (index, bind) in request.pdu.varbinds.iter().enumerate() {
        match state.objects.get(&bind.oid.to_string()) {
            Some(value) => binds.push(VarBind { oid: bind.oid.clone(), value: value.clone() }),
            None if request.version == Version::V1 => {
                return Some(request.response(
                    ErrorStatus::NO_SUCH_NAME,
                    index as i64 + 1,
                    request.pdu.varbinds.clone(),
                ));
            }
            None => binds.push(VarBind { oid: bind.oid.clone(), value: Value::NoSuchObject }),
        }
    }
    Some(request.response(ErrorStatus::NO_ERROR, 0, binds))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OID: &str = "1.3.6.1.4.1.318.1.1.12.1.16.0";

    fn get(version: Version, community: &str) -> Message {
        Message::get_request(version, community, 42, OID.parse().unwrap())
    }

    fn state(community: &str) -> PduState {
        PduState { community: community.to_string(), ..PduState::default() }
    }

    #[test]
    fn test_answers_known_object() {
        let mut state = state("public");
        state.objects.insert(OID.to_string(), Value::Integer(153));

        let reply = answer(&state, &get(Version::V1, "public")).unwrap();
        assert_eq!(reply.pdu.kind, PduKind::Response);
        assert_eq!(reply.pdu.request_id, 42);
        assert_eq!(reply.pdu.varbinds[0].value, Value::Integer(153));
    }

    #[test]
    fn test_wrong_community_is_dropped() {
        let mut state = state("public");
        state.objects.insert(OID.to_string(), Value::Integer(153));
        assert!(answer(&state, &get(Version::V1, "private")).is_none());
    }

    #[test]
    fn test_missing_object_per_version() {
        let state = state("public");

        let v1 = answer(&state, &get(Version::V1, "public")).unwrap();
        assert_eq!(v1.pdu.error_status, ErrorStatus::NO_SUCH_NAME);
        assert_eq!(v1.pdu.error_index, 1);

        let v2 = answer(&state, &get(Version::V2c, "public")).unwrap();
        assert!(!v2.pdu.error_status.is_error());
        assert_eq!(v2.pdu.varbinds[0].value, Value::NoSuchObject);
    }
}
