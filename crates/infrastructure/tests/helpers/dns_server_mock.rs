use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

/// What the mock server answers with.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// NOERROR with one A record per address.
    Answer { addresses: Vec<Ipv4Addr>, ttl: u32 },
    /// An empty response with the given response code.
    Rcode(ResponseCode),
    /// Never respond, forcing the client timeout.
    Silent,
}

/// A local UDP DNS responder for exercising the real resolve pipeline.
pub struct MockDnsServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockDnsServer {
    pub async fn start(behavior: MockBehavior) -> std::io::Result<(Self, SocketAddr)> {
        Self::start_with_delay(behavior, Duration::ZERO).await
    }

    /// Start with an artificial response delay, to hold cache stores back
    /// until every concurrent sub-worker has passed its cache check.
    pub async fn start_with_delay(
        behavior: MockBehavior,
        delay: Duration,
    ) -> std::io::Result<(Self, SocketAddr)> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let local_addr = socket.local_addr()?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = socket.recv_from(&mut buf) => {
                        let Ok((len, peer)) = result else { break };
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        if let Some(response) = build_response(&buf[..len], &behavior) {
                            let _ = socket.send_to(&response, peer).await;
                        }
                    }
                }
            }
        });

        Ok((
            Self {
                addr: local_addr,
                shutdown_tx: Some(shutdown_tx),
            },
            local_addr,
        ))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn addr_string(&self) -> String {
        self.addr.to_string()
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn build_response(query_bytes: &[u8], behavior: &MockBehavior) -> Option<Vec<u8>> {
    let query = Message::from_vec(query_bytes).ok()?;
    let question = query.queries().first()?.clone();

    let mut response = Message::new();
    response.set_id(query.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_desired(query.recursion_desired());
    response.set_recursion_available(true);
    response.add_query(question.clone());

    match behavior {
        MockBehavior::Answer { addresses, ttl } => {
            response.set_response_code(ResponseCode::NoError);
            for addr in addresses {
                response.add_answer(Record::from_rdata(
                    question.name().clone(),
                    *ttl,
                    RData::A(A(*addr)),
                ));
            }
            let mut edns = hickory_proto::op::Edns::new();
            edns.set_max_payload(4096);
            response.set_edns(edns);
        }
        MockBehavior::Rcode(rcode) => {
            response.set_response_code(*rcode);
        }
        MockBehavior::Silent => return None,
    }

    serialize(&response)
}

fn serialize(message: &Message) -> Option<Vec<u8>> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message.emit(&mut encoder).ok()?;
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_queries_with_configured_addresses() {
        let (server, addr) = MockDnsServer::start(MockBehavior::Answer {
            addresses: vec![Ipv4Addr::new(93, 184, 216, 34)],
            ttl: 60,
        })
        .await
        .unwrap();

        let mut question = hickory_proto::op::Query::new();
        question.set_name("example.com.".parse().unwrap());
        question.set_query_type(hickory_proto::rr::RecordType::A);
        let mut message = Message::new();
        message.set_id(0x1234);
        message.set_message_type(MessageType::Query);
        message.set_op_code(OpCode::Query);
        message.add_query(question);
        let query_bytes = serialize(&message).unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&query_bytes, addr).await.unwrap();
        let mut buf = vec![0u8; 4096];
        let (len, _) = client.recv_from(&mut buf).await.unwrap();

        let response = Message::from_vec(&buf[..len]).unwrap();
        assert_eq!(response.id(), 0x1234);
        assert_eq!(response.answers().len(), 1);
        assert_eq!(response.answers()[0].ttl(), 60);

        server.shutdown();
    }
}
