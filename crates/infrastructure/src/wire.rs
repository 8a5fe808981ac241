//! DNS wire format helpers: query construction and response decoding.

use dnsres_domain::ResolveError;
use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::str::FromStr;

/// Build a recursive A-record query for the hostname, with EDNS(0) at a
/// 4096-byte UDP payload and the DO bit set.
pub fn build_a_query(hostname: &str) -> Result<Vec<u8>, ResolveError> {
    let fqdn = if hostname.ends_with('.') {
        hostname.to_string()
    } else {
        format!("{hostname}.")
    };
    let name = Name::from_str(&fqdn)
        .map_err(|e| ResolveError::Query(format!("invalid hostname '{hostname}': {e}")))?;

    let mut query = Query::new();
    query.set_name(name);
    query.set_query_type(RecordType::A);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new();
    message.set_id(fastrand::u16(..));
    message.set_message_type(MessageType::Query);
    message.set_op_code(OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);
    message.set_edns(default_edns());

    serialize_message(&message)
}

fn default_edns() -> Edns {
    let mut edns = Edns::new();
    edns.set_max_payload(4096);
    edns.set_dnssec_ok(true);
    edns.set_version(0);
    edns
}

fn serialize_message(message: &Message) -> Result<Vec<u8>, ResolveError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message
        .emit(&mut encoder)
        .map_err(|e| ResolveError::Query(format!("failed to serialize DNS message: {e}")))?;
    Ok(buf)
}

pub fn parse_message(bytes: &[u8]) -> Result<Message, ResolveError> {
    Message::from_vec(bytes)
        .map_err(|e| ResolveError::Query(format!("failed to parse DNS response: {e}")))
}

/// The conventional mnemonic for a response code, as used in error-type
/// metric labels and failure events.
pub fn rcode_name(rcode: ResponseCode) -> &'static str {
    match rcode {
        ResponseCode::NoError => "NOERROR",
        ResponseCode::NXDomain => "NXDOMAIN",
        ResponseCode::ServFail => "SERVFAIL",
        ResponseCode::Refused => "REFUSED",
        ResponseCode::NotImp => "NOTIMP",
        ResponseCode::FormErr => "FORMERR",
        ResponseCode::NotAuth => "NOTAUTH",
        ResponseCode::NotZone => "NOTZONE",
        _ => "UNKNOWN",
    }
}
