//! SUBSCRIBE payload: packed IP address followed by a big-endian port

use super::DecodeError;
use bytes::{BufMut, Bytes, BytesMut};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

pub const SUBSCRIBE_V4_LEN: usize = 4 + 2;
pub const SUBSCRIBE_V6_LEN: usize = 16 + 2;

/// Serialize the address the provider should publish quotes to
pub fn encode_subscribe(addr: SocketAddr) -> Bytes {
    let mut buf = BytesMut::with_capacity(SUBSCRIBE_V6_LEN);
    match addr.ip() {
        IpAddr::V4(ip) => buf.put_slice(&ip.octets()),
        IpAddr::V6(ip) => buf.put_slice(&ip.octets()),
    }
    buf.put_u16(addr.port());
    buf.freeze()
}

/// Parse a SUBSCRIBE payload back into an address
pub fn decode_subscribe(payload: &[u8]) -> Result<SocketAddr, DecodeError> {
    let (ip, port) = match payload.len() {
        SUBSCRIBE_V4_LEN => {
            let octets: [u8; 4] = payload[..4].try_into().map_err(|_| address_err(payload))?;
            (IpAddr::V4(Ipv4Addr::from(octets)), &payload[4..])
        }
        SUBSCRIBE_V6_LEN => {
            let octets: [u8; 16] = payload[..16].try_into().map_err(|_| address_err(payload))?;
            (IpAddr::V6(Ipv6Addr::from(octets)), &payload[16..])
        }
        _ => return Err(address_err(payload)),
    };
    Ok(SocketAddr::new(ip, u16::from_be_bytes([port[0], port[1]])))
}

fn address_err(payload: &[u8]) -> DecodeError {
    DecodeError::Address { len: payload.len() }
}
