//! Response body: `xid | reserved | status | payload` (`spec.md` §4.1).

use std::io::Cursor;

use crate::error::{Error, Result, Status};
use crate::wire::primitive;

/// A decoded response header; `payload` is the remaining command-specific
/// bytes, only meaningful when `status` is `Ok`.
pub struct Response {
    pub xid: u32,
    pub status: i32,
    pub payload: Vec<u8>,
}

pub fn decode(body: &[u8]) -> Result<Response> {
    let mut src = Cursor::new(body);
    let xid = primitive::u32(&mut src)?;
    let reserved = primitive::u32(&mut src)?;
    if reserved != 0 {
        return Err(Error::Protocol);
    }
    let status = primitive::i32(&mut src)?;
    let payload = body[src.position() as usize..].to_vec();
    Ok(Response { xid, status, payload })
}

/// Encodes a successful response body, appending `payload` verbatim.
pub fn encode_ok(xid: u32, payload: &[u8]) -> Result<Vec<u8>> {
    encode(xid, Status::Ok, payload)
}

/// Encodes an error response body; no payload is ever written alongside a
/// non-zero status (`spec.md` §4.1: "payload ... only present on success").
pub fn encode_err(xid: u32, status: Status) -> Result<Vec<u8>> {
    encode(xid, status, &[])
}

fn encode(xid: u32, status: Status, payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(12 + payload.len());
    primitive::write_u32(&mut out, xid)?;
    primitive::write_u32(&mut out, 0)?;
    primitive::write_i32(&mut out, status.to_wire())?;
    primitive::write_array(&mut out, payload)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ok_response() {
        let body = encode_ok(5, b"payload-bytes").unwrap();
        let decoded = decode(&body).unwrap();
        assert_eq!(decoded.xid, 5);
        assert_eq!(decoded.status, 0);
        assert_eq!(decoded.payload, b"payload-bytes");
    }

    #[test]
    fn round_trips_error_response() {
        let body = encode_err(5, Status::NoEntry).unwrap();
        let decoded = decode(&body).unwrap();
        assert_eq!(decoded.status, -2);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn nonzero_reserved_rejected() {
        let mut body = encode_ok(1, &[]).unwrap();
        body[4] = 1; // corrupt the reserved field
        assert!(decode(&body).is_err());
    }
}
