//! Wire encoding for the two authentication RPCs. Reuses the framing
//! codec's outer envelope (`spec.md` §4.1: signature, xid, body length)
//! but has its own small body grammar — the main request/response shape of
//! §4.1 belongs to the file-service protocol, not this short exchange.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result, Status};
use crate::wire::frame::SIGNATURE;
use crate::wire::primitive;

const CMD_AUTHENTICATE: u8 = 1;
const CMD_WHICH_GROUPS: u8 = 4;

async fn write_frame_body(stream: &mut TcpStream, body: &[u8]) -> Result<()> {
    let mut out = Vec::with_capacity(13 + body.len());
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    stream.write_all(&out).await.map_err(|_| Error::Status(Status::HostUnreachable))?;
    stream.flush().await.map_err(|_| Error::Status(Status::HostUnreachable))
}

async fn read_frame_body(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut header = [0u8; 5 + 4 + 4];
    stream.read_exact(&mut header).await.map_err(|_| Error::Status(Status::HostUnreachable))?;
    if &header[..5] != SIGNATURE {
        return Err(Error::Protocol);
    }
    let body_len = u32::from_le_bytes(header[9..13].try_into().unwrap()) as usize;
    let mut body = vec![0u8; body_len];
    stream.read_exact(&mut body).await.map_err(|_| Error::Status(Status::HostUnreachable))?;
    Ok(body)
}

pub async fn send_authenticate(stream: &mut TcpStream, user: &str, token: &[u8; 128]) -> Result<()> {
    let mut body = Vec::new();
    primitive::write_u8(&mut body, CMD_AUTHENTICATE)?;
    primitive::write_string(&mut body, user)?;
    primitive::write_array(&mut body, token)?;
    write_frame_body(stream, &body).await
}

pub async fn recv_authenticate_reply(stream: &mut TcpStream) -> Result<()> {
    let body = read_frame_body(stream).await?;
    let mut cursor = std::io::Cursor::new(body);
    let status = primitive::i32(&mut cursor)?;
    if status == 0 {
        Ok(())
    } else {
        Err(Error::Status(Status::Access))
    }
}

pub async fn send_which_groups(stream: &mut TcpStream, user: &str) -> Result<()> {
    let mut body = Vec::new();
    primitive::write_u8(&mut body, CMD_WHICH_GROUPS)?;
    primitive::write_string(&mut body, user)?;
    write_frame_body(stream, &body).await
}

pub async fn recv_which_groups_reply(stream: &mut TcpStream) -> Result<Vec<String>> {
    let mut groups = Vec::new();
    loop {
        let body = read_frame_body(stream).await?;
        let mut cursor = std::io::Cursor::new(body);
        let status = primitive::i32(&mut cursor)?;
        if status != 0 {
            return Ok(groups);
        }
        groups.push(primitive::string(&mut cursor, 32)?);
    }
}
