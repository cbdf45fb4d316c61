//! Length-prefixed binary framing and the socket I/O primitives that back it.
//!
//! Wire format: `TYPE(1) LEN(4, big-endian u32) PAYLOAD(LEN bytes)`. The payload is
//! opaque to this layer; only the type byte is interpreted here.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use nix::sys::socket::{setsockopt, sockopt};

use crate::error::WireError;

/// How often `accept_with_deadline` re-polls a non-blocking listener: a monotonic
/// deadline polled between network operations, standing in for the original's
/// `select`-based readiness wait.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Payload size the receiver is willing to accept, matching the original's default of
/// 900 bytes; raise it uniformly if your application needs more, but sender and
/// receiver must agree — this crate does not negotiate it over the wire.
pub const DEFAULT_MAX_PAYLOAD: u32 = 900;

const HEADER_LEN: usize = 5;

/// The six wire-level packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Hello = 1,
    Task = 2,
    Result = 3,
    Error = 4,
    Abort = 5,
    Shutdown = 6,
}

impl PacketType {
    fn from_u8(b: u8) -> Result<Self, WireError> {
        match b {
            1 => Ok(PacketType::Hello),
            2 => Ok(PacketType::Task),
            3 => Ok(PacketType::Result),
            4 => Ok(PacketType::Error),
            5 => Ok(PacketType::Abort),
            6 => Ok(PacketType::Shutdown),
            other => Err(WireError::UnknownType(other)),
        }
    }
}

fn apply_common_sockopts(fd: &impl std::os::fd::AsFd) -> Result<(), WireError> {
    let _ = setsockopt(fd, sockopt::ReuseAddr, &true);
    // Not every kernel exposes SO_REUSEPORT; best-effort, as in the original C net_listen.
    let _ = setsockopt(fd, sockopt::ReusePort, &true);
    Ok(())
}

/// Bind and listen on `host:port`. IPv4, `SO_REUSEADDR` (+ opportunistic
/// `SO_REUSEPORT`).
pub fn listen(host: &str, port: u16) -> Result<TcpListener, WireError> {
    let addr = resolve_one(host, port)?;
    let listener = TcpListener::bind(addr)?;
    apply_common_sockopts(&listener)?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Accept a connection, blocking for at most `deadline` via readiness polling.
///
/// Rust's runtime ignores `SIGPIPE` by default, which is what gives us the "no
/// broken-pipe signal" discipline the framing contract asks for — a disconnected peer
/// surfaces as an `io::Error` on the next send, not a process-terminating signal.
pub fn accept_with_deadline(
    listener: &TcpListener,
    deadline: Duration,
) -> Result<(TcpStream, SocketAddr), WireError> {
    let started = Instant::now();
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(false)?;
                apply_keepalive(&stream)?;
                return Ok((stream, peer));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if started.elapsed() >= deadline {
                    return Err(WireError::Timeout);
                }
                std::thread::sleep(ACCEPT_POLL_INTERVAL.min(deadline));
            }
            Err(e) => return Err(WireError::Io(e)),
        }
    }
}

/// Close a connection accepted after admission has already completed, without reading
/// from it: a late connector must be dropped unread.
pub fn reject_late_connection(stream: TcpStream) {
    drop(stream);
}

fn apply_keepalive(stream: &TcpStream) -> Result<(), WireError> {
    let _ = setsockopt(stream, sockopt::KeepAlive, &true);
    Ok(())
}

fn resolve_one(host: &str, port: u16) -> Result<SocketAddr, WireError> {
    (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut it| it.find(|a| a.is_ipv4()))
        .ok_or_else(|| WireError::Resolve {
            host: host.to_string(),
            port,
        })
}

/// Connect to `host:port`, blocking for at most `deadline`.
pub fn connect_with_deadline(
    host: &str,
    port: u16,
    deadline: Duration,
) -> Result<TcpStream, WireError> {
    let addr = resolve_one(host, port)?;
    let stream = TcpStream::connect_timeout(&addr, deadline)?;
    apply_keepalive(&stream)?;
    Ok(stream)
}

/// Send one packet, setting the socket's write timeout for the duration of this call.
pub fn send_packet(
    stream: &mut TcpStream,
    ty: PacketType,
    payload: &[u8],
    deadline: Duration,
) -> Result<(), WireError> {
    stream.set_write_timeout(Some(deadline))?;
    let mut header = [0u8; HEADER_LEN];
    {
        let mut w = &mut header[..];
        w.write_u8(ty as u8)?;
        w.write_u32::<BigEndian>(payload.len() as u32)?;
    }
    stream.write_all(&header)?;
    stream.write_all(payload)?;
    Ok(())
}

/// Receive one packet, setting the socket's read timeout for the duration of this call.
/// `capacity` is the receiver's declared buffer size; a packet whose declared length
/// exceeds it is a framing error and the connection should be treated as unusable.
pub fn recv_packet(
    stream: &mut TcpStream,
    deadline: Duration,
    capacity: u32,
) -> Result<(PacketType, Vec<u8>), WireError> {
    stream.set_read_timeout(Some(deadline))?;
    let mut header = [0u8; HEADER_LEN];
    read_exact_mapping_eof(stream, &mut header)?;
    let ty = PacketType::from_u8(header[0])?;
    let len = (&header[1..]).read_u32::<BigEndian>()?;
    if len > capacity {
        return Err(WireError::PayloadTooLarge {
            declared: len,
            capacity,
        });
    }
    let mut payload = vec![0u8; len as usize];
    read_exact_mapping_eof(stream, &mut payload)?;
    Ok((ty, payload))
}

/// `read_exact` that turns a clean EOF mid-packet into a distinct framing error rather
/// than the generic `UnexpectedEof` io error.
fn read_exact_mapping_eof(stream: &mut TcpStream, buf: &mut [u8]) -> Result<(), WireError> {
    match stream.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(WireError::Eof),
        Err(e) if e.kind() == ErrorKind::WouldBlock => Err(WireError::Timeout),
        Err(e) => Err(WireError::Io(e)),
    }
}
