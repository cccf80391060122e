//! Framing primitives (spec.md §4.7, C7): blocking send/recv that loop on
//! partial I/O and retry on interrupt, plus a best-effort non-blocking send
//! used only for async broadcast.

use std::io;
use std::io::Read;
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;

use crate::error::ProtocolError;
use crate::wire::header::Header;
use crate::wire::header::HEADER_LEN;

/// Blocking send: loops on partial writes, retries on `EINTR`.
pub fn send(stream: &UnixStream, msg_type: u16, payload: &[u8]) -> Result<(), ProtocolError> {
    let header = Header::new(msg_type, payload.len() as u32);
    write_all_retry(stream, &header.to_bytes())?;
    if !payload.is_empty() {
        write_all_retry(stream, payload)?;
    }
    Ok(())
}

/// Best-effort send: a single `MSG_DONTWAIT` write of the whole frame.
/// Fails with `ProtocolError::WouldBlock` rather than suspending — used
/// only for async broadcast (PROGRESS, END, GLOBAL_MODE_CHANGED) so a slow
/// client can never stall the simulation loop. Unlike toggling
/// `set_nonblocking` on the stream, this never touches the socket's
/// blocking mode, which is shared with any other clone of the same fd
/// (the per-connection reader thread's handle).
pub fn send_best_effort(stream: &UnixStream, msg_type: u16, payload: &[u8]) -> Result<(), ProtocolError> {
    let header = Header::new(msg_type, payload.len() as u32);
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(payload);
    send_nonblocking_raw(stream, &frame)
}

fn send_nonblocking_raw(stream: &UnixStream, buf: &[u8]) -> Result<(), ProtocolError> {
    let fd = stream.as_raw_fd();
    let mut offset = 0;
    while offset < buf.len() {
        let remaining = &buf[offset..];
        let n = unsafe {
            libc::send(
                fd,
                remaining.as_ptr() as *const libc::c_void,
                remaining.len(),
                libc::MSG_DONTWAIT,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => return Err(ProtocolError::WouldBlock),
                _ => return Err(ProtocolError::Io(err)),
            }
        }
        offset += n as usize;
    }
    Ok(())
}

pub fn recv_hdr(stream: &UnixStream) -> Result<Header, ProtocolError> {
    let mut buf = [0u8; HEADER_LEN];
    read_exact_retry(stream, &mut buf, ProtocolError::HeaderClosed)?;
    Ok(Header::from_bytes(buf))
}

pub fn recv_payload(stream: &UnixStream, len: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![0u8; len];
    read_exact_retry(stream, &mut buf, ProtocolError::PayloadClosed)?;
    Ok(buf)
}

fn write_all_retry(mut stream: &UnixStream, mut buf: &[u8]) -> Result<(), ProtocolError> {
    while !buf.is_empty() {
        match stream.write(buf) {
            Ok(0) => return Err(ProtocolError::PayloadClosed),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProtocolError::Io(e)),
        }
    }
    Ok(())
}

fn read_exact_retry(mut stream: &UnixStream, mut buf: &mut [u8], on_eof: ProtocolError) -> Result<(), ProtocolError> {
    while !buf.is_empty() {
        match stream.read(buf) {
            Ok(0) => return Err(on_eof),
            Ok(n) => {
                let tmp = buf;
                buf = &mut tmp[n..];
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProtocolError::Io(e)),
        }
    }
    Ok(())
}
