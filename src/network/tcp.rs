use super::error::Error;
use super::{Close, Read, Transport, Write};
use std::io::{ErrorKind, Read as StdRead, Write as StdWrite};
use std::net::TcpStream;

/// A [`Transport`] over a non-blocking [`TcpStream`].
///
/// Reads return `Ok(0)` while the socket has nothing pending. A read of zero
/// bytes from the socket itself means the peer closed the stream, which is
/// reported as [`Error::ConnectionClosed`] and drops the socket.
#[derive(Debug, Default)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Create a transport with no open stream.
    pub fn new() -> Self {
        Self { stream: None }
    }
}

impl Read for TcpTransport {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;
        match stream.read(buf) {
            Ok(0) if !buf.is_empty() => {
                self.stream = None;
                Err(Error::ConnectionClosed)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(_) => {
                self.stream = None;
                Err(Error::ReadError)
            }
        }
    }
}

impl Write for TcpTransport {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;
        loop {
            match stream.write(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => std::thread::yield_now(),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(_) => {
                    self.stream = None;
                    return Err(Error::WriteError);
                }
            }
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;
        if stream.flush().is_err() {
            self.stream = None;
            return Err(Error::WriteError);
        }
        Ok(())
    }
}

impl Close for TcpTransport {
    type Error = Error;

    fn close(&mut self) -> Result<(), Self::Error> {
        match self.stream.take() {
            Some(stream) => {
                let _ = stream.shutdown(std::net::Shutdown::Both);
                Ok(())
            }
            None => Err(Error::NotOpen),
        }
    }
}

impl Transport for TcpTransport {
    type ConnectError = Error;

    fn open(&mut self, host: &str, port: u16) -> Result<(), Self::ConnectError> {
        self.stream = None;
        let stream = TcpStream::connect((host, port)).map_err(|e| match e.kind() {
            ErrorKind::ConnectionRefused => Error::ConnectionRefused,
            ErrorKind::InvalidInput => Error::InvalidAddress,
            _ => Error::NotOpen,
        })?;
        stream.set_nodelay(true).map_err(|_| Error::NotOpen)?;
        stream.set_nonblocking(true).map_err(|_| Error::NotOpen)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        let Some(stream) = self.stream.as_ref() else {
            return false;
        };
        let mut probe = [0u8; 1];
        match stream.peek(&mut probe) {
            Ok(0) => {
                self.stream = None;
                false
            }
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::WouldBlock => true,
            Err(_) => {
                self.stream = None;
                false
            }
        }
    }
}
