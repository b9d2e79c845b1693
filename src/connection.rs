use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use tracing::{debug, trace};

use crate::error::{ConnectError, SendError};

/// Classification of one read from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Received(usize),
    EndOfStream,
    Error(String),
}

/// A byte channel the session loop can send a request on and read the
/// response from, one caller-sized chunk at a time.
pub trait Channel {
    fn send(&mut self, bytes: &[u8]) -> Result<(), SendError>;
    fn read_chunk(&mut self, buf: &mut [u8]) -> ReadOutcome;
    fn shutdown(&mut self);
}

/// One TCP connection to a fetch server.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    pub fn open(host: &str, port: u16) -> Result<Self, ConnectError> {
        let addresses = (host, port)
            .to_socket_addrs()
            .map_err(|_| ConnectError::UnknownHost {
                host: host.to_string(),
            })?
            .collect::<Vec<_>>();

        let mut last_error = None;
        for address in addresses {
            match TcpStream::connect(address) {
                Ok(stream) => {
                    debug!(%address, "connected to fetch server");
                    return Ok(Self {
                        stream,
                        peer: address,
                    });
                }
                Err(err) => {
                    trace!(%address, error = %err, "connect attempt failed");
                    last_error = Some((address, err));
                }
            }
        }

        match last_error {
            Some((address, err)) => Err(ConnectError::ConnectFailed {
                address: address.to_string(),
                reason: err.to_string(),
            }),
            None => Err(ConnectError::UnknownHost {
                host: host.to_string(),
            }),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Channel for Connection {
    /// One `write` per call; the std runtime ignores SIGPIPE so a closed peer
    /// surfaces as `BrokenPipe` rather than killing the process.
    fn send(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        loop {
            match self.stream.write(bytes) {
                Ok(written) if written == bytes.len() => return Ok(()),
                Ok(written) => {
                    return Err(SendError::ShortWrite {
                        expected: bytes.len(),
                        written,
                    });
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(classify_send_error(&err)),
            }
        }
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> ReadOutcome {
        read_classified(&mut self.stream, buf)
    }

    fn shutdown(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Read-only channel over any byte stream, used for HTTP bodies and
/// command output. Requests are carried out of band, so `send` is refused.
pub struct ReaderChannel<R: Read> {
    reader: R,
}

impl<R: Read> ReaderChannel<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> Channel for ReaderChannel<R> {
    fn send(&mut self, _bytes: &[u8]) -> Result<(), SendError> {
        Err(SendError::NotConnected)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> ReadOutcome {
        read_classified(&mut self.reader, buf)
    }

    fn shutdown(&mut self) {}
}

pub fn read_classified<R: Read>(reader: &mut R, buf: &mut [u8]) -> ReadOutcome {
    loop {
        match reader.read(buf) {
            Ok(0) => return ReadOutcome::EndOfStream,
            Ok(count) => return ReadOutcome::Received(count),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return ReadOutcome::Error(err.to_string()),
        }
    }
}

fn classify_send_error(err: &io::Error) -> SendError {
    match err.kind() {
        ErrorKind::BrokenPipe => SendError::BrokenPipe,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => SendError::ConnectionReset,
        ErrorKind::NotConnected => SendError::NotConnected,
        _ => SendError::Io(err.to_string()),
    }
}
