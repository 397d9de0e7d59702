//! Blocking TCP sources for the dispatcher: one that yields new connections and one that yields
//! the lines a connected player types.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use reactor::{Cancelled, CancellationToken, Handle, Payload};
use tracing::{debug, warn};

use crate::ERR_POISONED_LOCK;

/// Everything the server's sources produce.
#[derive(Debug)]
#[non_exhaustive]
pub enum Input {
    /// A player connected.
    Connected(TcpStream),

    /// A connected player sent a line of text, without the line terminator.
    Line(String),
}

/// Accepts connections on a listening socket.
///
/// Closing the acceptor makes a blocked [`read()`][Handle::read] return end of stream by
/// connecting to the listener once, which is the only portable way to wake a blocked `accept()`.
#[derive(Debug)]
pub struct Acceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
    closed: AtomicBool,
}

impl Acceptor {
    /// Starts listening on `addr`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the address cannot be bound.
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            closed: AtomicBool::new(false),
        })
    }

    /// The address the acceptor listens on.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Handle for Acceptor {
    type Item = Input;

    fn read(&self, cancel: &CancellationToken) -> Result<Payload<Input>, Cancelled> {
        loop {
            cancel.check()?;

            if self.closed.load(Ordering::Acquire) {
                return Ok(Payload::EndOfStream);
            }

            match self.listener.accept() {
                // The wake-up connection made by `close()`, or a player who came too late.
                Ok(_) if self.closed.load(Ordering::Acquire) => return Ok(Payload::EndOfStream),
                Ok((stream, peer)) => {
                    debug!(%peer, "connection accepted");
                    return Ok(Payload::Data(Input::Connected(stream)));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(error = %e, "accepting connections failed");
                    return Ok(Payload::EndOfStream);
                }
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Err(e) = TcpStream::connect(self.local_addr) {
            debug!(error = %e, "wake-up connection to closed acceptor failed");
        }
    }
}

/// Longest line a player may send, terminator included. Guesses are single words.
pub const MAX_LINE_BYTES: u64 = 1024;

/// One connected player: reads lines from the socket and writes lines back.
///
/// Read failures and lines longer than [`MAX_LINE_BYTES`] are reported as end of stream, same
/// as the peer disconnecting.
#[derive(Debug)]
pub struct Connection {
    peer: SocketAddr,
    reader: Mutex<BufReader<TcpStream>>,
    writer: Mutex<TcpStream>,
}

impl Connection {
    /// Wraps an accepted stream.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the stream is already unusable.
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        let writer = stream.try_clone()?;

        Ok(Self {
            peer,
            reader: Mutex::new(BufReader::new(stream)),
            writer: Mutex::new(writer),
        })
    }

    /// The address of the remote end.
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Writes `line` followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the write fails, typically because the peer has gone away.
    pub fn send(&self, line: &str) -> io::Result<()> {
        let mut writer = self.writer.lock().expect(ERR_POISONED_LOCK);

        writeln!(writer, "{line}")?;
        writer.flush()
    }
}

impl Handle for Connection {
    type Item = Input;

    fn read(&self, cancel: &CancellationToken) -> Result<Payload<Input>, Cancelled> {
        cancel.check()?;

        let mut line = String::new();
        let mut reader = self.reader.lock().expect(ERR_POISONED_LOCK);

        match (&mut *reader).take(MAX_LINE_BYTES).read_line(&mut line) {
            Ok(0) => Ok(Payload::EndOfStream),
            Ok(read)
                if u64::try_from(read) == Ok(MAX_LINE_BYTES) && !line.ends_with('\n') =>
            {
                debug!(peer = %self.peer, "line too long, treating as disconnect");
                Ok(Payload::EndOfStream)
            }
            Ok(_) => Ok(Payload::Data(Input::Line(
                line.trim_end_matches(['\r', '\n']).to_owned(),
            ))),
            Err(e) => {
                debug!(peer = %self.peer, error = %e, "read failed, treating as disconnect");
                Ok(Payload::EndOfStream)
            }
        }
    }

    fn close(&self) {
        let writer = self.writer.lock().expect(ERR_POISONED_LOCK);

        // Fails if the peer already disconnected, which is just as closed.
        if let Err(e) = writer.shutdown(Shutdown::Both) {
            debug!(peer = %self.peer, error = %e, "shutting down connection failed");
        }
    }
}
