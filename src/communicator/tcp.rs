//! Blocking TCP communicator.
//!
//! The client listens on `127.0.0.1:port` and the simulation connects to
//! it, the same direction the simulation expects when launched with
//! `--mlagents-port`. Each round trip is one framed [`Envelope`] each way.

use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::framing::{is_disconnect, read_message, write_message};
use super::Communicator;
use crate::error::{Result, SimLinkError};
use crate::protocol::{Command, RlInput, UnityInput, UnityOutput};

/// Envelope status for a regular message
pub const STATUS_OK: i32 = 200;

/// Envelope status announcing that the sender is shutting down
pub const STATUS_CLOSING: i32 = 400;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Envelope header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// [`STATUS_OK`] or [`STATUS_CLOSING`]
    pub status: i32,
}

/// One frame on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Status header
    pub header: EnvelopeHeader,
    /// Message body, absent on closing frames
    pub payload: Option<T>,
}

impl<T> Envelope<T> {
    /// Regular message
    pub fn ok(payload: T) -> Self {
        Self {
            header: EnvelopeHeader { status: STATUS_OK },
            payload: Some(payload),
        }
    }

    /// Closing message carrying an optional final payload
    pub fn closing(payload: Option<T>) -> Self {
        Self {
            header: EnvelopeHeader {
                status: STATUS_CLOSING,
            },
            payload,
        }
    }
}

/// Communicator over a single accepted TCP connection
#[derive(Debug)]
pub struct TcpCommunicator {
    listener: Option<TcpListener>,
    stream: Option<TcpStream>,
    timeout: Duration,
    closed: bool,
}

impl TcpCommunicator {
    /// Bind `127.0.0.1:port`. Port 0 picks a free port, see [`Self::local_addr`].
    pub fn bind(port: u16, timeout: Duration) -> Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let listener = TcpListener::bind(addr).map_err(|e| {
            SimLinkError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Couldn't bind {addr}; another environment may already be using this port, \
                     try a different worker id: {e}"
                ),
            ))
        })?;
        tracing::info!("Listening for the simulation on {}", addr);

        Ok(Self {
            listener: Some(listener),
            stream: None,
            timeout,
            closed: false,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        match &self.listener {
            Some(listener) => Ok(listener.local_addr()?),
            None => Err(SimLinkError::CommunicatorStopped(
                "listener already released".to_string(),
            )),
        }
    }

    fn accept(&mut self) -> Result<()> {
        let listener = self.listener.as_ref().ok_or_else(|| {
            SimLinkError::CommunicatorStopped("communicator is closed".to_string())
        })?;
        listener.set_nonblocking(true)?;

        let deadline = Instant::now() + self.timeout;
        let stream = loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    tracing::debug!("Simulation connected from {}", peer);
                    break stream;
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(SimLinkError::Timeout(format!(
                            "The simulation did not connect within {}s. Check that it is \
                             running and pointed at the right port.",
                            self.timeout.as_secs()
                        )));
                    }
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                },
                Err(e) => return Err(e.into()),
            }
        };

        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn round_trip(&mut self, input: UnityInput) -> Result<Option<UnityOutput>> {
        if self.closed {
            return Ok(None);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(SimLinkError::CommunicatorStopped(
                "no simulation connected".to_string(),
            ));
        };

        match write_message(stream, &Envelope::ok(input)) {
            Ok(()) => {},
            Err(SimLinkError::Io(e)) if is_disconnect(&e) => {
                tracing::debug!("Simulation went away while sending: {}", e);
                return Ok(None);
            },
            Err(e) => return Err(e),
        }
        let reply: Option<Envelope<UnityOutput>> = read_message(stream)?;
        match reply {
            Some(envelope) if envelope.header.status == STATUS_OK => Ok(envelope.payload),
            Some(envelope) => {
                tracing::debug!("Simulation replied with status {}", envelope.header.status);
                Ok(None)
            },
            None => Ok(None),
        }
    }
}

impl Communicator for TcpCommunicator {
    fn initialize(&mut self, input: UnityInput) -> Result<Option<UnityOutput>> {
        if self.stream.is_none() {
            self.accept()?;
        }
        // Bound the handshake by the same timeout as the connection.
        if let Some(stream) = &self.stream {
            stream.set_read_timeout(Some(self.timeout))?;
        }
        let output = self.round_trip(input);
        if let Some(stream) = &self.stream {
            stream.set_read_timeout(None)?;
        }
        output
    }

    fn exchange(&mut self, input: UnityInput) -> Result<Option<UnityOutput>> {
        self.round_trip(input)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(mut stream) = self.stream.take() {
            let quit = UnityInput::rl(RlInput {
                command: Command::Quit,
                ..Default::default()
            });
            if let Err(e) = write_message(&mut stream, &Envelope::closing(Some(quit))) {
                tracing::debug!("Failed to notify the simulation of shutdown: {}", e);
            }
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        self.listener = None;
    }
}

impl Drop for TcpCommunicator {
    fn drop(&mut self) {
        self.close();
    }
}
