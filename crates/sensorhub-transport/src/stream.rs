use std::io::{ErrorKind, Read, Write};

use bytes::BytesMut;
use sensorhub_codec::{decode_message, encode_message, TimeValue, WireMessage, DEFAULT_MAX_PAYLOAD};
use tracing::{debug, trace, warn};

use crate::error::{Result, TransportError};
use crate::names::NameTable;
use crate::traits::{Delivery, MessageTypeId, SenderId, Transport, TransportEvent};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Configuration for a [`StreamTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Largest frame body accepted from the peer. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Bytes requested per `read` call. Default: 8 KiB.
    pub read_chunk_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_chunk_size: 8 * 1024,
        }
    }
}

/// Transport over a byte stream, carrying framed [`WireMessage`]s.
///
/// Messages travel by name, so each end keeps its own id tables; names first
/// seen from the peer are registered locally on arrival. The stream should be
/// non-blocking: `mainloop_once` reads until the stream would block.
pub struct StreamTransport<S> {
    inner: S,
    types: NameTable,
    senders: NameTable,
    rbuf: BytesMut,
    wbuf: BytesMut,
    config: StreamConfig,
    connection_events: bool,
    connected_reported: bool,
    closed: bool,
}

impl<S: Read + Write> StreamTransport<S> {
    pub fn new(inner: S) -> Self {
        Self::with_config(inner, StreamConfig::default())
    }

    pub fn with_config(inner: S, config: StreamConfig) -> Self {
        Self {
            inner,
            types: NameTable::new("type"),
            senders: NameTable::new("sender"),
            rbuf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            wbuf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            connection_events: false,
            connected_reported: false,
            closed: false,
        }
    }

    /// Whether the peer has closed the stream.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = vec![0u8; self.config.read_chunk_size.max(1)];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    debug!("stream peer closed");
                    self.closed = true;
                    return Ok(());
                }
                Ok(n) => self.rbuf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn write_all_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.wbuf.len() {
            match self.inner.write(&self.wbuf[offset..]) {
                Ok(0) => return Err(TransportError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn localize(&mut self, message: WireMessage) -> Result<Delivery> {
        Ok(Delivery {
            sender: SenderId(self.senders.register(&message.sender)?),
            message_type: MessageTypeId(self.types.register(&message.message_type)?),
            timestamp: message.timestamp,
            payload: message.payload,
        })
    }
}

#[cfg(unix)]
impl StreamTransport<std::os::unix::net::UnixStream> {
    /// Wrap a connected Unix stream, switching it to non-blocking mode.
    pub fn unix(stream: std::os::unix::net::UnixStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        if let Some((uid, gid, pid)) = crate::uds::peer_credentials(&stream) {
            debug!(uid, gid, pid, "stream peer credentials");
        }
        Ok(Self::new(stream))
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn register_type(&mut self, name: &str) -> Result<MessageTypeId> {
        self.types.register(name).map(MessageTypeId)
    }

    fn register_sender(&mut self, name: &str) -> Result<SenderId> {
        self.senders.register(name).map(SenderId)
    }

    fn type_name(&self, id: MessageTypeId) -> Option<&str> {
        self.types.name(id.0)
    }

    fn sender_name(&self, id: SenderId) -> Option<&str> {
        self.senders.name(id.0)
    }

    fn enable_connection_events(&mut self) {
        self.connection_events = true;
    }

    fn send(
        &mut self,
        sender: SenderId,
        message_type: MessageTypeId,
        timestamp: TimeValue,
        payload: &[u8],
    ) -> Result<()> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }
        let message = WireMessage::new(
            self.senders.require(sender.0)?,
            self.types.require(message_type.0)?,
            timestamp,
            payload.to_vec(),
        );

        self.wbuf.clear();
        encode_message(&message, &mut self.wbuf)?;
        trace!(bytes = self.wbuf.len(), "stream send");
        self.write_all_buffered()
    }

    fn mainloop_once(&mut self, sink: &mut dyn FnMut(TransportEvent)) -> Result<()> {
        if self.closed && self.rbuf.is_empty() {
            return Err(TransportError::ConnectionClosed);
        }

        if self.connection_events && !self.connected_reported {
            self.connected_reported = true;
            sink(TransportEvent::Connected);
        }

        if !self.closed {
            self.fill()?;
        }

        while let Some(message) = decode_message(&mut self.rbuf, self.config.max_payload_size)? {
            let delivery = self.localize(message)?;
            sink(TransportEvent::Message(delivery));
        }

        if self.closed && !self.rbuf.is_empty() {
            warn!(
                leftover = self.rbuf.len(),
                "peer closed mid-frame; discarding partial data"
            );
            self.rbuf.clear();
        }
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "stream"
    }
}

impl<S> std::fmt::Debug for StreamTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("buffered", &self.rbuf.len())
            .field("closed", &self.closed)
            .finish()
    }
}
