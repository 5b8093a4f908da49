//! MQTT 3.1.1 session for constrained devices.
//!
//! A [`Session`] owns the transport, the clock, the inbound message sink and a
//! single [`FrameBuffer`]. Every operation borrows the session mutably, so the
//! buffer is never shared between two operations in flight.
//!
//! # Lifecycle
//!
//! ```text
//!                 connect()                CONNACK 0
//! Disconnected ─────────────▶ Connecting ─────────────▶ Connected
//!       ▲                         │                         │
//!       │ disconnect()            │ open failed /           │ transport dropped /
//!       │                         │ timeout / refused       │ missed pong
//!       │                         ▼                         ▼
//!       └──────────────── failure states ◀──────────────────┘
//! ```
//!
//! # Service loop
//!
//! [`Session::poll`] is the per-tick entry point: it runs the keepalive check
//! and, when the transport has a byte pending, reads and dispatches exactly one
//! packet. Inbound PUBLISH packets reach the [`MessageSink`] synchronously; a
//! QoS 1 delivery is acknowledged right after the sink returns.

use super::error::Error;
use super::options::{Options, PRESENCE_PAYLOAD, QoS, Topics};
use super::packet::{
    self, DISCONNECT, Decoded, FrameBuffer, PINGREQ, PINGRESP, PUBLISH, PayloadStream,
};
use super::state::{ReturnCode, State};
use crate::network::{Transport, Write};
use crate::time::Clock;

/// Default frame buffer capacity in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// Receiver of inbound PUBLISH messages.
///
/// `on_message` runs synchronously inside [`Session::poll`] exactly once per
/// decoded publish. No other packet is read until it returns.
///
/// Closures taking `(&str, &[u8])` implement this trait.
pub trait MessageSink {
    /// Handle a message. `payload` excludes the QoS 1 message identifier.
    fn on_message(&mut self, topic: &str, payload: &[u8]);

    /// Stream for payload bytes of publishes too large for the frame buffer.
    ///
    /// When this returns `Some`, payload bytes of every inbound publish are
    /// passed through as they are read. Publishes that fit the buffer are
    /// delivered to `on_message` with their payload; larger ones reach
    /// `on_message` with an empty payload once streaming is done. QoS 1 is
    /// acknowledged either way.
    fn payload_stream(&mut self) -> Option<&mut dyn PayloadStream> {
        None
    }
}

impl<F> MessageSink for F
where
    F: FnMut(&str, &[u8]),
{
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        self(topic, payload)
    }
}

/// An MQTT 3.1.1 client session.
///
/// # Type Parameters
///
/// * `T` - the byte-stream [`Transport`]
/// * `K` - the [`Clock`] used for every deadline
/// * `S` - the inbound [`MessageSink`]
/// * `N` - frame buffer capacity
pub struct Session<'a, T, K, S, const N: usize = DEFAULT_BUFFER_SIZE> {
    options: Options<'a>,
    topics: Topics,
    transport: T,
    clock: K,
    sink: S,
    buffer: FrameBuffer<N>,
    state: State,
    last_in_activity: u64,
    last_out_activity: u64,
    ping_outstanding: bool,
    next_message_id: u16,
}

impl<T, K, S, const N: usize> core::fmt::Debug for Session<'_, T, K, S, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("client_id", &self.options.client_id)
            .field("state", &self.state)
            .field("ping_outstanding", &self.ping_outstanding)
            .field("next_message_id", &self.next_message_id)
            .finish_non_exhaustive()
    }
}

impl<'a, T, K, S, const N: usize> Session<'a, T, K, S, N>
where
    T: Transport,
    K: Clock,
    S: MessageSink,
{
    /// Create a disconnected session.
    ///
    /// # Errors
    ///
    /// [`Error::TopicTooLong`] if the device topics cannot be derived from the
    /// client identifier.
    pub fn new(transport: T, clock: K, sink: S, options: Options<'a>) -> Result<Self, Error> {
        let topics = Topics::for_client(options.client_id)?;
        let now = clock.now_ms();
        Ok(Self {
            options,
            topics,
            transport,
            clock,
            sink,
            buffer: FrameBuffer::new(),
            state: State::Disconnected,
            last_in_activity: now,
            last_out_activity: now,
            ping_outstanding: false,
            next_message_id: 1,
        })
    }

    /// Current connection state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The options the session was built with.
    pub fn options(&self) -> &Options<'a> {
        &self.options
    }

    /// The device topic pair.
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Whether a PINGREQ is waiting for its PINGRESP.
    pub fn ping_outstanding(&self) -> bool {
        self.ping_outstanding
    }

    /// Shared access to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Exclusive access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Shared access to the message sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Exclusive access to the message sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Exclusive access to the clock, e.g. for retry delays.
    pub fn clock_mut(&mut self) -> &mut K {
        &mut self.clock
    }

    /// Establish the MQTT session.
    ///
    /// Opens the transport, sends CONNECT and waits for CONNACK. The wait is
    /// bounded by the socket timeout measured from the moment CONNECT was
    /// written. Returns immediately if the session is already connected.
    ///
    /// # Errors
    ///
    /// * [`Error::BufferOverflow`] - CONNECT does not fit the frame buffer;
    ///   the transport is not touched
    /// * [`Error::Transport`] - the transport could not be opened or failed
    ///   during the handshake (state `TransportConnectFailed`)
    /// * [`Error::Timeout`] - no CONNACK in time (state `HandshakeTimeout`)
    /// * [`Error::RejectedByPeer`] - non-zero return code (state `RejectedByPeer`)
    /// * [`Error::MalformedPacket`] - the reply was not a valid CONNACK
    ///   (state `Disconnected`)
    ///
    /// On every error the transport is left closed.
    pub fn connect(&mut self) -> Result<(), Error> {
        if self.state == State::Connected && self.connected() {
            return Ok(());
        }

        let options = self.options;
        let frame = self.buffer.encode_connect(
            options.client_id,
            options.keep_alive_seconds,
            options.will.as_ref(),
            options.credentials.as_ref(),
        )?;

        self.state = State::Connecting;
        info!(
            "mqtt: connecting to {}:{} as {}",
            options.broker.host,
            options.broker.port,
            options.client_id
        );
        if self
            .transport
            .open(options.broker.host, options.broker.port)
            .is_err()
        {
            warn!("mqtt: transport open failed");
            self.state = State::TransportConnectFailed;
            return Err(Error::Transport);
        }
        self.next_message_id = 1;

        if let Err(e) = write_frame(&mut self.transport, frame) {
            return Err(self.abort_handshake(State::TransportConnectFailed, e));
        }
        let now = self.clock.now_ms();
        self.last_in_activity = now;
        self.last_out_activity = now;

        let timeout_ms = options.socket_timeout_ms();
        let decoded = packet::read_byte(&mut self.transport, &mut self.clock, timeout_ms)
            .and_then(|header| {
                self.buffer.read_packet(
                    header,
                    &mut self.transport,
                    &mut self.clock,
                    timeout_ms,
                    None,
                )
            });
        let code = match decoded {
            Ok(Decoded::Complete(frame)) => self
                .buffer
                .packet(&frame)
                .and_then(|packet| packet.connack_code()),
            Ok(Decoded::Streamed(_) | Decoded::Ignored(_)) => Err(Error::MalformedPacket),
            Err(e) => Err(e),
        };

        match code {
            Ok(ReturnCode::Accepted) => {
                self.last_in_activity = self.clock.now_ms();
                self.ping_outstanding = false;
                self.state = State::Connected;
                info!("mqtt: connected");
                Ok(())
            }
            Ok(code) => {
                warn!("mqtt: connection refused, code {}", code.code());
                Err(self.abort_handshake(State::RejectedByPeer(code), Error::RejectedByPeer(code)))
            }
            Err(Error::Timeout) => {
                warn!("mqtt: no CONNACK within {} ms", timeout_ms);
                Err(self.abort_handshake(State::HandshakeTimeout, Error::Timeout))
            }
            Err(Error::Transport) => {
                Err(self.abort_handshake(State::TransportConnectFailed, Error::Transport))
            }
            Err(e) => {
                warn!("mqtt: malformed CONNACK");
                Err(self.abort_handshake(State::Disconnected, e))
            }
        }
    }

    fn abort_handshake(&mut self, state: State, error: Error) -> Error {
        self.state = state;
        let _ = self.transport.close();
        error
    }

    /// Whether the session is live.
    ///
    /// Asks the transport. If it reports a drop while the state is
    /// `Connected`, the state moves to `ConnectionLost` and the transport is
    /// flushed and closed.
    pub fn connected(&mut self) -> bool {
        let connected = self.transport.is_connected();
        if !connected && self.state == State::Connected {
            warn!("mqtt: connection lost");
            self.lose_connection();
        }
        connected
    }

    fn ensure_connected(&mut self) -> Result<(), Error> {
        if self.connected() && self.state == State::Connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn lose_connection(&mut self) {
        self.state = State::ConnectionLost;
        let _ = self.transport.flush();
        let _ = self.transport.close();
    }

    /// Drop the connection if a write on a live session failed.
    fn check_write(&mut self, written: Result<(), Error>) -> Result<(), Error> {
        if written.is_err() {
            warn!("mqtt: write failed, dropping connection");
            self.lose_connection();
        }
        written
    }

    /// End the session.
    ///
    /// Sends DISCONNECT if the transport is open, then closes it. Always
    /// succeeds locally; calling it on a disconnected session is a no-op.
    pub fn disconnect(&mut self) {
        if self.transport.is_connected() {
            if let Ok(frame) = self.buffer.encode_control(DISCONNECT) {
                if write_frame(&mut self.transport, frame).is_err() {
                    debug!("mqtt: DISCONNECT not delivered");
                }
            }
            let _ = self.transport.close();
        }
        self.state = State::Disconnected;
        self.ping_outstanding = false;
        let now = self.clock.now_ms();
        self.last_in_activity = now;
        self.last_out_activity = now;
    }

    /// Keepalive check, run once per service tick.
    ///
    /// When the keepalive interval has passed since the last inbound or the
    /// last outbound packet, sends a PINGREQ. If the previous PINGREQ is still
    /// unanswered at that point, the peer is declared dead.
    ///
    /// # Errors
    ///
    /// * [`Error::PeerUnresponsive`] - missed PINGRESP; state `ConnectionLost`
    /// * [`Error::Transport`] - the PINGREQ could not be written; state `ConnectionLost`
    pub fn keep_alive(&mut self) -> Result<(), Error> {
        let interval = self.options.keep_alive_ms();
        if self.state != State::Connected || interval == 0 {
            return Ok(());
        }
        let now = self.clock.now_ms();
        let idle_in = now.saturating_sub(self.last_in_activity);
        let idle_out = now.saturating_sub(self.last_out_activity);
        if idle_in <= interval && idle_out <= interval {
            return Ok(());
        }

        if self.ping_outstanding {
            warn!("mqtt: PINGRESP missing, dropping connection");
            self.state = State::ConnectionLost;
            let _ = self.transport.close();
            return Err(Error::PeerUnresponsive);
        }

        trace!("mqtt: PINGREQ");
        let frame = self.buffer.encode_control(PINGREQ)?;
        let written = write_frame(&mut self.transport, frame);
        self.check_write(written)?;
        self.last_in_activity = now;
        self.last_out_activity = now;
        self.ping_outstanding = true;
        Ok(())
    }

    /// Service the session once.
    ///
    /// Runs [`keep_alive`](Self::keep_alive) and, if a byte is pending on the
    /// transport, reads and dispatches one packet:
    ///
    /// * PUBLISH - delivered to the sink; QoS 1 is acknowledged with PUBACK,
    ///   including publishes that only fit through the sink's payload stream
    /// * PINGREQ - answered with PINGRESP
    /// * PINGRESP - clears the outstanding ping
    /// * anything else - consumed and dropped
    ///
    /// A packet that times out half-way is discarded as if nothing arrived.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConnected`] - the session is not live
    /// * [`Error::PeerUnresponsive`] / [`Error::Transport`] - the session
    ///   was lost
    /// * [`Error::MalformedPacket`] - the packet was dropped; the session stays
    ///   connected
    pub fn poll(&mut self) -> Result<(), Error> {
        self.ensure_connected()?;
        self.keep_alive()?;

        let header = match packet::try_read_byte(&mut self.transport) {
            Ok(Some(header)) => header,
            Ok(None) => return Ok(()),
            Err(e) => {
                self.lose_connection();
                return Err(e);
            }
        };

        let timeout_ms = self.options.socket_timeout_ms();
        let stream = self.sink.payload_stream();
        let decoded = self.buffer.read_packet(
            header,
            &mut self.transport,
            &mut self.clock,
            timeout_ms,
            stream,
        );
        let now = self.clock.now_ms();

        match decoded {
            Ok(Decoded::Complete(frame)) => {
                self.last_in_activity = now;
                match frame.packet_type() {
                    PUBLISH => self.dispatch_publish(&frame, false, now),
                    PINGREQ => {
                        let frame = self.buffer.encode_control(PINGRESP)?;
                        let written = write_frame(&mut self.transport, frame);
                        self.check_write(written)?;
                        self.last_out_activity = now;
                        Ok(())
                    }
                    PINGRESP => {
                        self.ping_outstanding = false;
                        Ok(())
                    }
                    other => {
                        trace!("mqtt: dropping packet type {=u8:#x}", other);
                        Ok(())
                    }
                }
            }
            Ok(Decoded::Streamed(frame)) => {
                self.last_in_activity = now;
                self.dispatch_publish(&frame, true, now)
            }
            Ok(Decoded::Ignored(frame)) => {
                self.last_in_activity = now;
                debug!(
                    "mqtt: packet of {} bytes exceeds buffer, ignored",
                    frame.remaining_length()
                );
                Ok(())
            }
            Err(Error::Timeout) => {
                debug!("mqtt: packet timed out mid-read, discarded");
                Ok(())
            }
            Err(Error::Transport) => {
                self.lose_connection();
                Err(Error::Transport)
            }
            Err(e) => {
                warn!("mqtt: malformed packet dropped");
                Err(e)
            }
        }
    }

    fn dispatch_publish(
        &mut self,
        frame: &packet::Frame,
        streamed: bool,
        now: u64,
    ) -> Result<(), Error> {
        let publish = if streamed {
            self.buffer.streamed_publish(frame)?
        } else {
            self.buffer.packet(frame)?.publish()?
        };
        self.sink.on_message(publish.topic, publish.payload);
        let Some(message_id) = publish.message_id else {
            return Ok(());
        };

        let frame = self.buffer.encode_puback(message_id)?;
        let written = write_frame(&mut self.transport, frame);
        self.check_write(written)?;
        self.last_out_activity = now;
        Ok(())
    }

    /// Publish `payload` on `topic` with QoS 0.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConnected`] - the session is not live
    /// * [`Error::PayloadTooLarge`] - topic and payload exceed the frame
    ///   buffer; nothing is written
    /// * [`Error::Transport`] - the write failed; state `ConnectionLost`
    pub fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> Result<(), Error> {
        self.ensure_connected()?;
        let frame = self.buffer.encode_publish(topic, payload, retained)?;
        let written = write_frame(&mut self.transport, frame);
        self.check_write(written)?;
        self.last_out_activity = self.clock.now_ms();
        Ok(())
    }

    /// Subscribe to `topic`.
    ///
    /// The request itself is always framed at QoS 1; `qos` is the level asked
    /// for the subscription. The SUBACK is not awaited.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConnected`] - the session is not live
    /// * [`Error::TopicTooLong`] - the request exceeds the frame buffer
    /// * [`Error::Transport`] - the write failed; state `ConnectionLost`
    pub fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Error> {
        self.ensure_connected()?;
        let message_id = self.allocate_message_id();
        let frame = self.buffer.encode_subscribe(message_id, topic, qos)?;
        let written = write_frame(&mut self.transport, frame);
        self.check_write(written)?;
        self.last_out_activity = self.clock.now_ms();
        Ok(())
    }

    /// Unsubscribe from `topic`.
    ///
    /// # Errors
    ///
    /// Same as [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&mut self, topic: &str) -> Result<(), Error> {
        self.ensure_connected()?;
        let message_id = self.allocate_message_id();
        let frame = self.buffer.encode_unsubscribe(message_id, topic)?;
        let written = write_frame(&mut self.transport, frame);
        self.check_write(written)?;
        self.last_out_activity = self.clock.now_ms();
        Ok(())
    }

    /// Announce the device on its publish topic.
    pub fn announce(&mut self) -> Result<(), Error> {
        let topics = self.topics.clone();
        self.publish(topics.publish(), PRESENCE_PAYLOAD, false)
    }

    /// Subscribe to the device's own subscribe topic.
    pub fn subscribe_device_topic(&mut self, qos: QoS) -> Result<(), Error> {
        let topics = self.topics.clone();
        self.subscribe(topics.subscribe(), qos)
    }

    fn allocate_message_id(&mut self) -> u16 {
        self.next_message_id = self.next_message_id.wrapping_add(1);
        if self.next_message_id == 0 {
            self.next_message_id = 1;
        }
        self.next_message_id
    }
}

/// Write a whole frame and flush it.
fn write_frame<T: Write + ?Sized>(transport: &mut T, frame: &[u8]) -> Result<(), Error> {
    let mut written = 0;
    while written < frame.len() {
        match transport.write(&frame[written..]) {
            Ok(0) | Err(_) => return Err(Error::Transport),
            Ok(n) => written += n,
        }
    }
    transport.flush().map_err(|_| Error::Transport)
}
