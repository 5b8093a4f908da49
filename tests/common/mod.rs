#![allow(dead_code)]

use libmqtt::network::error::Error;
use libmqtt::network::*;
use libmqtt::network::application::mqtt::MessageSink;
use libmqtt::time::Clock;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

pub const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
pub const PINGRESP: [u8; 2] = [0xD0, 0x00];

/// Shared state behind a [`MockTransport`], inspected by the tests.
#[derive(Debug, Default)]
pub struct Link {
    /// Scripted results of successive `open` calls; empty means success.
    pub open_results: VecDeque<bool>,
    /// Bytes made readable right after each successful `open`.
    pub replies_on_open: VecDeque<Vec<u8>>,
    pub rx: VecDeque<u8>,
    pub written: Vec<u8>,
    pub connected: bool,
    pub opens: usize,
    pub closes: usize,
    pub write_calls: usize,
    pub fail_writes: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    link: Rc<RefCell<Link>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose next open succeeds and is answered with `reply`.
    pub fn answering(reply: &[u8]) -> Self {
        let transport = Self::new();
        transport.reply_on_open(reply);
        transport
    }

    pub fn reply_on_open(&self, reply: &[u8]) {
        self.link.borrow_mut().replies_on_open.push_back(reply.to_vec());
    }

    pub fn script_opens(&self, results: &[bool]) {
        self.link.borrow_mut().open_results.extend(results.iter().copied());
    }

    pub fn push_rx(&self, bytes: &[u8]) {
        self.link.borrow_mut().rx.extend(bytes.iter().copied());
    }

    pub fn drop_link(&self) {
        self.link.borrow_mut().connected = false;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.link.borrow_mut().fail_writes = fail;
    }

    pub fn written(&self) -> Vec<u8> {
        self.link.borrow().written.clone()
    }

    pub fn clear_written(&self) {
        self.link.borrow_mut().written.clear();
    }

    pub fn opens(&self) -> usize {
        self.link.borrow().opens
    }

    pub fn closes(&self) -> usize {
        self.link.borrow().closes
    }

    pub fn write_calls(&self) -> usize {
        self.link.borrow().write_calls
    }

    pub fn is_open(&self) -> bool {
        self.link.borrow().connected
    }

    /// Split everything written so far into frames.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        split_frames(&self.link.borrow().written)
    }

    /// Packet types (high nibble) of every frame written so far.
    pub fn written_types(&self) -> Vec<u8> {
        self.frames().iter().map(|frame| frame[0] & 0xF0).collect()
    }
}

pub fn split_frames(mut bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let mut len = 0usize;
        let mut multiplier = 1usize;
        let mut pos = 1;
        loop {
            let digit = bytes[pos];
            len += (digit & 0x7F) as usize * multiplier;
            multiplier *= 128;
            pos += 1;
            if digit & 0x80 == 0 {
                break;
            }
        }
        let end = pos + len;
        frames.push(bytes[..end].to_vec());
        bytes = &bytes[end..];
    }
    frames
}

impl Read for MockTransport {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut link = self.link.borrow_mut();
        if !link.connected {
            return Err(Error::NotOpen);
        }
        let mut count = 0;
        while count < buf.len() {
            match link.rx.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

impl Write for MockTransport {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut link = self.link.borrow_mut();
        link.write_calls += 1;
        if !link.connected || link.fail_writes {
            return Err(Error::WriteError);
        }
        link.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for MockTransport {
    type Error = Error;

    fn close(&mut self) -> Result<(), Self::Error> {
        let mut link = self.link.borrow_mut();
        link.connected = false;
        link.closes += 1;
        Ok(())
    }
}

impl Transport for MockTransport {
    type ConnectError = Error;

    fn open(&mut self, _host: &str, _port: u16) -> Result<(), Self::ConnectError> {
        let mut link = self.link.borrow_mut();
        link.opens += 1;
        if !link.open_results.pop_front().unwrap_or(true) {
            return Err(Error::ConnectionRefused);
        }
        link.connected = true;
        link.rx.clear();
        if let Some(reply) = link.replies_on_open.pop_front() {
            link.rx.extend(reply);
        }
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.link.borrow().connected
    }
}

/// Clock that only moves when told to, or when the code under test sleeps.
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    now: Rc<Cell<u64>>,
    delays: Rc<RefCell<Vec<u32>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Delays of at least `min_ms`, in call order.
    pub fn delays_over(&self, min_ms: u32) -> Vec<u32> {
        self.delays
            .borrow()
            .iter()
            .copied()
            .filter(|&ms| ms >= min_ms)
            .collect()
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.borrow_mut().push(ms);
        self.advance(ms as u64);
    }
}

/// Sink that records every delivered message.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    messages: Rc<RefCell<Vec<(String, Vec<u8>)>>>,
}

impl Recorder {
    pub fn messages(&self) -> Vec<(String, Vec<u8>)> {
        self.messages.borrow().clone()
    }
}

impl MessageSink for Recorder {
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        self.messages
            .borrow_mut()
            .push((topic.to_string(), payload.to_vec()));
    }
}

/// Encode a PUBLISH as a broker would send it.
pub fn publish_frame(topic: &str, payload: &[u8], message_id: Option<u16>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    body.extend_from_slice(topic.as_bytes());
    if let Some(id) = message_id {
        body.extend_from_slice(&id.to_be_bytes());
    }
    body.extend_from_slice(payload);

    let header = if message_id.is_some() { 0x32 } else { 0x30 };
    let mut frame = vec![header];
    let mut len = body.len();
    loop {
        let mut digit = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            digit |= 0x80;
        }
        frame.push(digit);
        if len == 0 {
            break;
        }
    }
    frame.extend(body);
    frame
}

/// Calls observed by a [`RecordingPlatform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    ServeConfiguration,
    EnterProvisioning,
    Join,
    LeaveProvisioning,
    Confirmation,
    Provisioning,
    Pin(u8, u8),
}

#[derive(Debug, Clone)]
pub struct RecordingPlatform {
    pub events: Vec<Event>,
    pub network_ready: bool,
    /// SSIDs passed to `join`.
    pub joined: Vec<String>,
    /// Whether `join` brings the network up.
    pub join_succeeds: bool,
}

impl Default for RecordingPlatform {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            network_ready: true,
            joined: Vec::new(),
            join_succeeds: false,
        }
    }
}

impl RecordingPlatform {
    pub fn count(&self, event: Event) -> usize {
        self.events.iter().filter(|&&e| e == event).count()
    }

    /// Events other than configuration serving, which happens every tick.
    pub fn notable(&self) -> Vec<Event> {
        self.events
            .iter()
            .copied()
            .filter(|&e| e != Event::ServeConfiguration)
            .collect()
    }
}

impl libmqtt::device::Platform for RecordingPlatform {
    fn network_ready(&mut self) -> bool {
        self.network_ready
    }

    fn serve_configuration(&mut self) {
        self.events.push(Event::ServeConfiguration);
    }

    fn enter_provisioning(&mut self) {
        self.events.push(Event::EnterProvisioning);
    }

    fn join(&mut self, credentials: &libmqtt::device::provisioning::NetworkCredentials) {
        self.events.push(Event::Join);
        self.joined.push(credentials.ssid.to_string());
        if self.join_succeeds {
            self.network_ready = true;
        }
    }

    fn leave_provisioning(&mut self) {
        self.events.push(Event::LeaveProvisioning);
    }

    fn indicate_confirmation(&mut self) {
        self.events.push(Event::Confirmation);
    }

    fn indicate_provisioning(&mut self) {
        self.events.push(Event::Provisioning);
    }

    fn set_pin(&mut self, pin: u8, value: u8) {
        self.events.push(Event::Pin(pin, value));
    }
}
