//! Device glue around the MQTT engine.
//!
//! A [`Device`] ties a [`Session`] to the board it runs on. The board is
//! reached through the [`Platform`] trait, which covers the network link, the
//! configuration portal used for provisioning, the status indicator and the
//! output pins driven by control messages.
//!
//! The application calls [`Device::tick`] from its main loop. Each tick serves
//! the configuration portal, brings the broker session back if it dropped,
//! services the session once and applies whatever the control channel
//! delivered.

pub mod control;
pub mod provisioning;

use crate::network::Transport;
use crate::network::application::mqtt::{
    self, DEFAULT_BUFFER_SIZE, Options, Outcome, ReconnectPolicy, Session, Supervisor,
};
use crate::time::Clock;
use control::{ControlSink, Directive};
use provisioning::NetworkCredentials;

/// Default time the start-up check waits for the network, in seconds.
pub const DEFAULT_NETWORK_BUDGET_SECONDS: u32 = 20;

/// Interval between two network checks during start-up.
const NETWORK_POLL_INTERVAL_MS: u32 = 1000;

/// Error types for device operations.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The MQTT engine reported an error.
    Mqtt(mqtt::Error),
    /// A control message was not valid JSON or did not have the expected shape.
    InvalidDocument,
    /// A control message carried a header the device does not know.
    UnsupportedDirective,
    /// Output did not fit the buffer provided.
    BufferOverflow,
    /// A required form field was missing.
    MissingField,
    /// A form field was not valid percent-encoded UTF-8.
    InvalidEncoding,
}

impl From<mqtt::Error> for Error {
    fn from(error: mqtt::Error) -> Self {
        Error::Mqtt(error)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Mqtt(e) => defmt::write!(f, "Mqtt({})", e),
            Error::InvalidDocument => defmt::write!(f, "InvalidDocument"),
            Error::UnsupportedDirective => defmt::write!(f, "UnsupportedDirective"),
            Error::BufferOverflow => defmt::write!(f, "BufferOverflow"),
            Error::MissingField => defmt::write!(f, "MissingField"),
            Error::InvalidEncoding => defmt::write!(f, "InvalidEncoding"),
        }
    }
}

/// Board-specific hooks used by the device loop and the reconnection supervisor.
///
/// Only [`enter_provisioning`](Platform::enter_provisioning) is mandatory;
/// every other hook defaults to a no-op.
pub trait Platform {
    /// Whether the network link (e.g. the WiFi station) is up.
    fn network_ready(&mut self) -> bool {
        true
    }

    /// Handle pending configuration portal requests.
    fn serve_configuration(&mut self) {}

    /// Start the access point and the configuration portal.
    fn enter_provisioning(&mut self);

    /// Start joining the network described by `credentials`.
    fn join(&mut self, credentials: &NetworkCredentials) {
        let _ = credentials;
    }

    /// Stop the access point once the network is up.
    fn leave_provisioning(&mut self) {}

    /// Confirmation signal, shown after a connect and after each delivered message.
    fn indicate_confirmation(&mut self) {}

    /// Steady signal shown while the access point is running.
    fn indicate_provisioning(&mut self) {}

    /// Drive output `pin` to `value`.
    fn set_pin(&mut self, pin: u8, value: u8) {
        let _ = (pin, value);
    }
}

impl<P: Platform + ?Sized> Platform for &mut P {
    fn network_ready(&mut self) -> bool {
        (**self).network_ready()
    }

    fn serve_configuration(&mut self) {
        (**self).serve_configuration()
    }

    fn enter_provisioning(&mut self) {
        (**self).enter_provisioning()
    }

    fn join(&mut self, credentials: &NetworkCredentials) {
        (**self).join(credentials)
    }

    fn leave_provisioning(&mut self) {
        (**self).leave_provisioning()
    }

    fn indicate_confirmation(&mut self) {
        (**self).indicate_confirmation()
    }

    fn indicate_provisioning(&mut self) {
        (**self).indicate_provisioning()
    }

    fn set_pin(&mut self, pin: u8, value: u8) {
        (**self).set_pin(pin, value)
    }
}

/// A device bound to one broker session.
///
/// # Type Parameters
///
/// * `T` - the broker [`Transport`]
/// * `K` - the [`Clock`]
/// * `P` - the board [`Platform`]
/// * `N` - frame buffer capacity
pub struct Device<'a, T, K, P, const N: usize = DEFAULT_BUFFER_SIZE> {
    session: Session<'a, T, K, ControlSink, N>,
    supervisor: Supervisor,
    platform: P,
    network_attached: bool,
}

impl<T, K, P, const N: usize> core::fmt::Debug for Device<'_, T, K, P, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("session", &self.session)
            .field("supervisor", &self.supervisor)
            .field("network_attached", &self.network_attached)
            .finish_non_exhaustive()
    }
}

impl<'a, T, K, P, const N: usize> Device<'a, T, K, P, N>
where
    T: Transport,
    K: Clock,
    P: Platform,
{
    /// Build a device. The network starts attached and the session disconnected.
    pub fn new(
        transport: T,
        clock: K,
        platform: P,
        options: Options<'a>,
        policy: ReconnectPolicy,
    ) -> Result<Self, Error> {
        let session = Session::new(transport, clock, ControlSink::new(), options)?;
        Ok(Self {
            session,
            supervisor: Supervisor::new(policy),
            platform,
            network_attached: true,
        })
    }

    /// The broker session.
    pub fn session(&self) -> &Session<'a, T, K, ControlSink, N> {
        &self.session
    }

    /// Exclusive access to the broker session, e.g. to publish telemetry.
    pub fn session_mut(&mut self) -> &mut Session<'a, T, K, ControlSink, N> {
        &mut self.session
    }

    /// The board hooks.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Exclusive access to the board hooks.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// The reconnection supervisor.
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Whether the broker session is serviced on each tick.
    pub fn is_network_attached(&self) -> bool {
        self.network_attached
    }

    /// Resume servicing the broker session, e.g. after new credentials were applied.
    pub fn attach_network(&mut self) {
        self.network_attached = true;
    }

    /// Wait for the network link at start-up.
    ///
    /// Checks [`Platform::network_ready`] once per second for up to
    /// `budget_seconds`. If the link comes up, provisioning mode is left and
    /// the network is attached; otherwise the network is detached and the
    /// platform enters provisioning mode.
    ///
    /// # Returns
    ///
    /// Whether the link came up.
    pub fn await_network(&mut self, budget_seconds: u32) -> bool {
        let mut waited = 0;
        while !self.platform.network_ready() {
            waited += 1;
            self.session.clock_mut().delay_ms(NETWORK_POLL_INTERVAL_MS);
            if waited >= budget_seconds {
                warn!("device: network not up after {} s", waited);
                self.network_attached = false;
                self.platform.enter_provisioning();
                self.platform.indicate_provisioning();
                return false;
            }
        }
        info!("device: network up");
        self.network_attached = true;
        self.platform.leave_provisioning();
        true
    }

    /// Join the network with credentials submitted through the portal.
    ///
    /// Hands `credentials` to [`Platform::join`], then repeats the start-up
    /// check of [`await_network`](Self::await_network) with `budget_seconds`.
    ///
    /// # Returns
    ///
    /// Whether the link came up.
    pub fn apply_credentials(
        &mut self,
        credentials: &NetworkCredentials,
        budget_seconds: u32,
    ) -> bool {
        info!("device: joining {}", credentials.ssid.as_str());
        self.platform.join(credentials);
        self.await_network(budget_seconds)
    }

    /// Run one service cycle.
    ///
    /// 1. Serve the configuration portal.
    /// 2. If the network is attached and ready, reconnect the session when it
    ///    is down. When reconnection gives up the cycle ends here.
    /// 3. Poll the session once (keepalive, then at most one inbound packet).
    /// 4. Apply the directives delivered on the control channel.
    ///
    /// # Errors
    ///
    /// [`Error::Mqtt`] with the error reported by [`Session::poll`]. Directives
    /// that arrived before the error are still applied.
    pub fn tick(&mut self) -> Result<(), Error> {
        self.platform.serve_configuration();
        if !self.network_attached || !self.platform.network_ready() {
            return Ok(());
        }

        if !self.session.connected() {
            debug!("device: session down, reconnecting");
            if let Outcome::Exhausted = self
                .supervisor
                .reconnect(&mut self.session, &mut self.platform)
            {
                return Ok(());
            }
        }

        let polled = self.session.poll();
        self.apply_directives();
        polled.map_err(Error::from)
    }

    fn apply_directives(&mut self) {
        let sink = self.session.sink_mut();
        while let Some(directive) = sink.next_directive() {
            match directive {
                Directive::Data(writes) => {
                    for write in &writes {
                        trace!("device: pin {} <- {}", write.pin, write.value);
                        self.platform.set_pin(write.pin, write.value);
                    }
                }
                Directive::Station => {
                    info!("device: station request, entering provisioning");
                    self.platform.enter_provisioning();
                    self.platform.indicate_provisioning();
                    self.network_attached = false;
                }
            }
        }
        for _ in 0..sink.take_deliveries() {
            self.platform.indicate_confirmation();
        }
    }
}
