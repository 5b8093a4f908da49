//! Reconnection supervisor.
//!
//! When the session drops, the supervisor retries the handshake a bounded number
//! of times with a fixed delay between attempts. A successful attempt announces
//! the device and subscribes to its command topic; running out of attempts hands
//! control to the platform's provisioning mode.
//!
//! The loop runs synchronously inside the tick that found the session down.

use super::client::{MessageSink, Session};
use super::options::QoS;
use crate::device::Platform;
use crate::network::Transport;
use crate::time::Clock;

/// Default total time budget for reconnecting, in seconds.
pub const DEFAULT_RECONNECT_BUDGET_SECONDS: u32 = 20;

/// Default delay between two handshake attempts, in seconds.
pub const DEFAULT_RETRY_DELAY_SECONDS: u32 = 5;

/// Retry limits for the [`Supervisor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay after each failed attempt.
    pub retry_delay_ms: u32,
    /// Failed attempts tolerated before falling back to provisioning.
    pub max_retries: u32,
}

impl ReconnectPolicy {
    /// Derive the retry count from a time budget and a per-attempt delay.
    ///
    /// At least one attempt is always made.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use libmqtt::network::application::mqtt::ReconnectPolicy;
    ///
    /// let policy = ReconnectPolicy::from_budget(20, 5);
    /// assert_eq!(policy.max_retries, 4);
    /// assert_eq!(policy.retry_delay_ms, 5_000);
    /// ```
    pub const fn from_budget(budget_seconds: u32, retry_delay_seconds: u32) -> Self {
        let max_retries = if retry_delay_seconds == 0 {
            1
        } else {
            budget_seconds / retry_delay_seconds
        };
        Self {
            retry_delay_ms: retry_delay_seconds.saturating_mul(1000),
            max_retries: if max_retries == 0 { 1 } else { max_retries },
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_budget(DEFAULT_RECONNECT_BUDGET_SECONDS, DEFAULT_RETRY_DELAY_SECONDS)
    }
}

/// Result of one supervision pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The session was already live; nothing was done.
    AlreadyConnected,
    /// The session was re-established on the given attempt.
    Reconnected {
        /// 1-based attempt number that succeeded.
        attempts: u32,
    },
    /// Every attempt failed; the platform was switched to provisioning.
    Exhausted,
}

/// Bounded reconnection loop.
#[derive(Debug, Clone, Default)]
pub struct Supervisor {
    policy: ReconnectPolicy,
    retries: u32,
}

impl Supervisor {
    /// A supervisor with the given limits.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, retries: 0 }
    }

    /// The active limits.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Failed attempts since the last success.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Reconnect `session` if it is down.
    ///
    /// Each failed attempt is followed by the policy delay. On success the
    /// device presence is published, the device topic is subscribed at QoS 0
    /// and [`Platform::indicate_confirmation`] is signalled. After
    /// `max_retries` failures the platform is switched to provisioning mode
    /// and the loop gives up.
    pub fn reconnect<T, K, S, P, const N: usize>(
        &mut self,
        session: &mut Session<'_, T, K, S, N>,
        platform: &mut P,
    ) -> Outcome
    where
        T: Transport,
        K: Clock,
        S: MessageSink,
        P: Platform + ?Sized,
    {
        let mut attempts = 0;
        self.retries = 0;
        while !session.connected() {
            attempts += 1;
            info!("mqtt: reconnect attempt {}", attempts);
            match session.connect() {
                Ok(()) => {
                    self.retries = 0;
                    if session.announce().is_err() {
                        warn!("mqtt: presence publish failed");
                    }
                    if session.subscribe_device_topic(QoS::AtMostOnce).is_err() {
                        warn!("mqtt: device topic subscribe failed");
                    }
                    platform.indicate_confirmation();
                    return Outcome::Reconnected { attempts };
                }
                Err(_) => {
                    self.retries += 1;
                    warn!(
                        "mqtt: attempt {} failed, retrying in {} ms",
                        attempts,
                        self.policy.retry_delay_ms
                    );
                    session.clock_mut().delay_ms(self.policy.retry_delay_ms);
                    if self.retries >= self.policy.max_retries {
                        error!("mqtt: giving up after {} attempts", attempts);
                        platform.enter_provisioning();
                        platform.indicate_provisioning();
                        return Outcome::Exhausted;
                    }
                }
            }
        }
        Outcome::AlreadyConnected
    }
}
