use std::{fmt, net::Ipv4Addr};

use log::{debug, info, warn};

use crate::{
    config::{Timings, DISCOVERY_REQUEST},
    hardware::{Clock, DiscoveryTransport},
};

/// Longest reply payload accepted as an address, excluding a terminator.
pub const MAX_ADDRESS_LEN: usize = 15;

/// Large enough that an oversized reply is seen whole instead of silently
/// truncated into something that happens to parse.
const REPLY_BUFFER_LEN: usize = 64;

/// IPv4 address of the alert server, as announced in a discovery reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerAddress(Ipv4Addr);

impl ServerAddress {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self(ip)
    }

    /// Interpret a reply payload as the server's address text.
    ///
    /// The payload may carry a NUL terminator and surrounding whitespace.
    /// Anything longer than [`MAX_ADDRESS_LEN`] or not a dotted quad is
    /// rejected rather than cut down.
    pub fn from_reply(payload: &[u8]) -> Option<Self> {
        let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
        let text = std::str::from_utf8(&payload[..end]).ok()?.trim();
        if text.len() > MAX_ADDRESS_LEN {
            return None;
        }
        text.parse().ok().map(Self)
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.0
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Locates the alert server by broadcasting a query and waiting for a reply.
pub struct DiscoveryClient<T> {
    transport: T,
    attempts: u32,
    timeout_ms: u64,
    poll_ms: u64,
}

impl<T: DiscoveryTransport> DiscoveryClient<T> {
    pub fn new(transport: T, timings: &Timings) -> Self {
        Self {
            transport,
            attempts: timings.discovery_attempts,
            timeout_ms: timings.discovery_timeout_ms,
            poll_ms: timings.discovery_poll_ms.max(1),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run discovery with the configured window and attempt count.
    pub fn discover<C: Clock>(&mut self, clock: &C) -> Option<ServerAddress> {
        self.discover_with(clock, self.timeout_ms, self.attempts)
    }

    /// Broadcast the query up to `attempts` times, listening `timeout_ms`
    /// after each broadcast, and return the first valid reply.
    ///
    /// Never takes longer than `attempts * timeout_ms`.
    pub fn discover_with<C: Clock>(
        &mut self,
        clock: &C,
        timeout_ms: u64,
        attempts: u32,
    ) -> Option<ServerAddress> {
        info!("Attempting server discovery...");
        let mut buffer = [0u8; REPLY_BUFFER_LEN];

        for attempt in 1..=attempts {
            debug!("Discovery attempt {}/{}", attempt, attempts);

            // A failed send still gets its full window so attempts keep the
            // same cadence.
            if let Err(e) = self.transport.broadcast(DISCOVERY_REQUEST) {
                warn!("Discovery broadcast failed: {:#}", e);
            }

            let start = clock.now_ms();
            loop {
                match self.transport.poll_reply(&mut buffer) {
                    Ok(Some(len)) => match ServerAddress::from_reply(&buffer[..len]) {
                        Some(address) => {
                            info!("Server found at: {}", address);
                            return Some(address);
                        }
                        None => warn!("Ignoring malformed discovery reply ({} bytes)", len),
                    },
                    Ok(None) => {}
                    Err(e) => warn!("Discovery receive failed: {:#}", e),
                }

                let elapsed = clock.now_ms().saturating_sub(start);
                if elapsed >= timeout_ms {
                    break;
                }
                clock.sleep_ms(self.poll_ms.min(timeout_ms - elapsed));
            }

            debug!("No response in attempt {}", attempt);
        }

        warn!("Server discovery failed after {} attempts", attempts);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDiscovery, ManualClock};

    fn client(discovery: &FakeDiscovery) -> DiscoveryClient<FakeDiscovery> {
        DiscoveryClient::new(discovery.clone(), &Timings::default())
    }

    #[test]
    fn test_parse_reply() {
        assert_eq!(
            ServerAddress::from_reply(b"192.168.1.20"),
            Some(ServerAddress::new(Ipv4Addr::new(192, 168, 1, 20)))
        );
        assert_eq!(
            ServerAddress::from_reply(b"10.0.0.5\0garbage"),
            Some(ServerAddress::new(Ipv4Addr::new(10, 0, 0, 5)))
        );
        assert_eq!(
            ServerAddress::from_reply(b" 10.0.0.5\n"),
            Some(ServerAddress::new(Ipv4Addr::new(10, 0, 0, 5)))
        );
    }

    #[test]
    fn test_reject_garbled_reply() {
        assert_eq!(ServerAddress::from_reply(b""), None);
        assert_eq!(ServerAddress::from_reply(b"server"), None);
        assert_eq!(ServerAddress::from_reply(b"192.168.100.2001"), None);
        // Would parse if it were cut at 15 bytes
        assert_eq!(ServerAddress::from_reply(b"192.168.100.2001234"), None);
        assert_eq!(ServerAddress::from_reply(&[0xff, 0xfe, b'1']), None);
    }

    #[test]
    fn test_first_reply_wins() {
        let clock = ManualClock::new();
        let discovery = FakeDiscovery::answering("192.168.1.20");
        let found = client(&discovery).discover(&clock);

        assert_eq!(found, Some(ServerAddress::new(Ipv4Addr::new(192, 168, 1, 20))));
        assert_eq!(discovery.broadcasts(), 1);
        assert_eq!(clock.now_ms(), 0);
    }

    #[test]
    fn test_retries_with_fresh_broadcast() {
        let clock = ManualClock::new();
        let discovery = FakeDiscovery::silent();
        discovery.script(vec![None, None, Some("10.0.0.7")]);

        let found = client(&discovery).discover(&clock);

        assert_eq!(found, Some(ServerAddress::new(Ipv4Addr::new(10, 0, 0, 7))));
        assert_eq!(discovery.broadcasts(), 3);
        // Two full empty windows, no backoff
        assert_eq!(clock.now_ms(), 2000);
    }

    #[test]
    fn test_gives_up_within_bound() {
        for (attempts, timeout) in [(0, 1000), (1, 1000), (3, 1000), (5, 120), (2, 33)] {
            let clock = ManualClock::new();
            let discovery = FakeDiscovery::silent();
            let found = client(&discovery).discover_with(&clock, timeout, attempts);

            assert_eq!(found, None);
            assert_eq!(discovery.broadcasts(), attempts);
            assert!(clock.now_ms() <= attempts as u64 * timeout);
        }
    }

    #[test]
    fn test_malformed_reply_does_not_end_attempt() {
        let clock = ManualClock::new();
        let discovery = FakeDiscovery::silent();
        discovery.script(vec![Some("not-an-address"), Some("172.16.0.9")]);

        let found = client(&discovery).discover(&clock);

        assert_eq!(found, Some(ServerAddress::new(Ipv4Addr::new(172, 16, 0, 9))));
        assert_eq!(discovery.broadcasts(), 2);
    }
}
