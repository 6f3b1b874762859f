/// A debounced level change on a pulled-up input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    /// High to low: the button went down
    Falling,
    /// Low to high: the button was released
    Rising,
}

/// Turns a raw sampled level into clean edges.
///
/// An edge is reported only when the sampled level differs from the last
/// reported one and at least `delay_ms` has passed since the last reported
/// edge. Bounces inside that window are swallowed. The first sample sets the
/// starting level without reporting anything, and the gate counts from time
/// zero, so a button held through power-up is not a press.
#[derive(Debug)]
pub struct Debouncer {
    delay_ms: u64,
    reported_low: Option<bool>,
    last_event_ms: u64,
}

impl Debouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            reported_low: None,
            last_event_ms: 0,
        }
    }

    pub fn sample(&mut self, is_low: bool, now_ms: u64) -> Option<Edge> {
        let reported_low = *self.reported_low.get_or_insert(is_low);
        if is_low == reported_low {
            return None;
        }

        if now_ms.saturating_sub(self.last_event_ms) < self.delay_ms {
            return None;
        }

        self.reported_low = Some(is_low);
        self.last_event_ms = now_ms;
        Some(if is_low { Edge::Falling } else { Edge::Rising })
    }
}

/// Flags an input held low continuously for `threshold_ms`.
///
/// Independent of [`Debouncer`]: no gate, any high sample restarts the hold.
/// Fires once per hold.
#[derive(Debug)]
pub struct HoldDetector {
    threshold_ms: u64,
    since: Option<u64>,
    fired: bool,
}

impl HoldDetector {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms,
            since: None,
            fired: false,
        }
    }

    pub fn sample(&mut self, is_low: bool, now_ms: u64) -> bool {
        if !is_low {
            self.since = None;
            self.fired = false;
            return false;
        }

        let since = *self.since.get_or_insert(now_ms);
        if !self.fired && now_ms.saturating_sub(since) >= self.threshold_ms {
            self.fired = true;
            return true;
        }
        false
    }
}
