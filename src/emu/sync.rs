//! Synchronizer chains for signals entering a clock domain.
//!
//! Every stage is a register of the destination domain, so a value sampled from another domain
//! only becomes visible after it has been recaptured `depth` times.

use super::registers::Reg;

/// A chain of sequential captures advanced once per destination tick.
#[derive(Debug, Clone)]
pub struct SyncChannel<T: Copy> {
    stages: Vec<Reg<T>>,
}

impl<T: Copy> SyncChannel<T> {
    /// Depth used for data and level signals.
    pub const DATA_DEPTH: usize = 2;
    /// Depth used for control signals that are turned into pulses.
    pub const CONTROL_DEPTH: usize = 3;

    /// Creates a chain of `depth` stages (at least one), all holding `init`.
    pub fn new(depth: usize, init: T) -> Self {
        Self {
            stages: vec![Reg::new(init); depth.max(1)],
        }
    }

    pub fn depth(&self) -> usize {
        self.stages.len()
    }

    /// Samples `input` into the first stage and shifts every other stage from its predecessor's
    /// committed value.
    pub fn evaluate(&mut self, input: T) {
        for i in (1..self.stages.len()).rev() {
            let prev = self.stages[i - 1].get();
            self.stages[i].set(prev);
        }
        self.stages[0].set(input);
    }

    pub fn commit(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.commit();
        }
    }

    /// The last stage: the only value that may be consumed by the destination domain.
    pub fn output(&self) -> T {
        self.stages[self.stages.len() - 1].get()
    }

    /// Committed stage values, newest capture first.
    pub fn history(&self) -> impl Iterator<Item = T> + '_ {
        self.stages.iter().map(Reg::get)
    }

    /// Asynchronously fills every stage with `value`.
    pub fn force(&mut self, value: T) {
        for stage in self.stages.iter_mut() {
            stage.force(value);
        }
    }
}

/// Two-stage relay for data fields and level signals.
///
/// A source change is captured on the first destination tick after it and exposed after the
/// second. The source must hold the value at least that long.
#[derive(Debug, Clone)]
pub struct DataRelay<T: Copy> {
    chain: SyncChannel<T>,
    init: T,
}

impl<T: Copy> DataRelay<T> {
    pub fn new(init: T) -> Self {
        Self {
            chain: SyncChannel::new(SyncChannel::<T>::DATA_DEPTH, init),
            init,
        }
    }

    pub fn evaluate(&mut self, input: T) {
        self.chain.evaluate(input);
    }

    pub fn commit(&mut self) {
        self.chain.commit();
    }

    /// The synchronized value.
    pub fn value(&self) -> T {
        self.chain.output()
    }

    pub fn reset(&mut self) {
        self.chain.force(self.init);
    }
}

/// Three-stage relay with rising-edge detection for enable and strobe signals.
///
/// The third-stage sample is compared against the one before it, producing a pulse that lasts
/// exactly one destination tick per rising transition no matter how long the source held the
/// level.
#[derive(Debug, Clone)]
pub struct PulseRelay {
    chain: SyncChannel<bool>,
    last: Reg<bool>,
}

impl PulseRelay {
    pub fn new() -> Self {
        Self {
            chain: SyncChannel::new(SyncChannel::<bool>::CONTROL_DEPTH, false),
            last: Reg::new(false),
        }
    }

    pub fn evaluate(&mut self, level: bool) {
        self.last.set(self.chain.output());
        self.chain.evaluate(level);
    }

    pub fn commit(&mut self) {
        self.chain.commit();
        self.last.commit();
    }

    /// Asserted for one tick after each synchronized rising edge.
    pub fn pulse(&self) -> bool {
        self.chain.output() && !self.last.get()
    }

    /// The synchronized level.
    pub fn level(&self) -> bool {
        self.chain.output()
    }

    pub fn reset(&mut self) {
        self.chain.force(false);
        self.last.force(false);
    }
}

impl Default for PulseRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drives `level` high for `hold` destination ticks and counts pulses and their lengths.
    fn pulses_for_hold(hold: usize) -> Vec<usize> {
        let mut relay = PulseRelay::new();
        let mut lengths = Vec::new();
        let mut run = 0;
        for tick in 0..hold + 20 {
            relay.evaluate(tick < hold);
            relay.commit();
            if relay.pulse() {
                run += 1;
            } else if run > 0 {
                lengths.push(run);
                run = 0;
            }
        }
        lengths
    }

    #[test]
    fn test_one_pulse_per_assertion() {
        for hold in [1, 5, 1000] {
            assert_eq!(pulses_for_hold(hold), vec![1], "hold {}", hold);
        }
    }

    #[test]
    fn test_pulse_latency_is_three_ticks() {
        let mut relay = PulseRelay::new();
        let mut fired = Vec::new();
        for tick in 1..=10 {
            relay.evaluate(true);
            relay.commit();
            if relay.pulse() {
                fired.push(tick);
            }
        }
        assert_eq!(fired, vec![3]);
        assert!(relay.level());
    }

    #[test]
    fn test_reassertion_pulses_again() {
        let mut relay = PulseRelay::new();
        let pattern = [true, true, true, false, false, false, true, true, true, true, true];
        let mut count = 0;
        for level in pattern.into_iter().chain([false; 6]) {
            relay.evaluate(level);
            relay.commit();
            count += usize::from(relay.pulse());
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_data_relay_latency_floor() {
        let mut relay = DataRelay::new(0u32);
        relay.evaluate(0x2_ABCD);
        relay.commit();
        assert_eq!(relay.value(), 0, "visible after one tick");
        relay.evaluate(0x2_ABCD);
        relay.commit();
        assert_eq!(relay.value(), 0x2_ABCD);
        relay.reset();
        assert_eq!(relay.value(), 0);
    }

    #[test]
    fn test_sync_channel_history() {
        let mut chain = SyncChannel::new(3, 0u8);
        for v in 1..=3 {
            chain.evaluate(v);
            chain.commit();
        }
        assert_eq!(chain.history().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(chain.output(), 1);
        assert_eq!(chain.depth(), 3);
    }
}
