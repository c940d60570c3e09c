//! Per-domain power-on reset sequencing.
//!
//! A domain is held in reset until its clock source's lock signal has crossed a synchronizer
//! into the domain and then stayed high for a settle interval counted in the domain's own ticks.

use super::{registers::Reg, sync::SyncChannel, ConfigError};

/// Settle interval used when none is configured.
pub const DEFAULT_SETTLE_TICKS: u32 = 128;
/// Lock synchronizer depth used when none is configured.
pub const DEFAULT_SYNC_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetState {
    /// Reset asserted.
    #[default]
    Held,
    /// Lock synchronized and stable; the settle counter is advancing.
    Counting,
    /// Reset released. Domain logic may run.
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetConfig {
    /// Domain ticks the synchronized lock must stay high before release.
    pub settle_ticks: u32,
    /// Number of synchronizer stages the raw lock level passes through.
    pub sync_depth: usize,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            settle_ticks: DEFAULT_SETTLE_TICKS,
            sync_depth: DEFAULT_SYNC_DEPTH,
        }
    }
}

impl ResetConfig {
    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// This function will return an error if the synchronizer has fewer than two stages or the
    /// settle interval is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_depth < 2 {
            return Err(ConfigError::SyncDepth(self.sync_depth));
        }
        if self.settle_ticks == 0 {
            return Err(ConfigError::ZeroSettle);
        }
        Ok(())
    }

    /// Ticks from a clean power-up with lock already high until reset is released.
    pub fn release_latency(&self) -> u64 {
        self.sync_depth as u64 + u64::from(self.settle_ticks)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Progress {
    state: ResetState,
    counter: u32,
}

/// The reset sequencer of one clock domain.
#[derive(Debug, Clone)]
pub struct ResetSequencer {
    config: ResetConfig,
    lock_sync: SyncChannel<bool>,
    progress: Reg<Progress>,
    external_reset: bool,
}

impl ResetSequencer {
    /// Creates a sequencer in the [`Held`][ResetState::Held] state.
    ///
    /// # Errors
    ///
    /// This function will return an error if `config` is invalid.
    pub fn new(config: ResetConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            lock_sync: SyncChannel::new(config.sync_depth, false),
            progress: Reg::new(Progress::default()),
            external_reset: false,
        })
    }

    /// Drives the asynchronous external reset input.
    ///
    /// Asserting it takes effect immediately, without waiting for a domain tick. Releasing it only
    /// allows the following ticks to start sequencing again.
    pub fn set_external_reset(&mut self, asserted: bool) {
        self.external_reset = asserted;
        if asserted {
            self.lock_sync.force(false);
            self.progress.force(Progress::default());
        }
    }

    /// Computes the next state from the committed one and the raw lock level.
    pub fn evaluate(&mut self, lock: bool) {
        if self.external_reset {
            return;
        }
        let stable = self.lock_sync.output();
        self.lock_sync.evaluate(lock);

        let prev = self.progress.get();
        let next = if !stable {
            Progress::default()
        } else {
            match prev.state {
                ResetState::Released => prev,
                ResetState::Held | ResetState::Counting => {
                    let counter = prev.counter.saturating_add(1);
                    let state = if counter >= self.config.settle_ticks {
                        ResetState::Released
                    } else {
                        ResetState::Counting
                    };
                    Progress { state, counter }
                }
            }
        };
        self.progress.set(next);
    }

    pub fn commit(&mut self) {
        self.lock_sync.commit();
        self.progress.commit();
    }

    pub fn state(&self) -> ResetState {
        self.progress.get().state
    }

    /// The domain-local reset-released level.
    pub fn released(&self) -> bool {
        self.state() == ResetState::Released
    }

    /// Settle ticks counted so far.
    pub fn counter(&self) -> u32 {
        self.progress.get().counter
    }

    /// Synchronized lock samples, newest first.
    pub fn lock_history(&self) -> Vec<bool> {
        self.lock_sync.history().collect()
    }

    pub fn external_reset(&self) -> bool {
        self.external_reset
    }

    pub fn config(&self) -> ResetConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Ticks the sequencer with `lock(tick)` and returns the first tick after which it is released.
    fn first_release(seq: &mut ResetSequencer, lock: impl Fn(u64) -> bool, max: u64) -> Option<u64> {
        (1..=max).find(|&tick| {
            seq.evaluate(lock(tick));
            seq.commit();
            seq.released()
        })
    }

    #[test]
    fn test_release_timing_is_exact() {
        let mut seq = ResetSequencer::new(ResetConfig::default()).unwrap();
        for tick in 1..=200u64 {
            seq.evaluate(true);
            seq.commit();
            assert_eq!(seq.released(), tick >= 131, "tick {}", tick);
            if tick == 3 {
                assert_eq!(seq.state(), ResetState::Held);
                assert_eq!(seq.lock_history(), vec![true, true, true]);
            }
            if tick == 4 {
                assert_eq!(seq.state(), ResetState::Counting);
                assert_eq!(seq.counter(), 1);
            }
        }
        assert_eq!(ResetConfig::default().release_latency(), 131);
    }

    #[test]
    fn test_lock_glitch_restarts_settle() {
        let mut clean = ResetSequencer::new(ResetConfig::default()).unwrap();
        let clean_release = first_release(&mut clean, |_| true, 1000).unwrap();

        let mut glitched = ResetSequencer::new(ResetConfig::default()).unwrap();
        let glitch_tick = 50;
        let release = first_release(&mut glitched, |t| t != glitch_tick, 1000).unwrap();
        assert!(release >= clean_release + glitch_tick);
        assert_eq!(release, 181);
    }

    #[test]
    fn test_lock_loss_after_release_holds_reset() {
        let mut seq = ResetSequencer::new(ResetConfig::default()).unwrap();
        first_release(&mut seq, |_| true, 200).unwrap();
        let mut held_after = None;
        for tick in 1..=10 {
            seq.evaluate(false);
            seq.commit();
            if held_after.is_none() && seq.state() == ResetState::Held {
                held_after = Some(tick);
            }
        }
        // three ticks for the loss to cross the synchronizer, one more to act on it
        assert_eq!(held_after, Some(4));
        assert_eq!(seq.counter(), 0);
    }

    #[test]
    fn test_external_reset_is_immediate() {
        let mut seq = ResetSequencer::new(ResetConfig::default()).unwrap();
        for _ in 0..100 {
            seq.evaluate(true);
            seq.commit();
        }
        assert_eq!(seq.state(), ResetState::Counting);
        seq.set_external_reset(true);
        assert_eq!(seq.state(), ResetState::Held);
        assert_eq!(seq.counter(), 0);
        assert_eq!(seq.lock_history(), vec![false; 3]);

        // held for as long as the reset stays asserted
        for _ in 0..300 {
            seq.evaluate(true);
            seq.commit();
            assert!(!seq.released());
        }
        seq.set_external_reset(false);
        assert_eq!(first_release(&mut seq, |_| true, 500), Some(131));
    }

    #[test]
    fn test_custom_config() {
        let config = ResetConfig {
            settle_ticks: 10,
            sync_depth: 2,
        };
        let mut seq = ResetSequencer::new(config).unwrap();
        assert_eq!(first_release(&mut seq, |_| true, 100), Some(12));
        assert_eq!(config.release_latency(), 12);
    }

    #[test]
    fn test_invalid_config() {
        let shallow = ResetConfig {
            sync_depth: 1,
            ..Default::default()
        };
        assert_eq!(ResetSequencer::new(shallow).unwrap_err(), ConfigError::SyncDepth(1));
        let no_settle = ResetConfig {
            settle_ticks: 0,
            ..Default::default()
        };
        assert_eq!(ResetSequencer::new(no_settle).unwrap_err(), ConfigError::ZeroSettle);
    }
}
