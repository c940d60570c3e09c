use crate::plat::DomainId;

use super::{
    registers::{wire, WireRx, WireTx},
    reset::{ResetConfig, ResetSequencer, ResetState},
    ConfigError,
};

/// The clock generator feeding every domain. Only its lock indication is modelled; edges are
/// produced by each [`ClockDomain`]'s period and phase.
#[derive(Debug)]
pub struct ClockSource {
    lock: WireTx<bool>,
}

impl ClockSource {
    /// Creates a source that has not locked yet.
    pub fn new() -> Self {
        let (lock, _) = wire(false);
        Self { lock }
    }

    /// Changes the lock level. The level is asynchronous to every domain, so it changes at once.
    pub fn set_locked(&mut self, locked: bool) {
        self.lock.force(locked);
    }

    pub fn locked(&self) -> bool {
        self.lock.current()
    }

    pub fn subscribe(&self) -> WireRx<bool> {
        self.lock.subscribe()
    }
}

impl Default for ClockSource {
    fn default() -> Self {
        Self::new()
    }
}

/// An independently clocked region: its tick counter, edge timing and reset sequencer.
#[derive(Debug)]
pub struct ClockDomain {
    id: DomainId,
    period_ps: u64,
    phase_ps: u64,
    tick_count: u64,
    sequencer: ResetSequencer,
    lock: WireRx<bool>,
}

impl ClockDomain {
    /// Creates a domain whose first edge is at `phase_ps + period_ps`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the period is zero or the reset configuration is
    /// invalid.
    pub fn new(
        id: DomainId,
        period_ps: u64,
        phase_ps: u64,
        reset: ResetConfig,
        lock: WireRx<bool>,
    ) -> Result<Self, ConfigError> {
        if period_ps == 0 {
            return Err(ConfigError::ZeroPeriod(id));
        }
        Ok(Self {
            id,
            period_ps,
            phase_ps,
            tick_count: 0,
            sequencer: ResetSequencer::new(reset)?,
            lock,
        })
    }

    /// Simulated time of this domain's next clock edge.
    pub fn next_edge(&self) -> u64 {
        self.phase_ps + (self.tick_count + 1) * self.period_ps
    }

    pub fn evaluate(&mut self) {
        self.sequencer.evaluate(self.lock.sample());
    }

    /// Clock edge: commits the sequencer and advances the tick counter.
    pub fn commit(&mut self) {
        let was_released = self.sequencer.released();
        self.sequencer.commit();
        self.tick_count += 1;
        if !was_released && self.sequencer.released() {
            log::debug!("{} domain out of reset at tick {}", self.id, self.tick_count);
        }
    }

    /// Drives this domain's asynchronous external reset input.
    pub fn set_external_reset(&mut self, asserted: bool) {
        if asserted && !self.sequencer.external_reset() {
            log::debug!("{} domain: external reset at tick {}", self.id, self.tick_count);
        }
        self.sequencer.set_external_reset(asserted);
    }

    pub fn id(&self) -> DomainId {
        self.id
    }

    pub fn period_ps(&self) -> u64 {
        self.period_ps
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn released(&self) -> bool {
        self.sequencer.released()
    }

    pub fn reset_state(&self) -> ResetState {
        self.sequencer.state()
    }

    pub fn sequencer(&self) -> &ResetSequencer {
        &self.sequencer
    }

    /// Synchronized lock samples, newest first.
    pub fn lock_history(&self) -> Vec<bool> {
        self.sequencer.lock_history()
    }
}
