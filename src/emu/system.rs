//! The two-domain synchronous system.
//!
//! Simulated time advances from one clock edge to the next. Every domain with an edge at that
//! instant is evaluated against the state committed before it, then all of them commit together,
//! so domains whose edges coincide never observe each other's same-instant updates. The only
//! paths between domains are the wires and the synchronizers in [`relay`][super::relay].

use crate::plat::DomainId;

use super::{
    clock::{ClockDomain, ClockSource},
    divider::{DivideOperation, DividePipeline, DivideResult},
    registers::{wire, WireTx},
    relay::{DisplaySignals, DisplayToExecRelay, ExecSignals, ExecToDisplayRelay, RelayedExec},
    reset::ResetConfig,
    ConfigError,
};

/// What the execution engine observes on one of its ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecView {
    /// Number of the execution-domain tick being evaluated.
    pub tick: u64,
    /// The divider's output register.
    pub divide: DivideResult,
    /// Synchronized blanking status from the display domain.
    pub blanking: bool,
}

/// What the execution engine drives on one of its ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecDrive {
    pub divide: DivideOperation,
    pub signals: ExecSignals,
}

/// What the display engine observes on one of its ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayView {
    /// Number of the display-domain tick being evaluated.
    pub tick: u64,
    pub relayed: RelayedExec,
}

/// What the display engine drives on one of its ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayDrive {
    pub signals: DisplaySignals,
}

/// The processor side. Ticked once per execution-domain edge while that domain is out of reset.
pub trait ExecutionEngine {
    fn tick(&mut self, view: &ExecView) -> ExecDrive;

    /// Called instead of `tick` on every edge during which the domain is held in reset.
    fn held(&mut self) {}
}

/// The display timing side. Ticked once per display-domain edge while that domain is out of reset.
pub trait DisplayEngine {
    fn tick(&mut self, view: &DisplayView) -> DisplayDrive;

    /// Called instead of `tick` on every edge during which the domain is held in reset.
    fn held(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemConfig {
    pub exec_period_ps: u64,
    pub display_period_ps: u64,
    /// Offset of the display clock's edges relative to the execution clock's.
    pub display_phase_ps: u64,
    pub reset: ResetConfig,
}

impl Default for SystemConfig {
    /// A 50 MHz execution clock and a 25 MHz pixel clock.
    fn default() -> Self {
        Self {
            exec_period_ps: 20_000,
            display_period_ps: 40_000,
            display_phase_ps: 0,
            reset: ResetConfig::default(),
        }
    }
}

/// Which domains ticked on a [`System::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Edges {
    pub exec: bool,
    pub display: bool,
}

impl Edges {
    pub fn contains(&self, domain: DomainId) -> bool {
        match domain {
            DomainId::Execution => self.exec,
            DomainId::Display => self.display,
        }
    }
}

/// The complete core: clock source, both domains, the divider and both relay directions.
pub struct System<E, D> {
    time_ps: u64,
    clock: ClockSource,
    exec: ClockDomain,
    display: ClockDomain,
    divider: DividePipeline,
    exec_out: WireTx<ExecSignals>,
    display_out: WireTx<DisplaySignals>,
    to_display: ExecToDisplayRelay,
    to_exec: DisplayToExecRelay,
    exec_engine: E,
    display_engine: D,
}

impl<E: ExecutionEngine, D: DisplayEngine> System<E, D> {
    /// Powers up a system. The clock source starts unlocked and both domains start held in reset.
    ///
    /// # Errors
    ///
    /// This function will return an error if `config` is invalid.
    pub fn new(config: SystemConfig, exec_engine: E, display_engine: D) -> Result<Self, ConfigError> {
        let clock = ClockSource::new();
        let exec = ClockDomain::new(
            DomainId::Execution,
            config.exec_period_ps,
            0,
            config.reset,
            clock.subscribe(),
        )?;
        let display = ClockDomain::new(
            DomainId::Display,
            config.display_period_ps,
            config.display_phase_ps,
            config.reset,
            clock.subscribe(),
        )?;
        let (exec_out, exec_rx) = wire(ExecSignals::default());
        let (display_out, display_rx) = wire(DisplaySignals::default());
        Ok(Self {
            time_ps: 0,
            clock,
            exec,
            display,
            divider: DividePipeline::new(),
            exec_out,
            display_out,
            to_display: ExecToDisplayRelay::new(exec_rx),
            to_exec: DisplayToExecRelay::new(display_rx),
            exec_engine,
            display_engine,
        })
    }

    /// Advances to the next clock edge and ticks every domain that has an edge there.
    pub fn step(&mut self) -> Edges {
        let exec_at = self.exec.next_edge();
        let display_at = self.display.next_edge();
        let now = exec_at.min(display_at);
        let edges = Edges {
            exec: exec_at == now,
            display: display_at == now,
        };

        if edges.exec {
            self.evaluate_exec();
        }
        if edges.display {
            self.evaluate_display();
        }

        if edges.exec {
            self.commit_exec();
        }
        if edges.display {
            self.commit_display();
        }
        self.time_ps = now;
        edges
    }

    fn evaluate_exec(&mut self) {
        self.exec.evaluate();
        self.to_exec.evaluate();
        if self.exec.released() {
            let view = ExecView {
                tick: self.exec.tick_count() + 1,
                divide: self.divider.result(),
                blanking: self.to_exec.blanking(),
            };
            let drive = self.exec_engine.tick(&view);
            self.divider.evaluate(drive.divide);
            self.exec_out.drive(drive.signals.masked());
        } else {
            self.exec_engine.held();
            self.divider.reset();
            self.exec_out.drive(ExecSignals::default());
        }
    }

    fn commit_exec(&mut self) {
        self.exec.commit();
        self.to_exec.commit();
        self.divider.commit();
        self.exec_out.commit();
    }

    fn evaluate_display(&mut self) {
        self.display.evaluate();
        self.to_display.evaluate();
        if self.display.released() {
            let view = DisplayView {
                tick: self.display.tick_count() + 1,
                relayed: self.to_display.view(),
            };
            let drive = self.display_engine.tick(&view);
            self.display_out.drive(drive.signals);
        } else {
            self.display_engine.held();
            self.display_out.drive(DisplaySignals::default());
        }
    }

    fn commit_display(&mut self) {
        self.display.commit();
        self.to_display.commit();
        self.display_out.commit();
    }

    /// Steps until simulated time reaches `time_ps`. Returns the number of steps taken.
    pub fn run_until(&mut self, time_ps: u64) -> u64 {
        let mut steps = 0;
        while self.next_edge() <= time_ps {
            self.step();
            steps += 1;
        }
        steps
    }

    /// Steps until `domain` has ticked `ticks` more times.
    pub fn run_ticks(&mut self, domain: DomainId, ticks: u64) {
        let target = self.domain(domain).tick_count() + ticks;
        while self.domain(domain).tick_count() < target {
            self.step();
        }
    }

    /// Time of the next clock edge in any domain.
    pub fn next_edge(&self) -> u64 {
        self.exec.next_edge().min(self.display.next_edge())
    }

    /// Changes the clock source's lock indication.
    pub fn set_lock(&mut self, locked: bool) {
        self.clock.set_locked(locked);
    }

    /// Drives the external reset. Asserting it immediately holds both domains in reset and
    /// discards all in-flight state: pipeline contents, synchronizer contents and cross-domain
    /// outputs.
    pub fn set_external_reset(&mut self, asserted: bool) {
        self.exec.set_external_reset(asserted);
        self.display.set_external_reset(asserted);
        if asserted {
            self.divider.reset();
            self.to_display.reset();
            self.to_exec.reset();
            self.exec_out.force(ExecSignals::default());
            self.display_out.force(DisplaySignals::default());
        }
    }

    pub fn time_ps(&self) -> u64 {
        self.time_ps
    }

    pub fn locked(&self) -> bool {
        self.clock.locked()
    }

    pub fn domain(&self, id: DomainId) -> &ClockDomain {
        match id {
            DomainId::Execution => &self.exec,
            DomainId::Display => &self.display,
        }
    }

    pub fn divider(&self) -> &DividePipeline {
        &self.divider
    }

    /// The execution domain's committed outputs toward the display.
    pub fn exec_signals(&self) -> ExecSignals {
        self.exec_out.current()
    }

    /// The display domain's committed outputs toward the execution domain.
    pub fn display_signals(&self) -> DisplaySignals {
        self.display_out.current()
    }

    /// What the display currently sees of the execution domain.
    pub fn relayed_exec(&self) -> RelayedExec {
        self.to_display.view()
    }

    /// What the execution domain currently sees of the blanking status.
    pub fn relayed_blanking(&self) -> bool {
        self.to_exec.blanking()
    }

    pub fn exec_engine(&self) -> &E {
        &self.exec_engine
    }

    pub fn exec_engine_mut(&mut self) -> &mut E {
        &mut self.exec_engine
    }

    pub fn display_engine(&self) -> &D {
        &self.display_engine
    }

    pub fn display_engine_mut(&mut self) -> &mut D {
        &mut self.display_engine
    }
}
