use std::{collections::VecDeque, time::Duration};

use anyhow::Result;
use tokio::{
    runtime::{Builder, Runtime},
    time::{interval, Interval},
};

use crate::plat::DomainId;

use super::{
    debugger::Debugger,
    host::{hold_ticks_for, ExecOp, RasterDisplay, RasterTiming, ScriptedExecution},
    system::{Edges, System, SystemConfig},
    ConfigError,
};

/// Edges kept for the debugger's backtrace.
const EDGE_HISTORY: usize = 256;
/// Display ticks to keep running after the script has finished, so the last handshake lands.
const DRAIN_DISPLAY_TICKS: u64 = 16;

/// The emulator's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmuState {
    /// The emulator is allowed to run.
    Continue,
    /// Stops stepping and drops into the debugger, without ending the run.
    Pause,
    /// Halt execution.
    Halt,
}

/// Everything needed to build an [`Emulator`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub system: SystemConfig,
    pub raster: RasterTiming,
    /// Simulated time at which the clock source reports lock.
    pub lock_at_ps: u64,
    /// Simulated time after which the run halts.
    pub time_limit_ps: u64,
    /// Wall-clock rate at which edges are stepped. Unpaced when `None`.
    pub pace_hz: Option<f64>,
    pub script: Vec<ExecOp>,
    /// Start paused in the debugger.
    pub debug: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            raster: RasterTiming::default(),
            lock_at_ps: 1_000_000,
            time_limit_ps: 50_000_000,
            pace_hz: None,
            script: Vec::new(),
            debug: false,
        }
    }
}

impl SimConfig {
    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// This function will return an error if a clock period is zero, the reset configuration is
    /// invalid or the pacing rate is not positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.system.exec_period_ps == 0 {
            return Err(ConfigError::ZeroPeriod(DomainId::Execution));
        }
        if self.system.display_period_ps == 0 {
            return Err(ConfigError::ZeroPeriod(DomainId::Display));
        }
        self.system.reset.validate()?;
        match self.pace_hz {
            Some(hz) if !(hz.is_finite() && hz > 0.0) => Err(ConfigError::Pace),
            _ => Ok(()),
        }
    }
}

struct Pacing {
    clock: Interval,
    rt: Runtime,
}

/// The main emulation context: the system plus its run control.
pub struct Emulator {
    pub system: System<ScriptedExecution, RasterDisplay>,
    pub state: EmuState,
    pub edge_history: VecDeque<(u64, Edges)>,
    lock_at_ps: Option<u64>,
    time_limit_ps: u64,
    drain_until: Option<u64>,
    pacing: Option<Pacing>,
}

impl Emulator {
    /// Builds the system described by `config` and loads its script.
    ///
    /// # Errors
    ///
    /// This function will return an error if the configuration is invalid or the Tokio runtime
    /// fails to initialize.
    pub fn new(config: &SimConfig) -> Result<Self> {
        config.validate()?;
        let mut exec = ScriptedExecution::new(hold_ticks_for(
            config.system.exec_period_ps,
            config.system.display_period_ps,
        ));
        exec.extend(config.script.iter().copied());
        let system = System::new(config.system, exec, RasterDisplay::new(config.raster))?;

        let pacing = match config.pace_hz {
            Some(hz) => {
                let rt = Builder::new_current_thread()
                    .enable_time()
                    .global_queue_interval(1)
                    .build()?;
                let clock = rt.block_on(async { interval(Duration::from_secs_f64(hz.recip())) });
                Some(Pacing { clock, rt })
            }
            None => None,
        };

        Ok(Self {
            system,
            state: if config.debug {
                EmuState::Pause
            } else {
                EmuState::Continue
            },
            edge_history: VecDeque::new(),
            lock_at_ps: Some(config.lock_at_ps),
            time_limit_ps: config.time_limit_ps,
            drain_until: None,
            pacing,
        })
    }

    /// Runs the emulator, stepping edges until it reaches a halt state.
    pub fn run_while_continue(&mut self) -> Result<()> {
        loop {
            match self.state {
                EmuState::Continue => {}
                EmuState::Halt => break,
                EmuState::Pause => {
                    self.debug()?;
                    continue;
                }
            }
            self.microstep()?;
        }
        Ok(())
    }

    pub fn cont(&mut self) -> Result<()> {
        self.state = EmuState::Continue;
        self.run_while_continue()
    }

    /// Steps `count` clock edges, stopping early on halt.
    pub fn step_edges(&mut self, count: u64) -> Result<()> {
        for _ in 0..count {
            if self.state == EmuState::Halt {
                break;
            }
            self.microstep()?;
        }
        Ok(())
    }

    /// Steps a single clock edge.
    pub fn microstep(&mut self) -> Result<()> {
        if self.state == EmuState::Halt {
            return Ok(());
        }
        if let Some(Pacing { clock, rt }) = self.pacing.as_mut() {
            // snap!
            rt.block_on(clock.tick());
        }

        if let Some(at) = self.lock_at_ps {
            if self.system.next_edge() >= at {
                log::debug!("clock source locked at {} ps", at);
                self.system.set_lock(true);
                self.lock_at_ps = None;
            }
        }

        let edges = self.system.step();
        let now = self.system.time_ps();
        log::trace!("> {} ps {:?}", now, edges);
        self.edge_history.push_back((now, edges));
        if self.edge_history.len() > EDGE_HISTORY {
            self.edge_history.pop_front();
        }

        let display_ticks = self.system.domain(DomainId::Display).tick_count();
        match self.drain_until {
            None if self.script_done() => {
                self.drain_until = Some(display_ticks + DRAIN_DISPLAY_TICKS);
            }
            Some(until) if display_ticks >= until => {
                log::info!("run complete at {} ps", now);
                self.state = EmuState::Halt;
            }
            _ => {}
        }
        if now >= self.time_limit_ps && self.state != EmuState::Halt {
            log::info!("time limit reached at {} ps", now);
            self.state = EmuState::Halt;
        }
        Ok(())
    }

    /// Both domains are running, the script is exhausted and the divider is empty.
    pub fn script_done(&self) -> bool {
        DomainId::ALL
            .iter()
            .all(|&id| self.system.domain(id).released())
            && self.system.exec_engine().is_done()
            && self.system.divider().in_flight() == 0
    }

    pub fn debug(&mut self) -> Result<()> {
        Debugger::new(self).repl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(script: Vec<ExecOp>) -> SimConfig {
        SimConfig {
            lock_at_ps: 100_000,
            script,
            ..Default::default()
        }
    }

    #[test]
    fn test_run_to_completion() {
        let script = vec![
            ExecOp::divide(1 << 33, 3).unwrap(),
            // the slower display domain leaves reset about 130 of its ticks later
            ExecOp::Idle(200),
            ExecOp::plot(10, 20, 5).unwrap(),
            ExecOp::write(7, 0o1234).unwrap(),
        ];
        let mut emu = Emulator::new(&config(script)).unwrap();
        emu.run_while_continue().unwrap();
        assert_eq!(emu.state, EmuState::Halt);
        assert!(emu.system.time_ps() < 50_000_000);

        let results = emu.system.exec_engine().results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].quotient, (1 << 33) / 3);
        let display = emu.system.display_engine();
        assert_eq!(display.points().len(), 1);
        assert_eq!(display.memory()[7], 0o1234);
        assert!(!emu.edge_history.is_empty());
    }

    #[test]
    fn test_lock_is_applied_at_configured_time() {
        let mut emu = Emulator::new(&config(Vec::new())).unwrap();
        while emu.system.time_ps() < 80_000 {
            emu.microstep().unwrap();
        }
        assert!(!emu.system.locked());
        while emu.system.time_ps() < 100_000 {
            emu.microstep().unwrap();
        }
        assert!(emu.system.locked());
    }

    #[test]
    fn test_time_limit_halts() {
        let mut cfg = config(vec![ExecOp::Idle(u32::MAX)]);
        cfg.time_limit_ps = 2_000_000;
        let mut emu = Emulator::new(&cfg).unwrap();
        emu.run_while_continue().unwrap();
        assert_eq!(emu.state, EmuState::Halt);
        assert_eq!(emu.system.time_ps(), 2_000_000);
        emu.step_edges(10).unwrap();
        assert_eq!(emu.system.time_ps(), 2_000_000);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut cfg = SimConfig::default();
        cfg.pace_hz = Some(0.0);
        assert_eq!(cfg.validate(), Err(ConfigError::Pace));
        cfg.pace_hz = None;
        cfg.system.reset.sync_depth = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::SyncDepth(0)));
        assert!(Emulator::new(&cfg).is_err());
    }
}
