//! Stand-ins for the processor and the display timing generator.
//!
//! [`ScriptedExecution`] replays a queue of [`ExecOp`]s, one step per execution tick, much like a
//! micro-op sequencer; [`RasterDisplay`] runs a raster counter, reports vertical blanking and
//! records everything the execution domain sends it.

use std::collections::VecDeque;

use crate::plat::{
    check_width, PResult, ADDRESS_BITS, COORD_BITS, DATA_BITS, DIVIDEND_BITS, DIVISOR_BITS,
    INTENSITY_BITS,
};

use super::{
    divider::DivideOperation,
    relay::{DisplaySignals, ExecSignals},
    sync::SyncChannel,
    system::{DisplayDrive, DisplayEngine, DisplayView, ExecDrive, ExecView, ExecutionEngine},
};

/// One step of an execution script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOp {
    /// Issues a divide. Takes one tick; the result is collected when it arrives.
    Divide { dividend: u64, divisor: u32 },
    /// Stores `data` at `address` in display memory through the write-enable handshake.
    Write { address: u16, data: u32 },
    /// Plots a point through the strobe handshake.
    Plot { x: u16, y: u16, intensity: u8 },
    /// Does nothing for the given number of ticks.
    Idle(u32),
    /// Waits until the display reports vertical blanking.
    WaitBlanking,
}

impl ExecOp {
    /// A divide with operands checked against the divider's field widths.
    ///
    /// # Errors
    ///
    /// This function will return an error if an operand is wider than its field.
    pub fn divide(dividend: u64, divisor: u64) -> PResult<Self> {
        Ok(Self::Divide {
            dividend: check_width("dividend", dividend, DIVIDEND_BITS)?,
            divisor: check_width("divisor", divisor, DIVISOR_BITS)? as u32,
        })
    }

    /// A display memory write with checked fields.
    ///
    /// # Errors
    ///
    /// This function will return an error if a field does not fit its wires.
    pub fn write(address: u64, data: u64) -> PResult<Self> {
        Ok(Self::Write {
            address: check_width("address", address, ADDRESS_BITS)? as u16,
            data: check_width("data", data, DATA_BITS)? as u32,
        })
    }

    /// A point with checked coordinates and intensity.
    ///
    /// # Errors
    ///
    /// This function will return an error if a field does not fit its wires.
    pub fn plot(x: u64, y: u64, intensity: u64) -> PResult<Self> {
        Ok(Self::Plot {
            x: check_width("x", x, COORD_BITS)? as u16,
            y: check_width("y", y, COORD_BITS)? as u16,
            intensity: check_width("intensity", intensity, INTENSITY_BITS)? as u8,
        })
    }
}

/// A completed divide as observed by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivideRecord {
    pub dividend: u64,
    pub divisor: u32,
    pub quotient: u64,
    pub remainder: u32,
    pub divide_by_zero: bool,
    /// Execution tick on which the result was observed.
    pub tick: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handshake {
    Write,
    Strobe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Active {
    Handshake { kind: Handshake, high: u32, low: u32 },
    Idle(u32),
    WaitBlanking,
}

/// Source ticks to hold a control level so that a destination clocked with
/// `display_period_ps` samples it through a full control synchronizer.
pub fn hold_ticks_for(exec_period_ps: u64, display_period_ps: u64) -> u32 {
    let depth = SyncChannel::<bool>::CONTROL_DEPTH as u64;
    let ticks = (depth * display_period_ps).div_ceil(exec_period_ps.max(1)) + 1;
    u32::try_from(ticks).unwrap_or(u32::MAX)
}

/// An execution engine that replays a script of [`ExecOp`]s.
#[derive(Debug, Clone)]
pub struct ScriptedExecution {
    script: VecDeque<ExecOp>,
    active: Option<Active>,
    hold_ticks: u32,
    latched: ExecSignals,
    pending: VecDeque<(u64, u32)>,
    results: Vec<DivideRecord>,
    finished: bool,
}

impl ScriptedExecution {
    /// Creates an engine that holds every write enable and strobe high for `hold_ticks`, then low
    /// for as long again.
    pub fn new(hold_ticks: u32) -> Self {
        Self {
            script: VecDeque::new(),
            active: None,
            hold_ticks: hold_ticks.max(1),
            latched: ExecSignals::default(),
            pending: VecDeque::new(),
            results: Vec::new(),
            finished: false,
        }
    }

    pub fn push(&mut self, op: ExecOp) {
        self.script.push_back(op);
        self.finished = false;
    }

    pub fn extend(&mut self, ops: impl IntoIterator<Item = ExecOp>) {
        for op in ops {
            self.push(op);
        }
    }

    /// Completed divides in completion order.
    pub fn results(&self) -> &[DivideRecord] {
        &self.results
    }

    /// Divides issued but not yet completed.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Ops not started yet.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    /// The script is exhausted and every issued divide has completed.
    pub fn is_done(&self) -> bool {
        self.script.is_empty() && self.active.is_none() && self.pending.is_empty()
    }

    fn start(&mut self, op: ExecOp, drive: &mut ExecDrive) {
        let hold = self.hold_ticks;
        self.active = match op {
            ExecOp::Divide { dividend, divisor } => {
                drive.divide = DivideOperation::issue(dividend, divisor);
                self.pending.push_back((dividend, divisor));
                None
            }
            ExecOp::Write { address, data } => {
                self.latched.address = address;
                self.latched.data = data;
                Some(Active::Handshake {
                    kind: Handshake::Write,
                    high: hold,
                    low: hold,
                })
            }
            ExecOp::Plot { x, y, intensity } => {
                self.latched.x = x;
                self.latched.y = y;
                self.latched.intensity = intensity;
                Some(Active::Handshake {
                    kind: Handshake::Strobe,
                    high: hold,
                    low: hold,
                })
            }
            ExecOp::Idle(ticks) => Some(Active::Idle(ticks)),
            ExecOp::WaitBlanking => Some(Active::WaitBlanking),
        };
    }

    fn advance(&mut self, view: &ExecView, drive: &mut ExecDrive) {
        self.active = match self.active {
            Some(Active::Handshake { kind, high, low }) if high > 0 => {
                match kind {
                    Handshake::Write => drive.signals.write_enable = true,
                    Handshake::Strobe => drive.signals.strobe = true,
                }
                Some(Active::Handshake {
                    kind,
                    high: high - 1,
                    low,
                })
            }
            Some(Active::Handshake { kind, low, .. }) if low > 1 => Some(Active::Handshake {
                kind,
                high: 0,
                low: low - 1,
            }),
            Some(Active::Idle(ticks)) if ticks > 1 => Some(Active::Idle(ticks - 1)),
            Some(Active::WaitBlanking) if !view.blanking => Some(Active::WaitBlanking),
            _ => None,
        };
    }
}

impl Default for ScriptedExecution {
    fn default() -> Self {
        Self::new(hold_ticks_for(1, 1))
    }
}

impl ExecutionEngine for ScriptedExecution {
    fn tick(&mut self, view: &ExecView) -> ExecDrive {
        if view.divide.valid {
            if let Some((dividend, divisor)) = self.pending.pop_front() {
                log::trace!("exec tick {}: divide {:#x} / {:#x} done", view.tick, dividend, divisor);
                self.results.push(DivideRecord {
                    dividend,
                    divisor,
                    quotient: view.divide.quotient,
                    remainder: view.divide.remainder,
                    divide_by_zero: view.divide.divide_by_zero,
                    tick: view.tick,
                });
            }
        }

        let mut drive = ExecDrive::default();
        if self.active.is_none() {
            if let Some(op) = self.script.pop_front() {
                log::trace!("exec tick {}: {:?}", view.tick, op);
                self.start(op, &mut drive);
            }
        }
        // fields change together with, never after, the enable that qualifies them
        drive.signals = self.latched;
        if self.active.is_some() {
            self.advance(view, &mut drive);
        }

        if self.is_done() && !self.finished {
            self.finished = true;
            log::info!("exec script finished at tick {}", view.tick);
        }
        drive
    }

    /// In-flight divides are discarded by the reset; an interrupted handshake starts over.
    fn held(&mut self) {
        self.pending.clear();
        if let Some(Active::Handshake { kind, .. }) = self.active {
            self.active = Some(Active::Handshake {
                kind,
                high: self.hold_ticks,
                low: self.hold_ticks,
            });
        }
    }
}

/// Raster dimensions in display ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterTiming {
    pub h_total: u32,
    pub v_total: u32,
    /// Lines before vertical blanking starts.
    pub v_visible: u32,
}

impl Default for RasterTiming {
    /// 640x480 VGA: 800 pixel clocks per line, 525 lines, 480 visible.
    fn default() -> Self {
        Self {
            h_total: 800,
            v_total: 525,
            v_visible: 480,
        }
    }
}

/// A point received from the execution domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: u16,
    pub y: u16,
    pub intensity: u8,
    pub frame: u64,
}

/// Words of display memory addressable by the execution domain.
pub const DISPLAY_MEMORY_WORDS: usize = 1 << ADDRESS_BITS;

/// A display timing engine: raster counters, vertical blanking, and a sink for points and writes.
#[derive(Debug, Clone)]
pub struct RasterDisplay {
    timing: RasterTiming,
    h: u32,
    v: u32,
    frames: u64,
    points: Vec<Point>,
    memory: Box<[u32]>,
    writes: u64,
}

impl RasterDisplay {
    pub fn new(timing: RasterTiming) -> Self {
        Self {
            timing: RasterTiming {
                h_total: timing.h_total.max(1),
                v_total: timing.v_total.max(1),
                v_visible: timing.v_visible,
            },
            h: 0,
            v: 0,
            frames: 0,
            points: Vec::new(),
            memory: vec![0u32; DISPLAY_MEMORY_WORDS].into_boxed_slice(),
            writes: 0,
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn memory(&self) -> &[u32] {
        &self.memory
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Current beam position `(h, v)`.
    pub fn position(&self) -> (u32, u32) {
        (self.h, self.v)
    }

    pub fn blanking(&self) -> bool {
        self.v >= self.timing.v_visible
    }
}

impl Default for RasterDisplay {
    fn default() -> Self {
        Self::new(RasterTiming::default())
    }
}

impl DisplayEngine for RasterDisplay {
    fn tick(&mut self, view: &DisplayView) -> DisplayDrive {
        let relayed = view.relayed;
        if relayed.strobe {
            self.points.push(Point {
                x: relayed.x,
                y: relayed.y,
                intensity: relayed.intensity,
                frame: self.frames,
            });
        }
        if relayed.write {
            self.memory[usize::from(relayed.address) % DISPLAY_MEMORY_WORDS] = relayed.data;
            self.writes += 1;
        }

        self.h += 1;
        if self.h == self.timing.h_total {
            self.h = 0;
            self.v += 1;
            if self.v == self.timing.v_total {
                self.v = 0;
                self.frames += 1;
            }
        }

        DisplayDrive {
            signals: DisplaySignals {
                blanking: self.blanking(),
            },
        }
    }

    fn held(&mut self) {
        self.h = 0;
        self.v = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::{
        alu::legacy_divide,
        system::{System, SystemConfig},
    };
    use crate::plat::{DomainId, PlatformError};

    const SMALL: RasterTiming = RasterTiming {
        h_total: 10,
        v_total: 10,
        v_visible: 8,
    };

    fn system(exec_ps: u64, display_ps: u64) -> System<ScriptedExecution, RasterDisplay> {
        let config = SystemConfig {
            exec_period_ps: exec_ps,
            display_period_ps: display_ps,
            display_phase_ps: 3_000,
            ..Default::default()
        };
        let exec = ScriptedExecution::new(hold_ticks_for(exec_ps, display_ps));
        let mut sys = System::new(config, exec, RasterDisplay::new(SMALL)).unwrap();
        sys.set_lock(true);
        sys
    }

    fn script() -> Vec<ExecOp> {
        let mut ops = vec![
            // the display only blanks once it is out of reset
            ExecOp::WaitBlanking,
            ExecOp::divide(0x3_FFFF_FFFF, 1).unwrap(),
            ExecOp::divide(1_000_000_007, 0x1_FFFF).unwrap(),
            ExecOp::divide(42, 0).unwrap(),
            ExecOp::plot(0, 0, 7).unwrap(),
            ExecOp::plot(1023, 512, 3).unwrap(),
            ExecOp::write(0o100, 0o123456).unwrap(),
            ExecOp::Idle(5),
            ExecOp::divide(987_654_321, 12_345).unwrap(),
            ExecOp::plot(1023, 512, 3).unwrap(),
            ExecOp::WaitBlanking,
            ExecOp::write(0o7777, 0o777777).unwrap(),
        ];
        ops.extend((0..8).map(|i| ExecOp::plot(i * 100, 1000 - i * 100, i % 8).unwrap()));
        ops
    }

    fn run(sys: &mut System<ScriptedExecution, RasterDisplay>) {
        sys.exec_engine_mut().extend(script());
        let mut guard = 0;
        while !sys.exec_engine().is_done() {
            sys.step();
            guard += 1;
            assert!(guard < 100_000, "script did not finish");
        }
        // let the last handshake reach the display
        sys.run_ticks(DomainId::Display, 10);
    }

    fn check(sys: &System<ScriptedExecution, RasterDisplay>) {
        let results = sys.exec_engine().results();
        assert_eq!(results.len(), 4);
        for r in results {
            assert_eq!((r.quotient, r.remainder), legacy_divide(r.dividend, r.divisor));
            assert_eq!(r.divide_by_zero, r.divisor == 0);
        }
        assert_eq!(results[0].quotient, 0x3_FFFF_FFFF);
        assert_eq!(results[1].tick, results[0].tick + 1);

        let display = sys.display_engine();
        let points: Vec<_> = display.points().iter().map(|p| (p.x, p.y, p.intensity)).collect();
        let mut expected = vec![(0, 0, 7), (1023, 512, 3), (1023, 512, 3)];
        expected.extend((0..8).map(|i| (i * 100, 1000 - i * 100, (i % 8) as u8)));
        assert_eq!(points, expected);

        assert_eq!(display.writes(), 2);
        assert_eq!(display.memory()[0o100], 0o123456);
        assert_eq!(display.memory()[0o7777], 0o777777);
    }

    #[test]
    fn test_fast_exec_slow_display() {
        let mut sys = system(20_000, 40_000);
        run(&mut sys);
        check(&sys);
    }

    #[test]
    fn test_slow_exec_fast_display() {
        let mut sys = system(40_000, 15_000);
        run(&mut sys);
        check(&sys);
    }

    #[test]
    fn test_wait_blanking_waits() {
        let mut sys = system(10_000, 10_000);
        sys.run_ticks(DomainId::Execution, 131);
        sys.exec_engine_mut().extend([ExecOp::WaitBlanking, ExecOp::Idle(1)]);
        // blanking starts on display line 8, relayed two ticks later
        sys.run_ticks(DomainId::Execution, 70);
        assert!(!sys.exec_engine().is_done());
        sys.run_ticks(DomainId::Execution, 20);
        assert!(sys.exec_engine().is_done());
    }

    #[test]
    fn test_hold_ticks_cover_control_relay() {
        assert_eq!(hold_ticks_for(20_000, 40_000), 7);
        assert_eq!(hold_ticks_for(40_000, 15_000), 3);
        assert_eq!(hold_ticks_for(10_000, 10_000), 4);
    }

    #[test]
    fn test_op_field_checks() {
        assert!(ExecOp::divide(1 << 34, 1).is_err());
        assert!(matches!(
            ExecOp::plot(0, 1024, 0),
            Err(PlatformError::FieldOverflow { field: "y", .. })
        ));
        assert!(ExecOp::write(0, 1 << 18).is_err());
        assert_eq!(
            ExecOp::plot(1, 2, 3),
            Ok(ExecOp::Plot {
                x: 1,
                y: 2,
                intensity: 3
            })
        );
    }

    #[test]
    fn test_raster_counters() {
        let mut display = RasterDisplay::new(SMALL);
        let view = DisplayView::default();
        let mut blank_ticks = 0;
        for _ in 0..200 {
            blank_ticks += usize::from(display.tick(&view).signals.blanking);
        }
        assert_eq!(display.frames(), 2);
        assert_eq!(display.position(), (0, 0));
        assert_eq!(blank_ticks, 40);
    }
}
