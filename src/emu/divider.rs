//! The pipelined 34/17-bit restoring divider.
//!
//! Each of the [`DIVIDE_STAGES`] stages performs a fixed group of restoring-division steps (see
//! [`STAGE_BITS`]) on the state the previous stage committed on the last tick, so a new operation
//! may be issued every tick. Results appear on the output register exactly
//! [`DividePipeline::LATENCY`] ticks after issue and are bit-identical to
//! [`legacy_divide`][super::alu::legacy_divide].

use crate::plat::{
    mask, DIVIDEND_BITS, DIVIDE_STAGES, DIVISOR_BITS, QUOTIENT_SENTINEL, REMAINDER_SENTINEL,
    STAGE_BITS,
};

use super::{alu::restoring_step, registers::Reg};

bitflags::bitflags! {
    /// Control bits travelling down the pipeline alongside each operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DivideFlags: u8 {
        /// The slot holds an issued operation rather than a bubble.
        const VALID = 1 << 0;
        /// The divisor was zero at issue. Never recomputed after stage 0.
        const DIVIDE_BY_ZERO = 1 << 1;
    }
}

impl Default for DivideFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// The divider's input port for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DivideOperation {
    pub dividend: u64,
    pub divisor: u32,
    /// Issue pulse. When clear, stage 0 takes a bubble this tick.
    pub start: bool,
}

impl DivideOperation {
    /// An operation that starts this tick.
    pub fn issue(dividend: u64, divisor: u32) -> Self {
        Self {
            dividend,
            divisor,
            start: true,
        }
    }

    /// No operation this tick.
    pub fn idle() -> Self {
        Self::default()
    }
}

/// The state one pipeline stage hands to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartialState {
    pub partial_remainder: u64,
    pub partial_quotient: u64,
    pub divisor: u32,
    pub flags: DivideFlags,
}

impl PartialState {
    /// Captures an operation's operands at issue. Operands are truncated to their field widths.
    pub fn capture(op: DivideOperation) -> Self {
        if !op.start {
            return Self::default();
        }
        let divisor = op.divisor & REMAINDER_SENTINEL;
        let mut flags = DivideFlags::VALID;
        flags.set(DivideFlags::DIVIDE_BY_ZERO, divisor == 0);
        Self {
            partial_remainder: 0,
            partial_quotient: op.dividend & mask(DIVIDEND_BITS),
            divisor,
            flags,
        }
    }

    /// Applies `steps` restoring-division steps. The divisor copy and flags pass through unchanged.
    pub fn advance(self, steps: u32) -> Self {
        let (mut remainder, mut quotient) = (self.partial_remainder, self.partial_quotient);
        for _ in 0..steps {
            (remainder, quotient) = restoring_step(remainder, quotient, self.divisor);
        }
        Self {
            partial_remainder: remainder,
            partial_quotient: quotient,
            ..self
        }
    }

    pub fn valid(&self) -> bool {
        self.flags.contains(DivideFlags::VALID)
    }

    pub fn divide_by_zero(&self) -> bool {
        self.flags.contains(DivideFlags::DIVIDE_BY_ZERO)
    }
}

/// The divider's output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DivideResult {
    pub quotient: u64,
    pub remainder: u32,
    /// Asserted for exactly one tick per issued operation.
    pub valid: bool,
    /// Set when `quotient` and `remainder` are the divide-by-zero sentinels.
    pub divide_by_zero: bool,
}

impl DivideResult {
    fn from_final_stage(state: PartialState) -> Self {
        let (quotient, remainder) = if state.divide_by_zero() {
            (QUOTIENT_SENTINEL, REMAINDER_SENTINEL)
        } else {
            (
                state.partial_quotient,
                (state.partial_remainder & mask(DIVISOR_BITS)) as u32,
            )
        };
        Self {
            quotient,
            remainder,
            valid: state.valid(),
            divide_by_zero: state.divide_by_zero(),
        }
    }
}

/// The eight-stage divide pipeline plus its output register.
#[derive(Debug, Clone, Default)]
pub struct DividePipeline {
    stages: [Reg<PartialState>; DIVIDE_STAGES],
    output: Reg<DivideResult>,
}

impl DividePipeline {
    /// Ticks from the issuing tick to the tick after which `valid` is observed.
    pub const LATENCY: u64 = DIVIDE_STAGES as u64;

    pub fn new() -> Self {
        Self::default()
    }

    /// Computes every stage's next state from the states committed on the previous tick.
    pub fn evaluate(&mut self, op: DivideOperation) {
        if op.start {
            log::trace!("div issue {:#x} / {:#x}", op.dividend, op.divisor);
        }
        let mut next = [PartialState::default(); DIVIDE_STAGES];
        next[0] = PartialState::capture(op).advance(STAGE_BITS[0]);
        for i in 1..DIVIDE_STAGES {
            next[i] = self.stages[i - 1].get().advance(STAGE_BITS[i]);
        }
        let result = DivideResult::from_final_stage(self.stages[DIVIDE_STAGES - 1].get());
        if result.valid {
            log::trace!("div done q={:#x} r={:#x}", result.quotient, result.remainder);
        }

        for (stage, state) in self.stages.iter_mut().zip(next) {
            stage.set(state);
        }
        self.output.set(result);
    }

    /// Clock edge: every stage latches its computed state at once.
    pub fn commit(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.commit();
        }
        self.output.commit();
    }

    /// Evaluates and commits one tick, returning the new output.
    pub fn tick(&mut self, op: DivideOperation) -> DivideResult {
        self.evaluate(op);
        self.commit();
        self.result()
    }

    /// Discards every in-flight operation.
    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.force(PartialState::default());
        }
        self.output.force(DivideResult::default());
    }

    /// The committed output. Only meaningful while `valid` is set.
    pub fn result(&self) -> DivideResult {
        self.output.get()
    }

    /// The state committed by stage `index`.
    pub fn stage(&self, index: usize) -> Option<PartialState> {
        self.stages.get(index).map(Reg::get)
    }

    /// Number of issued operations whose result has not been presented yet, plus one if the
    /// output register currently presents a result.
    pub fn in_flight(&self) -> usize {
        self.stages.iter().filter(|s| s.get().valid()).count() + usize::from(self.result().valid)
    }
}
