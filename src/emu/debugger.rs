use std::cell::RefCell;

use anyhow::Result;
use easy_repl::{command, repl::LoopStatus, CommandStatus, Repl};

use crate::plat::{parse_number, DomainId, DIVIDE_STAGES};

use super::{
    emulator::{EmuState, Emulator},
    host::ExecOp,
};

pub struct Debugger<'b> {
    pub emu: RefCell<&'b mut Emulator>,
}

impl<'b> Debugger<'b> {
    pub fn new(emu: &'b mut Emulator) -> Self {
        Self {
            emu: RefCell::new(emu),
        }
    }

    pub fn repl(&self) -> Result<()> {
        let mut repl = Repl::builder()
            .description("fpg1 Debug REPL")
            .add(
                "c",
                command! {
                    "Continue execution",
                    () => || {
                        self.emu.borrow_mut().state = EmuState::Continue;
                        Ok(CommandStatus::Quit)
                    }
                },
            )
            .add(
                "s",
                command! {
                    "Step X clock edges",
                    (x:u64) => |x| {
                        self.emu.borrow_mut().step_edges(x)?;
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "bt",
                command! {
                    "Print the last X clock edges",
                    (x:usize) => |x| {
                        let emu = self.emu.borrow();
                        for (time, edges) in emu.edge_history.iter().rev().take(x).rev() {
                            let exec = if edges.exec { "exec" } else { "" };
                            let display = if edges.display { "display" } else { "" };
                            eprintln!("{:>12} ps  {:<5} {}", time, exec, display);
                        }
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "pr",
                command! {
                    "Print domain, pipeline and relay state",
                    () => || {
                        let emu = self.emu.borrow();
                        let sys = &emu.system;
                        eprintln!("t={} ps lock={}", sys.time_ps(), sys.locked());
                        for id in DomainId::ALL {
                            let domain = sys.domain(id);
                            eprintln!(
                                "{:>8}: tick={} reset={:?} settle={} lock_sync={:?}",
                                id.to_string(),
                                domain.tick_count(),
                                domain.reset_state(),
                                domain.sequencer().counter(),
                                domain.lock_history(),
                            );
                        }
                        for i in 0..DIVIDE_STAGES {
                            if let Some(stage) = sys.divider().stage(i).filter(|s| s.valid()) {
                                eprintln!(
                                    "  div[{}]: rem={:09X} quo={:09X} div={:05X} dbz={}",
                                    i,
                                    stage.partial_remainder,
                                    stage.partial_quotient,
                                    stage.divisor,
                                    stage.divide_by_zero(),
                                );
                            }
                        }
                        let res = sys.divider().result();
                        if res.valid {
                            eprintln!("  div out: q={:09X} r={:05X}", res.quotient, res.remainder);
                        }
                        eprintln!("exec out: {:?}", sys.exec_signals());
                        eprintln!("display sees: {:?}", sys.relayed_exec());
                        eprintln!("exec sees blanking={}", sys.relayed_blanking());
                        let exec = sys.exec_engine();
                        eprintln!(
                            "script: {} queued, {} divides pending, {} done",
                            exec.remaining(),
                            exec.pending(),
                            exec.results().len(),
                        );
                        let display = sys.display_engine();
                        eprintln!(
                            "display: beam={:?} frames={} points={} writes={}",
                            display.position(),
                            display.frames(),
                            display.points().len(),
                            display.writes(),
                        );
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "lock",
                command! {
                    "Set the clock source's lock level (0 or 1)",
                    (level:u8) => |level| {
                        self.emu.borrow_mut().system.set_lock(level != 0);
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "rst",
                command! {
                    "Set the external reset level (0 or 1)",
                    (level:u8) => |level| {
                        self.emu.borrow_mut().system.set_external_reset(level != 0);
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "div",
                command! {
                    "Queue a divide",
                    (dividend:String, divisor:String) => |dividend: String, divisor: String| {
                        let op = ExecOp::divide(parse_number(&dividend)?, parse_number(&divisor)?)?;
                        self.emu.borrow_mut().system.exec_engine_mut().push(op);
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "plot",
                command! {
                    "Queue a point",
                    (x:u64, y:u64, intensity:u64) => |x, y, intensity| {
                        let op = ExecOp::plot(x, y, intensity)?;
                        self.emu.borrow_mut().system.exec_engine_mut().push(op);
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "wr",
                command! {
                    "Queue a display memory write",
                    (addr:String, data:String) => |addr: String, data: String| {
                        let op = ExecOp::write(parse_number(&addr)?, parse_number(&data)?)?;
                        self.emu.borrow_mut().system.exec_engine_mut().push(op);
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "results",
                command! {
                    "Print completed divides",
                    () => || {
                        let emu = self.emu.borrow();
                        for r in emu.system.exec_engine().results() {
                            eprintln!(
                                "[tick {}] {:#x} / {:#x} = {:#x} r {:#x}{}",
                                r.tick,
                                r.dividend,
                                r.divisor,
                                r.quotient,
                                r.remainder,
                                if r.divide_by_zero { " (divide by zero)" } else { "" },
                            );
                        }
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "halt",
                command! {
                    "Halt execution",
                    () => || {
                        self.emu.borrow_mut().state = EmuState::Halt;
                        Ok(CommandStatus::Quit)
                    }
                },
            )
            .build()?;
        eprintln!("fpg1 Debug REPL");
        'repl: loop {
            eprintln!();
            {
                let emu = self.emu.borrow();
                if let Some((time, edges)) = emu.edge_history.back() {
                    eprintln!("Last edge:\n[t={} ps] --> {:?}", time, edges);
                }
            }

            let status = repl.next()?;
            if let LoopStatus::Break = status {
                break 'repl;
            }
            {
                let emu = self.emu.borrow();
                if let EmuState::Halt = emu.state {
                    break 'repl;
                }
            }
        }
        Ok(())
    }
}
