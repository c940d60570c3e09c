use anyhow::Result;
use clap::Parser;
use fpg1::{
    emu::{
        emulator::{Emulator, SimConfig},
        host::{ExecOp, RasterTiming},
        reset::{ResetConfig, DEFAULT_SETTLE_TICKS, DEFAULT_SYNC_DEPTH},
        system::SystemConfig,
    },
    plat::parse_number,
};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

/// Cycle-level simulation of the fpg1 divide pipeline and its two clock domains.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Execution clock period in picoseconds.
    #[arg(long, default_value_t = 20_000)]
    exec_period_ps: u64,
    /// Display (pixel) clock period in picoseconds.
    #[arg(long, default_value_t = 40_000)]
    display_period_ps: u64,
    /// Offset of the display clock's edges in picoseconds.
    #[arg(long, default_value_t = 0)]
    display_phase_ps: u64,
    /// Ticks of stable lock required before a domain leaves reset.
    #[arg(long, default_value_t = DEFAULT_SETTLE_TICKS)]
    settle_ticks: u32,
    /// Synchronizer stages on the lock input.
    #[arg(long, default_value_t = DEFAULT_SYNC_DEPTH)]
    sync_depth: usize,
    /// Simulated time at which the clock source locks.
    #[arg(long, default_value_t = 1_000_000)]
    lock_at_ps: u64,
    /// Simulated time after which the run stops.
    #[arg(long, default_value_t = 50_000_000)]
    time_limit_ps: u64,
    /// Step at most this many clock edges per wall-clock second.
    #[arg(long)]
    pace_hz: Option<f64>,
    /// A script step, in order: `div:D/V`, `wr:ADDR=DATA`, `plot:X,Y,I`, `idle:N` or `vblank`.
    /// Numbers take 0x, 0o and 0b prefixes.
    #[arg(short, long = "op", value_parser = parse_op)]
    ops: Vec<ExecOp>,
    /// Start paused in the debug REPL.
    #[arg(short, long)]
    debug: bool,
    /// More logging (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_op(s: &str) -> Result<ExecOp, String> {
    let num = |s: &str| parse_number(s).map_err(|e| format!("{s:?}: {e}"));
    let (kind, rest) = s.split_once(':').unwrap_or((s, ""));
    let op = match kind {
        "div" => {
            let (d, v) = rest.split_once('/').ok_or("expected div:DIVIDEND/DIVISOR")?;
            ExecOp::divide(num(d)?, num(v)?)
        }
        "wr" => {
            let (a, d) = rest.split_once('=').ok_or("expected wr:ADDR=DATA")?;
            ExecOp::write(num(a)?, num(d)?)
        }
        "plot" => {
            let mut parts = rest.splitn(3, ',');
            let mut next = || parts.next().ok_or("expected plot:X,Y,INTENSITY");
            let (x, y, i) = (next()?, next()?, next()?);
            ExecOp::plot(num(x)?, num(y)?, num(i)?)
        }
        "idle" => {
            let n = num(rest)?;
            return u32::try_from(n)
                .map(ExecOp::Idle)
                .map_err(|_| format!("idle count {n} is too large"));
        }
        "vblank" => return Ok(ExecOp::WaitBlanking),
        _ => return Err(format!("unknown op {kind:?}")),
    };
    op.map_err(|e| e.to_string())
}

fn demo_script() -> Vec<ExecOp> {
    let mut script = vec![
        ExecOp::Divide { dividend: 1 << 33, divisor: 3 },
        ExecOp::Divide { dividend: 0x3_FFFF_FFFF, divisor: 1 },
        ExecOp::Divide { dividend: 12345, divisor: 0 },
        ExecOp::Divide { dividend: 1000, divisor: 7 },
    ];
    for i in 0..8u16 {
        script.push(ExecOp::Plot {
            x: i * 100,
            y: 479 - i * 50,
            intensity: (i % 8) as u8,
        });
    }
    script.push(ExecOp::Write { address: 0o7777, data: 0o777777 });
    script
}

/// Execution ticks to wait before the first display handshake so the display has left reset.
fn settle_wait(system: &SystemConfig) -> u32 {
    let display_ticks = system.reset.release_latency() + 1;
    let ticks = (display_ticks * system.display_period_ps).div_ceil(system.exec_period_ps.max(1));
    u32::try_from(ticks).unwrap_or(u32::MAX)
}

/// Inserts a settle wait ahead of the first display handshake, unless the script already waits.
fn with_settle_wait(mut script: Vec<ExecOp>, system: &SystemConfig) -> Vec<ExecOp> {
    let first = script
        .iter()
        .position(|op| !matches!(op, ExecOp::Divide { .. }));
    if let Some(i) = first {
        if matches!(script[i], ExecOp::Write { .. } | ExecOp::Plot { .. }) {
            script.insert(i, ExecOp::Idle(settle_wait(system)));
        }
    }
    script
}

fn main() -> Result<()> {
    let args = Args::parse();
    TermLogger::init(
        match args.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        },
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let system = SystemConfig {
        exec_period_ps: args.exec_period_ps,
        display_period_ps: args.display_period_ps,
        display_phase_ps: args.display_phase_ps,
        reset: ResetConfig {
            settle_ticks: args.settle_ticks,
            sync_depth: args.sync_depth,
        },
    };
    let script = if args.ops.is_empty() {
        demo_script()
    } else {
        args.ops
    };
    let config = SimConfig {
        system,
        raster: RasterTiming::default(),
        lock_at_ps: args.lock_at_ps,
        time_limit_ps: args.time_limit_ps,
        pace_hz: args.pace_hz,
        script: with_settle_wait(script, &system),
        debug: args.debug,
    };

    let mut emu = Emulator::new(&config)?;
    emu.run_while_continue()?;

    let sys = &emu.system;
    println!("stopped at {} ps", sys.time_ps());
    for r in sys.exec_engine().results() {
        if r.divide_by_zero {
            println!(
                "{:#x} / {:#x}: divide by zero (q={:#x} r={:#x})",
                r.dividend, r.divisor, r.quotient, r.remainder
            );
        } else {
            println!(
                "{:#x} / {:#x} = {:#x} r {:#x}",
                r.dividend, r.divisor, r.quotient, r.remainder
            );
        }
    }
    let display = sys.display_engine();
    for p in display.points() {
        println!(
            "point ({}, {}) intensity {} in frame {}",
            p.x, p.y, p.intensity, p.frame
        );
    }
    println!("{} display memory writes", display.writes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_op() {
        assert_eq!(parse_op("div:0x10/3"), ExecOp::divide(16, 3).map_err(|e| e.to_string()));
        assert_eq!(parse_op("wr:0o7=5"), Ok(ExecOp::Write { address: 7, data: 5 }));
        assert_eq!(
            parse_op("plot:1,2,3"),
            Ok(ExecOp::Plot { x: 1, y: 2, intensity: 3 })
        );
        assert_eq!(parse_op("idle:10"), Ok(ExecOp::Idle(10)));
        assert_eq!(parse_op("vblank"), Ok(ExecOp::WaitBlanking));
        assert!(parse_op("plot:1,2").is_err());
        assert!(parse_op("plot:1024,0,0").is_err());
        assert!(parse_op("div:5").is_err());
        assert!(parse_op("jmp:3").is_err());
    }

    #[test]
    fn test_settle_wait_is_inserted_before_first_handshake() {
        let system = SystemConfig::default();
        // 132 display ticks at twice the execution period
        assert_eq!(settle_wait(&system), 264);
        let script = with_settle_wait(demo_script(), &system);
        assert_eq!(script[4], ExecOp::Idle(264));
        assert!(matches!(script[5], ExecOp::Plot { .. }));

        let waits = vec![ExecOp::WaitBlanking, ExecOp::Plot { x: 0, y: 0, intensity: 0 }];
        assert_eq!(with_settle_wait(waits.clone(), &system), waits);
    }
}
