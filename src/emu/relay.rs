//! The signal bundles crossing between the execution and display domains.
//!
//! Each field has its own synchronizer. Data fields use a [`DataRelay`]; the write enable and the
//! point strobe are control levels and use a [`PulseRelay`], so the display sees exactly one pulse
//! per assertion, one tick after the matching data fields have settled.

use crate::plat::{mask, ADDRESS_BITS, COORD_BITS, DATA_BITS, INTENSITY_BITS};

use super::{
    registers::WireRx,
    sync::{DataRelay, PulseRelay},
};

/// Levels the execution domain drives toward the display domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecSignals {
    pub address: u16,
    pub data: u32,
    /// Must stay high until the display has seen it, and `address`/`data` must not change while
    /// it is high.
    pub write_enable: bool,
    pub x: u16,
    pub y: u16,
    pub intensity: u8,
    /// Same holding rules as `write_enable`, for `x`, `y` and `intensity`.
    pub strobe: bool,
}

impl ExecSignals {
    /// Truncates every field to the width of its wires.
    pub fn masked(self) -> Self {
        Self {
            address: (u64::from(self.address) & mask(ADDRESS_BITS)) as u16,
            data: (u64::from(self.data) & mask(DATA_BITS)) as u32,
            x: (u64::from(self.x) & mask(COORD_BITS)) as u16,
            y: (u64::from(self.y) & mask(COORD_BITS)) as u16,
            intensity: (u64::from(self.intensity) & mask(INTENSITY_BITS)) as u8,
            ..self
        }
    }
}

/// Levels the display domain drives toward the execution domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplaySignals {
    /// The raster is in its blanking interval.
    pub blanking: bool,
}

/// The execution domain's signals as seen from inside the display domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayedExec {
    pub address: u16,
    pub data: u32,
    /// One-tick write pulse.
    pub write: bool,
    pub x: u16,
    pub y: u16,
    pub intensity: u8,
    /// One-tick point strobe.
    pub strobe: bool,
}

/// Execution → display crossing. Clocked by the display domain.
#[derive(Debug)]
pub struct ExecToDisplayRelay {
    wire: WireRx<ExecSignals>,
    address: DataRelay<u16>,
    data: DataRelay<u32>,
    write: PulseRelay,
    x: DataRelay<u16>,
    y: DataRelay<u16>,
    intensity: DataRelay<u8>,
    strobe: PulseRelay,
}

impl ExecToDisplayRelay {
    pub fn new(wire: WireRx<ExecSignals>) -> Self {
        Self {
            wire,
            address: DataRelay::new(0),
            data: DataRelay::new(0),
            write: PulseRelay::new(),
            x: DataRelay::new(0),
            y: DataRelay::new(0),
            intensity: DataRelay::new(0),
            strobe: PulseRelay::new(),
        }
    }

    pub fn evaluate(&mut self) {
        let s = self.wire.sample();
        self.address.evaluate(s.address);
        self.data.evaluate(s.data);
        self.write.evaluate(s.write_enable);
        self.x.evaluate(s.x);
        self.y.evaluate(s.y);
        self.intensity.evaluate(s.intensity);
        self.strobe.evaluate(s.strobe);
    }

    pub fn commit(&mut self) {
        self.address.commit();
        self.data.commit();
        self.write.commit();
        self.x.commit();
        self.y.commit();
        self.intensity.commit();
        self.strobe.commit();
    }

    pub fn reset(&mut self) {
        self.address.reset();
        self.data.reset();
        self.write.reset();
        self.x.reset();
        self.y.reset();
        self.intensity.reset();
        self.strobe.reset();
    }

    pub fn view(&self) -> RelayedExec {
        RelayedExec {
            address: self.address.value(),
            data: self.data.value(),
            write: self.write.pulse(),
            x: self.x.value(),
            y: self.y.value(),
            intensity: self.intensity.value(),
            strobe: self.strobe.pulse(),
        }
    }
}

/// Display → execution crossing. Clocked by the execution domain.
#[derive(Debug)]
pub struct DisplayToExecRelay {
    wire: WireRx<DisplaySignals>,
    blanking: DataRelay<bool>,
}

impl DisplayToExecRelay {
    pub fn new(wire: WireRx<DisplaySignals>) -> Self {
        Self {
            wire,
            blanking: DataRelay::new(false),
        }
    }

    pub fn evaluate(&mut self) {
        self.blanking.evaluate(self.wire.sample().blanking);
    }

    pub fn commit(&mut self) {
        self.blanking.commit();
    }

    pub fn reset(&mut self) {
        self.blanking.reset();
    }

    pub fn blanking(&self) -> bool {
        self.blanking.value()
    }
}
