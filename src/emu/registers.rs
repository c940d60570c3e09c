use tokio::sync::watch::{channel, Receiver, Sender};

/// A clocked register.
///
/// Reads always return the value committed on the last clock edge. Writes only drive the
/// register's input, which is latched by [`commit`][Reg::commit]. A register that is not driven
/// during a tick holds its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reg<T: Copy> {
    q: T,
    d: T,
}

impl<T: Copy> Reg<T> {
    /// Creates a new [`Reg`] holding `init`.
    pub fn new(init: T) -> Self {
        Self { q: init, d: init }
    }

    /// The committed value.
    pub fn get(&self) -> T {
        self.q
    }

    /// The value that will be committed on the next edge.
    pub fn next(&self) -> T {
        self.d
    }

    /// Drives the register's input. The committed value changes on the next call to `commit`.
    pub fn set(&mut self, value: T) {
        self.d = value;
    }

    /// Clock edge: latches the driven input.
    pub fn commit(&mut self) {
        self.q = self.d;
    }

    /// Asynchronously forces both the committed value and the pending input.
    pub fn force(&mut self, value: T) {
        self.q = value;
        self.d = value;
    }
}

/// Creates a [`Wire`] carrying `init` until it is first driven.
pub fn wire<T: Copy>(init: T) -> (WireTx<T>, WireRx<T>) {
    let (tx, rx) = channel(init);
    (
        WireTx {
            tx,
            out: Reg::new(init),
        },
        WireRx { rx },
    )
}

/// The driving end of a net that leaves its clock domain.
///
/// The value is registered in the source domain: [`drive`][WireTx::drive] sets the next value and
/// [`commit`][WireTx::commit] publishes it to every receiver, so other domains never observe a
/// value the source has not committed yet.
#[derive(Debug)]
pub struct WireTx<T: Copy> {
    tx: Sender<T>,
    out: Reg<T>,
}

impl<T: Copy> WireTx<T> {
    pub fn drive(&mut self, value: T) {
        self.out.set(value);
    }

    /// The value currently visible on the net.
    pub fn current(&self) -> T {
        self.out.get()
    }

    /// Clock edge of the source domain: publishes the driven value.
    pub fn commit(&mut self) {
        self.out.commit();
        self.tx.send_replace(self.out.get());
    }

    /// Asynchronously forces the net to `value`.
    pub fn force(&mut self, value: T) {
        self.out.force(value);
        self.tx.send_replace(value);
    }

    /// Attaches another receiver to this net.
    pub fn subscribe(&self) -> WireRx<T> {
        WireRx {
            rx: self.tx.subscribe(),
        }
    }
}

/// The receiving end of a net. Sampling it is only safe through a synchronizer.
#[derive(Debug, Clone)]
pub struct WireRx<T: Copy> {
    rx: Receiver<T>,
}

impl<T: Copy> WireRx<T> {
    /// Samples the net's current level.
    pub fn sample(&self) -> T {
        *self.rx.borrow()
    }
}
