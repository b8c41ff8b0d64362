//! Per-channel debounce logic.
//!
//! A raw transition opens a debounce window. The stable state only follows
//! the raw input once the raw input has held still for the full window; a
//! reversal inside the window restarts it. This bounds stable transitions to
//! at most one per interval no matter how hard the contact chatters.

/// Direction of a stable-state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Press,
    Release,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    /// Debounced state: true = pressed.
    stable: bool,
    /// Most recent raw sample.
    raw: bool,
    /// Timestamp of the last raw transition (µs, free-running).
    raw_changed_at: u32,
    interval_us: u32,
    /// Edge produced by the most recent `sample`, until read.
    edge: Option<Edge>,
}

impl Debouncer {
    pub const fn new(interval_us: u32) -> Self {
        Self {
            stable: false,
            raw: false,
            raw_changed_at: 0,
            interval_us,
            edge: None,
        }
    }

    /// Feed one raw reading taken at `now`.
    ///
    /// Any edge from the previous sample that was never read is dropped.
    pub fn sample(&mut self, raw: bool, now: u32) {
        self.edge = None;

        if raw != self.raw {
            // Raw moved: (re)start the window
            self.raw = raw;
            self.raw_changed_at = now;
            return;
        }

        if raw != self.stable && now.wrapping_sub(self.raw_changed_at) >= self.interval_us {
            self.stable = raw;
            self.edge = Some(if raw { Edge::Press } else { Edge::Release });
        }
    }

    /// True once if the most recent sample produced a press edge.
    pub fn is_pressed_edge(&mut self) -> bool {
        self.consume(Edge::Press)
    }

    /// True once if the most recent sample produced a release edge.
    pub fn is_released_edge(&mut self) -> bool {
        self.consume(Edge::Release)
    }

    /// Read and consume whichever edge the most recent sample produced.
    pub fn take_edge(&mut self) -> Option<Edge> {
        self.edge.take()
    }

    pub fn is_pressed(&self) -> bool {
        self.stable
    }

    fn consume(&mut self, edge: Edge) -> bool {
        if self.edge == Some(edge) {
            self.edge = None;
            true
        } else {
            false
        }
    }
}
