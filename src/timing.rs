//! Group-wide wall-clock timing.

use crate::comm::Communicator;
use crate::error::DimmError;
use std::time::Instant;

/// Wall-clock timer whose `stop` max-reduces across the transport group,
/// so the reported time is bounded by the slowest rank.
pub struct GroupTimer<'c, C: Communicator> {
    comm: &'c C,
    begin: Instant,
}

impl<'c, C: Communicator> GroupTimer<'c, C> {
    /// Create a timer; the clock starts immediately.
    pub fn new(comm: &'c C) -> Self {
        Self {
            comm,
            begin: Instant::now(),
        }
    }

    /// Restart the clock.
    pub fn start(&mut self) {
        self.begin = Instant::now();
    }

    /// Milliseconds since `start`, max-reduced over all ranks.
    pub fn stop(&self, tag: u16) -> Result<f64, DimmError> {
        let elapsed = self.begin.elapsed().as_secs_f64() * 1.0e3;
        self.comm.reduce_max_f64(tag, elapsed)
    }
}
