use std::time::Duration;

/// Ring buffer of recent tick durations for instrumentation.
#[derive(Debug)]
pub struct TickTimer {
    history: Vec<Duration>,
    index: usize,
    filled: bool,
}

impl TickTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: vec![Duration::ZERO; capacity.max(1)],
            index: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.index] = dt;
        self.index = (self.index + 1) % self.history.len();
        if self.index == 0 {
            self.filled = true;
        }
    }

    pub fn count(&self) -> usize {
        if self.filled {
            self.history.len()
        } else {
            self.index
        }
    }

    pub fn average(&self) -> Duration {
        match self.count() {
            0 => Duration::ZERO,
            n => self.recorded().iter().sum::<Duration>() / n as u32,
        }
    }

    pub fn max(&self) -> Duration {
        self.recorded().iter().copied().max().unwrap_or_default()
    }

    fn recorded(&self) -> &[Duration] {
        &self.history[..self.count()]
    }
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_average_and_max() {
        let mut t = TickTimer::new(3);
        t.record(Duration::from_millis(2));
        t.record(Duration::from_millis(4));
        assert_eq!(t.count(), 2);
        assert_eq!(t.average(), Duration::from_millis(3));
        assert_eq!(t.max(), Duration::from_millis(4));
    }

    #[test]
    fn wraps_around() {
        let mut t = TickTimer::new(2);
        t.record(Duration::from_millis(10));
        t.record(Duration::from_millis(20));
        t.record(Duration::from_millis(30));
        assert_eq!(t.count(), 2);
        assert_eq!(t.average(), Duration::from_millis(25));
    }
}
