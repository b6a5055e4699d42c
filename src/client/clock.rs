//! Sample-based server-clock offset estimator.
//!
//! Every response carrying a server timestamp yields one offset sample
//! measured against the local request midpoint. Samples taken at a new
//! best RTT are trusted more (60/40 blend toward the old estimate) than
//! steady-state samples (85/15), which biases the estimate toward the
//! most accurate midpoints without needing NTP.

/// Percent of the previous estimate kept when the sample set a new best RTT.
pub const BEST_RTT_KEEP_PERCENT: i64 = 60;

/// Percent of the previous estimate kept for ordinary samples.
pub const STEADY_KEEP_PERCENT: i64 = 85;

#[derive(Debug, Clone)]
pub struct ClockSync {
    offset_ms: i64,
    best_rtt_ms: i64,
    synced: bool,
    best_rtt_keep_percent: i64,
    steady_keep_percent: i64,
}

impl Default for ClockSync {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSync {
    pub fn new() -> Self {
        Self::with_weights(BEST_RTT_KEEP_PERCENT, STEADY_KEEP_PERCENT)
    }

    pub fn with_weights(best_rtt_keep_percent: i64, steady_keep_percent: i64) -> Self {
        Self {
            offset_ms: 0,
            best_rtt_ms: i64::MAX,
            synced: false,
            best_rtt_keep_percent,
            steady_keep_percent,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    /// Feed one sample: the server timestamp from a response plus the local
    /// send and receive times of the carrying request.
    pub fn observe(&mut self, server_timestamp_ms: i64, request_start_ms: i64, response_recv_ms: i64) {
        if server_timestamp_ms <= 0 || response_recv_ms < request_start_ms {
            return;
        }
        let rtt_ms = response_recv_ms - request_start_ms;
        let midpoint_ms = request_start_ms + rtt_ms / 2;
        let sample_offset_ms = server_timestamp_ms - midpoint_ms;

        if !self.synced {
            self.offset_ms = sample_offset_ms;
            self.best_rtt_ms = rtt_ms;
            self.synced = true;
            return;
        }

        if rtt_ms < self.best_rtt_ms {
            self.best_rtt_ms = rtt_ms;
            self.offset_ms = (self.offset_ms * self.best_rtt_keep_percent
                + sample_offset_ms * (100 - self.best_rtt_keep_percent))
                / 100;
        } else {
            self.offset_ms = (self.offset_ms * self.steady_keep_percent
                + sample_offset_ms * (100 - self.steady_keep_percent))
                / 100;
        }
    }

    pub fn estimated_server_now(&self, local_now_ms: i64) -> i64 {
        if self.synced {
            local_now_ms + self.offset_ms
        } else {
            local_now_ms
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn first_sample_is_adopted() {
        let mut clock = ClockSync::new();
        assert!(!clock.is_synced());
        assert_eq!(clock.estimated_server_now(1000), 1000);
        // Server is 500ms ahead, 100ms symmetric RTT.
        clock.observe(1550, 1000, 1100);
        assert!(clock.is_synced());
        assert_eq!(clock.offset_ms(), 500);
        assert_eq!(clock.estimated_server_now(2000), 2500);
    }

    #[test]
    fn invalid_samples_are_ignored() {
        let mut clock = ClockSync::new();
        clock.observe(0, 1000, 1100);
        clock.observe(1500, 1100, 1000);
        assert!(!clock.is_synced());
    }

    #[test]
    fn best_rtt_samples_pull_harder() {
        let mut clock = ClockSync::new();
        clock.observe(2000, 1000, 1200); // offset 900, rtt 200
        // New best RTT with a very different offset: 60/40 blend.
        clock.observe(10_050, 10_000, 10_100); // sample offset 0, rtt 100
        assert_eq!(clock.offset_ms(), 900 * 60 / 100);
        let blended = clock.offset_ms();
        // Worse RTT sample with offset 0: only 15 percent weight.
        clock.observe(20_150, 20_000, 20_300);
        assert_eq!(clock.offset_ms(), blended * 85 / 100);
    }

    #[test]
    fn zero_true_offset_converges_under_symmetric_rtt_noise() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut clock = ClockSync::new();
        let mut local = 1_000_000i64;
        let max_rtt = 240;
        for _ in 0..200 {
            let rtt = rng.gen_range(20..=max_rtt);
            // Zero true offset: the server stamps exactly the midpoint.
            let server_ts = local + rtt / 2;
            clock.observe(server_ts, local, local + rtt);
            local += 1000;
        }
        assert!(clock.offset_ms().abs() <= max_rtt / 2);
    }
}
