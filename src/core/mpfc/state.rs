// src/core/mpfc/state.rs

//! The pure, allocation-free computation at the heart of the controller: the
//! running `(sum, count)` aggregate, the per-tick target recomputation, and the
//! per-report immediate reply. Kept free of I/O and channel plumbing so it can be
//! unit- and property-tested in isolation from the actor that drives it.

use super::MpfcConfig;

/// Per-queue bookkeeping: the last duration the queue reported, and the last
/// target this controller sent it. Both are non-negative or `f64::INFINITY`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessEntry {
    pub reported: f64,
    pub sent: f64,
}

impl ProcessEntry {
    pub fn new() -> Self {
        Self {
            reported: f64::INFINITY,
            sent: f64::INFINITY,
        }
    }
}

impl Default for ProcessEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// The controller's running aggregate and last-computed target.
#[derive(Debug, Clone, Copy)]
pub struct ControllerState {
    pub sum: f64,
    pub count: u64,
    pub memory_limit_bytes: u64,
    pub desired_duration: f64,
}

fn zero_clamp(sum: f64, epsilon: f64) -> f64 {
    if sum.abs() < epsilon { 0.0 } else { sum }
}

impl ControllerState {
    /// `memory_limit_bytes` is the already-scaled working budget
    /// (`raw_limit * MEM_SCALE`), fixed for the lifetime of this controller.
    pub fn new(memory_limit_bytes: u64) -> Self {
        Self {
            sum: 0.0,
            count: 0,
            memory_limit_bytes,
            desired_duration: f64::INFINITY,
        }
    }

    /// Applies the `(prev_reported, new_reported)` transition to `(sum, count)`,
    /// per the four cases in the controller's contract.
    pub fn apply_report_transition(&mut self, prev_reported: f64, new_reported: f64, cfg: &MpfcConfig) {
        match (prev_reported.is_infinite(), new_reported.is_infinite()) {
            (true, true) => {}
            (true, false) => {
                self.sum += new_reported;
                self.count += 1;
            }
            (false, true) => {
                self.sum -= prev_reported;
                self.count = self.count.saturating_sub(1);
            }
            (false, false) => {
                self.sum += new_reported - prev_reported;
            }
        }
        self.sum = zero_clamp(self.sum, cfg.epsilon);
    }

    /// Removes an entry's contribution to `(sum, count)` on deregistration.
    pub fn remove_entry(&mut self, reported: f64, cfg: &MpfcConfig) {
        if reported.is_finite() {
            self.sum = zero_clamp(self.sum - reported, cfg.epsilon);
            self.count = self.count.saturating_sub(1);
        }
    }

    /// The immediate reply to a `report_queue_duration` call: suppresses flapping
    /// queues that briefly dip below the oscillation floor right after being told
    /// "no pressure".
    pub fn immediate_reply(&self, prev_sent: f64, new_reported: f64, cfg: &MpfcConfig) -> f64 {
        if new_reported.is_finite() && prev_sent.is_infinite() && new_reported < cfg.osc_guard {
            f64::INFINITY
        } else {
            self.desired_duration
        }
    }

    /// Recomputes the target duration from the current memory ratio. Does not
    /// decide push-back; callers compare the result against `self.desired_duration`
    /// before replacing it.
    pub fn compute_target(&self, current_used_bytes: u64, cfg: &MpfcConfig) -> f64 {
        let ratio = current_used_bytes as f64 / self.memory_limit_bytes.max(1) as f64;
        if ratio < cfg.limit_threshold || self.count == 0 {
            return f64::INFINITY;
        }
        let sum_adjusted = if ratio < cfg.sum_inc_threshold {
            self.sum + cfg.sum_inc_amount
        } else {
            self.sum
        };
        (sum_adjusted / self.count as f64) / ratio
    }

    /// Whether a tick-triggered recomputation should proceed to push at all: only
    /// when the new target is a strict decrease in pressure tolerance (or the
    /// first-ever finite target after starting at infinity).
    pub fn should_recompute_push(&self, next_desired: f64) -> bool {
        if next_desired.is_infinite() {
            return false;
        }
        self.desired_duration.is_infinite() || next_desired < self.desired_duration
    }
}

/// Whether a specific queue should receive the newly computed target, given its
/// own last-reported and last-sent values.
pub fn should_push(entry: ProcessEntry, next_desired: f64, cfg: &MpfcConfig) -> bool {
    match (entry.reported.is_infinite(), entry.sent.is_infinite()) {
        (true, true) => true,
        (true, false) => next_desired < entry.sent,
        (false, true) => next_desired < entry.reported && entry.reported >= cfg.osc_guard,
        (false, false) => next_desired < entry.reported.min(entry.sent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cfg() -> MpfcConfig {
        MpfcConfig::default()
    }

    #[test]
    fn transition_inf_to_finite_increments_sum_and_count() {
        let mut s = ControllerState::new(1000);
        s.apply_report_transition(f64::INFINITY, 6.0, &cfg());
        assert_eq!(s.sum, 6.0);
        assert_eq!(s.count, 1);
    }

    #[test]
    fn transition_finite_to_inf_decrements_sum_and_count() {
        let mut s = ControllerState::new(1000);
        s.apply_report_transition(f64::INFINITY, 6.0, &cfg());
        s.apply_report_transition(6.0, f64::INFINITY, &cfg());
        assert_eq!(s.sum, 0.0);
        assert_eq!(s.count, 0);
    }

    #[test]
    fn transition_finite_to_finite_adjusts_delta() {
        let mut s = ControllerState::new(1000);
        s.apply_report_transition(f64::INFINITY, 6.0, &cfg());
        s.apply_report_transition(6.0, 4.0, &cfg());
        assert_eq!(s.sum, 4.0);
        assert_eq!(s.count, 1);
    }

    #[test]
    fn sum_near_zero_clamps_to_exactly_zero() {
        let mut s = ControllerState::new(1000);
        s.apply_report_transition(f64::INFINITY, 1e-9, &cfg());
        assert_eq!(s.sum, 0.0);
    }

    #[test]
    fn below_limit_threshold_target_is_infinite() {
        let s = ControllerState {
            sum: 100.0,
            count: 3,
            memory_limit_bytes: 1000,
            desired_duration: f64::INFINITY,
        };
        let target = s.compute_target(400, &cfg()); // ratio = 0.4 < 0.5
        assert!(target.is_infinite());
    }

    #[test]
    fn zero_count_target_is_infinite() {
        let s = ControllerState::new(1000);
        let target = s.compute_target(900, &cfg());
        assert!(target.is_infinite());
    }

    #[test]
    fn mid_pressure_matches_formula_with_inflation() {
        let s = ControllerState {
            sum: 18.0,
            count: 3,
            memory_limit_bytes: 1000,
            desired_duration: f64::INFINITY,
        };
        // ratio = 0.8, within [0.5, 0.95) -> sum inflated by 1.0
        let target = s.compute_target(800, &cfg());
        let expected = (18.0 + 1.0) / 3.0 / 0.8;
        assert!((target - expected).abs() < 1e-9);
    }

    #[test]
    fn high_pressure_no_inflation() {
        let s = ControllerState {
            sum: 18.0,
            count: 3,
            memory_limit_bytes: 1000,
            desired_duration: f64::INFINITY,
        };
        // ratio = 0.97 >= sum_inc_threshold -> no inflation
        let target = s.compute_target(970, &cfg());
        let expected = 18.0 / 3.0 / 0.97;
        assert!((target - expected).abs() < 1e-9);
    }

    #[test]
    fn oscillation_guard_forces_infinite_reply() {
        let s = ControllerState {
            sum: 0.0,
            count: 0,
            memory_limit_bytes: 1000,
            desired_duration: 5.0,
        };
        let reply = s.immediate_reply(f64::INFINITY, 0.5, &cfg());
        assert!(reply.is_infinite());
    }

    #[test]
    fn no_guard_once_queue_already_has_a_finite_sent() {
        let s = ControllerState {
            sum: 0.0,
            count: 0,
            memory_limit_bytes: 1000,
            desired_duration: 5.0,
        };
        let reply = s.immediate_reply(3.0, 0.5, &cfg());
        assert_eq!(reply, 5.0);
    }

    #[test]
    fn push_decision_both_infinite_pushes() {
        let e = ProcessEntry {
            reported: f64::INFINITY,
            sent: f64::INFINITY,
        };
        assert!(should_push(e, 5.0, &cfg()));
    }

    #[test]
    fn push_decision_respects_previous_sent() {
        let e = ProcessEntry {
            reported: f64::INFINITY,
            sent: 4.0,
        };
        assert!(!should_push(e, 5.0, &cfg()));
        assert!(should_push(e, 3.0, &cfg()));
    }

    #[test]
    fn push_decision_respects_osc_guard_on_reported() {
        let e = ProcessEntry {
            reported: 0.5,
            sent: f64::INFINITY,
        };
        // reported below osc_guard -> never push even if target is lower
        assert!(!should_push(e, 0.1, &cfg()));
    }

    #[test]
    fn push_decision_finite_both_requires_strict_decrease() {
        let e = ProcessEntry {
            reported: 5.0,
            sent: 4.0,
        };
        assert!(should_push(e, 3.0, &cfg()));
        assert!(!should_push(e, 4.0, &cfg()));
    }

    #[test]
    fn recompute_push_gate_requires_decrease_or_first_finite() {
        let mut s = ControllerState::new(1000);
        assert!(s.should_recompute_push(5.0));
        s.desired_duration = 5.0;
        assert!(!s.should_recompute_push(6.0));
        assert!(s.should_recompute_push(4.0));
        assert!(!s.should_recompute_push(f64::INFINITY));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property 7: after replaying an arbitrary sequence of per-queue duration
        /// reports, `(sum, count)` match a direct recomputation from each queue's
        /// final reported value, modulo the epsilon clamp near zero.
        #[test]
        fn sum_and_count_match_direct_recomputation_after_arbitrary_reports(
            reports in prop::collection::vec(
                (0..4usize, prop::option::of(0.0f64..500.0)),
                0..64,
            ),
        ) {
            let cfg = MpfcConfig::default();
            let mut state = ControllerState::new(1_000_000);
            let mut last_reported = [f64::INFINITY; 4];

            for (queue, duration) in reports {
                let new_reported = duration.unwrap_or(f64::INFINITY);
                state.apply_report_transition(last_reported[queue], new_reported, &cfg);
                last_reported[queue] = new_reported;
            }

            let expected_sum: f64 = last_reported.iter().filter(|d| d.is_finite()).sum();
            let expected_count = last_reported.iter().filter(|d| d.is_finite()).count() as u64;

            prop_assert_eq!(state.count, expected_count);
            prop_assert!((state.sum - zero_clamp(expected_sum, cfg.epsilon)).abs() < 1e-6);
        }
    }
}
