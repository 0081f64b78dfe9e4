use std::time::Duration;

/// Budget for confirming a payment with the backend.
///
/// The timeout is attempt based: a slow backend stretches the wall-clock wait
/// beyond `max_attempts * interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 15;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_INTERVAL)
    }
}

/// What a single status check returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Paid,
    NotPaid,
    /// The check itself failed. Counted exactly like `NotPaid`.
    Unreachable,
}

/// Client-side view of a payment being confirmed by the backend.
///
/// `Polling(n)` holds the number of checks already spent without seeing the
/// paid flag. `Confirmed` and `TimedOut` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationState {
    Polling(u32),
    Confirmed,
    TimedOut,
}

impl ReconciliationState {
    pub const fn start() -> Self {
        ReconciliationState::Polling(0)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReconciliationState::Polling(_))
    }

    /// Applies one status check.
    pub fn advance(self, observation: Observation, policy: &PollPolicy) -> Self {
        match self {
            ReconciliationState::Polling(spent) => match observation {
                Observation::Paid => ReconciliationState::Confirmed,
                Observation::NotPaid | Observation::Unreachable => {
                    let spent = spent + 1;
                    if spent >= policy.max_attempts {
                        ReconciliationState::TimedOut
                    } else {
                        ReconciliationState::Polling(spent)
                    }
                }
            },
            terminal => terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(observations: &[Observation], policy: &PollPolicy) -> (ReconciliationState, usize) {
        let mut state = ReconciliationState::start();
        let mut ticks = 0;
        for obs in observations {
            if state.is_terminal() {
                break;
            }
            state = state.advance(*obs, policy);
            ticks += 1;
        }
        (state, ticks)
    }

    #[test]
    fn test_never_paid_times_out_after_budget() {
        let policy = PollPolicy::default();
        let (state, ticks) = run(&[Observation::NotPaid; 20], &policy);
        assert_eq!(state, ReconciliationState::TimedOut);
        assert_eq!(ticks, 15);
    }

    #[test]
    fn test_paid_on_tick_k_confirms_at_k() {
        let policy = PollPolicy::default();
        for k in 1..=15 {
            let mut observations = vec![Observation::NotPaid; k - 1];
            observations.push(Observation::Paid);
            let (state, ticks) = run(&observations, &policy);
            assert_eq!(state, ReconciliationState::Confirmed, "k = {k}");
            assert_eq!(ticks, k);
        }
    }

    #[test]
    fn test_transport_errors_consume_budget() {
        let policy = PollPolicy::new(3, Duration::from_millis(10));
        let state = ReconciliationState::start()
            .advance(Observation::Unreachable, &policy)
            .advance(Observation::NotPaid, &policy);
        assert_eq!(state, ReconciliationState::Polling(2));
        assert_eq!(
            state.advance(Observation::Unreachable, &policy),
            ReconciliationState::TimedOut
        );
    }

    #[test]
    fn test_terminal_states_absorb() {
        let policy = PollPolicy::default();
        assert_eq!(
            ReconciliationState::Confirmed.advance(Observation::NotPaid, &policy),
            ReconciliationState::Confirmed
        );
        assert_eq!(
            ReconciliationState::TimedOut.advance(Observation::Paid, &policy),
            ReconciliationState::TimedOut
        );
    }
}
