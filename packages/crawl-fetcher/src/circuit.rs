//! Per-host circuit breaker: after `F` consecutive
//! failures within window `T`, trip open for `cool_off`; half-open
//! admits one probe; one success closes it. No existing crate in this
//! workspace's stack covers this, so it's hand-rolled as a small
//! mutex-guarded state machine per host, the same granularity as the
//! per-host token bucket next to it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct HostCircuit {
    state: State,
    consecutive_failures: u32,
    first_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
    /// true while a half-open probe is in flight, so only one probe is
    /// ever admitted at a time.
    probe_in_flight: bool,
}

impl Default for HostCircuit {
    fn default() -> Self {
        Self {
            state: State::Closed,
            consecutive_failures: 0,
            first_failure_at: None,
            opened_at: None,
            probe_in_flight: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// This admitted call is the half-open probe; the caller MUST
    /// report its outcome via `record_probe_result`.
    Probe,
    Rejected,
}

pub struct CircuitBreaker {
    fail_threshold: u32,
    failure_window: Duration,
    cool_off: Duration,
    hosts: Mutex<HashMap<String, HostCircuit>>,
}

impl CircuitBreaker {
    pub fn new(fail_threshold: u32, failure_window: Duration, cool_off: Duration) -> Self {
        Self {
            fail_threshold: fail_threshold.max(1),
            failure_window,
            cool_off,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    pub async fn admit(&self, host: &str) -> Admission {
        let mut hosts = self.hosts.lock().await;
        let circuit = hosts.entry(host.to_string()).or_default();

        match circuit.state {
            State::Closed => Admission::Allowed,
            State::Open => {
                let elapsed = circuit.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.cool_off && !circuit.probe_in_flight {
                    circuit.state = State::HalfOpen;
                    circuit.probe_in_flight = true;
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
            State::HalfOpen => {
                if circuit.probe_in_flight {
                    Admission::Rejected
                } else {
                    circuit.probe_in_flight = true;
                    Admission::Probe
                }
            }
        }
    }

    pub async fn record_success(&self, host: &str) {
        let mut hosts = self.hosts.lock().await;
        let circuit = hosts.entry(host.to_string()).or_default();
        circuit.state = State::Closed;
        circuit.consecutive_failures = 0;
        circuit.first_failure_at = None;
        circuit.opened_at = None;
        circuit.probe_in_flight = false;
    }

    pub async fn record_failure(&self, host: &str) {
        let mut hosts = self.hosts.lock().await;
        let circuit = hosts.entry(host.to_string()).or_default();

        if circuit.state == State::HalfOpen {
            // Probe failed: back to open for another full cool-off.
            circuit.state = State::Open;
            circuit.opened_at = Some(Instant::now());
            circuit.probe_in_flight = false;
            return;
        }

        let now = Instant::now();
        let within_window = circuit
            .first_failure_at
            .map(|t| now.duration_since(t) <= self.failure_window)
            .unwrap_or(false);

        if within_window {
            circuit.consecutive_failures += 1;
        } else {
            circuit.consecutive_failures = 1;
            circuit.first_failure_at = Some(now);
        }

        if circuit.consecutive_failures >= self.fail_threshold {
            circuit.state = State::Open;
            circuit.opened_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trips_open_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60), Duration::from_secs(30));
        assert_eq!(breaker.admit("h").await, Admission::Allowed);
        breaker.record_failure("h").await;
        assert_eq!(breaker.admit("h").await, Admission::Allowed);
        breaker.record_failure("h").await;
        breaker.record_failure("h").await;
        assert_eq!(breaker.admit("h").await, Admission::Rejected);
    }

    #[tokio::test]
    async fn success_closes_circuit() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60), Duration::from_secs(30));
        breaker.record_failure("h").await;
        assert_eq!(breaker.admit("h").await, Admission::Rejected);
        // Can't probe yet (cool_off not elapsed); force success directly.
        breaker.record_success("h").await;
        assert_eq!(breaker.admit("h").await, Admission::Allowed);
    }

    #[tokio::test]
    async fn different_hosts_are_independent() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60), Duration::from_secs(30));
        breaker.record_failure("a").await;
        assert_eq!(breaker.admit("a").await, Admission::Rejected);
        assert_eq!(breaker.admit("b").await, Admission::Allowed);
    }
}
