//! Resource budget and usage tracker.
//!
//! Five independently bounded dimensions: tokens, cost, tool calls, wall
//! time, turns. A zero limit means that dimension is unbounded. The first
//! dimension to reach its limit terminates the run with a reason string.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Immutable resource limits for one session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Budget {
    /// Total tokens (input + output) across all turns. 0 = unbounded.
    pub max_tokens: u64,
    /// Maximum spend in USD. 0 = unbounded.
    pub max_cost_usd: f64,
    /// Maximum tool executions. 0 = unbounded.
    pub max_tool_calls: u32,
    /// Wall clock limit. Zero = unbounded.
    pub max_duration: Duration,
    /// Maximum provider calls (each tool round = one turn). 0 = unbounded.
    pub max_turns: u32,
}

impl Default for Budget {
    /// Conservative defaults.
    fn default() -> Self {
        Self {
            max_tokens: 500_000,
            max_cost_usd: 2.0,
            max_tool_calls: 200,
            max_duration: Duration::from_secs(30 * 60),
            max_turns: 50,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    tokens: u64,
    cost_usd: f64,
    tool_calls: u32,
    turns: u32,
}

/// Mutable usage accumulator checked before every turn.
#[derive(Debug)]
pub struct BudgetTracker {
    budget: Budget,
    counters: Mutex<Counters>,
    started_at: Instant,
}

impl BudgetTracker {
    /// Create a tracker; the wall clock starts now.
    #[must_use]
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            counters: Mutex::new(Counters::default()),
            started_at: Instant::now(),
        }
    }

    /// Add usage from one completed turn.
    pub fn record(
        &self,
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: f64,
        tool_calls_this_turn: u32,
    ) {
        let mut c = self.counters.lock().expect("budget mutex poisoned");
        c.tokens += input_tokens + output_tokens;
        c.cost_usd += cost_usd;
        c.tool_calls += tool_calls_this_turn;
        c.turns += 1;
    }

    /// The first exhausted dimension's reason, or `None` while within limits.
    #[must_use]
    pub fn exceeded(&self) -> Option<String> {
        let c = self.counters.lock().expect("budget mutex poisoned");
        let b = &self.budget;

        if b.max_tokens > 0 && c.tokens >= b.max_tokens {
            return Some(format!("token limit reached ({}/{})", c.tokens, b.max_tokens));
        }
        if b.max_cost_usd > 0.0 && c.cost_usd >= b.max_cost_usd {
            return Some(format!(
                "cost limit reached (${:.4}/${:.2})",
                c.cost_usd, b.max_cost_usd
            ));
        }
        if b.max_tool_calls > 0 && c.tool_calls >= b.max_tool_calls {
            return Some(format!(
                "tool call limit reached ({}/{})",
                c.tool_calls, b.max_tool_calls
            ));
        }
        if !b.max_duration.is_zero() && self.started_at.elapsed() >= b.max_duration {
            return Some(format!(
                "duration limit reached ({}/{})",
                format_duration(self.started_at.elapsed()),
                format_duration(b.max_duration)
            ));
        }
        if b.max_turns > 0 && c.turns >= b.max_turns {
            return Some(format!("turn limit reached ({}/{})", c.turns, b.max_turns));
        }
        None
    }

    /// Human-readable usage line, emitted with the terminal `done` event.
    #[must_use]
    pub fn summary(&self) -> String {
        let c = self.counters.lock().expect("budget mutex poisoned");
        format!(
            "Tokens: {} | Cost: ${:.4} | Tool calls: {} | Turns: {} | Duration: {}",
            c.tokens,
            c.cost_usd,
            c.tool_calls,
            c.turns,
            format_duration(self.started_at.elapsed())
        )
    }

    /// Accumulated cost in USD.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.counters.lock().expect("budget mutex poisoned").cost_usd
    }
}

/// Render a duration rounded to whole seconds: `45s`, `30m0s`, `1h0m0s`.
/// Once a unit is printed, every smaller unit is printed too.
fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs() + u64::from(d.subsec_millis() >= 500);
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn unbounded() -> Budget {
        Budget {
            max_tokens: 0,
            max_cost_usd: 0.0,
            max_tool_calls: 0,
            max_duration: Duration::ZERO,
            max_turns: 0,
        }
    }

    #[test]
    fn defaults_match_policy() {
        let b = Budget::default();
        assert_eq!(b.max_tokens, 500_000);
        assert!((b.max_cost_usd - 2.0).abs() < f64::EPSILON);
        assert_eq!(b.max_tool_calls, 200);
        assert_eq!(b.max_duration, Duration::from_secs(1800));
        assert_eq!(b.max_turns, 50);
    }

    #[test]
    fn within_limits_not_exceeded() {
        let t = BudgetTracker::new(Budget::default());
        t.record(1000, 500, 0.01, 3);
        assert_eq!(t.exceeded(), None);
    }

    #[test]
    fn record_is_additive() {
        let t = BudgetTracker::new(unbounded());
        t.record(100, 50, 0.25, 2);
        t.record(200, 100, 0.50, 3);
        assert!((t.total_cost() - 0.75).abs() < 1e-9);
        let summary = t.summary();
        assert!(summary.contains("Tokens: 450"));
        assert!(summary.contains("Tool calls: 5"));
        assert!(summary.contains("Turns: 2"));
    }

    #[test]
    fn token_limit_triggers_at_boundary() {
        let t = BudgetTracker::new(Budget {
            max_tokens: 1000,
            ..unbounded()
        });
        t.record(600, 399, 0.0, 0);
        assert_eq!(t.exceeded(), None);
        t.record(1, 0, 0.0, 0);
        let reason = t.exceeded().unwrap();
        assert_eq!(reason, "token limit reached (1000/1000)");
    }

    #[test]
    fn cost_limit_reason_format() {
        let t = BudgetTracker::new(Budget {
            max_cost_usd: 2.0,
            ..unbounded()
        });
        t.record(0, 0, 2.5, 0);
        assert_eq!(t.exceeded().unwrap(), "cost limit reached ($2.5000/$2.00)");
    }

    #[test]
    fn tool_call_limit() {
        let t = BudgetTracker::new(Budget {
            max_tool_calls: 5,
            ..unbounded()
        });
        t.record(0, 0, 0.0, 5);
        assert_eq!(t.exceeded().unwrap(), "tool call limit reached (5/5)");
    }

    #[test]
    fn turn_limit() {
        let t = BudgetTracker::new(Budget {
            max_turns: 2,
            ..unbounded()
        });
        t.record(0, 0, 0.0, 1);
        assert_eq!(t.exceeded(), None);
        t.record(0, 0, 0.0, 1);
        assert_eq!(t.exceeded().unwrap(), "turn limit reached (2/2)");
    }

    #[test]
    fn duration_limit() {
        let t = BudgetTracker::new(Budget {
            max_duration: Duration::from_nanos(1),
            ..unbounded()
        });
        std::thread::sleep(Duration::from_millis(2));
        assert!(t.exceeded().unwrap().contains("duration limit reached"));
    }

    #[test]
    fn duration_reason_uses_compound_units() {
        let t = BudgetTracker::new(Budget {
            max_duration: Duration::from_secs(30 * 60),
            ..unbounded()
        });
        // Not yet exceeded, but the limit side of the reason is what the
        // default budget would print.
        assert_eq!(t.exceeded(), None);
        assert_eq!(format_duration(Duration::from_secs(30 * 60)), "30m0s");
    }

    #[test]
    fn format_duration_matches_second_rounding() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h0m0s");
        assert_eq!(format_duration(Duration::from_secs(3600 + 72)), "1h1m12s");
        // Sub-second rounding, nearest whole second.
        assert_eq!(format_duration(Duration::from_millis(499)), "0s");
        assert_eq!(format_duration(Duration::from_millis(500)), "1s");
    }

    #[test]
    fn zero_limits_never_trigger() {
        let t = BudgetTracker::new(unbounded());
        t.record(10_000_000, 10_000_000, 9999.0, 10_000);
        for _ in 0..100 {
            t.record(0, 0, 0.0, 0);
        }
        assert_eq!(t.exceeded(), None);
    }

    #[test]
    fn first_exhausted_dimension_wins() {
        // Both tokens and turns exhausted; tokens is checked first.
        let t = BudgetTracker::new(Budget {
            max_tokens: 10,
            max_turns: 1,
            ..unbounded()
        });
        t.record(10, 0, 0.0, 0);
        assert!(t.exceeded().unwrap().starts_with("token limit"));
    }
}
