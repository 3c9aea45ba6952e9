//! Token usage accounting against a model's context budget.

use palaver_common::TokenBudget;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assembler::Payload;
use crate::{EngineError, TokenUsage};

/// Characters per token used when no tuned value is configured.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

/// Usage exactly as the provider reported it, before validation.
///
/// Kept signed so a broken provider report is caught instead of wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub input_tokens: i64,
    pub output_tokens: i64,
}

impl UsageReport {
    pub fn new(input_tokens: i64, output_tokens: i64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }
}

/// Outcome of the soft pre-flight check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preflight {
    Fits,
    /// Fits, but uses more of the remaining budget than the warning ratio.
    NearLimit,
    Exceeds,
}

/// Tracks cumulative usage for one session.
///
/// `remaining()` is always derived from the budget and the confirmed
/// cumulative count; nothing is deducted before the provider reports usage.
/// Every pre-flight estimate for the session goes through [`estimate`](Self::estimate).
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAccountant {
    budget: TokenBudget,
    cumulative_tokens: u64,
    chars_per_token: f64,
}

impl TokenAccountant {
    pub fn new(budget: TokenBudget) -> Self {
        Self::with_cumulative(budget, 0)
    }

    pub(crate) fn with_cumulative(budget: TokenBudget, cumulative_tokens: u64) -> Self {
        Self {
            budget,
            cumulative_tokens,
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
        }
    }

    /// Approximate token count of a payload.
    pub fn estimate(&self, payload: &Payload) -> u64 {
        estimate_tokens(payload.char_count(), self.chars_per_token)
    }

    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }

    /// Tune the estimator. Ratios that are not positive and finite fall back
    /// to [`DEFAULT_CHARS_PER_TOKEN`].
    pub fn set_chars_per_token(&mut self, chars_per_token: f64) {
        self.chars_per_token = if chars_per_token.is_finite() && chars_per_token > 0.0 {
            chars_per_token
        } else {
            warn!(chars_per_token, "invalid chars per token, using default");
            DEFAULT_CHARS_PER_TOKEN
        };
    }

    /// Soft check of an estimate against the remaining budget. Never blocks.
    pub fn preflight(&self, estimated: u64, warning_ratio: f64) -> Preflight {
        let remaining = self.remaining();
        if estimated > remaining {
            Preflight::Exceeds
        } else if (estimated as f64) > (remaining as f64) * warning_ratio {
            Preflight::NearLimit
        } else {
            Preflight::Fits
        }
    }

    /// Apply provider-confirmed usage of a completed turn.
    ///
    /// Negative counts are a provider protocol violation and are rejected
    /// without touching the cumulative total.
    pub fn record(&mut self, report: UsageReport) -> Result<TokenUsage, EngineError> {
        let usage = validate_report(report)?;
        self.cumulative_tokens = self
            .cumulative_tokens
            .checked_add(usage.total_tokens())
            .ok_or_else(|| {
                EngineError::UsageViolation(format!(
                    "cumulative total overflows after adding {}",
                    usage.total_tokens()
                ))
            })?;
        debug!(
            input = usage.input_tokens,
            output = usage.output_tokens,
            cumulative = self.cumulative_tokens,
            remaining = self.remaining(),
            "usage recorded"
        );
        Ok(usage)
    }

    /// Move the cumulative count to a provider-reported running total.
    pub fn advance_to(&mut self, reported_cumulative: u64) -> Result<(), EngineError> {
        if reported_cumulative < self.cumulative_tokens {
            warn!(
                previous = self.cumulative_tokens,
                reported = reported_cumulative,
                "cumulative usage went backwards"
            );
            return Err(EngineError::UsageViolation(format!(
                "cumulative usage decreased from {} to {reported_cumulative}",
                self.cumulative_tokens
            )));
        }
        self.cumulative_tokens = reported_cumulative;
        Ok(())
    }

    pub fn remaining(&self) -> u64 {
        self.budget
            .max_context_tokens
            .saturating_sub(self.cumulative_tokens)
    }

    pub fn cumulative_tokens(&self) -> u64 {
        self.cumulative_tokens
    }

    pub fn budget(&self) -> TokenBudget {
        self.budget
    }

    pub(crate) fn set_budget(&mut self, budget: TokenBudget) {
        self.budget = budget;
    }

    /// Input and output of one turn as percentages of the model's limits.
    pub fn usage_share(&self, usage: &TokenUsage) -> (f64, f64) {
        (
            percent(usage.input_tokens, self.budget.max_context_tokens),
            percent(usage.output_tokens, self.budget.max_output_tokens),
        )
    }
}

fn estimate_tokens(chars: usize, chars_per_token: f64) -> u64 {
    (chars as f64 / chars_per_token).ceil() as u64
}

fn validate_report(report: UsageReport) -> Result<TokenUsage, EngineError> {
    if report.input_tokens < 0 || report.output_tokens < 0 {
        warn!(
            input = report.input_tokens,
            output = report.output_tokens,
            "provider reported negative usage"
        );
        return Err(EngineError::UsageViolation(format!(
            "negative usage reported (input {}, output {})",
            report.input_tokens, report.output_tokens
        )));
    }
    Ok(TokenUsage {
        input_tokens: report.input_tokens as u64,
        output_tokens: report.output_tokens as u64,
    })
}

fn percent(value: u64, limit: u64) -> f64 {
    if limit == 0 {
        0.0
    } else {
        value as f64 / limit as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accountant() -> TokenAccountant {
        TokenAccountant::new(TokenBudget::new(1_000, 100))
    }

    #[test]
    fn remaining_tracks_every_record() {
        let mut acc = accountant();
        assert_eq!(acc.remaining(), 1_000);
        for (input, output) in [(10, 2), (100, 50), (0, 0), (300, 38)] {
            acc.record(UsageReport::new(input, output)).unwrap();
            assert_eq!(
                acc.remaining(),
                acc.budget().max_context_tokens - acc.cumulative_tokens()
            );
        }
        assert_eq!(acc.cumulative_tokens(), 500);
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let mut acc = accountant();
        acc.record(UsageReport::new(900, 200)).unwrap();
        assert_eq!(acc.cumulative_tokens(), 1_100);
        assert_eq!(acc.remaining(), 0);
    }

    #[test]
    fn negative_usage_is_rejected() {
        let mut acc = accountant();
        acc.record(UsageReport::new(5, 5)).unwrap();
        let err = acc.record(UsageReport::new(-3, 1)).unwrap_err();
        assert!(matches!(err, EngineError::UsageViolation(_)));
        assert_eq!(acc.cumulative_tokens(), 10);
    }

    #[test]
    fn decreasing_cumulative_is_rejected() {
        let mut acc = accountant();
        acc.advance_to(40).unwrap();
        acc.advance_to(40).unwrap();
        let err = acc.advance_to(39).unwrap_err();
        assert!(matches!(err, EngineError::UsageViolation(_)));
        assert_eq!(acc.cumulative_tokens(), 40);
        assert_eq!(acc.remaining(), 960);
    }

    #[test]
    fn overflow_is_a_violation() {
        let mut acc = TokenAccountant::with_cumulative(TokenBudget::new(10, 10), u64::MAX - 1);
        let err = acc.record(UsageReport::new(1, 1)).unwrap_err();
        assert!(matches!(err, EngineError::UsageViolation(_)));
        assert_eq!(acc.cumulative_tokens(), u64::MAX - 1);
    }

    #[test]
    fn preflight_levels() {
        let mut acc = accountant();
        acc.record(UsageReport::new(500, 0)).unwrap();
        assert_eq!(acc.preflight(100, 0.9), Preflight::Fits);
        assert_eq!(acc.preflight(460, 0.9), Preflight::NearLimit);
        assert_eq!(acc.preflight(501, 0.9), Preflight::Exceeds);
    }

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(0, 4.0), 0);
        assert_eq!(estimate_tokens(1, 4.0), 1);
        assert_eq!(estimate_tokens(8, 4.0), 2);
        assert_eq!(estimate_tokens(9, 4.0), 3);
    }

    #[test]
    fn estimate_covers_rendered_payload() {
        let session = crate::Session::new("m", TokenBudget::new(1_000, 100))
            .with_system_role("abcd");
        let payload = crate::ContextAssembler::default()
            .assemble(&session, &[crate::ContentPart::text("efgh")])
            .unwrap();
        // "[system]\nabcd\n\n[user]\nefgh" is 26 chars.
        assert_eq!(payload.char_count(), 26);
        assert_eq!(accountant().estimate(&payload), 7);
    }

    #[test]
    fn estimate_follows_configured_ratio() {
        let session = crate::Session::new("m", TokenBudget::new(1_000, 100))
            .with_system_role("abcd");
        let payload = crate::ContextAssembler::default()
            .assemble(&session, &[crate::ContentPart::text("efgh")])
            .unwrap();

        let mut acc = accountant();
        acc.set_chars_per_token(2.0);
        assert_eq!(acc.estimate(&payload), 13);
        acc.set_chars_per_token(0.0);
        assert_eq!(acc.chars_per_token(), DEFAULT_CHARS_PER_TOKEN);
        acc.set_chars_per_token(f64::NAN);
        assert_eq!(acc.estimate(&payload), 7);
    }

    #[test]
    fn usage_share_against_limits() {
        let acc = accountant();
        let (input, output) = acc.usage_share(&TokenUsage {
            input_tokens: 250,
            output_tokens: 50,
        });
        assert_eq!(input, 25.0);
        assert_eq!(output, 50.0);
    }
}
