//! Validation for the session and archive sections.

use std::fmt::Display;

use crate::schema::PalaverConfig;

/// Push an error unless `min <= value <= max`. NaN is always out of range.
fn check_range<T: PartialOrd + Display + Copy>(
    errors: &mut Vec<String>,
    name: &str,
    value: T,
    (min, max): (T, T),
) {
    if !(min..=max).contains(&value) {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

pub(crate) fn validate_session(errors: &mut Vec<String>, config: &PalaverConfig) {
    let session = &config.session;
    check_range(errors, "session.stream_buffer", session.stream_buffer, (1, 4096));
    check_range(errors, "session.chars_per_token", session.chars_per_token, (1.0, 16.0));
    check_range(
        errors,
        "session.budget_warning_ratio",
        session.budget_warning_ratio,
        (0.1, 1.0),
    );
}

pub(crate) fn validate_archive(errors: &mut Vec<String>, config: &PalaverConfig) {
    check_range(errors, "archive.min_exchanges", config.archive.min_exchanges, (1, 100));
}
