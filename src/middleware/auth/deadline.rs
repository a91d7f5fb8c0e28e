//! Per-call deadline.
//!
//! A caller may shorten its own budget with `grpc-timeout` (`<1..8 digits><H|M|S|m|u|n>`).
//! The effective deadline is `now + min(grpc-timeout, call_timeout)`.
//! Values that do not parse are ignored and the server budget applies.

use std::time::Duration;

use axum::http::{HeaderMap, HeaderName};
use tokio::time::Instant;

pub const GRPC_TIMEOUT: HeaderName = HeaderName::from_static("grpc-timeout");

// Stand-in for "no deadline" when the budget does not fit in an Instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if !value.is_ascii() {
        return None;
    }
    let split = value.len().checked_sub(1)?;
    let (digits, unit) = value.split_at(split);
    if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    match unit {
        "H" => Some(Duration::from_secs(amount * 3600)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}

pub fn call_deadline(headers: &HeaderMap, call_timeout: Duration) -> Instant {
    let requested = headers
        .get(GRPC_TIMEOUT)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_grpc_timeout);

    let budget = match requested {
        Some(requested) => requested.min(call_timeout),
        None => call_timeout,
    };
    let now = Instant::now();
    now.checked_add(budget).unwrap_or_else(|| now + FAR_FUTURE)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn parses_every_unit() {
        assert_eq!(parse_grpc_timeout("2H"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_grpc_timeout("3M"), Some(Duration::from_secs(180)));
        assert_eq!(parse_grpc_timeout("10S"), Some(Duration::from_secs(10)));
        assert_eq!(parse_grpc_timeout("250m"), Some(Duration::from_millis(250)));
        assert_eq!(parse_grpc_timeout("99u"), Some(Duration::from_micros(99)));
        assert_eq!(parse_grpc_timeout("12345678n"), Some(Duration::from_nanos(12_345_678)));
    }

    #[test]
    fn rejects_malformed_values() {
        for bad in ["", "S", "10", "10s", "123456789S", "-1S", "1.5S", "１S"] {
            assert_eq!(parse_grpc_timeout(bad), None, "{bad}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn client_budget_only_shortens_the_call() {
        let call_timeout = Duration::from_secs(30);
        let now = Instant::now();

        let mut headers = HeaderMap::new();
        assert_eq!(call_deadline(&headers, call_timeout), now + call_timeout);

        headers.insert(GRPC_TIMEOUT, HeaderValue::from_static("500m"));
        assert_eq!(call_deadline(&headers, call_timeout), now + Duration::from_millis(500));

        headers.insert(GRPC_TIMEOUT, HeaderValue::from_static("1H"));
        assert_eq!(call_deadline(&headers, call_timeout), now + call_timeout);

        headers.insert(GRPC_TIMEOUT, HeaderValue::from_static("soon"));
        assert_eq!(call_deadline(&headers, call_timeout), now + call_timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_budget_falls_back_to_far_future() {
        let now = Instant::now();
        let deadline = call_deadline(&HeaderMap::new(), Duration::from_secs(u64::MAX / 2));
        assert_eq!(deadline, now + FAR_FUTURE);
    }
}
