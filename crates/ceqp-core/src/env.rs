//! `CEQP_TEST_ENV` parsing.

/// Parse a test-env flag value. Accepts `1`, `true`, `yes`, `on`,
/// case-insensitively; anything else (including absence) is `false`.
#[must_use]
pub fn parse_test_env_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Read `CEQP_TEST_ENV` from the process environment.
#[must_use]
pub fn test_env_from_os() -> bool {
    std::env::var("CEQP_TEST_ENV").map(|v| parse_test_env_flag(&v)).unwrap_or(false)
}
