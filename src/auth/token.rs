use subtle::ConstantTimeEq;

use crate::config::AuthToken;

fn token_matches(candidate: &str, expected: &str) -> bool {
    bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()))
}

/// Name of the configured token equal to `candidate`, compared in constant time.
pub fn match_device_token<'a>(candidate: &str, tokens: &'a [AuthToken]) -> Option<&'a str> {
    tokens
        .iter()
        .find(|entry| token_matches(candidate, &entry.token))
        .map(|entry| entry.name.as_str())
}
