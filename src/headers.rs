use std::collections::BTreeMap;

/// Parse a `-H` flag value of the form `k1:v1,k2:v2` into a header map.
///
/// Pairs are split on `,` and each pair on its first `:`; keys and values are
/// trimmed. Pairs without a colon are dropped and a repeated key keeps its
/// last value. Never fails.
pub fn parse_headers(input: &str) -> BTreeMap<String, String> {
    input
        .split(',')
        .filter_map(|pair| pair.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}
