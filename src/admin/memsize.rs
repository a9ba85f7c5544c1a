//! Human-readable memory sizes.

use crate::proto::error::ParseError;

/// Configuration parameters whose value is a byte count and may be given
/// with a unit suffix.
pub const SIZE_VALUED_KEYS: &[&str] = &[
    "active-defrag-ignore-bytes",
    "auto-aof-rewrite-min-size",
    "client-query-buffer-limit",
    "hash-max-ziplist-entries",
    "hash-max-ziplist-value",
    "hll-sparse-max-bytes",
    "maxmemory",
    "proto-max-bulk-len",
    "repl-backlog-size",
    "set-max-intset-entries",
    "stream-node-max-bytes",
    "zset-max-ziplist-entries",
    "zset-max-ziplist-value",
];

/// Returns true if `key` takes a memory size.
pub fn is_size_valued(key: &str) -> bool {
    SIZE_VALUED_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// Converts a size such as `100mb` or `1G` into bytes.
///
/// Units follow the Redis configuration file: `k`, `m`, `g` are powers of
/// 1000, `kb`, `mb`, `gb` powers of 1024, `b` or no unit means bytes. Units
/// are case-insensitive and surrounding whitespace is ignored.
///
/// ```
/// use clustermap::admin::parse_memory_size;
///
/// assert_eq!(parse_memory_size("1gb").unwrap(), 1 << 30);
/// assert_eq!(parse_memory_size("5k").unwrap(), 5000);
/// assert!(parse_memory_size("-1").is_err());
/// ```
pub fn parse_memory_size(value: &str) -> Result<u64, ParseError> {
    let invalid = || ParseError::InvalidSize {
        value: value.to_string(),
    };

    let trimmed = value.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    if digits.is_empty() {
        return Err(invalid());
    }

    let multiplier: u64 = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" => 1_000,
        "kb" => 1 << 10,
        "m" => 1_000_000,
        "mb" => 1 << 20,
        "g" => 1_000_000_000,
        "gb" => 1 << 30,
        _ => return Err(invalid()),
    };

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_bytes() {
        assert_eq!(parse_memory_size("0").unwrap(), 0);
        assert_eq!(parse_memory_size("1048576").unwrap(), 1_048_576);
        assert_eq!(parse_memory_size("512b").unwrap(), 512);
        assert_eq!(parse_memory_size(" 64 ").unwrap(), 64);
    }

    #[test]
    fn test_units() {
        assert_eq!(parse_memory_size("1k").unwrap(), 1_000);
        assert_eq!(parse_memory_size("1kb").unwrap(), 1_024);
        assert_eq!(parse_memory_size("2m").unwrap(), 2_000_000);
        assert_eq!(parse_memory_size("2mb").unwrap(), 2 * 1_048_576);
        assert_eq!(parse_memory_size("3g").unwrap(), 3_000_000_000);
        assert_eq!(parse_memory_size("3gb").unwrap(), 3 * 1_073_741_824);
    }

    #[test]
    fn test_units_case_insensitive() {
        assert_eq!(parse_memory_size("100MB").unwrap(), 100 * 1_048_576);
        assert_eq!(parse_memory_size("1Gb").unwrap(), 1_073_741_824);
        assert_eq!(parse_memory_size("7K").unwrap(), 7_000);
    }

    #[test]
    fn test_rejects_malformed() {
        for value in ["", "  ", "mb", "-1", "-1mb", "1.5gb", "10tb", "10 mb", "abc"] {
            assert_eq!(
                parse_memory_size(value),
                Err(ParseError::InvalidSize {
                    value: value.to_string()
                }),
                "value {:?}",
                value
            );
        }
    }

    #[test]
    fn test_rejects_overflow() {
        assert!(parse_memory_size("18446744073709551615").is_ok());
        assert!(parse_memory_size("18446744073709551616").is_err());
        assert!(parse_memory_size("18446744073709551615kb").is_err());
    }

    #[test]
    fn test_is_size_valued() {
        assert_eq!(SIZE_VALUED_KEYS.len(), 13);
        assert!(is_size_valued("maxmemory"));
        assert!(is_size_valued("MAXMEMORY"));
        assert!(is_size_valued("hll-sparse-max-bytes"));
        assert!(!is_size_valued("maxmemory-policy"));
        assert!(!is_size_valued("client-output-buffer-limit"));
    }
}
