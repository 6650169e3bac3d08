//! Environment variable utilities
//!
//! Typed readers for the `UTHREAD_*` variables consulted at runtime
//! initialization. Every reader falls back to the supplied default when the
//! variable is unset or does not parse, so a typo never aborts startup.
//!
//! ```ignore
//! use uthread_core::env::{env_get, env_get_bool, env_get_size};
//!
//! let quantum: u64 = env_get("UTHREAD_QUANTUM_MS", 10);
//! let stack = env_get_size("UTHREAD_STACK_SIZE", 128 * 1024); // accepts "256K", "1M"
//! let preempt = env_get_bool("UTHREAD_PREEMPT", false);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as optional value
///
/// `None` when unset or unparsable. Surrounding whitespace is ignored.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean
///
/// "1", "true", "yes", "on" are true and "0", "false", "no", "off" are false
/// (case-insensitive). Anything else, including unset, yields the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => parse_bool(&val).unwrap_or(default),
        Err(_) => default,
    }
}

/// Get environment variable as a byte count
///
/// Accepts a plain number or one with a `K`, `M` or `G` suffix (binary units).
pub fn env_get_size(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_size(&v))
        .unwrap_or(default)
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Check if environment variable is set (regardless of value)
#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var_os(key).is_some()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_size(s: &str) -> Option<usize> {
    let s = s.trim();
    let (digits, shift) = match s.char_indices().last()? {
        (i, 'k' | 'K') => (&s[..i], 10),
        (i, 'm' | 'M') => (&s[..i], 20),
        (i, 'g' | 'G') => (&s[..i], 30),
        _ => (s, 0),
    };
    let n: usize = digits.trim().parse().ok()?;
    n.checked_mul(1usize << shift)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSET: &str = "__UTHREAD_TEST_UNSET__";

    #[test]
    fn test_unset_returns_default() {
        let v: u64 = env_get(UNSET, 42);
        assert_eq!(v, 42);
        assert!(env_get_bool(UNSET, true));
        assert_eq!(env_get_size(UNSET, 4096), 4096);
        assert_eq!(env_get_str(UNSET, "fifo"), "fifo");
        assert!(env_get_opt::<u32>(UNSET).is_none());
        assert!(!env_is_set(UNSET));
    }

    #[test]
    fn test_parse_bool() {
        for t in ["1", "true", "TRUE", "yes", "On"] {
            assert_eq!(parse_bool(t), Some(true), "{}", t);
        }
        for f in ["0", "false", "no", "OFF"] {
            assert_eq!(parse_bool(f), Some(false), "{}", f);
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("65536"), Some(65536));
        assert_eq!(parse_size("64K"), Some(64 * 1024));
        assert_eq!(parse_size(" 2m "), Some(2 * 1024 * 1024));
        assert_eq!(parse_size("1G"), Some(1 << 30));
        assert_eq!(parse_size("K"), None);
        assert_eq!(parse_size("lots"), None);
        assert_eq!(parse_size(""), None);
    }

    #[test]
    fn test_env_get_with_set_var() {
        std::env::set_var("__UTHREAD_TEST_NUM__", " 123 ");
        let v: usize = env_get("__UTHREAD_TEST_NUM__", 0);
        assert_eq!(v, 123);
        std::env::remove_var("__UTHREAD_TEST_NUM__");
    }

    #[test]
    fn test_bool_garbage_keeps_default() {
        std::env::set_var("__UTHREAD_TEST_BOOL__", "garbage");
        assert!(env_get_bool("__UTHREAD_TEST_BOOL__", true));
        assert!(!env_get_bool("__UTHREAD_TEST_BOOL__", false));
        std::env::remove_var("__UTHREAD_TEST_BOOL__");
    }
}
