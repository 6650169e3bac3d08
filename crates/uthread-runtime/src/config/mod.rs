//! Runtime configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Environment variables (read when the runtime starts)
//! 2. The constants file named by `UTHREAD_CONFIG_RS` at build time
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use uthread_runtime::config::{RuntimeConfig, SchedPolicy};
//!
//! let config = RuntimeConfig::from_env()
//!     .policy(SchedPolicy::Priority)
//!     .preemption(true)
//!     .quantum(Duration::from_millis(5));
//! ```

pub mod defaults;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use uthread_core::constants::MIN_STACK_SIZE;
use uthread_core::env::{env_get, env_get_bool, env_get_size, env_get_str};
use uthread_core::ConfigError;

/// Ready-queue selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedPolicy {
    /// Single run queue, strict arrival order
    #[default]
    Fifo,
    /// One queue per priority level with per-reschedule decay
    Priority,
}

impl FromStr for SchedPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fifo" => Ok(SchedPolicy::Fifo),
            "priority" | "prio" => Ok(SchedPolicy::Priority),
            _ => Err(ConfigError::InvalidValue("policy must be fifo or priority")),
        }
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedPolicy::Fifo => write!(f, "fifo"),
            SchedPolicy::Priority => write!(f, "priority"),
        }
    }
}

/// Runtime configuration with builder pattern.
///
/// Use `from_env()` to start with compile-time defaults and apply
/// any environment variable overrides.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Ready-queue policy
    pub policy: SchedPolicy,
    /// Arm the CPU-time quantum timer
    pub preemption: bool,
    /// CPU time a thread may run before it is forced to yield
    pub quantum: Duration,
    /// Default stack size for new green threads
    pub stack_size: usize,
    /// Reserve a PROT_NONE page below every stack
    pub guard_pages: bool,
    /// Raise the log level to debug when the runtime starts
    pub debug_logging: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `UTHREAD_SCHED_POLICY` - `fifo` or `priority`
    /// - `UTHREAD_PREEMPT` - Enable timer preemption (0/1)
    /// - `UTHREAD_QUANTUM_MS` - Quantum in milliseconds
    /// - `UTHREAD_STACK_SIZE` - Stack size (bytes, or with K/M suffix)
    /// - `UTHREAD_GUARD_PAGES` - Guard page below each stack (0/1)
    /// - `UTHREAD_DEBUG` - Debug logging (0/1)
    ///
    /// An unrecognised policy name keeps the compiled default.
    pub fn from_env() -> Self {
        let base = Self::new();
        Self {
            policy: env_get_str("UTHREAD_SCHED_POLICY", "")
                .parse()
                .unwrap_or(base.policy),
            preemption: env_get_bool("UTHREAD_PREEMPT", base.preemption),
            quantum: Duration::from_millis(env_get("UTHREAD_QUANTUM_MS", defaults::QUANTUM_MS)),
            stack_size: env_get_size("UTHREAD_STACK_SIZE", base.stack_size),
            guard_pages: env_get_bool("UTHREAD_GUARD_PAGES", base.guard_pages),
            debug_logging: env_get_bool("UTHREAD_DEBUG", base.debug_logging),
        }
    }

    /// Create config with compiled defaults only (no env override).
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            policy: defaults::SCHED_POLICY.parse().unwrap_or_default(),
            preemption: defaults::ENABLE_PREEMPTION,
            quantum: Duration::from_millis(defaults::QUANTUM_MS),
            stack_size: defaults::STACK_SIZE,
            guard_pages: defaults::GUARD_PAGES,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn policy(mut self, policy: SchedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn preemption(mut self, enable: bool) -> Self {
        self.preemption = enable;
        self
    }

    pub fn quantum(mut self, d: Duration) -> Self {
        self.quantum = d;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn guard_pages(mut self, enable: bool) -> Self {
        self.guard_pages = enable;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preemption && self.quantum.is_zero() {
            return Err(ConfigError::InvalidValue("quantum must be > 0 when preemption is on"));
        }
        validate_stack_size(self.stack_size)
    }
}

/// Smallest stack accepted for a green thread
pub(crate) fn validate_stack_size(size: usize) -> Result<(), ConfigError> {
    if size < MIN_STACK_SIZE {
        return Err(ConfigError::InvalidValue("stack_size must be >= 16KB"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiled_defaults() {
        let config = RuntimeConfig::new();
        assert_eq!(config.policy, SchedPolicy::Fifo);
        assert!(!config.preemption);
        assert_eq!(config.quantum, Duration::from_millis(10));
        assert_eq!(config.stack_size, 128 * 1024);
        assert!(config.guard_pages);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new()
            .policy(SchedPolicy::Priority)
            .preemption(true)
            .quantum(Duration::from_millis(5))
            .guard_pages(false);

        assert_eq!(config.policy, SchedPolicy::Priority);
        assert!(config.preemption);
        assert_eq!(config.quantum, Duration::from_millis(5));
        assert!(!config.guard_pages);
    }

    #[test]
    fn test_validation() {
        let config = RuntimeConfig::new().preemption(true).quantum(Duration::ZERO);
        assert!(config.validate().is_err());

        // Zero quantum is harmless while preemption is off
        let config = RuntimeConfig::new().quantum(Duration::ZERO);
        assert!(config.validate().is_ok());

        let config = RuntimeConfig::new().stack_size(4096);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidValue("stack_size must be >= 16KB"))
        );
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("FIFO".parse::<SchedPolicy>(), Ok(SchedPolicy::Fifo));
        assert_eq!("priority".parse::<SchedPolicy>(), Ok(SchedPolicy::Priority));
        assert!("round-robin".parse::<SchedPolicy>().is_err());
        assert_eq!(SchedPolicy::Priority.to_string(), "priority");
    }
}
