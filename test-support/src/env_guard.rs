//! Test helpers for managing environment variables.
//!
//! [`EnvVarGuard`] changes a variable for its own lifetime and puts the
//! previous value back on drop. Callers must run under
//! `#[serial_test::serial]` because the process environment is global.

#[derive(Debug)]
pub struct EnvVarGuard {
    key: String,
    original: Option<String>,
}

impl EnvVarGuard {
    /// Set `key` to `value` until the guard is dropped.
    pub fn set(key: &str, value: &str) -> Self {
        Self::apply(key, Some(value))
    }

    /// Unset `key` until the guard is dropped.
    pub fn remove(key: &str) -> Self {
        Self::apply(key, None)
    }

    fn apply(key: &str, value: Option<&str>) -> Self {
        let original = std::env::var(key).ok();
        write_env(key, value);
        Self {
            key: key.to_owned(),
            original,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        write_env(&self.key, self.original.as_deref());
    }
}

/// SAFETY: only reached through [`EnvVarGuard`], whose callers serialise
/// environment access.
fn write_env(key: &str, value: Option<&str>) {
    match value {
        Some(v) => unsafe { std::env::set_var(key, v) },
        None => unsafe { std::env::remove_var(key) },
    }
}

#[cfg(test)]
mod tests {
    use super::EnvVarGuard;

    #[test]
    #[serial_test::serial]
    fn set_restores_unset_variable() {
        let key = "DMBOT_GUARD_SET";
        {
            let _guard = EnvVarGuard::set(key, "value");
            assert_eq!(std::env::var(key).ok().as_deref(), Some("value"));
        }
        assert!(std::env::var(key).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn remove_restores_previous_value() {
        let key = "DMBOT_GUARD_REMOVE";
        let outer = EnvVarGuard::set(key, "original");
        {
            let _guard = EnvVarGuard::remove(key);
            assert!(std::env::var(key).is_err());
        }
        assert_eq!(std::env::var(key).ok().as_deref(), Some("original"));
        drop(outer);
        assert!(std::env::var(key).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn nested_guards_unwind_in_order() {
        let key = "DMBOT_GUARD_NESTED";
        let first = EnvVarGuard::set(key, "first");
        {
            let _second = EnvVarGuard::set(key, "second");
            assert_eq!(std::env::var(key).ok().as_deref(), Some("second"));
        }
        assert_eq!(std::env::var(key).ok().as_deref(), Some("first"));
        drop(first);
        assert!(std::env::var(key).is_err());
    }
}
