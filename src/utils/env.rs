/// Get environment variable with CACHEYARD_ prefix, falling back to unprefixed version
///
/// Checks `CACHEYARD_{key}` first, then `{key}`, so hosts that already export
/// `CACHE_CONFIG` and friends work without renaming anything.
///
/// # Examples
///
/// ```rust,ignore
/// // Checks CACHEYARD_CACHE_CONFIG first, then CACHE_CONFIG
/// let raw = get_env_with_prefix("CACHE_CONFIG");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("CACHEYARD_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Serializes tests that mutate process environment variables
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        unsafe {
            std::env::set_var("CACHEYARD_ENV_TEST_VAR", "prefixed_value");
            std::env::set_var("ENV_TEST_VAR", "unprefixed_value");
        }
        assert_eq!(get_env_with_prefix("ENV_TEST_VAR"), Some("prefixed_value".to_string()));
        unsafe {
            std::env::remove_var("CACHEYARD_ENV_TEST_VAR");
        }

        assert_eq!(get_env_with_prefix("ENV_TEST_VAR"), Some("unprefixed_value".to_string()));
        unsafe {
            std::env::remove_var("ENV_TEST_VAR");
        }

        assert_eq!(get_env_with_prefix("ENV_TEST_MISSING_VAR"), None);
    }
}
