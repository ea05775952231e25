/// Get environment variable with TENANTRY_ prefix, falling back to unprefixed version
///
/// Checks `TENANTRY_{key}` first, then `{key}`.
///
/// # Examples
///
/// ```rust
/// use tenantry::utils::get_env_with_prefix;
///
/// // Checks TENANTRY_API_URL first, then API_URL
/// let url = get_env_with_prefix("API_URL");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("TENANTRY_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse an environment variable, ignoring values that fail to parse.
pub fn parse_env_with_prefix<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = get_env_with_prefix(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment variable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("TENANTRY_TEST_VAR", "prefixed_value");
        }
        assert_eq!(get_env_with_prefix("TEST_VAR"), Some("prefixed_value".to_string()));
        unsafe {
            std::env::remove_var("TENANTRY_TEST_VAR");
        }

        unsafe {
            std::env::set_var("TENANTRY_FALLBACK_ONLY", "unprefixed_value");
            std::env::remove_var("TENANTRY_FALLBACK_ONLY");
            std::env::set_var("FALLBACK_ONLY", "unprefixed_value");
        }
        assert_eq!(get_env_with_prefix("FALLBACK_ONLY"), Some("unprefixed_value".to_string()));
        unsafe {
            std::env::remove_var("FALLBACK_ONLY");
        }

        assert_eq!(get_env_with_prefix("NON_EXISTENT_VAR"), None);
    }

    #[test]
    fn test_parse_env_with_prefix() {
        unsafe {
            std::env::set_var("TENANTRY_PARSE_NUM", " 42 ");
            std::env::set_var("TENANTRY_PARSE_BAD", "forty-two");
        }
        assert_eq!(parse_env_with_prefix::<u32>("PARSE_NUM"), Some(42));
        assert_eq!(parse_env_with_prefix::<u32>("PARSE_BAD"), None);
        unsafe {
            std::env::remove_var("TENANTRY_PARSE_NUM");
            std::env::remove_var("TENANTRY_PARSE_BAD");
        }
    }
}
