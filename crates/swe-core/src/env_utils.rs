use anyhow::{Context, Result};

/// Read a string env var with a default when absent or empty.
pub fn env_string(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Read a u64 env var; absence yields the default, garbage is an error.
pub fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid {name} value '{value}'")),
        _ => Ok(default),
    }
}

/// Read a usize env var; absence yields the default, garbage is an error.
pub fn env_usize(name: &str, default: usize) -> Result<usize> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<usize>()
            .with_context(|| format!("invalid {name} value '{value}'")),
        _ => Ok(default),
    }
}

/// Read a boolean env var; `true`/`1`/`yes` (any case) count as true.
pub fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        ),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::{env_bool, env_string, env_u64};

    #[test]
    fn unit_env_string_defaults_on_missing_or_blank() {
        std::env::remove_var("SWE_TEST_STRING_MISSING");
        assert_eq!(env_string("SWE_TEST_STRING_MISSING", "fallback"), "fallback");
        std::env::set_var("SWE_TEST_STRING_BLANK", "   ");
        assert_eq!(env_string("SWE_TEST_STRING_BLANK", "fallback"), "fallback");
        std::env::set_var("SWE_TEST_STRING_SET", " value ");
        assert_eq!(env_string("SWE_TEST_STRING_SET", "fallback"), "value");
    }

    #[test]
    fn unit_env_u64_parses_and_rejects_garbage() {
        std::env::remove_var("SWE_TEST_U64_MISSING");
        assert_eq!(env_u64("SWE_TEST_U64_MISSING", 16).expect("default"), 16);
        std::env::set_var("SWE_TEST_U64_SET", "42");
        assert_eq!(env_u64("SWE_TEST_U64_SET", 16).expect("parsed"), 42);
        std::env::set_var("SWE_TEST_U64_BAD", "not-a-number");
        assert!(env_u64("SWE_TEST_U64_BAD", 16).is_err());
    }

    #[test]
    fn unit_env_bool_accepts_common_truthy_spellings() {
        std::env::set_var("SWE_TEST_BOOL_YES", "Yes");
        assert!(env_bool("SWE_TEST_BOOL_YES", false));
        std::env::set_var("SWE_TEST_BOOL_OFF", "off");
        assert!(!env_bool("SWE_TEST_BOOL_OFF", true));
        std::env::remove_var("SWE_TEST_BOOL_MISSING");
        assert!(env_bool("SWE_TEST_BOOL_MISSING", true));
    }
}
