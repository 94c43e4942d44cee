use tracing::warn;

/// Environment variable that controls whether models cache tensor buffers
/// between runs.
pub const CACHE_BUFFERS_VAR: &str = "TENSORIO_CACHE_BUFFERS";

/// Interpret a string value such as "1" or "no" as a boolean.
///
/// Returns `None` if the value is not recognized.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Interpret a string value such as "1" or "no" as a boolean.
///
/// Unrecognized values are logged and treated as false.
pub fn str_as_bool(s: &str) -> bool {
    parse_bool(s).unwrap_or_else(|| {
        warn!(value = s, "unrecognized boolean value");
        false
    })
}

/// Return whether a feature flag controlled by an environment variable is
/// enabled.
pub fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .as_ref()
        .map(|s| str_as_bool(s))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use tensorio_testing::TestCases;

    use super::{env_flag, parse_bool, str_as_bool};

    #[test]
    fn test_str_as_bool() {
        #[derive(Debug)]
        struct Case {
            value: &'static str,
            expected: Option<bool>,
        }

        let cases = [
            ("1", Some(true)),
            ("true", Some(true)),
            ("y", Some(true)),
            ("0", Some(false)),
            ("no", Some(false)),
            ("f", Some(false)),
            ("maybe", None),
            ("", None),
        ]
        .map(|(value, expected)| Case { value, expected });

        cases.test_each(|case| {
            assert_eq!(parse_bool(case.value), case.expected);
            assert_eq!(str_as_bool(case.value), case.expected.unwrap_or(false));
        });
    }

    #[test]
    fn test_env_flag() {
        let name = "TENSORIO_TEST_ENV_FLAG_UNSET";
        assert!(env_flag(name, true));
        assert!(!env_flag(name, false));
    }
}
