//! Environment overrides for configuration structs

use std::str::FromStr;

use crate::error::ConfigError;

/// Parse `var` if it is set
///
/// Unset (or non-unicode) variables yield `None`; set but unparsable values
/// are an error rather than a silent fallback.
pub(crate) fn env_override<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_override() {
        std::env::remove_var("LIVESYNC_TEST_UNSET");
        assert_eq!(env_override::<u16>("LIVESYNC_TEST_UNSET"), Ok(None));

        std::env::set_var("LIVESYNC_TEST_PORT", " 8081 ");
        assert_eq!(env_override::<u16>("LIVESYNC_TEST_PORT"), Ok(Some(8081)));

        std::env::set_var("LIVESYNC_TEST_BAD", "eighty");
        assert_eq!(
            env_override::<u16>("LIVESYNC_TEST_BAD"),
            Err(ConfigError::InvalidEnv {
                var: "LIVESYNC_TEST_BAD",
                value: "eighty".into()
            })
        );
    }
}
