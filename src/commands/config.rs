use anyhow::Result;
use log::debug;
use std::time::Duration;

use crate::config::{API_KEY_ENV, HttpConfiguration};
use crate::runtime::Runtime;

/// Resolves the server connection. Command-line values win over the
/// environment.
pub fn connection<R: Runtime>(
    runtime: &R,
    server: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
) -> Result<HttpConfiguration> {
    let mut config = match server {
        Some(server) => {
            let config = HttpConfiguration::new(server)?;
            match runtime.env_var(API_KEY_ENV) {
                Ok(key) if !key.is_empty() => config.with_api_key(key),
                _ => config,
            }
        }
        None => HttpConfiguration::from_runtime(runtime)?,
    };

    if let Some(key) = api_key {
        config = config.with_api_key(key);
    }
    if let Some(timeout) = timeout {
        config = config.with_timeout(timeout);
    }

    debug!("Resolved connection: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SERVER_URI_ENV;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    fn runtime_with(server: Option<&'static str>, key: Option<&'static str>) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_env_var()
            .with(eq(SERVER_URI_ENV))
            .returning(move |_| server.map(str::to_string).ok_or(std::env::VarError::NotPresent));
        runtime
            .expect_env_var()
            .with(eq(API_KEY_ENV))
            .returning(move |_| key.map(str::to_string).ok_or(std::env::VarError::NotPresent));
        runtime
    }

    #[test]
    fn test_connection_from_environment() {
        let runtime = runtime_with(Some("https://env.example.com"), Some("env-key"));

        let config = connection(&runtime, None, None, None).unwrap();
        assert_eq!(config.server_uri(), "https://env.example.com");
        assert_eq!(config.api_key(), Some("env-key"));
    }

    #[test]
    fn test_flags_override_environment() {
        let runtime = runtime_with(Some("https://env.example.com"), Some("env-key"));

        let config = connection(
            &runtime,
            Some("https://flag.example.com".to_string()),
            Some("flag-key".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(config.server_uri(), "https://flag.example.com");
        assert_eq!(config.api_key(), Some("flag-key"));
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_server_flag_keeps_environment_key() {
        let runtime = runtime_with(None, Some("env-key"));

        let config =
            connection(&runtime, Some("http://localhost:8080".to_string()), None, None).unwrap();
        assert_eq!(config.api_key(), Some("env-key"));
    }

    #[test]
    fn test_missing_server_fails() {
        let runtime = runtime_with(None, None);
        assert!(connection(&runtime, None, None, None).is_err());
    }
}
