//! Process environment access behind a trait so configuration can be tested
//! without touching real environment variables.

use std::env;

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    fn env_var(&self, key: &str) -> Result<String, env::VarError>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    #[tracing::instrument(skip(self))]
    fn env_var(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_runtime_missing_var() {
        let runtime = RealRuntime;
        assert!(
            runtime
                .env_var("SYSTEMLINK_TEST_VARIABLE_THAT_DOES_NOT_EXIST")
                .is_err()
        );
    }
}
