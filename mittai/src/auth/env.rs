use super::CredentialLookup;
use anyhow::bail;

/// Conventional variable for the mittwald AI hosting key.
pub const MITTWALD_ENV_VAR: &str = "MITTWALD_API_KEY";

/// Treats the identifier as the name of an environment variable.
/// A blank identifier falls back to `MITTWALD_API_KEY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    fn var_name(identifier: &str) -> &str {
        let id = identifier.trim();
        if id.is_empty() { MITTWALD_ENV_VAR } else { id }
    }
}

impl CredentialLookup for EnvCredentials {
    fn resolve(&self, identifier: &str) -> anyhow::Result<String> {
        let name = Self::var_name(identifier);
        match std::env::var(name) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            Ok(_) => bail!("Environment variable {} is empty", name),
            Err(_) => bail!("Environment variable {} is not set", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_named_variable() {
        // SAFETY: test-unique variable names, no other thread reads them.
        unsafe {
            std::env::set_var("MITTAI_TEST_ENV_KEY", "sk-env");
            std::env::set_var("MITTAI_TEST_ENV_EMPTY", "");
        }
        assert_eq!(EnvCredentials.resolve("MITTAI_TEST_ENV_KEY").unwrap(), "sk-env");

        let err = EnvCredentials.resolve("MITTAI_TEST_ENV_EMPTY").unwrap_err();
        assert!(err.to_string().contains("is empty"));

        let err = EnvCredentials.resolve("MITTAI_TEST_ENV_MISSING").unwrap_err();
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn blank_identifier_uses_default_variable() {
        assert_eq!(EnvCredentials::var_name(""), MITTWALD_ENV_VAR);
        assert_eq!(EnvCredentials::var_name("OTHER"), "OTHER");
    }
}
