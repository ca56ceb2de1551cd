use std::time::Duration;

use serde::Deserialize;

use crate::transaction::DEFAULT_MAX_SIGNING_ATTEMPTS;
use crate::{Error, Result};

pub const DEFAULT_CONFIG_NAME: &str = "config";
pub const ENV_PREFIX: &str = "GRAPHENE";

pub const DEFAULT_URL: &str = "ws://127.0.0.1:8090";
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_EXPIRATION_SECONDS: u32 = 30;

/// Client settings, read from defaults, then an optional config file, then
/// `GRAPHENE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientSettings {
    url: String,
    /// Empty means "use whatever the node reports".
    chain_id: String,
    call_timeout_ms: u64,
    max_signing_attempts: u32,
    expiration_seconds: u32,
}

impl ClientSettings {
    pub fn load(config_name: &str) -> Result<ClientSettings> {
        ClientSettings::from_sources(Some(config_name), ENV_PREFIX)
    }

    pub fn from_sources(config_name: Option<&str>, env_prefix: &str) -> Result<ClientSettings> {
        let mut settings = config::Config::default();
        settings
            .set_default("url", DEFAULT_URL)?
            .set_default("chain_id", "")?
            .set_default("call_timeout_ms", DEFAULT_CALL_TIMEOUT_MS as i64)?
            .set_default("max_signing_attempts", DEFAULT_MAX_SIGNING_ATTEMPTS as i64)?
            .set_default("expiration_seconds", DEFAULT_EXPIRATION_SECONDS as i64)?;
        if let Some(config_name) = config_name {
            settings.merge(config::File::with_name(config_name).required(false))?;
        }
        settings.merge(config::Environment::with_prefix(env_prefix))?;

        let client_settings: ClientSettings = settings.try_into()?;
        client_settings.validate()?;
        Ok(client_settings)
    }

    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.url)
            .map_err(|e| Error::Config(format!("invalid url {:?}: {}", self.url, e)))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(Error::Config(format!(
                "url {:?} is not a websocket url",
                self.url
            )));
        }
        if !self.chain_id.is_empty() && hex::decode(&self.chain_id).is_err() {
            return Err(Error::Config(format!(
                "chain id {:?} is not hex",
                self.chain_id
            )));
        }
        if self.max_signing_attempts == 0 {
            return Err(Error::Config(String::from(
                "max_signing_attempts must be at least 1",
            )));
        }
        Ok(())
    }

    pub fn get_url(&self) -> &str {
        &self.url
    }

    pub fn get_chain_id(&self) -> Option<&str> {
        if self.chain_id.is_empty() {
            None
        } else {
            Some(&self.chain_id)
        }
    }

    pub fn get_call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn get_max_signing_attempts(&self) -> u32 {
        self.max_signing_attempts
    }

    pub fn get_expiration_seconds(&self) -> u32 {
        self.expiration_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("{}.toml", name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn defaults_test() {
        let settings =
            ClientSettings::from_sources(None, "GRAPHENE_DEFAULTS_TEST").unwrap();
        assert_eq!(settings.get_url(), DEFAULT_URL);
        assert_eq!(settings.get_chain_id(), None);
        assert_eq!(settings.get_call_timeout(), Duration::from_secs(10));
        assert_eq!(settings.get_max_signing_attempts(), DEFAULT_MAX_SIGNING_ATTEMPTS);
        assert_eq!(settings.get_expiration_seconds(), DEFAULT_EXPIRATION_SECONDS);
    }

    #[test]
    fn missing_file_is_optional_test() {
        let settings = ClientSettings::from_sources(
            Some("graphene_rust_no_such_config"),
            "GRAPHENE_MISSING_FILE_TEST",
        )
        .unwrap();
        assert_eq!(settings.get_url(), DEFAULT_URL);
    }

    #[test]
    fn file_overrides_defaults_test() {
        let path = write_config(
            "graphene_rust_file_overrides_test",
            "url = \"wss://node.example.com/ws\"\nchain_id = \"abcd\"\nexpiration_seconds = 60\n",
        );
        let settings =
            ClientSettings::from_sources(Some(&path), "GRAPHENE_FILE_OVERRIDES_TEST").unwrap();
        assert_eq!(settings.get_url(), "wss://node.example.com/ws");
        assert_eq!(settings.get_chain_id(), Some("abcd"));
        assert_eq!(settings.get_expiration_seconds(), 60);
        assert_eq!(settings.get_call_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn environment_overrides_file_test() {
        let path = write_config(
            "graphene_rust_environment_overrides_test",
            "call_timeout_ms = 500\n",
        );
        std::env::set_var("GRAPHENE_ENV_OVERRIDES_TEST_CALL_TIMEOUT_MS", "250");
        let settings =
            ClientSettings::from_sources(Some(&path), "GRAPHENE_ENV_OVERRIDES_TEST").unwrap();
        assert_eq!(settings.get_call_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn invalid_settings_test() {
        let path = write_config("graphene_rust_bad_url_test", "url = \"http://node\"\n");
        assert!(matches!(
            ClientSettings::from_sources(Some(&path), "GRAPHENE_BAD_URL_TEST"),
            Err(Error::Config(_))
        ));

        let path = write_config("graphene_rust_bad_chain_test", "chain_id = \"xyz\"\n");
        assert!(matches!(
            ClientSettings::from_sources(Some(&path), "GRAPHENE_BAD_CHAIN_TEST"),
            Err(Error::Config(_))
        ));

        let path = write_config(
            "graphene_rust_zero_attempts_test",
            "max_signing_attempts = 0\n",
        );
        assert!(matches!(
            ClientSettings::from_sources(Some(&path), "GRAPHENE_ZERO_ATTEMPTS_TEST"),
            Err(Error::Config(_))
        ));
    }
}
