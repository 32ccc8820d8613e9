use crate::token::{sas_token, TokenError};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Lifetime of the signed token backing one deployment call.
const TOKEN_TTL_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

pub type HubResult<T> = Result<T, HubError>;

/// Connection settings for one IoT hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub hub_name: String,
    /// Base64-encoded shared access key
    pub key: String,
    pub policy_name: Option<String>,
    pub api_version: String,
}

impl HubConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.hub_name.is_empty() {
            return Err("Hub name cannot be empty".to_string());
        }
        if self.key.is_empty() {
            return Err("Shared access key cannot be empty".to_string());
        }
        if self.api_version.is_empty() {
            return Err("API version cannot be empty".to_string());
        }
        Ok(())
    }

    /// Resource URI the access token is scoped to.
    pub fn resource_uri(&self) -> String {
        format!("{}.azure-devices.net", self.hub_name)
    }
}

/// Result of an apply-configuration call.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl DeployOutcome {
    /// The service acknowledges a deployment with 204 and nothing else.
    pub fn succeeded(&self) -> bool {
        self.status == 204
    }
}

/// REST client for the device-management endpoints of one IoT hub.
pub struct HubClient {
    config: HubConfig,
    endpoint: String,
    http: reqwest::Client,
}

impl HubClient {
    pub fn new(config: HubConfig) -> HubResult<Self> {
        config
            .validate()
            .map_err(|message| HubError::InvalidConfig { message })?;

        let endpoint = format!("https://{}", config.resource_uri());
        Ok(Self {
            config,
            endpoint,
            http: reqwest::Client::new(),
        })
    }

    /// Point the client at a different endpoint (tests, sovereign clouds).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// POST the raw bytes of `config_path` as the device's desired module
    /// configuration.
    ///
    /// A non-204 response is reported in the outcome, not raised as an
    /// error; only token, file, and transport failures error out.
    pub async fn apply_configuration(
        &self,
        device_id: &str,
        config_path: &Path,
    ) -> HubResult<DeployOutcome> {
        let token = sas_token(
            &self.config.resource_uri(),
            &self.config.key,
            self.config.policy_name.as_deref(),
            TOKEN_TTL_SECS,
        )?;
        let body = fs::read(config_path)?;

        let url = format!(
            "{}/devices/{}/applyConfigurationContent?api-version={}",
            self.endpoint, device_id, self.config.api_version
        );
        debug!(url = %url, "applying device configuration");

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, token)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(DeployOutcome { url, status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn test_config() -> HubConfig {
        HubConfig {
            hub_name: "myhub".to_string(),
            key: STANDARD.encode(b"super-secret-device-key"),
            policy_name: Some("iothubowner".to_string()),
            api_version: "2018-06-30".to_string(),
        }
    }

    fn deployment_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"moduleContent":{}}"#).unwrap();
        file
    }

    #[test]
    fn test_config_validation() {
        assert!(test_config().validate().is_ok());

        let mut config = test_config();
        config.hub_name = String::new();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.key = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resource_uri() {
        assert_eq!(test_config().resource_uri(), "myhub.azure-devices.net");
    }

    #[test]
    fn test_empty_config_rejected_by_client() {
        let mut config = test_config();
        config.api_version = String::new();
        assert!(matches!(
            HubClient::new(config),
            Err(HubError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_configuration_succeeds_on_204() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/devices/edge-device/applyConfigurationContent")
            .match_query(mockito::Matcher::UrlEncoded(
                "api-version".to_string(),
                "2018-06-30".to_string(),
            ))
            .match_header("content-type", "application/json")
            .with_status(204)
            .create_async()
            .await;

        let file = deployment_file();
        let client = HubClient::new(test_config())
            .unwrap()
            .with_endpoint(server.url());

        let outcome = client
            .apply_configuration("edge-device", file.path())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(outcome.status, 204);
        assert!(outcome.succeeded());
    }

    #[tokio::test]
    async fn test_apply_configuration_sends_signed_authorization() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/devices/edge-device/applyConfigurationContent")
            .match_query(mockito::Matcher::Any)
            .match_header(
                "authorization",
                mockito::Matcher::Regex("^SharedAccessSignature sr=".to_string()),
            )
            .with_status(204)
            .create_async()
            .await;

        let file = deployment_file();
        let client = HubClient::new(test_config())
            .unwrap()
            .with_endpoint(server.url());

        client
            .apply_configuration("edge-device", file.path())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_204_is_reported_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/devices/edge-device/applyConfigurationContent")
            .match_query(mockito::Matcher::Any)
            .with_status(412)
            .with_body("precondition failed")
            .create_async()
            .await;

        let file = deployment_file();
        let client = HubClient::new(test_config())
            .unwrap()
            .with_endpoint(server.url());

        let outcome = client
            .apply_configuration("edge-device", file.path())
            .await
            .unwrap();

        assert_eq!(outcome.status, 412);
        assert!(!outcome.succeeded());
        assert_eq!(outcome.body, "precondition failed");
    }

    #[tokio::test]
    async fn test_missing_config_file_is_an_error() {
        let client = HubClient::new(test_config()).unwrap();
        let result = client
            .apply_configuration("edge-device", Path::new("/nonexistent/deployment.json"))
            .await;
        assert!(matches!(result, Err(HubError::Io(_))));
    }
}
