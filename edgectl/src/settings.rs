use module_builder::Allowlist;
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Required environment variable {name} is not set")]
    Missing { name: &'static str },
}

/// Process-wide configuration, read once at startup and immutable after.
///
/// Every field is backed by a required environment variable; a missing
/// variable fails startup before any command runs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub iothub_name: String,
    pub iothub_key: String,
    pub iothub_policy_name: String,
    pub iot_rest_api_version: String,
    pub device_connection_string: String,
    pub edge_device_id: String,
    pub runtime_host_name: String,
    /// Modules admitted to the build pipeline
    pub active_modules: Allowlist,
    /// Dockerfile parent directories admitted to the build pipeline
    pub active_docker_dirs: Allowlist,
    pub container_registry_server: String,
    pub container_registry_username: String,
    pub container_registry_password: String,
    pub container_tag: String,
    pub runtime_tag: String,
    pub runtime_verbosity: String,
    pub runtime_home_dir: String,
    pub modules_config_file: String,
    pub runtime_config_file: String,
    pub dotnet_verbosity: String,
    /// Shell command template for streaming one module's logs; `{0}` is
    /// replaced with the module name
    pub logs_cmd: String,
}

impl Settings {
    /// Load `.env` if present, then read every required variable.
    pub fn from_env() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            iothub_name: required("IOTHUB_NAME")?,
            iothub_key: required("IOTHUB_KEY")?,
            iothub_policy_name: required("IOTHUB_POLICY_NAME")?,
            iot_rest_api_version: required("IOT_REST_API_VERSION")?,
            device_connection_string: required("DEVICE_CONNECTION_STRING")?,
            edge_device_id: required("EDGE_DEVICE_ID")?,
            runtime_host_name: required("RUNTIME_HOST_NAME")?,
            active_modules: Allowlist::from_csv(&required("ACTIVE_MODULES")?),
            active_docker_dirs: Allowlist::from_csv(&required("ACTIVE_DOCKER_DIRS")?),
            container_registry_server: required("CONTAINER_REGISTRY_SERVER")?,
            container_registry_username: required("CONTAINER_REGISTRY_USERNAME")?,
            container_registry_password: required("CONTAINER_REGISTRY_PASSWORD")?,
            container_tag: required("CONTAINER_TAG")?,
            runtime_tag: required("RUNTIME_TAG")?,
            runtime_verbosity: required("RUNTIME_VERBOSITY")?,
            runtime_home_dir: required("RUNTIME_HOME_DIR")?,
            modules_config_file: required("MODULES_CONFIG_FILE")?,
            runtime_config_file: required("RUNTIME_CONFIG_FILE")?,
            dotnet_verbosity: required("DOTNET_VERBOSITY")?,
            logs_cmd: required("LOGS_CMD")?,
        })
    }
}

fn required(name: &'static str) -> Result<String, SettingsError> {
    env::var(name).map_err(|_| SettingsError::Missing { name })
}
