//! IoT Hub REST client for edge deployments
//!
//! Shared-access-signature generation and the apply-configuration call used
//! to push a module deployment to a remote device.

pub mod client;
pub mod token;

pub use client::{DeployOutcome, HubClient, HubConfig, HubError, HubResult};
pub use token::{sas_token, sas_token_at, TokenError};
