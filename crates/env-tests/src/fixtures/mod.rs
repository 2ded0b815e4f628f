//! Test fixtures for interacting with the observability backend.

pub mod grafana;
pub mod provisioner;

pub use grafana::{GrafanaClient, QueryError};
pub use provisioner::{
    AccessToken, AdminCredentials, CredentialProvisioner, ProvisioningError, ServiceIdentity,
};
