//! Credential provisioning against Grafana's service account API.
//!
//! Two sequential admin calls: create a service account, then mint a token
//! for it. The token is what every telemetry query authenticates with.
//! Nothing is retried and nothing is cleaned up; the backend is ephemeral.

use crate::sanitize::sanitize_error_body;
use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Default service account name.
pub const DEFAULT_IDENTITY_NAME: &str = "greeter-harness";

/// Role granted to provisioned service accounts (read-only queries).
pub const SERVICE_ACCOUNT_ROLE: &str = "Viewer";

/// Provisioning call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStep {
    CreateServiceAccount,
    CreateToken,
}

impl fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningStep::CreateServiceAccount => write!(f, "create service account"),
            ProvisioningStep::CreateToken => write!(f, "create token"),
        }
    }
}

/// Provisioning errors. All of them are fatal for the run.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("HTTP request failed during {step}: {source}")]
    Http {
        step: ProvisioningStep,
        #[source]
        source: reqwest::Error,
    },

    #[error("{step} rejected with status {status}: {body}")]
    Rejected {
        step: ProvisioningStep,
        status: u16,
        body: String,
    },

    #[error("{step} returned an unexpected body: {message}")]
    Malformed {
        step: ProvisioningStep,
        message: String,
    },
}

/// Grafana administrator login.
#[derive(Debug)]
pub struct AdminCredentials {
    pub username: String,
    pub password: SecretString,
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl Clone for AdminCredentials {
    fn clone(&self) -> Self {
        Self::new(self.username.clone(), self.password.expose_secret())
    }
}

impl Default for AdminCredentials {
    /// The ephemeral backend's well-known login.
    fn default() -> Self {
        Self::new("admin", "admin")
    }
}

/// Backend ids are numeric today; keep them opaque either way.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OpaqueId {
    Number(i64),
    Text(String),
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpaqueId::Number(n) => write!(f, "{}", n),
            OpaqueId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Service account created for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub id: String,
}

/// Bearer credential for a [`ServiceIdentity`]. `Debug` is redacted.
#[derive(Debug)]
pub struct AccessToken {
    pub key: SecretString,
}

impl AccessToken {
    /// `Authorization` header value.
    pub fn authorization(&self) -> String {
        common::secret::bearer_header(&self.key)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateServiceAccountRequest<'a> {
    name: &'a str,
    role: &'a str,
    is_disabled: bool,
}

#[derive(Debug, Deserialize)]
struct CreateServiceAccountResponse {
    id: OpaqueId,
}

#[derive(Debug, Serialize)]
struct CreateTokenRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateTokenResponse {
    key: SecretString,
}

/// Creates service accounts and tokens with admin basic auth.
pub struct CredentialProvisioner {
    base_url: String,
    admin: AdminCredentials,
    http_client: Client,
}

impl CredentialProvisioner {
    pub fn new(base_url: impl Into<String>, admin: AdminCredentials) -> Self {
        Self::with_client(base_url, admin, Client::new())
    }

    /// Reuse an existing HTTP client.
    pub fn with_client(
        base_url: impl Into<String>,
        admin: AdminCredentials,
        http_client: Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin,
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Provision an identity named [`DEFAULT_IDENTITY_NAME`].
    pub async fn provision_default(
        &self,
    ) -> Result<(ServiceIdentity, AccessToken), ProvisioningError> {
        self.provision(DEFAULT_IDENTITY_NAME).await
    }

    /// Create a service account named `name` and a token for it.
    ///
    /// The backend rejects a second account with the same name, so callers
    /// provisioning more than once per backend pass distinct names.
    pub async fn provision(
        &self,
        name: &str,
    ) -> Result<(ServiceIdentity, AccessToken), ProvisioningError> {
        let identity = self.create_service_account(name).await?;
        let token = self.create_token(&identity, name).await?;

        info!(identity = %identity.id, name, "Provisioned service account token");

        Ok((identity, token))
    }

    async fn create_service_account(
        &self,
        name: &str,
    ) -> Result<ServiceIdentity, ProvisioningError> {
        let step = ProvisioningStep::CreateServiceAccount;
        let url = format!("{}/api/serviceaccounts", self.base_url);
        let request = CreateServiceAccountRequest {
            name,
            role: SERVICE_ACCOUNT_ROLE,
            is_disabled: false,
        };

        debug!(name, "Creating service account");

        let response = self
            .http_client
            .post(&url)
            .basic_auth(
                &self.admin.username,
                Some(self.admin.password.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|source| ProvisioningError::Http { step, source })?;

        let parsed: CreateServiceAccountResponse = handle_response(step, response).await?;

        Ok(ServiceIdentity {
            id: parsed.id.to_string(),
        })
    }

    async fn create_token(
        &self,
        identity: &ServiceIdentity,
        name: &str,
    ) -> Result<AccessToken, ProvisioningError> {
        let step = ProvisioningStep::CreateToken;
        let url = format!(
            "{}/api/serviceaccounts/{}/tokens",
            self.base_url, identity.id
        );

        debug!(identity = %identity.id, "Creating service account token");

        let response = self
            .http_client
            .post(&url)
            .basic_auth(
                &self.admin.username,
                Some(self.admin.password.expose_secret()),
            )
            .json(&CreateTokenRequest { name })
            .send()
            .await
            .map_err(|source| ProvisioningError::Http { step, source })?;

        let parsed: CreateTokenResponse = handle_response(step, response).await?;

        Ok(AccessToken { key: parsed.key })
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    step: ProvisioningStep,
    response: reqwest::Response,
) -> Result<T, ProvisioningError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| ProvisioningError::Http { step, source })?;

    if !status.is_success() {
        return Err(ProvisioningError::Rejected {
            step,
            status: status.as_u16(),
            body: sanitize_error_body(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| ProvisioningError::Malformed {
        step,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // base64("admin:admin")
    const ADMIN_BASIC: &str = "Basic YWRtaW46YWRtaW4=";

    async fn mount_happy_path(server: &MockServer, name: &str, id: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/api/serviceaccounts"))
            .and(header("authorization", ADMIN_BASIC))
            .and(body_json(json!({
                "name": name,
                "role": "Viewer",
                "isDisabled": false
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": id,
                "name": name,
                "login": format!("sa-{name}"),
                "role": "Viewer",
                "isDisabled": false
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_provision_creates_account_then_token() {
        let server = MockServer::start().await;
        mount_happy_path(&server, "greeter-harness", json!(42)).await;

        Mock::given(method("POST"))
            .and(path("/api/serviceaccounts/42/tokens"))
            .and(header("authorization", ADMIN_BASIC))
            .and(body_json(json!({"name": "greeter-harness"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1,
                "name": "greeter-harness",
                "key": "glsa_test_key_0001"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provisioner = CredentialProvisioner::new(server.uri(), AdminCredentials::default());
        let (identity, token) = provisioner.provision_default().await.unwrap();

        assert_eq!(identity.id, "42");
        assert_eq!(token.key.expose_secret(), "glsa_test_key_0001");
        assert_eq!(token.authorization(), "Bearer glsa_test_key_0001");
    }

    #[tokio::test]
    async fn test_provision_accepts_string_ids() {
        let server = MockServer::start().await;
        mount_happy_path(&server, "run-a", json!("sa-7")).await;

        Mock::given(method("POST"))
            .and(path("/api/serviceaccounts/sa-7/tokens"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"key": "glsa_string_id"})),
            )
            .mount(&server)
            .await;

        let provisioner = CredentialProvisioner::new(server.uri(), AdminCredentials::default());
        let (identity, _) = provisioner.provision("run-a").await.unwrap();

        assert_eq!(identity.id, "sa-7");
    }

    #[tokio::test]
    async fn test_fixed_name_provisions_on_each_fresh_backend() {
        let mut tokens = Vec::new();

        for (id, key) in [(11, "glsa_first_backend"), (12, "glsa_second_backend")] {
            let server = MockServer::start().await;
            mount_happy_path(&server, DEFAULT_IDENTITY_NAME, json!(id)).await;

            Mock::given(method("POST"))
                .and(path(format!("/api/serviceaccounts/{id}/tokens")))
                .and(body_json(json!({"name": DEFAULT_IDENTITY_NAME})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"key": key})))
                .expect(1)
                .mount(&server)
                .await;

            let provisioner =
                CredentialProvisioner::new(server.uri(), AdminCredentials::default());
            let (identity, token) = provisioner.provision_default().await.unwrap();

            assert_eq!(identity.id, id.to_string());
            tokens.push(token.key.expose_secret().to_string());
        }

        assert_eq!(tokens, ["glsa_first_backend", "glsa_second_backend"]);
    }

    #[tokio::test]
    async fn test_account_rejection_is_fatal_and_skips_token_call() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/serviceaccounts"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/serviceaccounts/1/tokens"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provisioner = CredentialProvisioner::new(
            server.uri(),
            AdminCredentials::new("admin", "wrong-password"),
        );
        let err = provisioner.provision("greeter-harness").await.unwrap_err();

        match err {
            ProvisioningError::Rejected { step, status, body } => {
                assert_eq!(step, ProvisioningStep::CreateServiceAccount);
                assert_eq!(status, 401);
                assert!(body.contains("Unauthorized"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_token_rejection_reports_step() {
        let server = MockServer::start().await;
        mount_happy_path(&server, "dup", json!(3)).await;

        Mock::given(method("POST"))
            .and(path("/api/serviceaccounts/3/tokens"))
            .respond_with(ResponseTemplate::new(409).set_body_string(
                r#"{"message":"service account token with given name already exists"}"#,
            ))
            .mount(&server)
            .await;

        let provisioner = CredentialProvisioner::new(server.uri(), AdminCredentials::default());
        let err = provisioner.provision("dup").await.unwrap_err();

        assert!(matches!(
            err,
            ProvisioningError::Rejected {
                step: ProvisioningStep::CreateToken,
                status: 409,
                ..
            }
        ));
        assert!(err.to_string().starts_with("create token rejected"));
    }

    #[tokio::test]
    async fn test_missing_key_is_malformed() {
        let server = MockServer::start().await;
        mount_happy_path(&server, "greeter-harness", json!(9)).await;

        Mock::given(method("POST"))
            .and(path("/api/serviceaccounts/9/tokens"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .mount(&server)
            .await;

        let provisioner = CredentialProvisioner::new(server.uri(), AdminCredentials::default());
        let err = provisioner.provision_default().await.unwrap_err();

        assert!(matches!(
            err,
            ProvisioningError::Malformed {
                step: ProvisioningStep::CreateToken,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_rejection_body_is_sanitized() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/serviceaccounts"))
            .respond_with(
                ResponseTemplate::new(500).set_body_string("leaked glsa_secret_material_123"),
            )
            .mount(&server)
            .await;

        let provisioner = CredentialProvisioner::new(server.uri(), AdminCredentials::default());
        let err = provisioner.provision_default().await.unwrap_err();

        assert!(!err.to_string().contains("glsa_secret_material_123"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let provisioner =
            CredentialProvisioner::new("http://127.0.0.1:9", AdminCredentials::default());
        let err = provisioner.provision_default().await.unwrap_err();

        assert!(matches!(
            err,
            ProvisioningError::Http {
                step: ProvisioningStep::CreateServiceAccount,
                ..
            }
        ));
    }

    #[test]
    fn test_admin_credentials_debug_is_redacted() {
        let debug = format!("{:?}", AdminCredentials::new("admin", "hunter2"));
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let provisioner =
            CredentialProvisioner::new("http://localhost:3000/", AdminCredentials::default());
        assert_eq!(provisioner.base_url(), "http://localhost:3000");
    }
}
