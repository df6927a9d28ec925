use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use cosmos_provision::external::{AzureCredentials, ServicePrincipalCredential, TokenProvider};
use cosmos_provision::{ManagementError, ProvisionConfig};

fn credential(server: &MockServer) -> ServicePrincipalCredential {
    let mut config = ProvisionConfig::default();
    config.azure.authority_host = server.uri();
    let credentials = AzureCredentials {
        client_id: "app-id".to_string(),
        client_secret: "app-secret".to_string(),
        tenant_id: "tenant-id".to_string(),
        subscription_id: "sub-id".to_string(),
    };
    ServicePrincipalCredential::new(credentials, &config.azure).unwrap()
}

#[tokio::test]
async fn test_rejected_secret_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    let err = credential(&server).token().await.unwrap_err();
    assert!(matches!(err, ManagementError::Authentication { .. }));
}
