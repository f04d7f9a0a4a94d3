//! Integration tests for emulator token verification

mod common;

use botframework_auth::{
    AuthError, EmulatorAuthenticator, SimpleCredentialProvider, is_token_from_emulator,
};
use common::*;
use serde_json::json;

fn credentials() -> SimpleCredentialProvider {
    SimpleCredentialProvider::new(TEST_APP_ID, TEST_APP_PASSWORD)
}

async fn setup() -> (MockConnectorServer, EmulatorAuthenticator) {
    let mock = MockConnectorServer::start().await;
    mock.mock_signing_keys(None).await;
    let authenticator = EmulatorAuthenticator::new(&mock.metadata_url, key_cache());
    (mock, authenticator)
}

#[tokio::test]
async fn test_version_1_token_uses_appid() {
    let (_mock, authenticator) = setup().await;
    let header = bearer(&mint_token(&emulator_claims(Some("1.0"))));

    let identity = authenticator
        .authenticate_emulator_token(&header, &credentials(), "emulator")
        .await
        .unwrap();

    assert!(identity.is_authenticated());
    assert_eq!(identity.get_claim("appid"), Some(TEST_APP_ID));
}

#[tokio::test]
async fn test_version_2_token_uses_azp() {
    let (_mock, authenticator) = setup().await;
    let header = bearer(&mint_token(&emulator_claims(Some("2.0"))));

    let identity = authenticator
        .authenticate_emulator_token(&header, &credentials(), "emulator")
        .await
        .unwrap();

    assert_eq!(identity.get_claim("azp"), Some(TEST_APP_ID));
    assert_eq!(identity.get_claim("iss"), Some(EMULATOR_ISSUER_V2));
}

#[tokio::test]
async fn test_absent_version_is_treated_as_version_1() {
    let (_mock, authenticator) = setup().await;
    let header = bearer(&mint_token(&emulator_claims(None)));

    let result = authenticator
        .authenticate_emulator_token(&header, &credentials(), "emulator")
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_version_1_without_appid() {
    let (_mock, authenticator) = setup().await;
    let mut claims = emulator_claims(None);
    claims.as_object_mut().unwrap().remove("appid");

    let err = authenticator
        .authenticate_emulator_token(&bearer(&mint_token(&claims)), &credentials(), "emulator")
        .await
        .unwrap_err();

    assert!(matches!(&err, AuthError::MissingClaim(claim) if claim == "appid"));
    assert!(err.to_string().contains("\"appid\" claim is required"));
}

#[tokio::test]
async fn test_version_2_without_azp() {
    let (_mock, authenticator) = setup().await;
    let mut claims = emulator_claims(Some("2.0"));
    claims.as_object_mut().unwrap().remove("azp");

    let result = authenticator
        .authenticate_emulator_token(&bearer(&mint_token(&claims)), &credentials(), "emulator")
        .await;

    assert!(matches!(result, Err(AuthError::MissingClaim(claim)) if claim == "azp"));
}

#[tokio::test]
async fn test_unknown_version() {
    let (_mock, authenticator) = setup().await;
    let header = bearer(&mint_token(&emulator_claims(Some("3.0"))));

    let result = authenticator
        .authenticate_emulator_token(&header, &credentials(), "emulator")
        .await;

    assert!(matches!(result, Err(AuthError::UnknownTokenVersion(v)) if v == "3.0"));
}

#[tokio::test]
async fn test_token_for_other_app() {
    let (_mock, authenticator) = setup().await;
    let mut claims = emulator_claims(Some("1.0"));
    claims["appid"] = json!("someone-else");

    let result = authenticator
        .authenticate_emulator_token(&bearer(&mint_token(&claims)), &credentials(), "emulator")
        .await;

    assert!(matches!(result, Err(AuthError::InvalidAppId(_))));
}

#[tokio::test]
async fn test_channel_token_is_never_accepted() {
    let (_mock, authenticator) = setup().await;
    let header = bearer(&mint_token(&channel_claims("https://smba.trafficmanager.net/amer/")));

    let result = authenticator
        .authenticate_emulator_token(&header, &credentials(), "msteams")
        .await;

    assert!(matches!(result, Err(AuthError::NotAuthenticated)));
}

#[test]
fn test_classifier_partitions_issuers() {
    let emulator = bearer(&mint_token(&emulator_claims(Some("1.0"))));
    let emulator_v2 = bearer(&mint_token(&emulator_claims(Some("2.0"))));
    let channel = bearer(&mint_token(&channel_claims("https://smba.trafficmanager.net/amer/")));

    assert!(is_token_from_emulator(&emulator));
    assert!(is_token_from_emulator(&emulator_v2));
    assert!(!is_token_from_emulator(&channel));
}
