//! Callback token tests

use chrono::{Duration, Utc};
use fayda_core::{CallbackPayload, CallbackToken, Error, VERIFICATION_STATUS};

const SECRET: &str = "3704f48dd839be71ca06e7446f7ec126d3424375c99ab3745a1092f820beea2a";

fn payload() -> CallbackPayload {
    CallbackPayload {
        client_id: "client-1".to_string(),
        user_id: "user-1".to_string(),
        fan: "1234567890123456".to_string(),
        photo: "https://portal.example/p.png".to_string(),
        name: "Abebe Kebede Tesfaye".to_string(),
        first_name: "Abebe".to_string(),
        middle_name: "Kebede".to_string(),
        last_name: "Tesfaye".to_string(),
        email: "abebe@example.com".to_string(),
        region: "Addis Ababa".to_string(),
        date_of_birth: "12/05/1991".to_string(),
        zone: "Region 14".to_string(),
        gender: "Male".to_string(),
        woreda: "Bole".to_string(),
        nationality: "Ethiopian".to_string(),
        phone_number: "+251911223344".to_string(),
        verification_status: VERIFICATION_STATUS.to_string(),
    }
}

#[test]
fn test_token_verifies_with_subscriber_secret() {
    let token = CallbackToken::sign(&payload(), SECRET).unwrap();
    let decoded = CallbackToken::verify(token.as_str(), SECRET).unwrap();
    assert_eq!(decoded, payload());
}

#[test]
fn test_token_expires_after_five_minutes() {
    let issued = Utc::now();
    let token = CallbackToken::sign_at(&payload(), SECRET, issued).unwrap();
    assert_eq!(token.expires_at() - issued, Duration::minutes(5));

    let stale = CallbackToken::sign_at(&payload(), SECRET, Utc::now() - Duration::minutes(6)).unwrap();
    let err = CallbackToken::verify(stale.as_str(), SECRET).unwrap_err();
    assert!(matches!(err, Error::TokenExpired));
}

#[test]
fn test_wrong_secret_rejected() {
    let token = CallbackToken::sign(&payload(), SECRET).unwrap();
    let err = CallbackToken::verify(token.as_str(), "some-other-secret").unwrap_err();
    assert!(matches!(err, Error::Jwt(_)));
}

#[test]
fn test_tampered_token_rejected() {
    let token = CallbackToken::sign(&payload(), SECRET).unwrap().into_string();
    let mut parts: Vec<String> = token.split('.').map(String::from).collect();
    parts[1] = parts[1].chars().rev().collect();
    let tampered = parts.join(".");
    assert!(CallbackToken::verify(&tampered, SECRET).is_err());
}

#[test]
fn test_token_uses_hs256_header() {
    let token = CallbackToken::sign(&payload(), SECRET).unwrap();
    let header = jsonwebtoken::decode_header(token.as_str()).unwrap();
    assert_eq!(header.alg, jsonwebtoken::Algorithm::HS256);
}
