use content_portal::{
    AppError,
    models::{Role, User},
    token::{Claims, TokenError, TokenService},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};

const SECRET: &str = "token-test-secret";
const NOW: i64 = 1_750_000_000;

fn alice() -> User {
    User {
        id: 42,
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        password_hash: String::new(),
        role: Role::Standard,
    }
}

fn claims_for(user: &User, exp: i64) -> Claims {
    Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: user.role,
        iat: NOW,
        exp,
    }
}

#[test]
fn issued_token_verifies_with_same_secret() {
    let service = TokenService::new(SECRET, 24);
    let issued = service.issue_at(&alice(), NOW).unwrap();

    assert_eq!(issued.expires_at, NOW + 24 * 3600);
    let claims = service.verify_at(&issued.token, NOW + 1).unwrap();
    assert_eq!(claims.user_id(), Some(42));
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.role, Role::Standard);
    assert_eq!(claims.exp, issued.expires_at);
}

#[test]
fn token_is_expired_from_exp_onwards() {
    let service = TokenService::new(SECRET, 1);
    let issued = service.issue_at(&alice(), NOW).unwrap();

    assert!(service.verify_at(&issued.token, issued.expires_at - 1).is_ok());
    assert_eq!(
        service.verify_at(&issued.token, issued.expires_at),
        Err(TokenError::Expired)
    );
    assert_eq!(
        service.verify_at(&issued.token, issued.expires_at + 3600),
        Err(TokenError::Expired)
    );
}

#[test]
fn wrong_secret_is_invalid() {
    let issued = TokenService::new(SECRET, 24).issue_at(&alice(), NOW).unwrap();
    let other = TokenService::new("some-other-secret", 24);
    assert_eq!(other.verify_at(&issued.token, NOW), Err(TokenError::Invalid));
}

#[test]
fn other_hmac_algorithms_are_rejected() {
    // Same secret, valid signature, but not HS256.
    let token = encode(
        &Header::new(Algorithm::HS512),
        &claims_for(&alice(), NOW + 3600),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    let service = TokenService::new(SECRET, 24);
    assert_eq!(service.verify_at(&token, NOW), Err(TokenError::Invalid));
}

#[test]
fn unsigned_token_is_rejected() {
    // Header {"alg":"none","typ":"JWT"}, a genuine payload, no signature.
    let issued = TokenService::new(SECRET, 24).issue_at(&alice(), NOW).unwrap();
    let payload = issued.token.split('.').nth(1).unwrap();
    let forged = format!("eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{payload}.");

    let service = TokenService::new(SECRET, 24);
    assert_eq!(service.verify_at(&forged, NOW), Err(TokenError::Invalid));
}

#[test]
fn tampered_payload_is_rejected() {
    let service = TokenService::new(SECRET, 24);
    let issued = service.issue_at(&alice(), NOW).unwrap();

    // Splice in the payload of a token for another user, keeping the signature.
    let mut bob = alice();
    bob.id = 43;
    let other = service.issue_at(&bob, NOW).unwrap();
    let parts: Vec<&str> = issued.token.split('.').collect();
    let other_payload = other.token.split('.').nth(1).unwrap();
    let forged = format!("{}.{}.{}", parts[0], other_payload, parts[2]);

    assert_eq!(service.verify_at(&forged, NOW), Err(TokenError::Invalid));
}

#[test]
fn garbage_is_invalid() {
    let service = TokenService::new(SECRET, 24);
    for token in ["", "abc", "a.b.c", "not a token at all"] {
        assert_eq!(service.verify_at(token, NOW), Err(TokenError::Invalid), "{token:?}");
    }
}

#[test]
fn non_numeric_subject_is_invalid() {
    let mut claims = claims_for(&alice(), NOW + 3600);
    claims.sub = "alice".to_string();
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let service = TokenService::new(SECRET, 24);
    assert_eq!(service.verify_at(&token, NOW), Err(TokenError::Invalid));
}

#[test]
fn out_of_range_lifetime_does_not_panic() {
    let service = TokenService::new(SECRET, i64::MAX);
    let issued = service.issue_at(&alice(), NOW).unwrap();
    assert!(issued.expires_at > NOW);

    // An expiry that would overflow is an error, not a wrapped timestamp.
    assert!(matches!(
        service.issue_at(&alice(), i64::MAX - 10),
        Err(AppError::Internal(_))
    ));
}
