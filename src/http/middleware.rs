//! Authentication middleware and JWT verification

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::app::AppState;
use crate::util::time::unix_millis;

type HmacSha256 = Hmac<Sha256>;

/// `aud` claim of Supabase user sessions
const EXPECTED_AUDIENCE: &str = "authenticated";

/// Header carrying the matchmaker's shared secret
pub const SERVICE_KEY_HEADER: &str = "x-service-key";

/// JWT claims from Supabase auth token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Audience
    #[serde(default)]
    pub aud: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: u64,
    /// Email (if available)
    #[serde(default)]
    pub email: Option<String>,
    /// Role
    #[serde(default)]
    pub role: Option<String>,
}

/// Verify a JWT token and extract claims
pub fn verify_jwt(token: &str, secret: &str) -> Result<JwtClaims, AuthError> {
    // Split token into parts
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::InvalidToken);
    }

    let header_b64 = parts[0];
    let payload_b64 = parts[1];
    let signature_b64 = parts[2];

    // Verify signature (HMAC-SHA256)
    let message = format!("{}.{}", header_b64, payload_b64);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    mac.update(message.as_bytes());

    let provided_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::InvalidToken)?;
    mac.verify_slice(&provided_signature)
        .map_err(|_| AuthError::InvalidToken)?;

    // Decode payload
    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    let claims: JwtClaims = serde_json::from_slice(&payload_json)
        .map_err(|_| AuthError::InvalidToken)?;

    // Check expiration
    let now = unix_millis() / 1000;
    if claims.exp < now {
        return Err(AuthError::TokenExpired);
    }

    if claims.aud.as_deref().is_some_and(|aud| aud != EXPECTED_AUDIENCE) {
        return Err(AuthError::InvalidAudience);
    }

    Ok(claims)
}

/// Extract JWT from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid authorization header format")]
    InvalidFormat,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid audience")]
    InvalidAudience,

    #[error("Invalid service key")]
    InvalidServiceKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::MissingHeader => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat => StatusCode::BAD_REQUEST,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::InvalidAudience => StatusCode::UNAUTHORIZED,
            AuthError::InvalidServiceKey => StatusCode::FORBIDDEN,
        };

        (status, self.to_string()).into_response()
    }
}

/// Authenticated user extractor result
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub claims: JwtClaims,
}

/// Middleware to require authentication
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingHeader)?;

    let token = extract_bearer_token(auth_header).ok_or(AuthError::InvalidFormat)?;

    let claims = verify_jwt(token, &state.config.supabase_jwt_secret)?;

    let auth_user = AuthenticatedUser {
        user_id: claims.sub,
        claims,
    };

    // Insert into request extensions for handlers to access
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Middleware for service-to-service routes (the matchmaker)
pub async fn require_service_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let provided = request
        .headers()
        .get(SERVICE_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingHeader)?;

    if !constant_time_eq(provided.as_bytes(), state.config.match_service_key.as_bytes()) {
        return Err(AuthError::InvalidServiceKey);
    }

    Ok(next.run(request).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn sign(claims: serde_json::Value, secret: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", header, payload).as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}.{}", header, payload, signature)
    }

    fn claims(exp: u64, aud: &str) -> serde_json::Value {
        serde_json::json!({
            "sub": "6f1c1f7e-98a5-4d63-9a8c-3c1f0b5e2a11",
            "aud": aud,
            "exp": exp,
            "role": "authenticated",
        })
    }

    fn in_an_hour() -> u64 {
        unix_millis() / 1000 + 3600
    }

    #[test]
    fn valid_token_yields_subject() {
        let token = sign(claims(in_an_hour(), "authenticated"), SECRET);
        let claims = verify_jwt(&token, SECRET).unwrap();
        assert_eq!(claims.sub.to_string(), "6f1c1f7e-98a5-4d63-9a8c-3c1f0b5e2a11");
    }

    #[test]
    fn tampered_or_foreign_tokens_are_rejected() {
        let token = sign(claims(in_an_hour(), "authenticated"), "other-secret");
        assert!(matches!(verify_jwt(&token, SECRET), Err(AuthError::InvalidToken)));
        assert!(matches!(verify_jwt("not-a-jwt", SECRET), Err(AuthError::InvalidToken)));

        let token = sign(claims(in_an_hour(), "anon-service"), SECRET);
        assert!(matches!(verify_jwt(&token, SECRET), Err(AuthError::InvalidAudience)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign(claims(1, "authenticated"), SECRET);
        assert!(matches!(verify_jwt(&token, SECRET), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn service_key_comparison() {
        assert!(constant_time_eq(b"matchmaker", b"matchmaker"));
        assert!(!constant_time_eq(b"matchmaker", b"matchmakes"));
        assert!(!constant_time_eq(b"match", b"matchmaker"));
    }
}
