use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use super::errors::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Verifier for the static API bearer token.
///
/// Tokens are compared as HMAC-SHA256 tags under a random per-process key,
/// so the comparison is constant-time and the configured token is not kept
/// around in raw form.
#[derive(Clone)]
pub struct ApiAuth {
    key: [u8; 16],
    expected: Vec<u8>,
}

impl ApiAuth {
    pub fn new(token: &str) -> Self {
        let key = *Uuid::new_v4().as_bytes();
        let expected = tag(&key, token);
        Self { key, expected }
    }

    pub fn verify(&self, presented: &str) -> bool {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(presented.as_bytes());
        mac.verify_slice(&self.expected).is_ok()
    }
}

fn tag(key: &[u8], token: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(token.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Rejects requests without a valid `Authorization: Bearer <token>` header
/// before they reach any handler.
pub async fn require_bearer(
    State(auth): State<ApiAuth>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if auth.verify(token) => Ok(next.run(request).await),
        _ => Err(ApiError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_configured_token() {
        let auth = ApiAuth::new("s3cret");
        assert!(auth.verify("s3cret"));
    }

    #[test]
    fn rejects_other_tokens() {
        let auth = ApiAuth::new("s3cret");
        assert!(!auth.verify("s3cret2"));
        assert!(!auth.verify(""));
        assert!(!auth.verify("S3CRET"));
    }
}
