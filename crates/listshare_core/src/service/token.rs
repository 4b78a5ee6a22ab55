//! Signed session tokens.
//!
//! Format: `base64url(claims_json) "." base64url(hmac_sha256(claims_json))`
//! without padding. Verification checks the signature before trusting any
//! claim, then compares expiry against the caller's clock.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject user id.
    pub sub: Uuid,
    /// Issued-at, epoch ms.
    pub iat: i64,
    /// Expiry, epoch ms.
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired { expired_at: i64 },
}

impl Display for TokenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed => write!(f, "session token is malformed"),
            Self::BadSignature => write!(f, "session token signature mismatch"),
            Self::Expired { expired_at } => write!(f, "session token expired at {expired_at}"),
        }
    }
}

impl Error for TokenError {}

/// Issues a token for `sub` valid for `ttl_ms` from `now_ms`.
pub fn issue_token(secret: &[u8], sub: Uuid, now_ms: i64, ttl_ms: i64) -> String {
    let claims = TokenClaims {
        sub,
        iat: now_ms,
        exp: now_ms.saturating_add(ttl_ms),
    };
    // Serializing a struct of a UUID and two integers cannot fail.
    let payload = serde_json::to_vec(&claims).unwrap_or_default();
    let signature = sign(secret, &payload);
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(&payload),
        URL_SAFE_NO_PAD.encode(signature)
    )
}

/// Verifies signature and expiry, returning the embedded claims.
pub fn verify_token(secret: &[u8], token: &str, now_ms: i64) -> Result<TokenClaims, TokenError> {
    let (payload_b64, signature_b64) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| TokenError::Malformed)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::Malformed)?;

    let mut mac = new_mac(secret);
    mac.update(&payload);
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let claims: TokenClaims =
        serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
    if now_ms >= claims.exp {
        return Err(TokenError::Expired {
            expired_at: claims.exp,
        });
    }
    Ok(claims)
}

fn sign(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(secret);
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

fn new_mac(secret: &[u8]) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(secret).expect("hmac accepts keys of any length")
}

#[cfg(test)]
mod tests {
    use super::{issue_token, verify_token, TokenError};
    use uuid::Uuid;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn issued_token_verifies_until_expiry() {
        let sub = Uuid::new_v4();
        let token = issue_token(SECRET, sub, 1_000, 500);

        let claims = verify_token(SECRET, &token, 1_499).unwrap();
        assert_eq!(claims.sub, sub);
        assert_eq!(claims.exp, 1_500);

        assert_eq!(
            verify_token(SECRET, &token, 1_500),
            Err(TokenError::Expired { expired_at: 1_500 })
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = issue_token(SECRET, Uuid::new_v4(), 0, 1_000);
        let (_, signature) = token.split_once('.').unwrap();
        let forged_claims = format!(
            r#"{{"sub":"{}","iat":0,"exp":9999999999999}}"#,
            Uuid::new_v4()
        );
        let forged = format!(
            "{}.{}",
            base64::Engine::encode(
                &base64::engine::general_purpose::URL_SAFE_NO_PAD,
                forged_claims
            ),
            signature
        );
        assert_eq!(verify_token(SECRET, &forged, 1), Err(TokenError::BadSignature));
    }

    #[test]
    fn other_secret_is_rejected() {
        let token = issue_token(SECRET, Uuid::new_v4(), 0, 1_000);
        assert_eq!(
            verify_token(b"another-secret-value", &token, 1),
            Err(TokenError::BadSignature)
        );
        assert_eq!(verify_token(SECRET, "garbage", 1), Err(TokenError::Malformed));
    }
}
