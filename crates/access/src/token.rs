//! HS256 JSON Web Tokens.
//!
//! Tokens carry the identity and its resolved scopes so authenticated routes
//! never need to consult the HR store again.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use roleflow_core::{AppError, AppResult};

use crate::identity::{Identity, ScopeSet};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

/// Token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub employee_id: String,
    pub full_name: String,
    pub department: String,
    pub role: String,
    pub accessible_folders: ScopeSet,
    /// Issued-at, seconds since the Unix epoch
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity::new(
            self.employee_id.clone(),
            self.full_name.clone(),
            self.department.clone(),
            self.role.clone(),
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Issues and verifies signed bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> AppResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(AppError::Config(
                "Token signing secret must not be empty".to_string(),
            ));
        }
        Ok(Self { secret, ttl })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, identity: &Identity, scopes: &ScopeSet) -> AppResult<String> {
        self.issue_at(identity, scopes, Utc::now())
    }

    pub fn issue_at(
        &self,
        identity: &Identity,
        scopes: &ScopeSet,
        now: DateTime<Utc>,
    ) -> AppResult<String> {
        let claims = Claims {
            employee_id: identity.employee_id.clone(),
            full_name: identity.full_name.clone(),
            department: identity.department.clone(),
            role: identity.role.clone(),
            accessible_folders: scopes.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let digest = self.mac(signing_input.as_bytes())?.finalize().into_bytes();
        let signature = URL_SAFE_NO_PAD.encode(digest);

        Ok(format!("{}.{}", signing_input, signature))
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        self.verify_at(token, Utc::now())
    }

    /// Rejects malformed, tampered, non-HS256 and expired tokens.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AppResult<Claims> {
        let mut parts = token.split('.');
        let (header_b64, payload_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => return Err(invalid_token("malformed token")),
            };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(invalid_token("unsupported algorithm"));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| invalid_token("malformed signature"))?;

        let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
        self.mac(signing_input.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| invalid_token("bad signature"))?;

        let claims: Claims = decode_segment(payload_b64)?;
        if now.timestamp() >= claims.exp {
            return Err(invalid_token("token expired"));
        }

        Ok(claims)
    }

    fn mac(&self, data: &[u8]) -> AppResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Config(format!("Invalid signing key: {}", e)))?;
        mac.update(data);
        Ok(mac)
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> AppResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| invalid_token("malformed segment"))?;
    serde_json::from_slice(&bytes).map_err(|_| invalid_token("malformed segment"))
}

fn invalid_token(reason: &str) -> AppError {
    tracing::debug!("Rejected token: {}", reason);
    AppError::Authentication("Invalid or expired token".to_string())
}
