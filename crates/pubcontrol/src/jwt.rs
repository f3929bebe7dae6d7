//! HS256 JSON Web Tokens for endpoint authentication.

use crate::{PubControlError, PubControlResult};
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Base64url engine used for every JWT segment.
const BASE64URL: base64::engine::GeneralPurpose = base64::engine::general_purpose::URL_SAFE_NO_PAD;

#[derive(Serialize)]
struct JwtHeader {
    typ: &'static str,
    alg: &'static str,
}

const HEADER: JwtHeader = JwtHeader {
    typ: "JWT",
    alg: "HS256",
};

/// An immutable JWT claim set.
///
/// Claims keep insertion order, so the encoded token is stable for a given
/// set of claims and key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Claims seeded with an issuer.
    pub fn issuer(iss: impl Into<String>) -> Self {
        Self::new().with("iss", Value::String(iss.into()))
    }

    /// Return a copy with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn has_expiry(&self) -> bool {
        self.0.contains_key("exp")
    }

    /// Derive a new claim set carrying `exp`, leaving `self` untouched.
    pub fn with_expiry(&self, exp: i64) -> Claims {
        self.clone().with("exp", exp)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Encode and sign `claims` with HMAC-SHA256.
pub fn sign(claims: &Claims, key: &[u8]) -> PubControlResult<String> {
    let header = BASE64URL.encode(serde_json::to_vec(&HEADER)?);
    let payload = BASE64URL.encode(serde_json::to_vec(&claims.0)?);
    let signing_input = format!("{header}.{payload}");

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| PubControlError::Config(format!("invalid JWT key: {e}")))?;
    mac.update(signing_input.as_bytes());
    let signature = BASE64URL.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
}

/// Decode the claim segment of a token without verifying it.
#[cfg(test)]
pub(crate) fn decode_claims(token: &str) -> Map<String, Value> {
    let payload = token.split('.').nth(1).unwrap();
    serde_json::from_slice(&BASE64URL.decode(payload).unwrap()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_known_vector() {
        let claims = Claims::issuer("hello").with("exp", 1426106601);
        let token = sign(&claims, &[0x91, 0xec]).unwrap();
        assert_eq!(
            token,
            "eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9.\
             eyJpc3MiOiJoZWxsbyIsImV4cCI6MTQyNjEwNjYwMX0.\
             92NIP0QPWbA-wRgsTA6zCwxejMgLkHep0S4UcAY3tN4"
        );
    }

    #[test]
    fn test_with_expiry_leaves_source_claims_untouched() {
        let claims = Claims::issuer("realm");
        let derived = claims.with_expiry(42);

        assert!(!claims.has_expiry());
        assert_eq!(derived.get("exp"), Some(&Value::from(42)));
        assert_eq!(derived.get("iss"), Some(&Value::from("realm")));
    }

    #[test]
    fn test_decode_claims_roundtrip() {
        let claims = Claims::issuer("realm").with("exp", 7);
        let token = sign(&claims, b"key").unwrap();
        let decoded = decode_claims(&token);
        assert_eq!(&decoded, claims.as_map());
    }

    #[test]
    fn test_different_keys_different_signatures() {
        let claims = Claims::issuer("realm").with("exp", 7);
        let a = sign(&claims, b"key-a").unwrap();
        let b = sign(&claims, b"key-b").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.rsplit_once('.').unwrap().0, b.rsplit_once('.').unwrap().0);
    }
}
