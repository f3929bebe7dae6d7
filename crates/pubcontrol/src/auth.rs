//! Per-endpoint credentials and `Authorization` header generation.

use crate::clock::Clock;
use crate::jwt::{self, Claims};
use crate::PubControlResult;
use base64::Engine;
use std::time::Duration;

/// Base64 encoding engine for basic credentials.
const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

#[derive(Debug, Clone)]
struct BasicCredentials {
    username: String,
    password: String,
}

#[derive(Debug, Clone)]
struct JwtCredentials {
    claims: Claims,
    key: Vec<u8>,
}

/// Credential state of one endpoint client.
///
/// Several schemes may be configured at once; the header is chosen in order
/// basic, JWT, bearer.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    basic: Option<BasicCredentials>,
    jwt: Option<JwtCredentials>,
    bearer: Option<String>,
}

impl AuthState {
    /// Use HTTP basic credentials.
    pub fn set_basic(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.basic = Some(BasicCredentials {
            username: username.into(),
            password: password.into(),
        });
    }

    /// Use HS256 tokens signed with `key`.
    pub fn set_jwt(&mut self, claims: Claims, key: impl Into<Vec<u8>>) {
        self.jwt = Some(JwtCredentials {
            claims,
            key: key.into(),
        });
    }

    /// Use a fixed bearer token.
    pub fn set_bearer(&mut self, token: impl Into<String>) {
        self.bearer = Some(token.into());
    }

    /// The configured JWT claims, if any.
    pub fn jwt_claims(&self) -> Option<&Claims> {
        self.jwt.as_ref().map(|jwt| &jwt.claims)
    }

    /// Build the `Authorization` header value, or `None` for anonymous access.
    ///
    /// JWT claims without `exp` are signed as a copy expiring `jwt_ttl` after
    /// `clock`'s current time; an explicit `exp` is never replaced.
    pub fn header(&self, clock: &dyn Clock, jwt_ttl: Duration) -> PubControlResult<Option<String>> {
        if let Some(basic) = &self.basic {
            let encoded = BASE64.encode(format!("{}:{}", basic.username, basic.password));
            return Ok(Some(format!("Basic {encoded}")));
        }

        if let Some(jwt) = &self.jwt {
            let token = if jwt.claims.has_expiry() {
                jwt::sign(&jwt.claims, &jwt.key)?
            } else {
                let ttl = i64::try_from(jwt_ttl.as_secs()).unwrap_or(i64::MAX);
                let exp = clock.now_utc_seconds().saturating_add(ttl);
                jwt::sign(&jwt.claims.with_expiry(exp), &jwt.key)?
            };
            return Ok(Some(format!("Bearer {token}")));
        }

        Ok(self.bearer.as_ref().map(|token| format!("Bearer {token}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::DEFAULT_JWT_TTL;
    use serde_json::Value;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_header_none() {
        let auth = AuthState::default();
        assert_eq!(auth.header(&FixedClock(NOW), DEFAULT_JWT_TTL).unwrap(), None);
    }

    #[test]
    fn test_header_basic() {
        let mut auth = AuthState::default();
        auth.set_basic("user", "pass");
        assert_eq!(
            auth.header(&FixedClock(NOW), DEFAULT_JWT_TTL).unwrap().as_deref(),
            Some("Basic dXNlcjpwYXNz")
        );
    }

    #[test]
    fn test_header_jwt_with_explicit_exp() {
        let mut auth = AuthState::default();
        auth.set_jwt(Claims::issuer("hello").with("exp", 1426106601), vec![0x91, 0xec]);
        assert_eq!(
            auth.header(&FixedClock(NOW), DEFAULT_JWT_TTL).unwrap().as_deref(),
            Some(
                "Bearer eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9.\
                 eyJpc3MiOiJoZWxsbyIsImV4cCI6MTQyNjEwNjYwMX0.\
                 92NIP0QPWbA-wRgsTA6zCwxejMgLkHep0S4UcAY3tN4"
            )
        );
    }

    #[test]
    fn test_header_jwt_default_expiry() {
        let mut auth = AuthState::default();
        auth.set_jwt(Claims::issuer("realm"), b"secret".to_vec());

        let header = auth.header(&FixedClock(NOW), DEFAULT_JWT_TTL).unwrap().unwrap();
        let token = header.strip_prefix("Bearer ").unwrap();
        let claims = jwt::decode_claims(token);

        assert_eq!(claims["exp"], Value::from(NOW + 3600));
        assert_eq!(claims["iss"], "realm");
        // stored claims are not mutated
        assert!(!auth.jwt_claims().unwrap().has_expiry());
    }

    #[test]
    fn test_header_jwt_custom_ttl() {
        let mut auth = AuthState::default();
        auth.set_jwt(Claims::issuer("realm"), b"secret".to_vec());

        let header = auth
            .header(&FixedClock(NOW), Duration::from_secs(60))
            .unwrap()
            .unwrap();
        let claims = jwt::decode_claims(header.strip_prefix("Bearer ").unwrap());
        assert_eq!(claims["exp"], Value::from(NOW + 60));
    }

    #[test]
    fn test_header_jwt_huge_ttl_saturates() {
        let mut auth = AuthState::default();
        auth.set_jwt(Claims::issuer("realm"), b"secret".to_vec());

        let header = auth
            .header(&FixedClock(NOW), Duration::from_secs(u64::MAX))
            .unwrap()
            .unwrap();
        let claims = jwt::decode_claims(header.strip_prefix("Bearer ").unwrap());
        assert_eq!(claims["exp"], Value::from(i64::MAX));
    }

    #[test]
    fn test_header_bearer() {
        let mut auth = AuthState::default();
        auth.set_bearer("static-token");
        assert_eq!(
            auth.header(&FixedClock(NOW), DEFAULT_JWT_TTL).unwrap().as_deref(),
            Some("Bearer static-token")
        );
    }

    #[test]
    fn test_header_precedence() {
        let mut auth = AuthState::default();
        auth.set_bearer("static-token");
        auth.set_jwt(Claims::issuer("realm").with("exp", 1), b"k".to_vec());
        let header = auth.header(&FixedClock(NOW), DEFAULT_JWT_TTL).unwrap().unwrap();
        assert!(header.starts_with("Bearer ey"));

        auth.set_basic("user", "pass");
        let header = auth.header(&FixedClock(NOW), DEFAULT_JWT_TTL).unwrap().unwrap();
        assert_eq!(header, "Basic dXNlcjpwYXNz");
    }
}
