use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::fmt;

/// Bearer token issued by the AnythingLLM API
///
/// The value is opaque to this crate. When it happens to be a JWT carrying an
/// `exp` claim, the expiry is decoded so stale tokens can be refreshed before
/// they are sent; otherwise the expiry is unknown and the token is assumed
/// valid until the server rejects it.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Wrap a token string, decoding its expiry if it is a JWT
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let expires_at = decode_jwt_expiry(&value);
        Self { value, expires_at }
    }

    /// Wrap a token string with an explicit expiry
    pub fn with_expiry(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Raw token value
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Expiry, when known
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the token expires within `buffer` of `now`
    ///
    /// Tokens without a known expiry never report as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>, buffer: chrono::Duration) -> bool {
        self.expires_at
            .is_some_and(|exp| now.checked_add_signed(buffer).is_none_or(|deadline| deadline >= exp))
    }

    /// Whether the token expires within `buffer` from now
    pub fn is_expired(&self, buffer: chrono::Duration) -> bool {
        self.is_expired_at(Utc::now(), buffer)
    }

    /// Local format check: non-empty and free of whitespace/control characters
    pub fn is_well_formed(&self) -> bool {
        !self.value.is_empty()
            && !self
                .value
                .chars()
                .any(|c| c.is_whitespace() || c.is_control())
    }

    /// Token with all but the first four characters masked, for logs
    pub fn masked(&self) -> String {
        mask_secret(&self.value, 4)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &self.masked())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

/// Mask a secret, keeping `visible` leading characters
///
/// Secrets no longer than `visible` are masked entirely.
pub fn mask_secret(secret: &str, visible: usize) -> String {
    let len = secret.chars().count();
    if len <= visible {
        return "*".repeat(len);
    }
    let head: String = secret.chars().take(visible).collect();
    format!("{head}{}", "*".repeat(len - visible))
}

/// Read the `exp` claim of a JWT, if the value is one
fn decode_jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    let exp = claims.get("exp")?;

    #[allow(clippy::cast_possible_truncation)]
    let seconds = exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))?;
    DateTime::from_timestamp(seconds, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u","exp":{exp}}}"#));
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn test_opaque_token_has_no_expiry() {
        let token = Token::new("abc123");
        assert_eq!(token.as_str(), "abc123");
        assert!(token.expires_at().is_none());
        assert!(!token.is_expired(Duration::seconds(300)));
    }

    #[test]
    fn test_jwt_expiry_decoded() {
        let token = Token::new(jwt_with_exp(1_900_000_000));
        assert_eq!(
            token.expires_at(),
            DateTime::from_timestamp(1_900_000_000, 0)
        );
    }

    #[test]
    fn test_jwt_expiry_respects_buffer() {
        let now = Utc::now();
        let token = Token::new(jwt_with_exp(now.timestamp() + 120));

        assert!(!token.is_expired_at(now, Duration::zero()));
        assert!(token.is_expired_at(now, Duration::seconds(300)));
    }

    #[test]
    fn test_malformed_jwt_is_opaque() {
        let token = Token::new("a.not-base64!.c");
        assert!(token.expires_at().is_none());

        let token = Token::new("a.b.c.d");
        assert!(token.expires_at().is_none());
    }

    #[test]
    fn test_well_formed() {
        assert!(Token::new("abc123").is_well_formed());
        assert!(!Token::new("").is_well_formed());
        assert!(!Token::new("abc 123").is_well_formed());
        assert!(!Token::new("abc\n").is_well_formed());
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abc123xyz", 4), "abc1*****");
        assert_eq!(mask_secret("abc", 4), "***");
        assert_eq!(mask_secret("", 4), "");
    }

    #[test]
    fn test_debug_masks_value() {
        let token = Token::new("supersecretvalue");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("supersecretvalue"));
        assert!(rendered.contains("supe"));
    }
}
