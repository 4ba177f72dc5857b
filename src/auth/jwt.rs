//! JWT Token Handler
//! Mission: Mint and verify the four token kinds with privilege-separated keys
//!
//! Access, refresh and service tokens are signed with the user key. Admin
//! tokens are signed with the admin key, so a leaked user key cannot mint them.

use crate::auth::{
    config::{JwtConfig, ADMIN_TOKEN_TTL_SECS},
    error::AuthError,
    models::{SignedToken, TokenKind, TokenPayload, TokenSubject, UserClaims, TOKEN_ISSUER},
};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// JWT Handler for token operations
#[derive(Debug, Clone)]
pub struct JwtHandler {
    config: JwtConfig,
}

impl JwtHandler {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Mint a token; the expiry is dictated by the kind, never by the caller
    pub fn issue(&self, kind: TokenKind) -> Result<SignedToken, AuthError> {
        let now = Utc::now().timestamp();

        match kind {
            TokenKind::Access { claims, session_id } => self.sign(
                TokenSubject::Access,
                Some(claims),
                Some(session_id),
                now,
                Some(expires_after(now, self.config.access_ttl_secs())?),
            ),
            TokenKind::Refresh { claims, session_id } => self.sign(
                TokenSubject::Refresh,
                Some(claims),
                Some(session_id),
                now,
                Some(expires_after(now, self.config.refresh_ttl_secs())?),
            ),
            TokenKind::Admin => self.sign(
                TokenSubject::Admin,
                None,
                None,
                now,
                Some(expires_after(now, ADMIN_TOKEN_TTL_SECS)?),
            ),
            TokenKind::Service => self.sign(TokenSubject::Service, None, None, now, None),
        }
    }

    /// Sign a new refresh token whose expiry is pinned to an absolute timestamp.
    /// Rotation uses this so a session never outlives its first refresh token.
    pub fn reissue_with_fixed_expiry(
        &self,
        claims: UserClaims,
        session_id: &str,
        expires_at: i64,
    ) -> Result<SignedToken, AuthError> {
        let now = Utc::now().timestamp();
        self.sign(
            TokenSubject::Refresh,
            Some(claims),
            Some(session_id.to_string()),
            now,
            Some(expires_at),
        )
    }

    /// Verify a token of the expected kind and return its payload.
    ///
    /// Checks run in a fixed order: structure, validity window, signature
    /// (against the key for `expected`), then issuer/audience/subject.
    pub fn verify(&self, token: &str, expected: TokenSubject) -> Result<TokenPayload, AuthError> {
        let unverified = decode_unverified(token)?;
        check_validity_window(&unverified, expected, Utc::now().timestamp())?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims = HashSet::new();
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_audience(expected.audience());
        validation.sub = Some(expected.as_str().to_string());

        let decoded = decode::<TokenPayload>(
            token,
            &DecodingKey::from_secret(self.key_for(expected)),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName => AuthError::InvalidSignature,
            ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => AuthError::ExpiredToken,
            _ => AuthError::MalformedToken,
        })?;

        let payload = decoded.claims;
        if matches!(expected, TokenSubject::Access | TokenSubject::Refresh)
            && (payload.claims.is_none() || payload.sid.is_none())
        {
            return Err(AuthError::MalformedToken);
        }

        debug!("Verified {} (jti {})", expected.as_str(), payload.jti);
        Ok(payload)
    }

    /// Verify a user token and return just its claims
    pub fn verify_claims(&self, token: &str, expected: TokenSubject) -> Result<UserClaims, AuthError> {
        self.verify(token, expected)?
            .claims
            .ok_or(AuthError::MalformedToken)
    }

    fn key_for(&self, subject: TokenSubject) -> &[u8] {
        match subject {
            TokenSubject::Admin => self.config.admin_key(),
            _ => self.config.secret_key(),
        }
    }

    fn sign(
        &self,
        subject: TokenSubject,
        claims: Option<UserClaims>,
        session_id: Option<String>,
        now: i64,
        expires_at: Option<i64>,
    ) -> Result<SignedToken, AuthError> {
        let payload = TokenPayload {
            iss: TOKEN_ISSUER.to_string(),
            sub: subject.as_str().to_string(),
            aud: subject.audience().iter().map(|a| a.to_string()).collect(),
            exp: expires_at,
            nbf: now,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            sid: session_id,
            claims,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(self.key_for(subject)),
        )
        .map_err(|e| AuthError::Configuration(format!("failed to sign token: {}", e)))?;

        debug!(
            "Issued {} (jti {}, exp {:?})",
            subject.as_str(),
            payload.jti,
            payload.exp
        );

        Ok(SignedToken { token, payload })
    }
}

fn expires_after(now: i64, ttl_secs: i64) -> Result<i64, AuthError> {
    now.checked_add(ttl_secs)
        .ok_or_else(|| AuthError::Configuration("token expiry out of range".into()))
}

/// Parse the payload without trusting it
fn decode_unverified(token: &str) -> Result<TokenPayload, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    decode::<TokenPayload>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|_| AuthError::MalformedToken)
}

fn check_validity_window(
    payload: &TokenPayload,
    expected: TokenSubject,
    now: i64,
) -> Result<(), AuthError> {
    match payload.exp {
        Some(exp) if now > exp => return Err(AuthError::ExpiredToken),
        None if expected.expires() => return Err(AuthError::MalformedToken),
        _ => {}
    }
    if payload.nbf > now {
        return Err(AuthError::ExpiredToken);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{config::MAX_TTL_SECS, models::UserRole};

    fn handler() -> JwtHandler {
        JwtHandler::new(JwtConfig::new("user-key-1234", "admin-key-5678", 60, 3600).unwrap())
    }

    fn claims() -> UserClaims {
        UserClaims::new("user-1", UserRole::Customer)
    }

    fn access(handler: &JwtHandler) -> SignedToken {
        handler
            .issue(TokenKind::Access {
                claims: claims(),
                session_id: "session-1".to_string(),
            })
            .unwrap()
    }

    #[test]
    fn test_access_and_refresh_round_trip() {
        let handler = handler();

        let token = access(&handler);
        assert_eq!(
            handler.verify_claims(&token.token, TokenSubject::Access).unwrap(),
            claims()
        );

        let refresh = handler
            .issue(TokenKind::Refresh {
                claims: claims(),
                session_id: "session-1".to_string(),
            })
            .unwrap();
        let payload = handler.verify(&refresh.token, TokenSubject::Refresh).unwrap();
        assert_eq!(payload.claims, Some(claims()));
        assert_eq!(payload.sid.as_deref(), Some("session-1"));
        assert_eq!(payload.sub, "refresh-token");
    }

    #[test]
    fn test_access_ttl_shorter_than_refresh() {
        let handler = handler();
        let a = access(&handler);
        let r = handler
            .issue(TokenKind::Refresh {
                claims: claims(),
                session_id: "session-1".to_string(),
            })
            .unwrap();

        assert_eq!(a.payload.exp, Some(a.payload.iat + 60));
        assert_eq!(r.payload.exp, Some(r.payload.iat + 3600));
    }

    #[test]
    fn test_admin_token_has_fixed_window_and_no_claims() {
        let handler = handler();
        let admin = handler.issue(TokenKind::Admin).unwrap();

        assert_eq!(admin.payload.exp, Some(admin.payload.iat + 300));
        assert!(admin.payload.claims.is_none());
        assert_eq!(admin.payload.aud, vec!["admin".to_string()]);

        let payload = handler.verify(&admin.token, TokenSubject::Admin).unwrap();
        assert!(payload.claims.is_none());
    }

    #[test]
    fn test_service_key_never_expires() {
        let handler = handler();
        let key = handler.issue(TokenKind::Service).unwrap();

        assert!(key.payload.exp.is_none());
        assert!(key.payload.claims.is_none());
        assert!(handler.verify(&key.token, TokenSubject::Service).is_ok());
    }

    #[test]
    fn test_expired_token_rejected() {
        let handler = handler();
        let past = Utc::now().timestamp() - 10;
        let token = handler.reissue_with_fixed_expiry(claims(), "s", past).unwrap();

        assert_eq!(
            handler.verify(&token.token, TokenSubject::Refresh),
            Err(AuthError::ExpiredToken)
        );
    }

    #[test]
    fn test_expired_token_reported_even_with_foreign_signature() {
        let foreign = JwtHandler::new(JwtConfig::new("other-user", "other-admin", 60, 3600).unwrap());
        let past = Utc::now().timestamp() - 10;
        let token = foreign.reissue_with_fixed_expiry(claims(), "s", past).unwrap();

        assert_eq!(
            handler().verify(&token.token, TokenSubject::Refresh),
            Err(AuthError::ExpiredToken)
        );
    }

    #[test]
    fn test_user_and_admin_keys_do_not_cross_verify() {
        let handler = handler();

        let user_token = access(&handler);
        assert_eq!(
            handler.verify(&user_token.token, TokenSubject::Admin),
            Err(AuthError::InvalidSignature)
        );

        let admin_token = handler.issue(TokenKind::Admin).unwrap();
        assert_eq!(
            handler.verify(&admin_token.token, TokenSubject::Access),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_different_secrets_reject() {
        let other = JwtHandler::new(JwtConfig::new("secret-a", "secret-b", 60, 3600).unwrap());
        let token = access(&other);

        assert_eq!(
            handler().verify(&token.token, TokenSubject::Access),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_kind_is_malformed() {
        let handler = handler();
        let token = access(&handler);

        assert_eq!(
            handler.verify(&token.token, TokenSubject::Refresh),
            Err(AuthError::MalformedToken)
        );
        // A service key is signed with the user key but is not an access token
        let key = handler.issue(TokenKind::Service).unwrap();
        assert_eq!(
            handler.verify(&key.token, TokenSubject::Access),
            Err(AuthError::MalformedToken)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let handler = handler();
        assert_eq!(
            handler.verify("invalid.token.here", TokenSubject::Access),
            Err(AuthError::MalformedToken)
        );
        assert_eq!(
            handler.verify("", TokenSubject::Access),
            Err(AuthError::MalformedToken)
        );
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let handler = handler();
        let token = access(&handler).token;
        let (head, sig) = token.rsplit_once('.').unwrap();
        let flipped = if sig.starts_with('A') { "B" } else { "A" };
        let tampered = format!("{}.{}{}", head, flipped, &sig[1..]);

        assert_eq!(
            handler.verify(&tampered, TokenSubject::Access),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_reissue_pins_expiry() {
        let handler = handler();
        let pinned = Utc::now().timestamp() + 1234;
        let token = handler.reissue_with_fixed_expiry(claims(), "s", pinned).unwrap();
        let payload = handler.verify(&token.token, TokenSubject::Refresh).unwrap();

        assert_eq!(payload.exp, Some(pinned));
    }

    fn sign_raw(key: &[u8], payload: &TokenPayload) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            payload,
            &EncodingKey::from_secret(key),
        )
        .unwrap()
    }

    #[test]
    fn test_future_not_before_is_expired() {
        let handler = handler();
        let mut payload = access(&handler).payload;
        payload.nbf = Utc::now().timestamp() + 60;
        let token = sign_raw(b"user-key-1234", &payload);

        assert_eq!(
            handler.verify(&token, TokenSubject::Access),
            Err(AuthError::ExpiredToken)
        );
    }

    #[test]
    fn test_expired_access_and_admin_tokens_rejected() {
        let handler = handler();
        let past = Utc::now().timestamp() - 1;

        let mut access_payload = access(&handler).payload;
        access_payload.exp = Some(past);
        let token = sign_raw(b"user-key-1234", &access_payload);
        assert_eq!(
            handler.verify(&token, TokenSubject::Access),
            Err(AuthError::ExpiredToken)
        );

        let mut admin_payload = handler.issue(TokenKind::Admin).unwrap().payload;
        admin_payload.exp = Some(past);
        let token = sign_raw(b"admin-key-5678", &admin_payload);
        assert_eq!(
            handler.verify(&token, TokenSubject::Admin),
            Err(AuthError::ExpiredToken)
        );
    }

    #[test]
    fn test_expiry_overflow_is_configuration_error() {
        assert!(matches!(
            expires_after(i64::MAX - 10, 60),
            Err(AuthError::Configuration(_))
        ));
        assert_eq!(expires_after(100, 60), Ok(160));
    }

    #[test]
    fn test_longest_ttl_issues_valid_refresh() {
        let handler =
            JwtHandler::new(JwtConfig::new("user-key-1234", "admin-key-5678", 60, MAX_TTL_SECS).unwrap());
        let refresh = handler
            .issue(TokenKind::Refresh {
                claims: claims(),
                session_id: "session-1".to_string(),
            })
            .unwrap();

        assert_eq!(refresh.payload.exp, Some(refresh.payload.iat + MAX_TTL_SECS));
        assert!(handler.verify(&refresh.token, TokenSubject::Refresh).is_ok());
    }

    #[test]
    fn test_every_token_is_unique() {
        let handler = handler();
        let a = access(&handler);
        let b = access(&handler);
        assert_ne!(a.token, b.token);
        assert_ne!(a.payload.jti, b.payload.jti);
    }
}
