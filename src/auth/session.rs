use std::time::Duration;

use axum::extract::FromRef;
use axum_extra::extract::cookie::{Cookie, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::SessionConfig, state::AppState};

pub const SESSION_COOKIE: &str = "sessionid";

/// Payload of the signed session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,   // user ID
    pub sid: Uuid,   // session row ID
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String, // issuer
}

/// Signs and verifies session cookies.
#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub ttl: Duration,
    pub cookie_secure: bool,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        SessionKeys::new(&state.config.session)
    }
}

impl SessionKeys {
    pub fn new(cfg: &SessionConfig) -> Self {
        let SessionConfig {
            secret,
            issuer,
            ttl_minutes,
            cookie_secure,
        } = cfg.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            ttl: Duration::from_secs((ttl_minutes.max(1) as u64) * 60),
            cookie_secure,
        }
    }

    /// When a session started now would expire.
    pub fn expires_at(&self, now: OffsetDateTime) -> OffsetDateTime {
        now + TimeDuration::seconds(self.ttl.as_secs() as i64)
    }

    pub fn sign(&self, user_id: Uuid, session_id: Uuid, expires_at: OffsetDateTime) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user_id,
            sid: session_id,
            iat: now.unix_timestamp() as usize,
            exp: expires_at.unix_timestamp() as usize,
            iss: self.issuer.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, session_id = %session_id, "session token signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, session_id = %data.claims.sid, "session token verified");
        Ok(data.claims)
    }

    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.cookie_secure)
            .max_age(TimeDuration::seconds(self.ttl.as_secs() as i64))
            .build()
    }
}

/// An already-expired session cookie; sent on logout whether or not the
/// browser presented one.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn make_keys(secret: &str, issuer: &str) -> SessionKeys {
        let mut cfg = AppConfig::for_tests().session;
        cfg.secret = secret.into();
        cfg.issuer = issuer.into();
        SessionKeys::new(&cfg)
    }

    #[test]
    fn sign_and_verify_session_token() {
        let keys = make_keys("dev-secret", "test-issuer");
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let exp = keys.expires_at(OffsetDateTime::now_utc());
        let token = keys.sign(user_id, session_id, exp).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.sid, session_id);
        assert_eq!(claims.iss, "test-issuer");
    }

    #[test]
    fn verify_rejects_other_secret_or_issuer() {
        let good = make_keys("same-secret", "good-iss");
        let exp = good.expires_at(OffsetDateTime::now_utc());
        let token = good.sign(Uuid::new_v4(), Uuid::new_v4(), exp).unwrap();

        assert!(make_keys("same-secret", "bad-iss").verify(&token).is_err());
        assert!(make_keys("other-secret", "good-iss").verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys("dev-secret", "iss");
        let past = OffsetDateTime::now_utc() - TimeDuration::hours(1);
        let token = keys.sign(Uuid::new_v4(), Uuid::new_v4(), past).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_garbage() {
        let keys = make_keys("dev-secret", "iss");
        assert!(keys.verify("not.a.token").is_err());
    }

    #[test]
    fn session_cookie_attributes() {
        let keys = make_keys("dev-secret", "iss");
        let cookie = keys.cookie("tok".into());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(TimeDuration::minutes(5)));
    }

    #[test]
    fn removal_cookie_is_expired() {
        let cookie = removal_cookie();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(TimeDuration::ZERO));
        assert!(cookie.to_string().contains("Max-Age=0"));
    }
}
