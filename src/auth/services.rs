use axum_extra::extract::cookie::{Cookie, SameSite};
use lazy_static::lazy_static;
use regex::Regex;

use super::{
    dto::{AuthResponse, PublicUser},
    extractors::SESSION_COOKIE,
    jwt::{normalize_email, JwtKeys},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Signs a fresh access/refresh pair for `email`.
pub fn issue_pair(keys: &JwtKeys, email: &str) -> anyhow::Result<AuthResponse> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        anyhow::bail!("invalid email {email:?}");
    }
    Ok(AuthResponse {
        access_token: keys.sign_access(&email)?,
        refresh_token: keys.sign_refresh(&email)?,
        user: PublicUser {
            email: Some(email),
            scoped: true,
        },
    })
}

pub fn session_cookie(access_token: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, access_token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;

    fn keys() -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: "s".into(),
            issuer: "i".into(),
            audience: "a".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
    }

    #[test]
    fn issue_pair_normalizes_email() {
        let keys = keys();
        let pair = issue_pair(&keys, "  Ana@Example.COM").unwrap();
        assert_eq!(pair.user.email.as_deref(), Some("ana@example.com"));
        assert_eq!(keys.verify_refresh(&pair.refresh_token).unwrap().sub, "ana@example.com");
        assert!(issue_pair(&keys, "nope").is_err());
    }

    #[test]
    fn session_cookie_is_http_only() {
        let cookie = session_cookie("tok");
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}
