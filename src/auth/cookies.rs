use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::jwt::TokenPair;
use crate::config::CookieConfig;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

fn session_cookie(
    cfg: &CookieConfig,
    name: &'static str,
    value: String,
    max_age: Duration,
) -> Cookie<'static> {
    let mut builder = Cookie::build((name, value))
        .http_only(true)
        .secure(cfg.secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age.as_secs() as i64));
    if let Some(domain) = &cfg.domain {
        builder = builder.domain(domain.clone());
    }
    builder.build()
}

fn expired_cookie(cfg: &CookieConfig, name: &'static str) -> Cookie<'static> {
    let mut builder = Cookie::build(name).path("/");
    if let Some(domain) = &cfg.domain {
        builder = builder.domain(domain.clone());
    }
    let mut cookie = builder.build();
    cookie.make_removal();
    cookie
}

pub fn set_session(
    jar: CookieJar,
    cfg: &CookieConfig,
    tokens: TokenPair,
    access_ttl: Duration,
    refresh_ttl: Duration,
) -> CookieJar {
    jar.add(session_cookie(cfg, ACCESS_COOKIE, tokens.access, access_ttl))
        .add(session_cookie(cfg, REFRESH_COOKIE, tokens.refresh, refresh_ttl))
}

/// Overwrites both cookies with expired blanks, whether or not the request sent them.
pub fn clear_session(jar: CookieJar, cfg: &CookieConfig) -> CookieJar {
    jar.add(expired_cookie(cfg, ACCESS_COOKIE))
        .add(expired_cookie(cfg, REFRESH_COOKIE))
}
