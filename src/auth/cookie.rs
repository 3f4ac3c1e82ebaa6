use axum::http::{header, HeaderMap, HeaderValue};

pub const SESSION_COOKIE: &str = "jwt";

fn attributes(production: bool) -> &'static str {
    if production {
        "HttpOnly; Path=/; SameSite=None; Secure"
    } else {
        "HttpOnly; Path=/; SameSite=Lax"
    }
}

pub fn session_cookie(token: &str, max_age_secs: u64, production: bool) -> anyhow::Result<HeaderValue> {
    let value = format!(
        "{}={}; Max-Age={}; {}",
        SESSION_COOKIE,
        token,
        max_age_secs,
        attributes(production)
    );
    Ok(HeaderValue::from_str(&value)?)
}

pub fn clear_session_cookie(production: bool) -> HeaderValue {
    let value = format!("{}=; Max-Age=0; {}", SESSION_COOKIE, attributes(production));
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("jwt=; Max-Age=0"))
}

/// Reads the session token from any `Cookie` header on the request.
pub fn read_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
