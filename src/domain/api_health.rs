use crate::domain::model::ApiAlert;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use tracing::debug;

const EXPIRY_WARNING_SECONDS: i64 = 3 * 24 * 3600;

/// Inspects the `exp` claim of a JWT access token without contacting the
/// issuer. Expired tokens raise an error alert, tokens with less than three
/// days left a warning. A refresh token suppresses both. Tokens that are not
/// JWTs, or carry no `exp`, raise nothing.
pub fn check_token_expiry(
    token: &str,
    source: &str,
    now: DateTime<Utc>,
    has_refresh_token: bool,
) -> Option<ApiAlert> {
    let expires_at = match jwt_expiry(token) {
        Some(exp) => exp,
        None => {
            debug!("No decodable expiry in {} token", source);
            return None;
        }
    };
    if has_refresh_token {
        return None;
    }

    let remaining = expires_at - now.timestamp();
    if remaining <= 0 {
        let hours_ago = (-remaining) as f64 / 3600.0;
        return Some(ApiAlert::error(
            source,
            format!("{} token expired {:.0}h ago", source, hours_ago),
        ));
    }
    if remaining < EXPIRY_WARNING_SECONDS {
        let hours_left = remaining as f64 / 3600.0;
        let left = if hours_left >= 24.0 {
            format!("{:.1} days", hours_left / 24.0)
        } else {
            format!("{:.0} hours", hours_left)
        };
        return Some(ApiAlert::warning(
            source,
            format!("{} token expires in {}", source, left),
        ));
    }
    None
}

fn jwt_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;
    exp.as_i64().or_else(|| exp.as_f64().map(|v| v as i64))
}
