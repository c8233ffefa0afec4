use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use url::form_urlencoded;

use super::{AdminState, error::ApiError};

const TOKEN_QUERY_KEY: &str = "token";

/// Gate for every `/cache*` route. Accepts `?token=` or `Authorization: Bearer`.
pub(super) async fn admin_auth(
    State(state): State<AdminState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let token = query_token(request.uri().query())
        .or_else(|| bearer_token(request.headers().get(AUTHORIZATION)));

    match token {
        Some(token) if state.token.verify(&token) => next.run(request).await,
        _ => ApiError::unauthorized().into_response(),
    }
}

fn query_token(query: Option<&str>) -> Option<String> {
    form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == TOKEN_QUERY_KEY)
        .map(|(_, value)| value.into_owned())
}

fn bearer_token(header: Option<&axum::http::HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?;
    Some(bearer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_read_from_query() {
        assert_eq!(
            query_token(Some("type=warm&token=a%2Bb")).as_deref(),
            Some("a+b")
        );
        assert_eq!(query_token(Some("type=warm")), None);
        assert_eq!(query_token(None), None);
    }

    #[test]
    fn bearer_prefix_is_required() {
        let header = axum::http::HeaderValue::from_static("Bearer abc");
        assert_eq!(bearer_token(Some(&header)).as_deref(), Some("abc"));
        let basic = axum::http::HeaderValue::from_static("Basic abc");
        assert_eq!(bearer_token(Some(&basic)), None);
    }
}
