//! Actor extraction.
//!
//! Authentication itself happens upstream. An auth middleware may insert an [`Actor`]
//! into the request extensions; otherwise the trusted gateway headers
//! `x-actor-id` and `x-actor-role` are read.

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use scandesk_core::models::{Actor, Role};
use scandesk_core::AppError;

use crate::constants::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
use crate::error::HttpAppError;

/// Authenticated actor for the current request. Rejects with 401 when absent.
#[derive(Debug, Clone, Copy)]
pub struct AuthActor(pub Actor);

// Works alongside Multipart because it only touches the request parts.
impl<S> FromRequestParts<S> for AuthActor
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(actor) = parts.extensions.get::<Actor>() {
            return Ok(AuthActor(*actor));
        }
        actor_from_headers(&parts.headers)
            .map(AuthActor)
            .map_err(HttpAppError::from)
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", name)))?
        .to_str()
        .map_err(|_| AppError::Unauthorized(format!("Malformed {} header", name)))
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let actor_id = header_value(headers, ACTOR_ID_HEADER)?
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::Unauthorized(format!("{} must be an integer", ACTOR_ID_HEADER)))?;
    let role = header_value(headers, ACTOR_ROLE_HEADER)?
        .parse::<Role>()
        .map_err(AppError::Unauthorized)?;
    Ok(Actor::new(actor_id, role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(id: &str, role: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_ID_HEADER, HeaderValue::from_str(id).unwrap());
        headers.insert(ACTOR_ROLE_HEADER, HeaderValue::from_str(role).unwrap());
        headers
    }

    #[test]
    fn test_actor_from_gateway_headers() {
        let actor = actor_from_headers(&headers("17", "Manager")).unwrap();
        assert_eq!(actor, Actor::new(17, Role::Manager));
        assert!(actor.is_elevated());
    }

    #[test]
    fn test_missing_or_invalid_headers_are_unauthorized() {
        assert!(matches!(
            actor_from_headers(&HeaderMap::new()),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            actor_from_headers(&headers("abc", "admin")),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            actor_from_headers(&headers("3", "janitor")),
            Err(AppError::Unauthorized(_))
        ));
    }
}
