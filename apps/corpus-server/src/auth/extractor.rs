// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated and authorized principals.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(principal): Auth) -> impl IntoResponse {
//!     // principal is AuthenticatedPrincipal
//! }
//! ```
//!
//! Use `Authorized<P>` to additionally run a named guard policy.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use super::guard::GuardPolicy;
use super::{AuthError, AuthenticatedPrincipal};
use crate::state::AppState;
use crate::storage::PrincipalRepository;

/// Extractor for authenticated principals.
///
/// Validates the bearer token, then loads the principal it names. Unknown
/// and inactive principals are rejected with 401.
pub struct Auth(pub AuthenticatedPrincipal);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Reuse a principal resolved earlier in this request
        if let Some(principal) = parts.extensions.get::<AuthenticatedPrincipal>().cloned() {
            return Ok(Auth(principal));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = state.tokens.verify(token)?;
        let principal_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::MalformedToken)?;

        let stored = PrincipalRepository::new(&state.db)
            .get(&principal_id)
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .ok_or(AuthError::UnknownPrincipal)?;

        if !stored.is_active {
            return Err(AuthError::InactiveAccount);
        }

        let principal = AuthenticatedPrincipal::from_stored(&stored, &claims);
        parts.extensions.insert(principal.clone());
        Ok(Auth(principal))
    }
}

/// Extractor that authenticates, then applies the guard policy `P`.
///
/// # Example
///
/// ```rust,ignore
/// async fn user_roles(
///     Authorized(principal, _): Authorized<UsersRead>,
/// ) -> impl IntoResponse {
///     // Only principals allowed users:GET reach here
/// }
/// ```
pub struct Authorized<P: GuardPolicy>(pub AuthenticatedPrincipal, pub PhantomData<fn() -> P>);

impl<P: GuardPolicy> Authorized<P> {
    pub fn into_inner(self) -> AuthenticatedPrincipal {
        self.0
    }
}

impl<P: GuardPolicy> FromRequestParts<AppState> for Authorized<P> {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(principal) = Auth::from_request_parts(parts, state).await?;
        let principal = P::guard().check(&state.authz, principal)?;
        Ok(Authorized(principal, PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::guard::{RequireAdmin, UsersRead};
    use crate::auth::Role;
    use crate::state::test_support::test_state;
    use crate::storage::RoleRepository;
    use axum::http::Request;

    fn parts_with_token(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (state, _dir) = test_state();
        let mut parts = parts_with_token(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_non_bearer_scheme() {
        let (state, _dir) = test_state();
        let mut parts = Request::builder()
            .uri("/test")
            .header("Authorization", "Basic abc")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_resolves_principal() {
        let (state, _dir) = test_state();
        let stored = PrincipalRepository::new(&state.db)
            .find_or_create_by_phone("+919000000050")
            .unwrap();
        let token = state.tokens.issue(&stored.id).unwrap();
        let mut parts = parts_with_token(Some(&token.access_token));

        let Auth(principal) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(principal.principal_id, stored.id);
        assert_eq!(principal.phone_number, "+919000000050");
    }

    #[tokio::test]
    async fn auth_extractor_rejects_unknown_principal() {
        let (state, _dir) = test_state();
        let token = state.tokens.issue(&Uuid::new_v4()).unwrap();
        let mut parts = parts_with_token(Some(&token.access_token));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::UnknownPrincipal)));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_inactive_principal() {
        let (state, _dir) = test_state();
        let repo = PrincipalRepository::new(&state.db);
        let stored = repo.find_or_create_by_phone("+919000000051").unwrap();
        repo.set_active(&stored.id, false).unwrap();
        let token = state.tokens.issue(&stored.id).unwrap();
        let mut parts = parts_with_token(Some(&token.access_token));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InactiveAccount)));
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let (state, _dir) = test_state();
        let mut parts = parts_with_token(None);
        let principal = AuthenticatedPrincipal {
            principal_id: Uuid::new_v4(),
            phone_number: "+919000000052".to_string(),
            is_active: true,
            expires_at: 0,
        };
        parts.extensions.insert(principal.clone());

        let Auth(found) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(found, principal);
    }

    #[tokio::test]
    async fn authorized_applies_policy() {
        let (state, _dir) = test_state();
        let stored = PrincipalRepository::new(&state.db)
            .find_or_create_by_phone("+919000000053")
            .unwrap();
        RoleRepository::new(&state.db)
            .assign(&stored.id, Role::Reviewer)
            .unwrap();
        let token = state.tokens.issue(&stored.id).unwrap();

        let mut parts = parts_with_token(Some(&token.access_token));
        let allowed = Authorized::<UsersRead>::from_request_parts(&mut parts, &state).await;
        assert_eq!(allowed.unwrap().into_inner().principal_id, stored.id);

        let mut parts = parts_with_token(Some(&token.access_token));
        let denied = Authorized::<RequireAdmin>::from_request_parts(&mut parts, &state).await;
        assert!(matches!(denied, Err(AuthError::InsufficientPermissions(_))));
    }
}
