// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer token authentication for the gateway.
//!
//! Every API route requires a token that resolves to a party id; the
//! middleware rejects everything else before a handler runs (fail-closed).
//! WebSocket upgrades carry the token as a query parameter instead and are
//! resolved during the handshake in [`crate::ws`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use sibyl_core::types::PartyId;

/// Maps a presented bearer token to the party it authenticates.
///
/// The production implementation is a static table from config; credential
/// issuance and rotation live outside the platform.
pub trait TokenResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Option<PartyId>;
}

/// Token table built from `[[auth.tokens]]` config entries.
pub struct StaticTokenResolver {
    tokens: HashMap<String, PartyId>,
}

impl StaticTokenResolver {
    /// Builds the table from `(token, party)` pairs.
    ///
    /// An empty table is legal and leaves the gateway fail-closed: every
    /// authenticated route rejects.
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let tokens: HashMap<String, PartyId> = entries
            .into_iter()
            .map(|(token, party)| (token, PartyId::new(party)))
            .collect();
        if tokens.is_empty() {
            tracing::warn!("no auth tokens configured; every authenticated route will reject");
        }
        Self { tokens }
    }
}

impl TokenResolver for StaticTokenResolver {
    fn resolve(&self, token: &str) -> Option<PartyId> {
        self.tokens.get(token).cloned()
    }
}

impl std::fmt::Debug for StaticTokenResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenResolver")
            .field("tokens", &format_args!("[{} redacted]", self.tokens.len()))
            .finish()
    }
}

/// The authenticated party, inserted into request extensions by
/// [`auth_middleware`] and read back by every API handler.
#[derive(Debug, Clone)]
pub struct Identity(pub PartyId);

/// Auth state shared by the middleware and the WebSocket handshake.
#[derive(Clone)]
pub struct AuthState {
    pub resolver: Arc<dyn TokenResolver>,
}

/// Middleware resolving `Authorization: Bearer <token>` to an [`Identity`].
///
/// A missing header, a malformed header, or an unknown token all answer 401
/// without reaching the handler.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(party) = token.and_then(|t| auth.resolver.resolve(t)) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    request.extensions_mut().insert(Identity(party));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> StaticTokenResolver {
        StaticTokenResolver::new([
            ("tok-client".to_string(), "client-1".to_string()),
            ("tok-advisor".to_string(), "advisor-1".to_string()),
        ])
    }

    #[test]
    fn known_tokens_resolve_to_their_party() {
        let resolver = resolver();
        assert_eq!(resolver.resolve("tok-client"), Some(PartyId::new("client-1")));
        assert_eq!(resolver.resolve("tok-advisor"), Some(PartyId::new("advisor-1")));
    }

    #[test]
    fn unknown_token_does_not_resolve() {
        assert_eq!(resolver().resolve("tok-mallory"), None);
    }

    #[test]
    fn empty_table_rejects_everything() {
        let resolver = StaticTokenResolver::new([]);
        assert_eq!(resolver.resolve(""), None);
        assert_eq!(resolver.resolve("any"), None);
    }

    #[test]
    fn debug_output_redacts_token_values() {
        let debug = format!("{:?}", resolver());
        assert!(!debug.contains("tok-client"));
        assert!(!debug.contains("client-1"));
        assert!(debug.contains("2 redacted"));
    }
}
