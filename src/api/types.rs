//! Shared types for the HTTP/WS layer: request context, the
//! bearer-token session registry and one-time WebSocket tickets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::rooms::RoomCoordinator;

/// One-time WS ticket lifetime.
const WS_TICKET_TTL: Duration = Duration::from_secs(30);

// ═══════════════════════════════════════════════════════════
// API context — shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub coordinator: RoomCoordinator,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub ws_tickets: Arc<Mutex<WsTicketStore>>,
}

impl ApiContext {
    pub fn new(coordinator: RoomCoordinator) -> Self {
        Self {
            coordinator,
            sessions: Arc::new(Mutex::new(SessionStore::new())),
            ws_tickets: Arc::new(Mutex::new(WsTicketStore::new())),
        }
    }

    /// Register a session for an authenticated platform user and return
    /// its bearer token. Called by the embedding platform (and tests) —
    /// wardsim itself never authenticates credentials.
    pub fn issue_session(&self, user_id: Uuid, username: &str) -> String {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .issue(user_id, username.to_string())
    }
}

/// Authenticated user context, injected into request extensions by the
/// auth middleware after token validation.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: Uuid,
    pub username: String,
}

// ═══════════════════════════════════════════════════════════
// Session registry — external auth at its interface
// ═══════════════════════════════════════════════════════════

/// Bearer-token session registry.
///
/// Credential checking is the platform's job; this store only maps
/// already-issued tokens to user identities. Tokens are kept as
/// SHA-256 hashes so a leaked store dump is not a leaked token set.
pub struct SessionStore {
    sessions: HashMap<[u8; 32], UserContext>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Issue a fresh token for a user.
    pub fn issue(&mut self, user_id: Uuid, username: String) -> String {
        let token = generate_token();
        self.sessions
            .insert(hash_token(&token), UserContext { user_id, username });
        token
    }

    /// Validate a bearer token.
    pub fn validate(&self, token: &str) -> Option<UserContext> {
        self.sessions.get(&hash_token(token)).cloned()
    }

    /// Revoke a token. Returns whether it existed.
    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(&hash_token(token)).is_some()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

// ═══════════════════════════════════════════════════════════
// WS ticket store — one-time WebSocket upgrade tokens
// ═══════════════════════════════════════════════════════════

/// One-time WebSocket upgrade ticket.
/// Prevents session token exposure in WS query params.
struct WsTicket {
    user_id: Uuid,
    username: String,
    expires_at: Instant,
}

/// Store for one-time WebSocket upgrade tickets.
pub struct WsTicketStore {
    tickets: HashMap<String, WsTicket>,
}

impl WsTicketStore {
    pub fn new() -> Self {
        Self {
            tickets: HashMap::new(),
        }
    }

    /// Issue a one-time ticket for the given user.
    pub fn issue(&mut self, user_id: Uuid, username: String) -> String {
        self.cleanup();
        let ticket = Uuid::new_v4().to_string();
        self.tickets.insert(
            ticket.clone(),
            WsTicket {
                user_id,
                username,
                expires_at: Instant::now() + WS_TICKET_TTL,
            },
        );
        ticket
    }

    /// Consume a ticket (one-time use). Returns (user_id, username).
    pub fn consume(&mut self, ticket: &str) -> Option<(Uuid, String)> {
        let entry = self.tickets.remove(ticket)?;
        if Instant::now() > entry.expires_at {
            return None;
        }
        Some((entry.user_id, entry.username))
    }

    fn cleanup(&mut self) {
        let now = Instant::now();
        self.tickets.retain(|_, t| now < t.expires_at);
    }
}

impl Default for WsTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_issue_and_validate() {
        let mut store = SessionStore::new();
        let user_id = Uuid::new_v4();
        let token = store.issue(user_id, "lea".into());

        let ctx = store.validate(&token).unwrap();
        assert_eq!(ctx.user_id, user_id);
        assert_eq!(ctx.username, "lea");
    }

    #[test]
    fn session_rejects_unknown_token() {
        let store = SessionStore::new();
        assert!(store.validate("not-a-token").is_none());
    }

    #[test]
    fn session_revoke_invalidates_token() {
        let mut store = SessionStore::new();
        let token = store.issue(Uuid::new_v4(), "lea".into());
        assert!(store.revoke(&token));
        assert!(store.validate(&token).is_none());
        assert!(!store.revoke(&token));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
        assert!(!t1.is_empty());
    }

    #[test]
    fn hash_token_is_deterministic() {
        assert_eq!(hash_token("test"), hash_token("test"));
        assert_ne!(hash_token("token-a"), hash_token("token-b"));
    }

    #[test]
    fn ws_ticket_consume_valid() {
        let mut store = WsTicketStore::new();
        let user_id = Uuid::new_v4();
        let ticket = store.issue(user_id, "lea".into());

        let (consumed_id, username) = store.consume(&ticket).unwrap();
        assert_eq!(consumed_id, user_id);
        assert_eq!(username, "lea");
    }

    #[test]
    fn ws_ticket_is_one_time_use() {
        let mut store = WsTicketStore::new();
        let ticket = store.issue(Uuid::new_v4(), "lea".into());
        assert!(store.consume(&ticket).is_some());
        assert!(store.consume(&ticket).is_none());
    }

    #[test]
    fn ws_ticket_unknown_rejected() {
        let mut store = WsTicketStore::new();
        assert!(store.consume("nonexistent").is_none());
    }

    #[test]
    fn ws_ticket_expired_rejected() {
        let mut store = WsTicketStore::new();
        store.tickets.insert(
            "expired-ticket".to_string(),
            WsTicket {
                user_id: Uuid::new_v4(),
                username: "lea".into(),
                expires_at: Instant::now() - Duration::from_secs(1),
            },
        );
        assert!(store.consume("expired-ticket").is_none());
    }
}
