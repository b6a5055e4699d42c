//! Session registry: login keys, session tokens, and the uid -> player
//! mapping. Credentials are opaque URL-safe strings; the registry is the
//! only authority resolving them.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;

const CREDENTIAL_BYTES: usize = 16;

fn random_credential() -> String {
    let mut bytes = [0u8; CREDENTIAL_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Clone)]
struct ActiveSession {
    player_id: String,
    token: String,
}

#[derive(Debug, Default)]
struct RegistryState {
    /// login key -> uid. One key per uid: a fresh login rotates it.
    keys: HashMap<String, String>,
    key_by_uid: HashMap<String, String>,
    /// session token -> player id.
    tokens: HashMap<String, String>,
    session_by_uid: HashMap<String, ActiveSession>,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
}

/// Credentials minted by `begin_session`.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub player_id: String,
    pub token: String,
    /// Player id of the uid's previous session, if any.
    pub replaces: Option<String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue (or rotate) the login key for a verified uid.
    pub fn issue_key(&self, uid: &str) -> String {
        let mut state = self.state.lock().unwrap();
        if let Some(old_key) = state.key_by_uid.remove(uid) {
            state.keys.remove(&old_key);
        }
        let key = random_credential();
        state.keys.insert(key.clone(), uid.to_string());
        state.key_by_uid.insert(uid.to_string(), key.clone());
        key
    }

    pub fn uid_for_key(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().keys.get(key).cloned()
    }

    pub fn player_for_token(&self, token: &str) -> Option<String> {
        self.state.lock().unwrap().tokens.get(token).cloned()
    }

    /// Allocate a player id and token for a join attempt. The uid's
    /// previous session, if any, is revoked: at most one active session per
    /// uid. The caller decides (against world state) whether the previous
    /// player was still alive and the join must be refused; `rollback`
    /// undoes the grant in that case.
    pub fn begin_session(&self, uid: &str) -> SessionGrant {
        let mut state = self.state.lock().unwrap();
        let replaced = state.session_by_uid.remove(uid);
        let replaces = replaced.map(|old| {
            state.tokens.remove(&old.token);
            old.player_id
        });
        let player_id = uuid::Uuid::new_v4().to_string();
        let token = random_credential();
        state.tokens.insert(token.clone(), player_id.clone());
        state.session_by_uid.insert(
            uid.to_string(),
            ActiveSession {
                player_id: player_id.clone(),
                token: token.clone(),
            },
        );
        SessionGrant {
            player_id,
            token,
            replaces,
        }
    }

    /// Restore the previous session after a refused join.
    pub fn rollback(&self, uid: &str, grant: &SessionGrant, previous_token: Option<String>) {
        let mut state = self.state.lock().unwrap();
        state.tokens.remove(&grant.token);
        state.session_by_uid.remove(uid);
        if let (Some(old_id), Some(old_token)) = (&grant.replaces, previous_token) {
            state.tokens.insert(old_token.clone(), old_id.clone());
            state.session_by_uid.insert(
                uid.to_string(),
                ActiveSession {
                    player_id: old_id.clone(),
                    token: old_token,
                },
            );
        }
    }

    /// Token of the uid's current session, needed to roll a refused join
    /// back.
    pub fn current_token(&self, uid: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .session_by_uid
            .get(uid)
            .map(|session| session.token.clone())
    }
}
