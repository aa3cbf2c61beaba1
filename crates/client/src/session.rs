use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use serde::{Deserialize, Serialize};

use crate::{
    storage::SessionStorage,
    types::UserProfile,
};

pub const STORAGE_KEY: &str = "auth-storage";
const PERSIST_VERSION: u32 = 1;

pub type SubscriptionId = u64;
type Listener = Arc<dyn Fn(&SessionSnapshot) + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct SessionState {
    user: Option<UserProfile>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl SessionState {
    fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some() && self.refresh_token.is_some()
    }
}

/// Point-in-time view of the session handed to subscribers.
///
/// `hydrated` distinguishes "not yet loaded from disk" from "loaded and
/// empty"; authorization decisions (redirects included) must wait for it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<UserProfile>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub is_authenticated: bool,
    pub hydrated: bool,
}

/// Durable local mirror of `{user, access token, refresh token}` with
/// explicit subscribe/unsubscribe semantics. Injected where needed rather
/// than reached through a global.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    state: Mutex<SessionState>,
    hydrated: AtomicBool,
    listeners: Mutex<HashMap<SubscriptionId, Listener>>,
    next_subscription_id: AtomicU64,
}

#[derive(Serialize, Deserialize)]
struct PersistedSession {
    state: PersistedState,
    version: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    #[serde(default)]
    user: Option<UserProfile>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    is_authenticated: bool,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Arc<Self> {
        Arc::new(Self {
            storage,
            state: Mutex::new(SessionState::default()),
            hydrated: AtomicBool::new(false),
            listeners: Mutex::new(HashMap::new()),
            next_subscription_id: AtomicU64::new(1),
        })
    }

    /// Loads the persisted session. Storage failures and malformed payloads
    /// are logged and treated as "no session"; the backend stays the source
    /// of truth.
    pub fn hydrate(&self) {
        let state = match self.storage.get(STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<PersistedSession>(&raw) {
                Ok(persisted) => SessionState {
                    user: persisted.state.user,
                    access_token: persisted.state.access_token,
                    refresh_token: persisted.state.refresh_token,
                },
                Err(err) => {
                    tracing::warn!(error = %err, "discarding malformed persisted session");
                    SessionState::default()
                }
            },
            Ok(None) => SessionState::default(),
            Err(err) => {
                tracing::warn!(error = %err, "session storage read failed, starting empty");
                SessionState::default()
            }
        };

        *self.state.lock().expect("session mutex poisoned") = state;
        self.hydrated.store(true, Ordering::SeqCst);
        self.notify();
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated.load(Ordering::SeqCst)
    }

    /// False until hydration completes, no matter what is on disk.
    pub fn is_authenticated(&self) -> bool {
        self.is_hydrated()
            && self
                .state
                .lock()
                .expect("session mutex poisoned")
                .is_authenticated()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state
            .lock()
            .expect("session mutex poisoned")
            .access_token
            .clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state
            .lock()
            .expect("session mutex poisoned")
            .refresh_token
            .clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state
            .lock()
            .expect("session mutex poisoned")
            .user
            .clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().expect("session mutex poisoned");
        SessionSnapshot {
            user: state.user.clone(),
            access_token: state.access_token.clone(),
            refresh_token: state.refresh_token.clone(),
            is_authenticated: self.is_hydrated() && state.is_authenticated(),
            hydrated: self.is_hydrated(),
        }
    }

    pub fn set_session(&self, user: UserProfile, access_token: String, refresh_token: String) {
        self.mutate(|state| {
            state.user = Some(user);
            state.access_token = Some(access_token);
            state.refresh_token = Some(refresh_token);
        });
    }

    /// Rotation: both credentials move together; the old refresh token is
    /// dead the moment the backend answered.
    pub fn set_tokens(&self, access_token: String, refresh_token: String) {
        self.mutate(|state| {
            state.access_token = Some(access_token);
            state.refresh_token = Some(refresh_token);
        });
    }

    pub fn clear(&self) {
        {
            let mut state = self.state.lock().expect("session mutex poisoned");
            *state = SessionState::default();
        }
        if let Err(err) = self.storage.remove(STORAGE_KEY) {
            tracing::warn!(error = %err, "failed to clear persisted session");
        }
        self.notify();
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SessionSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .expect("listener mutex poisoned")
            .insert(id, Arc::new(listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners
            .lock()
            .expect("listener mutex poisoned")
            .remove(&id)
            .is_some()
    }

    fn mutate(&self, apply: impl FnOnce(&mut SessionState)) {
        let persisted = {
            let mut state = self.state.lock().expect("session mutex poisoned");
            apply(&mut state);
            PersistedSession {
                state: PersistedState {
                    user: state.user.clone(),
                    access_token: state.access_token.clone(),
                    refresh_token: state.refresh_token.clone(),
                    is_authenticated: state.is_authenticated(),
                },
                version: PERSIST_VERSION,
            }
        };

        self.persist(&persisted);
        self.notify();
    }

    fn persist(&self, persisted: &PersistedSession) {
        let raw = match serde_json::to_string(persisted) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize session");
                return;
            }
        };

        if let Err(err) = self.storage.set(STORAGE_KEY, &raw) {
            tracing::warn!(error = %err, "failed to persist session");
        }
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        let listeners: Vec<Listener> = {
            let guard = self.listeners.lock().expect("listener mutex poisoned");
            guard.values().cloned().collect()
        };

        for listener in listeners {
            listener(&snapshot);
        }
    }
}
