//! Shared gateway state: configuration, the connection registry, per-client
//! sessions, and the turn pipeline.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use botan_core::{
    ConnectionRegistry, CoreConfig, GenerationBridge, PersonaProfile, Session, TurnPipeline,
};

use crate::voice::VoiceBridge;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: CoreConfig,
    pub persona: PersonaProfile,
    pub registry: ConnectionRegistry,
    /// One session per client id; the per-session mutex serializes the
    /// lagged evaluation and the pipeline run for each inbound message.
    pub sessions: DashMap<String, Arc<Mutex<Session>>>,
    pub pipeline: TurnPipeline,
    pub voice: VoiceBridge,
}

impl AppState {
    pub fn new(config: CoreConfig, bridge: Arc<dyn GenerationBridge>) -> Self {
        let persona = PersonaProfile::default();
        let pipeline = TurnPipeline::new(
            bridge,
            persona.clone(),
            Duration::from_secs(config.generation_timeout_secs),
        );
        let voice = VoiceBridge::new(&config.voice_service_url);
        Self {
            persona,
            registry: ConnectionRegistry::new(),
            sessions: DashMap::new(),
            pipeline,
            voice,
            config,
        }
    }

    /// Fetches or creates the session for a client id.
    pub fn session_for(&self, client_id: &str) -> Arc<Mutex<Session>> {
        self.sessions
            .entry(client_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new())))
            .clone()
    }

    /// Best-effort persistence of one client's session record.
    pub async fn persist_session(&self, client_id: &str) {
        let Some(session) = self.sessions.get(client_id).map(|s| s.clone()) else {
            return;
        };
        let session = session.lock().await;
        if session.turns().is_empty() {
            return;
        }
        match session.persist(&self.config.session_dir, &self.config.model) {
            Ok(path) => {
                tracing::info!(target: "botan::gateway", client_id, path = %path.display(), "session record written")
            }
            Err(e) => {
                tracing::warn!(target: "botan::gateway", client_id, error = %e, "session persistence failed")
            }
        }
    }
}
