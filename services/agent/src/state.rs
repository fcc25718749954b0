//! Process State
//!
//! Resolves configuration into the objects a session needs: the agent adapter,
//! its standing instructions and the loaded conversation history.

use crate::config::Config;
use anyhow::Context;
use scholar_core::{
    AgentAdapter, HistoryStore, HttpAgent, MockAgent, Session, SessionSettings,
    agent::DEFAULT_AGENT_DESCRIPTION,
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct AppState {
    pub agent: Arc<dyn AgentAdapter>,
    pub settings: SessionSettings,
    pub history: HistoryStore,
}

impl AppState {
    /// Builds the adapter and loads history.
    ///
    /// A configured but unreadable description file is an error; a missing
    /// endpoint selects the mock adapter.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let instructions = match &config.agent_description_path {
            Some(path) => std::fs::read_to_string(path).with_context(|| {
                format!("Failed to read agent description from {}", path.display())
            })?,
            None => DEFAULT_AGENT_DESCRIPTION.to_string(),
        };

        let agent: Arc<dyn AgentAdapter> = match &config.agent_url {
            Some(url) => {
                info!(%url, "Using HTTP agent.");
                Arc::new(HttpAgent::new(
                    url.clone(),
                    config.agent_api_key.clone(),
                    instructions,
                ))
            }
            None => {
                warn!("No AGENT_URL configured. Using mock agent.");
                Arc::new(MockAgent)
            }
        };

        let history = HistoryStore::load(&config.history_dir, config.checkpoint_every);

        Ok(Self {
            agent,
            settings: SessionSettings {
                transcription_model_id: config.transcription_model_id.clone(),
            },
            history,
        })
    }

    pub fn into_session(self) -> Session {
        Session::new(self.agent, self.settings, self.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use tracing::Level;

    fn config(history_dir: PathBuf) -> Config {
        Config {
            agent_url: None,
            agent_api_key: None,
            transcription_model_id: "model".to_string(),
            history_dir,
            checkpoint_every: 3,
            agent_description_path: None,
            log_level: Level::INFO,
        }
    }

    #[tokio::test]
    async fn test_from_config_without_url_uses_mock_agent() {
        let dir = tempdir().unwrap();
        let state = AppState::from_config(&config(dir.path().to_path_buf())).unwrap();
        assert_eq!(state.settings.transcription_model_id, "model");
        assert!(state.history.is_empty());

        let mut session = state.into_session();
        let reply = session.handle(r#"{"prompt": "hello"}"#).await;
        match reply.payload {
            scholar_core::Payload::Text(text) => assert!(text.contains("mock mode")),
            other => panic!("Expected text payload, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_description_file_is_an_error() {
        let dir = tempdir().unwrap();
        let mut config = config(dir.path().to_path_buf());
        config.agent_description_path = Some(dir.path().join("absent.md"));
        let err = AppState::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("absent.md"));
    }
}
