//! An in-memory reference `Engine`, useful for tests and local demos
//! without a real container runtime. Addresses are pre-seeded by the
//! caller; `start_project` just "starts" every requested service
//! immediately and reports success.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use riptide_core::project::{Project, ServiceKey};
use tokio_stream::wrappers::ReceiverStream;

use crate::{Engine, StartEvent, StartStream};

#[derive(Default)]
pub struct MemoryEngine {
    addresses: RwLock<HashMap<ServiceKey, (String, u16)>>,
    /// Services that should fail to start, reported as a per-service error.
    failing: RwLock<std::collections::HashSet<ServiceKey>>,
    /// Projects whose start stream itself raises instead of yielding
    /// per-service events.
    raising: RwLock<HashMap<String, String>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_address(&self, project: &str, service: &str, host: &str, port: u16) {
        self.addresses.write().unwrap().insert(
            ServiceKey::new(project, service),
            (host.to_string(), port),
        );
    }

    pub fn seed_failure(&self, project: &str, service: &str) {
        self.failing
            .write()
            .unwrap()
            .insert(ServiceKey::new(project, service));
    }

    /// Makes `start_project` for `project` raise `message` as a stream-level
    /// error instead of yielding any per-service events.
    pub fn seed_stream_error(&self, project: &str, message: &str) {
        self.raising
            .write()
            .unwrap()
            .insert(project.to_string(), message.to_string());
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn address_for(&self, project: &Project, service_name: &str) -> Option<(String, u16)> {
        self.addresses
            .read()
            .unwrap()
            .get(&ServiceKey::new(project.name.clone(), service_name))
            .cloned()
    }

    async fn start_project(&self, project: &Project, services: Vec<String>) -> StartStream {
        let (tx, rx) = tokio::sync::mpsc::channel(services.len().max(1));
        let failing = self.failing.read().unwrap().clone();
        let stream_error = self.raising.read().unwrap().get(&project.name).cloned();
        let project_name = project.name.clone();
        tokio::spawn(async move {
            if let Some(message) = stream_error {
                let _ = tx.send(Err(message)).await;
                return;
            }
            for service_name in services {
                let key = ServiceKey::new(project_name.clone(), service_name.clone());
                if failing.contains(&key) {
                    let _ = tx
                        .send(Ok(StartEvent {
                            service_name,
                            finished: true,
                            status: Some(crate::StartStatus::Error(
                                "container failed to start".to_string(),
                            )),
                        }))
                        .await;
                } else {
                    let _ = tx
                        .send(Ok(StartEvent {
                            service_name,
                            finished: true,
                            status: None,
                        }))
                        .await;
                }
            }
        });
        Box::pin(ReceiverStream::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::collections::HashMap as Map;

    fn project(name: &str) -> Project {
        Project {
            name: name.to_string(),
            app: riptide_core::project::App {
                services: Map::new(),
            },
            default_services: None,
        }
    }

    #[tokio::test]
    async fn address_for_returns_seeded_address() {
        let engine = MemoryEngine::new();
        engine.seed_address("demo", "web", "127.0.0.1", 8080);
        let addr = engine.address_for(&project("demo"), "web").await;
        assert_eq!(addr, Some(("127.0.0.1".to_string(), 8080)));
    }

    #[tokio::test]
    async fn address_for_unseeded_service_is_none() {
        let engine = MemoryEngine::new();
        let addr = engine.address_for(&project("demo"), "web").await;
        assert_eq!(addr, None);
    }

    #[tokio::test]
    async fn start_project_reports_finished_for_every_service() {
        let engine = MemoryEngine::new();
        let mut stream = engine
            .start_project(&project("demo"), vec!["web".to_string(), "db".to_string()])
            .await;
        let mut seen = vec![];
        while let Some(event) = stream.next().await {
            let event = event.expect("stream should not raise");
            assert!(event.finished);
            assert!(event.status.is_none());
            seen.push(event.service_name);
        }
        seen.sort();
        assert_eq!(seen, vec!["db".to_string(), "web".to_string()]);
    }

    #[tokio::test]
    async fn start_project_reports_error_for_failing_service() {
        let engine = MemoryEngine::new();
        engine.seed_failure("demo", "web");
        let mut stream = engine
            .start_project(&project("demo"), vec!["web".to_string()])
            .await;
        let event = stream.next().await.unwrap().expect("stream should not raise");
        assert!(event.finished);
        assert!(matches!(event.status, Some(crate::StartStatus::Error(_))));
    }

    #[tokio::test]
    async fn start_project_can_raise_a_stream_level_error() {
        let engine = MemoryEngine::new();
        engine.seed_stream_error("demo", "engine connection lost");
        let mut stream = engine
            .start_project(&project("demo"), vec!["web".to_string()])
            .await;
        let event = stream.next().await.unwrap();
        assert_eq!(event, Err("engine connection lost".to_string()));
        assert!(stream.next().await.is_none());
    }
}
