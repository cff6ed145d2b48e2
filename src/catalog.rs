use crate::error::{RegistrationError, Result};
use crate::types::{EventCatalog, EventDescriptor};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Shape of a `catalog.toml` file: a flat list of event tables.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    events: Vec<EventDescriptor>,
}

/// In-memory event catalog for development/testing, optionally seeded from a
/// TOML file. The real deployment fronts the fest backend's events API.
#[derive(Debug)]
pub struct InMemoryCatalog {
    events: Arc<Mutex<HashMap<String, EventDescriptor>>>,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Load a catalog from a TOML file of `[[events]]` tables.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RegistrationError::Config(format!(
                "Failed to read catalog file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let file: CatalogFile = toml::from_str(&content)?;

        let catalog = Self::new();
        for event in file.events {
            catalog.insert(event);
        }
        info!(path = %path.display(), "event catalog loaded");
        Ok(catalog)
    }

    /// Add or replace an event. Individual events are normalized to a team
    /// size of one, matching what the backend enforces on save.
    pub fn insert(&self, mut event: EventDescriptor) {
        if !event.is_team_event {
            event.max_team_size = 1;
        }
        debug!(event = %event.id, name = %event.name, "catalog event registered");
        let mut events = self.events.lock().unwrap();
        events.insert(event.id.clone(), event);
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventCatalog for InMemoryCatalog {
    async fn get_event(&self, event_id: &str) -> Result<EventDescriptor> {
        let events = self.events.lock().unwrap();
        events
            .get(event_id)
            .cloned()
            .ok_or_else(|| RegistrationError::EventNotFound(event_id.to_string()))
    }

    async fn list_events(&self) -> Result<Vec<EventDescriptor>> {
        let events = self.events.lock().unwrap();
        let mut all: Vec<EventDescriptor> = events.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}
