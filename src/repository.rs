//! The authoritative character collection.
//!
//! Every mutation clones the current snapshot, applies the change, writes the
//! whole collection to the store and only then publishes it. A failed write
//! leaves both the published snapshot and the store as they were.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::model::{Ability, Character, CharacterForm, CharacterHistory, ScenarioGroup};
use crate::storage::{KeyValueStore, StorageError};
use crate::views;

/// Store slot holding the JSON array of characters.
pub const COLLECTION_KEY: &str = "character_vault.characters";

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Character not found: {0}")]
    NotFound(String),
    #[error("Invalid character data: {0}")]
    InvalidData(String),
    #[error("Characters could not be saved: {0}")]
    Storage(#[from] StorageError),
}

/// Receives a serialized character whenever one is handed out for download.
pub trait ExportSink: Send + Sync {
    fn export(&self, file_name: &str, json: &str) -> anyhow::Result<()>;
}

pub fn new_character_id() -> String {
    Uuid::new_v4().to_string()
}

/// Pretty JSON in the shape accepted by [`CharacterRepository::import_from_json`].
pub fn to_export_json(character: &Character) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(character)
}

/// Lenient view of an exported file. Identity and timestamps are ignored.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct CharacterImport {
    creator_name: Option<String>,
    character_name: Option<String>,
    scenario: Option<String>,
    age: Option<String>,
    height: Option<String>,
    weight: Option<String>,
    role: Option<String>,
    abilities: Option<Vec<Ability>>,
    physical_chars: Option<String>,
    personality: Option<String>,
    motivation: Option<String>,
    history: Option<CharacterHistory>,
    image: Option<String>,
}

impl TryFrom<CharacterImport> for CharacterForm {
    type Error = RepositoryError;

    fn try_from(import: CharacterImport) -> Result<Self, Self::Error> {
        fn required(value: Option<String>, field: &str) -> Result<String, RepositoryError> {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| RepositoryError::InvalidData(format!("missing {}", field)))
        }

        let character_name = required(import.character_name, "characterName")?;
        let creator_name = required(import.creator_name, "creatorName")?;
        let scenario = required(import.scenario, "scenario")?;
        let (history_content, history_file_name) = match import.history {
            Some(history) => (Some(history.content), history.file_name),
            None => (None, None),
        };

        Ok(CharacterForm {
            creator_name,
            character_name,
            scenario,
            age: import.age,
            height: import.height,
            weight: import.weight,
            role: import.role,
            abilities: import.abilities.unwrap_or_default(),
            physical_chars: import.physical_chars,
            personality: import.personality,
            motivation: import.motivation,
            history_content,
            history_file_name,
            image: import.image,
        })
    }
}

fn read_collection<S: KeyValueStore>(store: &S) -> Vec<Character> {
    match store.get(COLLECTION_KEY) {
        Ok(Some(data)) => match serde_json::from_str(&data) {
            Ok(characters) => characters,
            Err(e) => {
                log::error!("Stored characters are unreadable, starting empty: {}", e);
                Vec::new()
            }
        },
        Ok(None) => Vec::new(),
        Err(e) => {
            log::error!("Could not load characters, starting empty: {}", e);
            Vec::new()
        }
    }
}

pub struct CharacterRepository<S> {
    store: Arc<S>,
    snapshot: watch::Sender<Vec<Character>>,
    exporter: Option<Box<dyn ExportSink>>,
    auto_export: bool,
}

impl<S: KeyValueStore> CharacterRepository<S> {
    /// Reads the persisted collection. Anything unreadable yields an empty one.
    pub fn load(store: Arc<S>) -> Self {
        let characters = read_collection(store.as_ref());
        log::debug!("Loaded {} characters", characters.len());
        let (snapshot, _) = watch::channel(characters);
        Self {
            store,
            snapshot,
            exporter: None,
            auto_export: true,
        }
    }

    /// Hands every created or updated character, and explicit exports, to `exporter`.
    pub fn with_exporter<E: ExportSink + 'static>(mut self, exporter: E) -> Self {
        self.exporter = Some(Box::new(exporter));
        self
    }

    /// Toggles the export that follows each create and update.
    pub fn auto_export(mut self, enabled: bool) -> Self {
        self.auto_export = enabled;
        self
    }

    /// Latest snapshot now, then one full snapshot per successful mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Character>> {
        self.snapshot.subscribe()
    }

    pub fn list(&self) -> Vec<Character> {
        self.snapshot.borrow().clone()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Character> {
        self.snapshot.borrow().iter().find(|c| c.id == id).cloned()
    }

    pub fn scenario_groups(&self) -> Vec<ScenarioGroup> {
        views::group_by_scenario(&self.snapshot.borrow())
    }

    pub fn characters_in_scenario(&self, label: &str) -> Vec<Character> {
        views::filter_by_scenario(&self.snapshot.borrow(), label)
    }

    pub fn create(&self, form: CharacterForm) -> Result<Character, RepositoryError> {
        let mut character = Character::from_form(new_character_id(), form, Utc::now());
        let created = self.commit(move |characters| {
            while characters.iter().any(|c| c.id == character.id) {
                character.id = new_character_id();
            }
            characters.push(character.clone());
            Ok(character)
        })?;

        log::info!(
            "Created character {:?} ({})",
            created.character_name,
            created.id
        );
        if self.auto_export {
            self.export_as_json(&created);
        }
        Ok(created)
    }

    /// Replaces the form-owned fields of `id` in place.
    pub fn update(&self, id: &str, form: CharacterForm) -> Result<Character, RepositoryError> {
        let now = Utc::now();
        let updated = self.commit(move |characters| {
            let existing = characters
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
            existing.apply_form(form, now);
            Ok(existing.clone())
        })?;

        log::info!(
            "Updated character {:?} ({})",
            updated.character_name,
            updated.id
        );
        if self.auto_export {
            self.export_as_json(&updated);
        }
        Ok(updated)
    }

    /// Removes `id` and returns the record that was removed.
    pub fn delete(&self, id: &str) -> Result<Character, RepositoryError> {
        let removed = self.commit(|characters| {
            let index = characters
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
            Ok(characters.remove(index))
        })?;

        log::info!(
            "Deleted character {:?} ({})",
            removed.character_name,
            removed.id
        );
        Ok(removed)
    }

    /// Creates a character from an exported file. The import always gets a new id.
    pub fn import_from_json(&self, text: &str) -> Result<Character, RepositoryError> {
        let import: CharacterImport = serde_json::from_str(text).map_err(|e| {
            log::warn!("Rejected character import: {}", e);
            RepositoryError::InvalidData(format!("malformed JSON: {}", e))
        })?;
        let form = CharacterForm::try_from(import).map_err(|e| {
            log::warn!("Rejected character import: {}", e);
            e
        })?;
        self.create(form)
    }

    /// Serializes `character` for download. Failures are logged, never returned.
    pub fn export_as_json(&self, character: &Character) {
        let exporter = match &self.exporter {
            Some(exporter) => exporter,
            None => {
                log::debug!("No exporter configured, skipping {}", character.id);
                return;
            }
        };
        let file_name = character.export_file_name();
        let result = to_export_json(character)
            .map_err(anyhow::Error::from)
            .and_then(|json| exporter.export(&file_name, &json));
        match result {
            Ok(()) => log::debug!("Exported {} as {}", character.id, file_name),
            Err(e) => log::error!("Could not export {}: {:#}", file_name, e),
        }
    }

    fn persist(&self, characters: &[Character]) -> Result<(), RepositoryError> {
        let data = serde_json::to_string(characters).map_err(StorageError::from)?;
        self.store.set(COLLECTION_KEY, &data)?;
        Ok(())
    }

    /// Applies `mutate` to a copy of the snapshot, persists it, then publishes it.
    fn commit<T, F>(&self, mutate: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut Vec<Character>) -> Result<T, RepositoryError>,
    {
        let mut outcome = None;
        self.snapshot.send_if_modified(|current| {
            let mut next = current.clone();
            let result = mutate(&mut next).and_then(|value| {
                self.persist(&next)?;
                Ok(value)
            });
            let modified = result.is_ok();
            if modified {
                log::debug!("Publishing snapshot of {} characters", next.len());
                *current = next;
            }
            outcome = Some(result);
            modified
        });

        let result = outcome.unwrap_or_else(|| {
            Err(RepositoryError::InvalidData(
                "snapshot was not updated".to_string(),
            ))
        });
        if let Err(RepositoryError::Storage(e)) = &result {
            log::error!("Could not persist characters, change discarded: {}", e);
        }
        result
    }
}
