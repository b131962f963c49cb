//! Character sheets grouped by scenario, kept in a local key-value store.
//!
//! [`repository::CharacterRepository`] owns the collection and publishes a full
//! snapshot after every change; [`views`] derives scenario groupings from a
//! snapshot; [`draft`] keeps the one unsaved form; [`paginate`] splits long
//! histories into pages.

pub mod draft;
pub mod files;
pub mod modal;
pub mod model;
pub mod paginate;
pub mod repository;
pub mod session;
pub mod storage;
pub mod utils;
pub mod views;

pub use model::{Ability, Character, CharacterForm, CharacterHistory, DraftForm, ScenarioGroup};
pub use repository::{CharacterRepository, RepositoryError};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
