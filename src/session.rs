//! The create/edit form lifecycle and the confirm-then-delete flow.
//!
//! Flows report their outcome through the broker, one dialog at a time: each
//! request is awaited before the next is made.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::draft::{DraftAutosaver, DraftStore};
use crate::files::{self, FileError};
use crate::modal::{Acknowledgement, Confirmation, ModalBroker, ModalError};
use crate::model::{Character, CharacterForm, DraftForm, FormError};
use crate::repository::{CharacterRepository, RepositoryError};
use crate::storage::KeyValueStore;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Invalid(#[from] FormError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Modal(#[from] ModalError),
    #[error(transparent)]
    File(#[from] FileError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FormMode {
    Create,
    Edit(String),
}

/// Shows an alert and waits for it. An alert the broker refuses is only logged.
async fn notify(broker: &ModalBroker, alert: Acknowledgement) {
    if let Err(e) = broker.request_acknowledgement(alert).await {
        log::warn!("Could not show alert: {}", e);
    }
}

/// One open character form. Drafts are only kept while creating.
pub struct FormSession<S> {
    mode: FormMode,
    drafts: DraftStore<S>,
    autosaver: Option<DraftAutosaver>,
}

impl<S: KeyValueStore + 'static> FormSession<S> {
    /// Starts a creation form whose changes are auto-saved after `debounce`.
    pub fn create(drafts: DraftStore<S>, debounce: Duration) -> Self {
        let autosaver = DraftAutosaver::spawn(drafts.clone(), debounce);
        Self {
            mode: FormMode::Create,
            drafts,
            autosaver: Some(autosaver),
        }
    }

    pub fn edit<I: Into<String>>(drafts: DraftStore<S>, id: I) -> Self {
        Self {
            mode: FormMode::Edit(id.into()),
            drafts,
            autosaver: None,
        }
    }

    /// The stored record as a form, when editing one that still exists.
    pub fn prefill<R: KeyValueStore>(
        &self,
        repository: &CharacterRepository<R>,
    ) -> Option<CharacterForm> {
        match &self.mode {
            FormMode::Edit(id) => repository.get_by_id(id).map(|c| CharacterForm::from(&c)),
            FormMode::Create => None,
        }
    }

    pub fn on_change(&self, form: &CharacterForm) {
        if let Some(autosaver) = &self.autosaver {
            autosaver.notify(DraftForm::from(form));
        }
    }

    /// Offers to restore a leftover draft. Declining deletes it.
    pub async fn offer_draft_restore(
        &self,
        broker: &ModalBroker,
    ) -> Result<Option<DraftForm>, SessionError> {
        if self.mode != FormMode::Create {
            return Ok(None);
        }
        let draft = match self.drafts.load() {
            Some(draft) => draft,
            None => return Ok(None),
        };

        let restore = broker
            .request_confirmation(
                Confirmation::new("Draft found", "Restore the unsaved draft?")
                    .confirm_label("Restore")
                    .cancel_label("Discard"),
            )
            .await?;
        if restore {
            Ok(Some(draft))
        } else {
            self.drafts.clear();
            Ok(None)
        }
    }

    /// Loads a `.txt` history file into `form`. A rejected file is reported as an alert.
    pub async fn attach_history(
        &self,
        form: &mut CharacterForm,
        path: &Path,
        broker: &ModalBroker,
    ) -> Result<(), SessionError> {
        match files::read_text_file(path) {
            Ok(content) => {
                form.history_content = Some(content);
                form.history_file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned());
                self.on_change(form);
                Ok(())
            }
            Err(e) => {
                log::warn!("Rejected history file: {}", e);
                notify(
                    broker,
                    Acknowledgement::new(
                        "Error",
                        "Could not read the file. Make sure it is a valid .txt file.",
                    ),
                )
                .await;
                Err(e.into())
            }
        }
    }

    /// Loads a portrait into `form`. A rejected file is reported as an alert.
    pub async fn attach_image(
        &self,
        form: &mut CharacterForm,
        path: &Path,
        broker: &ModalBroker,
    ) -> Result<(), SessionError> {
        match files::read_image_as_data_url(path) {
            Ok(image) => {
                form.image = Some(image);
                self.on_change(form);
                Ok(())
            }
            Err(e) => {
                log::warn!("Rejected image: {}", e);
                notify(
                    broker,
                    Acknowledgement::new(
                        "Error",
                        "Could not process the image. Make sure the file is a valid image.",
                    ),
                )
                .await;
                Err(e.into())
            }
        }
    }

    /// Validates and stores the form, drops the draft and confirms with an alert.
    ///
    /// On failure an alert explains why, and the session stays open and keeps auto-saving.
    pub async fn save<R: KeyValueStore>(
        &mut self,
        repository: &CharacterRepository<R>,
        broker: &ModalBroker,
        mut form: CharacterForm,
    ) -> Result<Character, SessionError> {
        form.prune_abilities();
        if let Err(e) = form.validate() {
            notify(
                broker,
                Acknowledgement::new(
                    "Invalid form",
                    format!("Please fill in every required field. {}", e),
                ),
            )
            .await;
            return Err(e.into());
        }

        let saved = match &self.mode {
            FormMode::Create => repository.create(form),
            FormMode::Edit(id) => repository.update(id, form),
        };
        let character = match saved {
            Ok(character) => character,
            Err(e) => {
                notify(
                    broker,
                    Acknowledgement::new("Error", "The character could not be saved. Try again."),
                )
                .await;
                return Err(e.into());
            }
        };

        if let Some(autosaver) = self.autosaver.take() {
            autosaver.cancel().await;
        }
        self.drafts.clear();

        let verb = match self.mode {
            FormMode::Create => "created",
            FormMode::Edit(_) => "updated",
        };
        notify(
            broker,
            Acknowledgement::new(
                "Success!",
                format!(
                    "Character \"{}\" {} successfully.",
                    character.character_name, verb
                ),
            ),
        )
        .await;
        Ok(character)
    }

    /// Asks before throwing the form and its draft away.
    pub async fn discard(&mut self, broker: &ModalBroker) -> Result<bool, SessionError> {
        let confirmed = broker
            .request_confirmation(
                Confirmation::new(
                    "Discard changes",
                    "Discard every change? The saved draft will be deleted too.",
                )
                .confirm_label("Discard")
                .cancel_label("Keep editing"),
            )
            .await?;
        if confirmed {
            if let Some(autosaver) = self.autosaver.take() {
                autosaver.cancel().await;
            }
            self.drafts.clear();
        }
        Ok(confirmed)
    }

    /// Asks before leaving a form with unsaved changes. `true` means leave.
    ///
    /// Leaving keeps the draft, including a change still inside its quiet period.
    pub async fn leave(&mut self, dirty: bool, broker: &ModalBroker) -> Result<bool, SessionError> {
        if dirty {
            let confirmed = broker
                .request_confirmation(
                    Confirmation::new("Unsaved changes", "You have unsaved changes. Leave anyway?")
                        .confirm_label("Leave")
                        .cancel_label("Keep editing"),
                )
                .await?;
            if !confirmed {
                return Ok(false);
            }
        }
        if let Some(autosaver) = self.autosaver.take() {
            autosaver.close().await;
        }
        Ok(true)
    }

    /// Leaves the form, writing any change still waiting for its quiet period.
    pub async fn close(mut self) {
        if let Some(autosaver) = self.autosaver.take() {
            autosaver.close().await;
        }
    }
}

/// Deletes `id` once the user confirms, then reports the outcome. `None` means they declined.
pub async fn confirm_and_delete<S: KeyValueStore>(
    repository: &CharacterRepository<S>,
    broker: &ModalBroker,
    id: &str,
) -> Result<Option<Character>, SessionError> {
    let character = repository
        .get_by_id(id)
        .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

    let confirmed = broker
        .request_confirmation(
            Confirmation::new(
                "Confirm deletion",
                format!(
                    "Delete the character \"{}\"? This cannot be undone.",
                    character.character_name
                ),
            )
            .confirm_label("Delete"),
        )
        .await?;
    if !confirmed {
        log::debug!("Deletion of {} declined", id);
        return Ok(None);
    }

    match repository.delete(id) {
        Ok(removed) => {
            notify(
                broker,
                Acknowledgement::new(
                    "Success",
                    format!("Character \"{}\" was deleted.", removed.character_name),
                ),
            )
            .await;
            Ok(Some(removed))
        }
        Err(e) => {
            notify(
                broker,
                Acknowledgement::new("Error", "The character could not be deleted. Try again."),
            )
            .await;
            Err(e.into())
        }
    }
}
