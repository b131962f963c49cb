use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::is_blank;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormError {
    #[error("Required fields are missing: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Ability {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

impl Ability {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CharacterHistory {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// A stored character sheet.
///
/// `id` and `created_at` never change once assigned; `updated_at` moves on every mutation.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    pub creator_name: String,
    pub character_name: String,
    #[serde(default)]
    pub scenario: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_chars: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<CharacterHistory>,
    /// Encoded image, usually a `data:` URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Character {
    /// Builds a fresh record out of form data.
    pub(crate) fn from_form(id: String, form: CharacterForm, now: DateTime<Utc>) -> Self {
        let mut character = Self {
            id,
            creator_name: String::new(),
            character_name: String::new(),
            scenario: String::new(),
            age: None,
            height: None,
            weight: None,
            role: None,
            abilities: Vec::new(),
            physical_chars: None,
            personality: None,
            motivation: None,
            history: None,
            image: None,
            created_at: now,
            updated_at: now,
        };
        character.apply_form(form, now);
        character
    }

    /// Overwrites every form-owned field, leaving `id` and `created_at` alone.
    pub(crate) fn apply_form(&mut self, form: CharacterForm, now: DateTime<Utc>) {
        self.creator_name = form.creator_name;
        self.character_name = form.character_name;
        self.scenario = form.scenario;
        self.age = form.age;
        self.height = form.height;
        self.weight = form.weight;
        self.role = form.role;
        self.abilities = form.abilities;
        self.physical_chars = form.physical_chars;
        self.personality = form.personality;
        self.motivation = form.motivation;
        self.history = form
            .history_content
            .filter(|content| !content.is_empty())
            .map(|content| CharacterHistory {
                content,
                file_name: form.history_file_name,
            });
        self.image = form.image;
        self.updated_at = now;
    }

    /// File name used when the record is handed out for download.
    pub fn export_file_name(&self) -> String {
        format!(
            "{}.json",
            crate::utils::sanitize_file_stem(&self.character_name)
        )
    }
}

/// Everything a user can type into the character form.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CharacterForm {
    pub creator_name: String,
    pub character_name: String,
    pub scenario: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_chars: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl CharacterForm {
    /// Checks the required fields, naming every one that is blank.
    pub fn validate(&self) -> Result<(), FormError> {
        let missing: Vec<&'static str> = [
            ("creatorName", &self.creator_name),
            ("characterName", &self.character_name),
            ("scenario", &self.scenario),
        ]
        .into_iter()
        .filter(|(_, value)| is_blank(value))
        .map(|(field, _)| field)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(FormError::MissingFields(missing))
        }
    }

    /// Drops abilities that were added to the form but never named.
    pub fn prune_abilities(&mut self) {
        self.abilities.retain(|ability| !is_blank(&ability.name));
    }
}

impl From<&Character> for CharacterForm {
    fn from(character: &Character) -> Self {
        let (history_content, history_file_name) = match &character.history {
            Some(history) => (Some(history.content.clone()), history.file_name.clone()),
            None => (None, None),
        };
        Self {
            creator_name: character.creator_name.clone(),
            character_name: character.character_name.clone(),
            scenario: character.scenario.clone(),
            age: character.age.clone(),
            height: character.height.clone(),
            weight: character.weight.clone(),
            role: character.role.clone(),
            abilities: character.abilities.clone(),
            physical_chars: character.physical_chars.clone(),
            personality: character.personality.clone(),
            motivation: character.motivation.clone(),
            history_content,
            history_file_name,
            image: character.image.clone(),
        }
    }
}

/// An unsaved, possibly incomplete form. Nothing here is required.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DraftForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abilities: Option<Vec<Ability>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_chars: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl DraftForm {
    /// Fills a form from the draft; absent required fields become empty strings.
    pub fn into_form(self) -> CharacterForm {
        CharacterForm {
            creator_name: self.creator_name.unwrap_or_default(),
            character_name: self.character_name.unwrap_or_default(),
            scenario: self.scenario.unwrap_or_default(),
            age: self.age,
            height: self.height,
            weight: self.weight,
            role: self.role,
            abilities: self.abilities.unwrap_or_default(),
            physical_chars: self.physical_chars,
            personality: self.personality,
            motivation: self.motivation,
            history_content: self.history_content,
            history_file_name: self.history_file_name,
            image: self.image,
        }
    }
}

impl From<&CharacterForm> for DraftForm {
    fn from(form: &CharacterForm) -> Self {
        fn present(value: &str) -> Option<String> {
            (!value.is_empty()).then(|| value.to_string())
        }

        Self {
            creator_name: present(&form.creator_name),
            character_name: present(&form.character_name),
            scenario: present(&form.scenario),
            age: form.age.clone(),
            height: form.height.clone(),
            weight: form.weight.clone(),
            role: form.role.clone(),
            abilities: (!form.abilities.is_empty()).then(|| form.abilities.clone()),
            physical_chars: form.physical_chars.clone(),
            personality: form.personality.clone(),
            motivation: form.motivation.clone(),
            history_content: form.history_content.clone(),
            history_file_name: form.history_file_name.clone(),
            image: form.image.clone(),
        }
    }
}

/// Characters sharing one scenario label, in stored order. Never persisted.
#[derive(Serialize, Debug, PartialEq, Eq, Clone)]
pub struct ScenarioGroup {
    pub name: String,
    pub characters: Vec<Character>,
    pub count: usize,
}

impl std::fmt::Display for ScenarioGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let noun = if self.count == 1 {
            "character"
        } else {
            "characters"
        };
        write!(f, "{} ({} {})", self.name, self.count, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> CharacterForm {
        CharacterForm {
            creator_name: "Ana".to_string(),
            character_name: "Kael".to_string(),
            scenario: "Ashfall".to_string(),
            abilities: vec![Ability::new("Stormcall")],
            history_content: Some("Born under a red sky.".to_string()),
            history_file_name: Some("kael.txt".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn validates_required_fields() {
        let cases = [
            (form(), Ok(())),
            (
                CharacterForm {
                    scenario: "   ".to_string(),
                    ..form()
                },
                Err(FormError::MissingFields(vec!["scenario"])),
            ),
            (
                CharacterForm::default(),
                Err(FormError::MissingFields(vec![
                    "creatorName",
                    "characterName",
                    "scenario",
                ])),
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(expected, input.validate());
        }
    }

    #[test]
    fn prunes_unnamed_abilities() {
        let mut input = form();
        input.abilities = vec![
            Ability::new("Stormcall"),
            Ability::new("  "),
            Ability {
                name: String::new(),
                description: Some("orphaned".to_string()),
                effect: None,
            },
            Ability::new("Ember Ward"),
        ];
        input.prune_abilities();

        let names: Vec<_> = input.abilities.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["Stormcall", "Ember Ward"]);
    }

    #[test]
    fn empty_history_content_is_dropped() {
        let now = Utc::now();
        let character = Character::from_form(
            "id".to_string(),
            CharacterForm {
                history_content: Some(String::new()),
                ..form()
            },
            now,
        );
        assert_eq!(character.history, None);
        assert_eq!(character.created_at, character.updated_at);
    }

    #[test]
    fn form_survives_character_round_trip() {
        let character = Character::from_form("id".to_string(), form(), Utc::now());
        assert_eq!(CharacterForm::from(&character), form());
    }

    #[test]
    fn draft_fills_missing_required_fields_with_empty_strings() {
        let draft = DraftForm {
            character_name: Some("Kael".to_string()),
            ..Default::default()
        };
        let form = draft.into_form();
        assert_eq!(form.character_name, "Kael");
        assert_eq!(form.creator_name, "");
        assert!(form.abilities.is_empty());
    }

    #[test]
    fn serializes_with_camel_case_and_omits_absent_fields() {
        let character = Character::from_form("abc".to_string(), form(), Utc::now());
        let json = serde_json::to_value(&character).unwrap();
        assert_eq!(json["characterName"], "Kael");
        assert_eq!(json["history"]["fileName"], "kael.txt");
        assert!(json.get("age").is_none());
        assert!(json["createdAt"].is_string());
    }
}
