use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use character_vault::paginate::DEFAULT_PAGE_SIZE;
use character_vault::{Ability, CharacterForm};

/// Keep character sheets grouped by scenario
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the JSON file backing the character store
    #[arg(
        long,
        env = "CHARACTER_VAULT_STORE",
        default_value = "character-vault.json",
        global = true
    )]
    pub store: PathBuf,

    /// Directory receiving exported `<character name>.json` files
    #[arg(
        long,
        env = "CHARACTER_VAULT_EXPORT_DIR",
        default_value = ".",
        global = true
    )]
    pub export_dir: PathBuf,

    /// Do not export a character after creating or editing it
    #[arg(long, env = "CHARACTER_VAULT_NO_AUTO_EXPORT", global = true)]
    pub no_auto_export: bool,

    /// Log more (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Actions
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List characters grouped by scenario
    List {
        /// Only list characters of this scenario
        #[arg(long)]
        scenario: Option<String>,
    },

    /// List scenarios with how many characters each has
    Scenarios,

    /// Show a character, with its history one page at a time
    Show {
        id: String,

        /// History page to show, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Characters per history page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },

    /// Create a character. An invalid form is kept as a draft.
    Create {
        #[command(flatten)]
        fields: CharacterFields,

        /// Start from the saved draft
        #[arg(long)]
        resume_draft: bool,
    },

    /// Edit a character. Only the given fields change.
    Edit {
        id: String,

        #[command(flatten)]
        fields: CharacterFields,
    },

    /// Delete a character
    Delete {
        id: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Import a character from an exported JSON file. It gets a new id.
    Import { path: PathBuf },

    /// Export a character as JSON into the export directory
    Export { id: String },

    /// Inspect or discard the unsaved draft
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum DraftAction {
    /// Print the draft as JSON
    Show,

    /// Delete the draft
    Discard {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct CharacterFields {
    /// Name of the person who created the character
    #[arg(long)]
    pub creator: Option<String>,

    /// Character name
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub scenario: Option<String>,

    #[arg(long)]
    pub age: Option<String>,

    #[arg(long)]
    pub height: Option<String>,

    #[arg(long)]
    pub weight: Option<String>,

    #[arg(long)]
    pub role: Option<String>,

    /// Physical characteristics
    #[arg(long)]
    pub physical: Option<String>,

    #[arg(long)]
    pub personality: Option<String>,

    #[arg(long)]
    pub motivation: Option<String>,

    /// Ability as `name[:description[:effect]]`. Repeat for more; replaces existing abilities.
    #[arg(long = "ability", value_parser = parse_ability)]
    pub abilities: Vec<Ability>,

    /// Plain text (.txt) file holding the character's history
    #[arg(long)]
    pub history_file: Option<PathBuf>,

    /// Portrait image file
    #[arg(long)]
    pub image: Option<PathBuf>,
}

fn parse_ability(input: &str) -> Result<Ability, String> {
    let mut parts = input.splitn(3, ':').map(str::trim);
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
        return Err("ability name cannot be empty".to_string());
    }
    let optional = |part: Option<&str>| part.filter(|p| !p.is_empty()).map(str::to_string);
    Ok(Ability {
        name: name.to_string(),
        description: optional(parts.next()),
        effect: optional(parts.next()),
    })
}

/// Files named on the command line, loaded through the form session.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Attachments {
    pub history_file: Option<PathBuf>,
    pub image: Option<PathBuf>,
}

impl CharacterFields {
    /// Overwrites the fields that were given on the command line.
    pub fn apply_to(self, form: &mut CharacterForm) -> Attachments {
        fn set(target: &mut String, value: Option<String>) {
            if let Some(value) = value {
                *target = value;
            }
        }
        fn set_optional(target: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *target = value;
            }
        }

        set(&mut form.creator_name, self.creator);
        set(&mut form.character_name, self.name);
        set(&mut form.scenario, self.scenario);
        set_optional(&mut form.age, self.age);
        set_optional(&mut form.height, self.height);
        set_optional(&mut form.weight, self.weight);
        set_optional(&mut form.role, self.role);
        set_optional(&mut form.physical_chars, self.physical);
        set_optional(&mut form.personality, self.personality);
        set_optional(&mut form.motivation, self.motivation);
        if !self.abilities.is_empty() {
            form.abilities = self.abilities;
        }

        Attachments {
            history_file: self.history_file,
            image: self.image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_abilities() {
        let cases = [
            ("Stormcall", Ok(Ability::new("Stormcall"))),
            (
                "Stormcall: Summons a squall : 2d6 lightning",
                Ok(Ability {
                    name: "Stormcall".to_string(),
                    description: Some("Summons a squall".to_string()),
                    effect: Some("2d6 lightning".to_string()),
                }),
            ),
            (
                "Ward::Halves fire damage",
                Ok(Ability {
                    name: "Ward".to_string(),
                    description: None,
                    effect: Some("Halves fire damage".to_string()),
                }),
            ),
            (
                "Ratio: 1:2",
                Ok(Ability {
                    name: "Ratio".to_string(),
                    description: Some("1".to_string()),
                    effect: Some("2".to_string()),
                }),
            ),
            (
                " :nameless",
                Err("ability name cannot be empty".to_string()),
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(expected, parse_ability(input));
        }
    }

    #[test]
    fn only_given_fields_change() {
        let mut form = CharacterForm {
            creator_name: "Ana".to_string(),
            character_name: "Kael".to_string(),
            scenario: "Ashfall".to_string(),
            role: Some("Stormcaller".to_string()),
            abilities: vec![Ability::new("Stormcall")],
            ..Default::default()
        };
        let fields = CharacterFields {
            name: Some("Kael Ashborn".to_string()),
            age: Some("32".to_string()),
            history_file: Some(PathBuf::from("kael.txt")),
            ..Default::default()
        };
        let attachments = fields.apply_to(&mut form);

        assert_eq!(form.character_name, "Kael Ashborn");
        assert_eq!(form.creator_name, "Ana");
        assert_eq!(form.age.as_deref(), Some("32"));
        assert_eq!(form.role.as_deref(), Some("Stormcaller"));
        assert_eq!(form.abilities, vec![Ability::new("Stormcall")]);
        assert_eq!(form.history_content, None);
        assert_eq!(
            attachments,
            Attachments {
                history_file: Some(PathBuf::from("kael.txt")),
                image: None,
            }
        );
    }

    #[test]
    fn verifies_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
