mod cli;

use std::io::Write;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;

use character_vault::draft::{DraftStore, DEFAULT_DEBOUNCE};
use character_vault::files::DirectoryExporter;
use character_vault::modal::{ModalBroker, ModalConfig};
use character_vault::paginate::HistoryPager;
use character_vault::session::{confirm_and_delete, FormSession};
use character_vault::{Character, CharacterForm, CharacterRepository, FileStore};

use cli::{Attachments, Cli, Command, DraftAction};

type Repository = CharacterRepository<FileStore>;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn is_affirmative(input: &str, config: &ModalConfig) -> bool {
    let input = input.trim();
    input.eq_ignore_ascii_case("y")
        || input.eq_ignore_ascii_case("yes")
        || input.eq_ignore_ascii_case(&config.confirm_label)
}

/// Renders broker dialogs on the terminal and feeds the typed answer back.
async fn answer_on_terminal(broker: Arc<ModalBroker>) {
    let mut shown = broker.subscribe();
    loop {
        let current = shown.borrow_and_update().clone();
        if let Some(config) = current {
            let prompt = match &config.cancel_label {
                Some(cancel) => format!(
                    "{}\n{}\n[{} = y / {} = n]: ",
                    config.title, config.message, config.confirm_label, cancel
                ),
                None => format!(
                    "{}\n{}\n[Enter = {}] ",
                    config.title, config.message, config.confirm_label
                ),
            };
            let line = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
                let mut stdout = std::io::stdout();
                stdout.write_all(prompt.as_bytes())?;
                stdout.flush()?;
                let mut line = String::new();
                std::io::stdin().read_line(&mut line)?;
                Ok(line)
            })
            .await;

            match line {
                Ok(Ok(line)) if config.cancel_label.is_none() || is_affirmative(&line, &config) => {
                    broker.confirm();
                }
                Ok(Ok(_)) => {
                    broker.cancel();
                }
                Ok(Err(e)) => {
                    log::error!("Could not read answer: {}", e);
                    broker.dismiss();
                }
                Err(e) => {
                    log::error!("Prompt task failed: {}", e);
                    broker.dismiss();
                }
            }
        }
        if shown.changed().await.is_err() {
            break;
        }
    }
}

fn find(repository: &Repository, id: &str) -> anyhow::Result<Character> {
    repository
        .get_by_id(id)
        .ok_or_else(|| anyhow!("No character with id {}", id))
}

fn print_summary(character: &Character) {
    println!(
        "  {}  {} (by {})",
        character.id, character.character_name, character.creator_name
    );
}

fn print_character(character: &Character, page: usize, page_size: usize) {
    println!("{}", character.character_name);
    println!("  id:          {}", character.id);
    println!("  creator:     {}", character.creator_name);
    println!(
        "  scenario:    {}",
        character_vault::views::scenario_label(character)
    );
    let optional = [
        ("age", &character.age),
        ("height", &character.height),
        ("weight", &character.weight),
        ("role", &character.role),
        ("physical", &character.physical_chars),
        ("personality", &character.personality),
        ("motivation", &character.motivation),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            println!("  {:<12} {}", format!("{}:", label), value);
        }
    }
    if let Some(image) = &character.image {
        let kind = image
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .unwrap_or("image");
        println!("  image:       {} ({} bytes encoded)", kind, image.len());
    }
    println!("  created:     {}", character.created_at.to_rfc3339());
    println!("  updated:     {}", character.updated_at.to_rfc3339());

    if !character.abilities.is_empty() {
        println!("Abilities:");
        for ability in &character.abilities {
            println!("  - {}", ability.name);
            if let Some(description) = &ability.description {
                println!("      {}", description);
            }
            if let Some(effect) = &ability.effect {
                println!("      effect: {}", effect);
            }
        }
    }

    if let Some(history) = &character.history {
        let mut pager = HistoryPager::new(&history.content, page_size);
        pager.go_to(page.saturating_sub(1));
        match &history.file_name {
            Some(file_name) => println!("History ({}, {}):", file_name, pager.page_info()),
            None => println!("History ({}):", pager.page_info()),
        }
        println!("{}", pager.current_page());
    }
}

/// Loads the files named on the command line; rejected files are reported by the session.
async fn attach(
    session: &FormSession<FileStore>,
    form: &mut CharacterForm,
    attachments: Attachments,
    broker: &ModalBroker,
) -> anyhow::Result<()> {
    if let Some(path) = attachments.history_file {
        session
            .attach_history(form, &path, broker)
            .await
            .with_context(|| format!("error loading history from {:?}", path))?;
    }
    if let Some(path) = attachments.image {
        session
            .attach_image(form, &path, broker)
            .await
            .with_context(|| format!("error loading image from {:?}", path))?;
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = Arc::new(
        FileStore::open(&cli.store).with_context(|| format!("error opening {:?}", cli.store))?,
    );
    let drafts = DraftStore::new(store.clone());
    let repository = CharacterRepository::load(store.clone())
        .with_exporter(DirectoryExporter::new(cli.export_dir.clone()))
        .auto_export(!cli.no_auto_export);
    let broker = Arc::new(ModalBroker::new());
    let responder = tokio::spawn(answer_on_terminal(broker.clone()));

    let result = execute(cli.command, &repository, drafts, &broker).await;
    responder.abort();
    result
}

async fn execute(
    command: Command,
    repository: &Repository,
    drafts: DraftStore<FileStore>,
    broker: &ModalBroker,
) -> anyhow::Result<()> {
    match command {
        Command::List { scenario: Some(label) } => {
            let characters = repository.characters_in_scenario(&label);
            println!("{} ({})", label, characters.len());
            characters.iter().for_each(print_summary);
        }
        Command::List { scenario: None } => {
            let groups = repository.scenario_groups();
            if groups.is_empty() {
                println!("No characters yet.");
            }
            for group in groups {
                println!("{}", group);
                group.characters.iter().for_each(print_summary);
            }
        }
        Command::Scenarios => {
            for group in repository.scenario_groups() {
                println!("{}", group);
            }
        }
        Command::Show {
            id,
            page,
            page_size,
        } => {
            let character = find(repository, &id)?;
            print_character(&character, page, page_size);
        }
        Command::Create {
            fields,
            resume_draft,
        } => {
            let mut form = CharacterForm::default();
            if resume_draft {
                match drafts.load() {
                    Some(draft) => form = draft.into_form(),
                    None => log::warn!("No draft to resume, starting from an empty form"),
                }
            }
            let mut session = FormSession::create(drafts, DEFAULT_DEBOUNCE);
            let attachments = fields.apply_to(&mut form);
            let filled = attach(&session, &mut form, attachments, broker).await;
            session.on_change(&form);

            let saved = match filled {
                Ok(()) => session
                    .save(repository, broker, form)
                    .await
                    .map_err(anyhow::Error::from),
                Err(e) => Err(e),
            };
            match saved {
                Ok(character) => {
                    println!("Created {} ({})", character.character_name, character.id)
                }
                Err(e) => {
                    session.close().await;
                    return Err(e).context("character was not created; resume with --resume-draft");
                }
            }
        }
        Command::Edit { id, fields } => {
            let mut session = FormSession::edit(drafts, id.as_str());
            let mut form = session
                .prefill(repository)
                .ok_or_else(|| anyhow!("No character with id {}", id))?;
            let attachments = fields.apply_to(&mut form);
            attach(&session, &mut form, attachments, broker).await?;
            let character = session.save(repository, broker, form).await?;
            println!("Updated {} ({})", character.character_name, character.id);
        }
        Command::Delete { id, yes: true } => {
            let character = repository.delete(&id)?;
            println!("Deleted {}", character.character_name);
        }
        Command::Delete { id, yes: false } => {
            match confirm_and_delete(repository, broker, &id).await? {
                Some(character) => println!("Deleted {}", character.character_name),
                None => println!("Kept {}", id),
            }
        }
        Command::Import { path } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("error reading {:?}", path))?;
            broker.show_busy(Some("Importing character..."));
            let imported = repository.import_from_json(&text);
            broker.hide_busy();
            let character = imported.with_context(|| format!("error importing {:?}", path))?;
            println!(
                "Imported {} ({})",
                character.character_name, character.id
            );
        }
        Command::Export { id } => {
            let character = find(repository, &id)?;
            repository.export_as_json(&character);
        }
        Command::Draft {
            action: DraftAction::Show,
        } => match drafts.load() {
            Some(draft) => println!("{}", serde_json::to_string_pretty(&draft)?),
            None => println!("No draft saved."),
        },
        Command::Draft {
            action: DraftAction::Discard { yes: true },
        } => drafts.clear(),
        Command::Draft {
            action: DraftAction::Discard { yes: false },
        } => {
            if drafts.load().is_none() {
                println!("No draft saved.");
                return Ok(());
            }
            let mut session = FormSession::create(drafts, DEFAULT_DEBOUNCE);
            let discarded = session.discard(broker).await?;
            session.close().await;
            if discarded {
                println!("Draft discarded.");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    log::debug!("Using store {:?}", cli.store);
    run(cli).await
}
