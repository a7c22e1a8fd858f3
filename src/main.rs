use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use colored::*;

use followup_core::{
    ClaudeClient, Config, Contact, ContactSnapshot, DateGrouping, FollowUpError, FollowUpManager,
    Notifier, OllamaClient, OpenAIClient, Provider, ReminderNotification, ReminderScheduler,
    SqliteStore, StarterTask, TagBoard, TagColour, TextGenerator,
};

#[derive(Parser)]
#[command(name = "followup")]
#[command(about = "Keep track of the people you meet and follow up with them")]
struct Cli {
    /// Contact database (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge contacts from a JSON file exported from the address book
    Import {
        /// JSON array of contacts ({"id", "name", "phone_number", "note", "create_date"})
        file: PathBuf,
    },
    /// List contacts grouped by when you met them
    Sections {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show one contact
    Show { contact: String },
    /// Record that you followed up with a contact
    FollowedUp { contact: String },
    /// Highlight (or unhighlight) a contact
    Highlight {
        contact: String,
        #[arg(long)]
        off: bool,
    },
    /// Add (or remove) a contact from your follow-ups
    FollowUps {
        contact: String,
        #[arg(long)]
        remove: bool,
    },
    /// Edit a contact's tags
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
    /// List conversation starter templates
    Starters,
    /// Render a conversation starter for a contact
    Starter {
        contact: String,
        /// Template id or label
        template: String,
    },
    /// List the models available for the configured AI provider
    Models,
    /// Preview today's follow-up reminder
    Remind {
        /// Mention the contacts by name
        #[arg(long)]
        names: bool,
    },
}

#[derive(Subcommand)]
enum TagAction {
    Add { contact: String, title: String },
    Remove { contact: String, tag: String },
    /// Move a tag to a new position (0 is first)
    Move {
        contact: String,
        tag: String,
        index: usize,
    },
    /// Set a tag's colour, or cycle to the next one when no colour is given
    Colour {
        contact: String,
        tag: String,
        colour: Option<String>,
    },
}

/// Prints reminders instead of handing them to an OS notification centre.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn schedule(&self, notification: &ReminderNotification) -> Result<()> {
        println!(
            "🔔 {} ({})",
            notification.title.bold(),
            notification.fire_at.with_timezone(&Local).format("%a %d %b %H:%M").to_string().dimmed()
        );
        println!("   {}", notification.body);
        Ok(())
    }

    fn clear_scheduled(&self) -> Result<()> {
        Ok(())
    }
}

/// Used when no provider is configured; standard starters never call it.
struct UnconfiguredGenerator(String);

#[async_trait::async_trait]
impl TextGenerator for UnconfiguredGenerator {
    fn name(&self) -> &'static str {
        "unconfigured"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(anyhow!("{}", self.0))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<FollowUpError>() {
            Some(err) => {
                eprintln!("{}: {}", err.title().red().bold(), err);
                if let Some(suggestion) = err.recovery_suggestion() {
                    eprintln!("{}", suggestion.dimmed());
                }
                std::process::exit(1);
            }
            None => Err(e),
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    let db_path = match cli.db {
        Some(path) => path,
        None => Config::data_path()?,
    };
    log::debug!("Using contact database {}", db_path.display());
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open contact database {}", db_path.display()))?;
    let mut manager = FollowUpManager::load(store, config.week_start)?;

    match cli.command {
        Commands::Import { file } => import_contacts(&mut manager, &file)?,
        Commands::Sections { json } => list_sections(&manager, json)?,
        Commands::Show { contact } => {
            let id = resolve_contact(&manager, &contact)?;
            print_contact(manager.contact(&id)?);
        }
        Commands::FollowedUp { contact } => {
            let id = resolve_contact(&manager, &contact)?;
            let contact = manager.mark_as_followed_up(&id, Utc::now())?;
            println!(
                "👍 Followed up with {} ({} total)",
                contact.name.bold(),
                contact.follow_up_count
            );
        }
        Commands::Highlight { contact, off } => {
            let id = resolve_contact(&manager, &contact)?;
            let contact = if off {
                manager.unhighlight(&id)?
            } else {
                manager.highlight(&id)?
            };
            println!("⭐ {} highlighted: {}", contact.name.bold(), contact.highlighted);
        }
        Commands::FollowUps { contact, remove } => {
            let id = resolve_contact(&manager, &contact)?;
            let contact = if remove {
                manager.remove_from_follow_ups(&id)?
            } else {
                manager.add_to_follow_ups(&id)?
            };
            println!(
                "📋 {} in follow ups: {}",
                contact.name.bold(),
                contact.contained_in_follow_ups
            );
        }
        Commands::Tag { action } => edit_tags(&mut manager, action)?,
        Commands::Starters => list_starters(&config),
        Commands::Starter { contact, template } => {
            render_starter(&manager, &config, &contact, &template).await?
        }
        Commands::Models => list_models(&config).await?,
        Commands::Remind { names } => {
            let scheduler = ReminderScheduler::new(
                ConsoleNotifier,
                config.notification_configuration(),
                config.week_start,
            );
            if names {
                let reminder = scheduler.names_reminder(manager.store(), &Local::now());
                scheduler.notifier().schedule(&reminder)?;
            } else {
                scheduler.reschedule(manager.store(), &Local::now())?;
            }
        }
    }

    Ok(())
}

fn resolve_contact(manager: &FollowUpManager<SqliteStore>, key: &str) -> Result<String> {
    if manager.store().contact(key).is_some() {
        return Ok(key.to_string());
    }
    let key_lower = key.to_lowercase();
    let matches: Vec<&Contact> = manager
        .store()
        .contacts()
        .filter(|c| c.name.to_lowercase().contains(&key_lower))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => Err(FollowUpError::ContactNotFound(key.to_string()).into()),
        many => Err(anyhow!(
            "\"{}\" matches {} contacts: {}",
            key,
            many.len(),
            many.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
        )),
    }
}

fn resolve_tag(contact: &Contact, key: &str) -> Result<String> {
    contact
        .tags
        .iter()
        .find(|t| t.id == key)
        .or_else(|| contact.tags.iter().find(|t| t.title.eq_ignore_ascii_case(key)))
        .map(|t| t.id.clone())
        .ok_or_else(|| FollowUpError::TagNotFound(key.to_string()).into())
}

fn import_contacts(manager: &mut FollowUpManager<SqliteStore>, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let snapshots: Vec<ContactSnapshot> = serde_json::from_str(&content)?;

    let changed = manager.import(&snapshots, Utc::now())?;
    println!(
        "✅ Imported {} contacts, {} new or updated",
        snapshots.len().to_string().bold(),
        changed.to_string().bold().green()
    );
    Ok(())
}

fn list_sections(manager: &FollowUpManager<SqliteStore>, json: bool) -> Result<()> {
    let sections = manager.sections(&Local::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&sections)?);
        return Ok(());
    }

    if sections.is_empty() {
        println!("{}", "No contacts yet. Import some with: followup import <file>".yellow());
        return Ok(());
    }

    for section in &sections {
        let heading = format!("{} ({})", section.grouping.title(), section.contacts.len());
        let heading = if section.grouping == DateGrouping::Today {
            heading.bold().green()
        } else {
            heading.bold().blue()
        };
        println!("\n{}", heading);
        println!("{}", "=".repeat(30).dimmed());
        for contact in &section.contacts {
            print_contact_row(contact);
        }
    }
    Ok(())
}

fn print_contact_row(contact: &Contact) {
    let star = if contact.highlighted { "⭐ " } else { "" };
    let tags = contact
        .tags
        .iter()
        .map(|t| format!("[{}]", t.title))
        .collect::<Vec<_>>()
        .join(" ");
    println!(
        "  • {}{} {} {}",
        star,
        contact.name.bold(),
        contact.create_date.with_timezone(&Local).format("%d %b %Y").to_string().dimmed(),
        tags.cyan()
    );
}

fn print_contact(contact: &Contact) {
    println!("\n{}", contact.name.bold().blue());
    println!("{}", "=".repeat(30).dimmed());
    println!("id:           {}", contact.id.dimmed());
    if let Some(phone) = &contact.phone_number {
        println!("phone:        {}", phone);
    }
    if let Some(note) = contact.note.as_deref().filter(|n| !n.is_empty()) {
        println!("note:         {}", note.italic());
    }
    println!(
        "met:          {}",
        contact.create_date.with_timezone(&Local).format("%a %d %b %Y %H:%M")
    );
    println!("follow ups:   {}", contact.follow_up_count);
    if let Some(at) = contact.last_followed_up {
        println!("last:         {}", at.with_timezone(&Local).format("%a %d %b %Y %H:%M"));
    }
    println!("highlighted:  {}", contact.highlighted);
    println!("in follow ups: {}", contact.contained_in_follow_ups);
    for (i, tag) in contact.tags.iter().enumerate() {
        println!("  {}. {} ({})", i, tag.title.bold(), tag.colour.as_str());
    }
}

fn edit_tags(manager: &mut FollowUpManager<SqliteStore>, action: TagAction) -> Result<()> {
    let tags = match action {
        TagAction::Add { contact, title } => {
            let id = resolve_contact(manager, &contact)?;
            manager.add_tag(&id, &title)?.to_vec()
        }
        TagAction::Remove { contact, tag } => {
            let id = resolve_contact(manager, &contact)?;
            let tag_id = resolve_tag(manager.contact(&id)?, &tag)?;
            manager.remove_tag(&id, &tag_id)?.to_vec()
        }
        TagAction::Move {
            contact,
            tag,
            index,
        } => {
            let id = resolve_contact(manager, &contact)?;
            let tag_id = resolve_tag(manager.contact(&id)?, &tag)?;
            manager.reorder_tag(&id, &tag_id, index)?.to_vec()
        }
        TagAction::Colour {
            contact,
            tag,
            colour,
        } => {
            let id = resolve_contact(manager, &contact)?;
            let tag_id = resolve_tag(manager.contact(&id)?, &tag)?;
            match colour {
                Some(name) => {
                    let colour = TagColour::from_str(&name).ok_or_else(|| {
                        anyhow!(
                            "Unknown colour \"{}\". Choose one of: {}",
                            name,
                            TagColour::all()
                                .iter()
                                .map(|c| c.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        )
                    })?;
                    manager.recolour_tag(&id, &tag_id, colour)?.to_vec()
                }
                None => {
                    let mut board = TagBoard::new(manager.contact(&id)?.tags.clone());
                    let tags = board.cycle_colour(&tag_id)?;
                    manager.set_tags(&id, tags)?.to_vec()
                }
            }
        }
    };

    if tags.is_empty() {
        println!("{}", "No tags".dimmed());
    }
    for (i, tag) in tags.iter().enumerate() {
        println!("  {}. {} ({})", i, tag.title.bold(), tag.colour.as_str());
    }
    Ok(())
}

fn list_starters(config: &Config) {
    println!("\n{}", "💬 Conversation Starters".bold().blue());
    println!("{}", "=".repeat(30).dimmed());
    for template in &config.templates {
        println!(
            "  • {} {} {}",
            template.title().bold(),
            format!("[{} / {}]", template.kind().display_name(), template.platform.display_name())
                .dimmed(),
            template.id.dimmed()
        );
    }
}

async fn list_models(config: &Config) -> Result<()> {
    let provider = config.provider();
    println!("\n{}", format!("🤖 {} Models", provider.display_name()).bold().blue());
    println!("{}", "=".repeat(30).dimmed());

    let models = match provider {
        Provider::OpenAI => OpenAIClient::list_models(),
        Provider::Claude => ClaudeClient::list_models(),
        Provider::Ollama => match OllamaClient::new(config.ollama_url()).list_models().await {
            Ok(models) => models,
            Err(e) => {
                println!("{}: {}", "Error connecting to Ollama".red(), e);
                println!("Make sure Ollama is running: {}", "ollama serve".bold());
                return Ok(());
            }
        },
    };

    if models.is_empty() {
        println!("{}", "No models found. Pull a model with: ollama pull llama3.2".yellow());
    }
    for model in models {
        if config.default_model.as_deref() == Some(model.as_str()) {
            println!("  • {} {}", model.green().bold(), "(default)".dimmed());
        } else {
            println!("  • {}", model.green());
        }
    }
    if provider.requires_api_key() && config.api_key(provider).is_none() {
        println!("\n{}", "No API key configured for this provider.".yellow());
    }
    Ok(())
}

async fn render_starter(
    manager: &FollowUpManager<SqliteStore>,
    config: &Config,
    contact: &str,
    template: &str,
) -> Result<()> {
    let id = resolve_contact(manager, contact)?;
    let contact = manager.contact(&id)?.clone();
    let template = config
        .template(template)
        .ok_or_else(|| anyhow!("No conversation starter called \"{}\"", template))?;

    let Some(action) = template.action(&contact) else {
        println!(
            "{}",
            format!("{} has no phone number for {}", contact.name, template.platform.display_name())
                .yellow()
        );
        return Ok(());
    };

    let generator = config
        .text_generator()
        .unwrap_or_else(|e| Arc::new(UnconfiguredGenerator(e.to_string())) as Arc<dyn TextGenerator>);
    let task = StarterTask::spawn(template.starter().clone(), contact, generator);

    let text = tokio::select! {
        result = task.result() => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("{}", "Cancelled".yellow());
            return Ok(());
        }
    };

    println!("{}", text);
    println!("\n{}", action.url(&text)?.as_str().underline().blue());
    Ok(())
}
