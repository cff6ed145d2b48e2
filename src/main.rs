use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{error, info};

use eventura_registration::catalog::InMemoryCatalog;
use eventura_registration::config::Config;
use eventura_registration::error::RegistrationError;
use eventura_registration::service::{HttpRegistrationService, InMemoryRegistrationService};
use eventura_registration::types::{
    EventCatalog, ParticipantInfo, RegistrationService, TeamMember,
};
use eventura_registration::validate::validate;
use eventura_registration::wizard::RegistrationWizard;
use eventura_registration::logging;

#[derive(Parser)]
#[command(name = "eventura_registration")]
#[command(about = "Eventura fest registration wizard")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the events in the catalog
    Catalog {
        /// Path to the catalog file (defaults to config)
        #[arg(long)]
        catalog: Option<String>,
    },
    /// Validate a registration form without submitting it
    Validate {
        /// Event id to validate against
        #[arg(long)]
        event: String,
        /// JSON file with participant and team member details
        #[arg(long)]
        input: String,
        #[arg(long)]
        catalog: Option<String>,
    },
    /// Drive a full registration through the wizard
    Register {
        /// Event id to register for
        #[arg(long)]
        event: String,
        /// JSON file with participant and team member details
        #[arg(long)]
        input: String,
        /// Transaction id for the mock payment step
        #[arg(long)]
        transaction: String,
        /// Submit to the configured backend instead of the in-memory service
        #[arg(long)]
        http: bool,
        #[arg(long)]
        catalog: Option<String>,
    },
}

/// Shape of the `--input` file: the filled registration form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationInput {
    participant: ParticipantInfo,
    #[serde(default)]
    team_members: Vec<TeamMember>,
}

fn load_input(path: &str) -> Result<RegistrationInput, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn load_catalog(
    config: &Config,
    override_path: Option<String>,
) -> Result<InMemoryCatalog, Box<dyn std::error::Error>> {
    let path = override_path.unwrap_or_else(|| config.registration.catalog_path.clone());
    Ok(InMemoryCatalog::from_path(path)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Catalog { catalog } => {
            let catalog = load_catalog(&config, catalog)?;
            let events = catalog.list_events().await?;
            println!("📋 {} event(s) in the catalog:", events.len());
            for event in events {
                let kind = if event.is_team_event {
                    format!("team of up to {}", event.max_team_size)
                } else {
                    "individual".to_string()
                };
                let window = if event.registration_open { "open" } else { "closed" };
                println!(
                    "   {} — {} ({}) | fee ₹{} | {} | registration {}",
                    event.id, event.name, event.department, event.fee, kind, window
                );
            }
        }
        Commands::Validate { event, input, catalog } => {
            let catalog = load_catalog(&config, catalog)?;
            let descriptor = catalog.get_event(&event).await?;
            let form = load_input(&input)?;
            let errors = validate(&form.participant, &form.team_members, &descriptor);
            if errors.is_empty() {
                println!("✅ Form is valid for '{}'", descriptor.name);
            } else {
                println!("❌ {} field(s) need attention:", errors.len());
                for (field, message) in &errors {
                    println!("   {field}: {message}");
                }
                std::process::exit(1);
            }
        }
        Commands::Register { event, input, transaction, http, catalog } => {
            let catalog = load_catalog(&config, catalog)?;
            let form = load_input(&input)?;

            let mut wizard = RegistrationWizard::for_event(&catalog, &event)
                .await?
                .with_confirm_timeout(config.registration.confirm_timeout());
            info!(event = %event, "starting registration");

            wizard.start()?;
            wizard.set_participant(form.participant)?;
            for member in form.team_members {
                if !wizard.add_team_member(member)? {
                    println!("⚠️  Team is full; extra member ignored");
                }
            }

            match wizard.continue_to_payment() {
                Ok(()) => {}
                Err(RegistrationError::FormInvalid(errors)) => {
                    println!("❌ Registration form is invalid:");
                    for (field, message) in &errors {
                        println!("   {field}: {message}");
                    }
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }

            println!("💳 Amount payable: ₹{}", wizard.total_amount());

            let service: Box<dyn RegistrationService> = if http {
                Box::new(HttpRegistrationService::new(
                    config.registration.service_url.clone(),
                ))
            } else {
                Box::new(InMemoryRegistrationService::new())
            };

            match wizard.confirm(&transaction, service.as_ref()).await {
                Ok(finalized) => {
                    println!("\n🎉 Registration confirmed!");
                    println!("   Registration id: {}", finalized.registration_id);
                    println!("   Event: {}", finalized.event_id);
                    println!("   Participant: {}", finalized.participant.name);
                    println!("   Team size: {}", 1 + finalized.team_members.len());
                    println!("   Amount paid: ₹{}", finalized.total_amount);
                    println!("   Transaction: {}", finalized.transaction_id);
                }
                Err(e) => {
                    error!("confirm failed: {}", e);
                    println!("❌ Registration failed: {e}");
                    if e.is_retryable() {
                        println!("   This looks transient; re-run the same command to retry.");
                    }
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
