pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod profile;
pub mod reconciler;
pub mod sanitize;
pub mod shell;

use chrono::Utc;
use cli::{ Args, Command, ProfileAction };
use client::{ AstrologyClient, ChatApi };
use config::ClientConfig;
use log::info;
use models::profile::BirthProfile;
use profile::open_file_repository;
use reconciler::ChatController;
use shell::{ render, Shell };
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = ClientConfig::from_args(&args)?;

    info!("--- Core Configuration ---");
    info!("API Base URL: {}", config.base_url);
    info!("Stream Base URL: {}", config.ws_url);
    match config.request_timeout {
        Some(timeout) => info!("Request Timeout: {}s", timeout.as_secs()),
        None => info!("Request Timeout: disabled"),
    }
    info!("User Id: {}", config.session.user_id);
    info!("Chart Type: {}", config.session.chart_type);
    info!("Context Window: {}", config.session.context_window);
    info!("Storage Path: {}", config.storage_path.display());
    if !config.profile_namespace.is_empty() {
        info!("Profile Namespace: {}", config.profile_namespace);
    }
    info!("-------------------------");

    let profiles = open_file_repository(&config.storage_path, &config.profile_namespace);

    match args.command.unwrap_or(Command::Chat) {
        Command::Chat => {
            let client = Arc::new(AstrologyClient::from_config(&config)?);
            let controller = ChatController::new(client, profiles, config.session.clone());
            let mut shell = Shell::new(controller, tokio::io::stdin(), std::io::stdout());
            shell.run().await?;
        }
        Command::Profile { action: ProfileAction::Show } => {
            match profiles.load()? {
                Some(profile) => println!("{}", render::profile_line(&profile)),
                None => println!("No birth profile saved yet."),
            }
        }
        Command::Profile { action: ProfileAction::Set { date, time, latitude, longitude } } => {
            let profile = BirthProfile::new(date, time, latitude, longitude);
            profile.validate()?;
            profiles.save(&profile)?;
            println!("Saved. {}", render::profile_line(&profile));
        }
        Command::Sessions => {
            let client = AstrologyClient::from_config(&config)?;
            let sessions = client.list_sessions(&config.session.user_id).await?;
            if sessions.is_empty() {
                println!("No previous consultations.");
            }
            let now = Utc::now();
            for session in &sessions {
                println!("{}", render::session_line(session, None, now));
            }
        }
        Command::Show { id } => {
            let client = AstrologyClient::from_config(&config)?;
            let session = client.fetch_session(id).await?;
            println!("--- {} ---", session.display_title());
            for message in &session.messages {
                println!("{}", render::message_line(message));
            }
        }
    }

    Ok(())
}
