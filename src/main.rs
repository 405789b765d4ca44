use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use townpick_cities::{
    readable_country, CityStore, Delivery, FoundCity, NominatimClient, Outcome, Services,
    SessionSettings, SqliteCityStore, SystemPositionProvider, TownSelectSession,
};
use townpick_core::Config;

#[derive(Parser)]
#[command(
    name = "townpick",
    version,
    about = "Pick the cities you want to follow",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List saved cities (the current location comes first)
    List,

    /// Show popular cities that are not saved yet
    Popular {
        /// Save the popular city at this position
        #[arg(short, long)]
        save: Option<usize>,
    },

    /// Search cities by name
    Search {
        query: String,

        /// Save the result at this position
        #[arg(short, long)]
        save: Option<usize>,
    },

    /// Save the city at the current device location
    Locate,

    /// Remove the saved city at this position
    Remove { index: usize },
}

fn print_cities<'a>(cities: impl IntoIterator<Item = &'a FoundCity>) {
    for (i, city) in cities.into_iter().enumerate() {
        println!("{:>3}. {} ({})", i + 1, city.name, readable_country(city));
    }
}

fn pick(cities: &[FoundCity], position: usize) -> Result<FoundCity> {
    position
        .checked_sub(1)
        .and_then(|i| cities.get(i))
        .cloned()
        .with_context(|| format!("No city at position {}", position))
}

async fn save(session: &mut TownSelectSession, city: &FoundCity) {
    match session.select_city(city).await {
        Outcome::Done => println!("Saved {} ({})", city.name, readable_country(city)),
        Outcome::Stay => report(session),
    }
}

fn report(session: &TownSelectSession) {
    if let Some(message) = session.message() {
        eprintln!("{}", message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    townpick_core::init()?;
    let (config, _) = Config::load_validated()?;

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Unable to create {}", parent.display()))?;
    }

    let store = CityStore::new(SqliteCityStore::open(&db_path)?);
    let nominatim = Arc::new(NominatimClient::from_config(&config.cities)?);
    let positions = SystemPositionProvider::new(config.cities.manual_position);
    let has_position = positions.is_available();
    let services = Services {
        store: Arc::new(store),
        search: nominatim.clone(),
        positions: Arc::new(positions),
        geocoder: nominatim,
    };

    let mut session =
        TownSelectSession::open(services, SessionSettings::from_config(&config.cities)).await;
    report(&session);

    match cli.command {
        Command::List => {
            if session.saved().is_empty() {
                println!("No saved cities");
            }
            for (i, entry) in session.saved().iter().enumerate() {
                let marker = if entry.is_geolocation { " [current location]" } else { "" };
                println!(
                    "{:>3}. {} ({}){}",
                    i + 1,
                    entry.city.name,
                    readable_country(&entry.city),
                    marker
                );
            }
        }
        Command::Popular { save: None } => print_cities(session.popular()),
        Command::Popular {
            save: Some(position),
        } => {
            let city = pick(session.popular(), position)?;
            save(&mut session, &city).await;
        }
        Command::Search { query, save: target } => {
            let submitted = session.submit_query(&query);
            if !submitted.remote {
                println!("Type at least a few letters to search");
                return Ok(());
            }
            if session.next_search_update().await == Delivery::Failed {
                eprintln!("Search failed, see the log for details");
                return Ok(());
            }

            let found = session.found();
            match target {
                None if found.is_empty() => println!("Nothing found for {:?}", query),
                None => print_cities(&found),
                Some(position) => {
                    let city = pick(&found, position)?;
                    save(&mut session, &city).await;
                }
            }
        }
        Command::Locate => match session.locate().await {
            Outcome::Done => {
                if let Some(current) = session.saved().iter().find(|c| c.is_geolocation) {
                    println!(
                        "Current location: {} ({})",
                        current.city.name,
                        readable_country(&current.city)
                    );
                }
            }
            Outcome::Stay => {
                report(&session);
                if !has_position {
                    eprintln!("Set [cities.manual_position] in the config file to use locate");
                }
            }
        },
        Command::Remove { index } => {
            let entry = index
                .checked_sub(1)
                .and_then(|i| session.saved().get(i))
                .cloned()
                .with_context(|| format!("No saved city at position {}", index))?;
            session.delete_city(&entry).await;
            println!("Removed {}", entry.city.name);
        }
    }

    tracing::debug!("Townpick finished");
    Ok(())
}
