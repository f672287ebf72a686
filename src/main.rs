mod error;
mod forecast;
mod manager;
mod message;
mod pg_store;
mod pushport_manager;
mod pushport_subscriber;
mod reconcile;
mod schedule;
mod store;
mod subscriber;
mod times;

use config_file::FromConfigFile;
use serde::Deserialize;

use crate::manager::Manager;
use crate::pg_store::{PgConfig, PgStore};
use crate::pushport_manager::{PushPortConfig, PushPortManager};

#[derive(Clone, Deserialize)]
struct Config {
    postgres: PgConfig,
    pushport: PushPortConfig,
}

#[tokio::main]
async fn main() -> Result<(), error::Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_config_file("./config.toml")?; // TODO improve

    let store = PgStore::connect(config.postgres).await?;

    let mut pushport_manager = PushPortManager::new(config.pushport, store);

    tokio::try_join!(pushport_manager.run(),)?;

    Ok(())
}
