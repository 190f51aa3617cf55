#![forbid(unsafe_code)]
#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications,
    clippy::useless_conversion,
    clippy::unwrap_used,
    clippy::todo,
    clippy::unimplemented
)]

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use human_panic::setup_panic;
use sqlx::MySqlPool;
use structopt::StructOpt;
use tracing::info;

use runeward_mysql_auth::MySqlAccountService;
use runeward_mysql_characters::MySqlCharacterService;

use crate::{
    conf::WorldServerConfig,
    opt::{Opt, OptCommand},
    world::World,
    worldserver::WorldServer,
};

mod client;
mod conf;
mod opt;
mod world;
mod worldserver;

#[tokio::main]
async fn main() -> Result<()> {
    setup_panic!();
    tracing_subscriber::fmt::init();

    let opts: Opt = Opt::from_args();

    match opts.command {
        Some(OptCommand::Init) => {
            WorldServerConfig::default().write(&opts.config).await?;
            info!("wrote default config to {}", opts.config.display());
        }
        None => start_server(&opts).await?,
    }

    Ok(())
}

async fn start_server(opts: &Opt) -> Result<()> {
    let config = WorldServerConfig::read(&opts.config).await?;

    let auth_pool = MySqlPool::connect(&config.auth_database)
        .await
        .context("could not start the auth database pool")?;
    let character_pool = MySqlPool::connect(&config.character_database)
        .await
        .context("could not start the character database pool")?;

    let world = Arc::new(World::new(
        MySqlAccountService::new(auth_pool),
        MySqlCharacterService::new(character_pool),
    ));
    let server = WorldServer::new(world.clone());

    let update_world = world.clone();
    let update_interval = Duration::from_millis(config.update_interval);
    let updates = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(update_interval);
        loop {
            ticker.tick().await;
            update_world.update_tick().await;
        }
    });

    let gc_world = world.clone();
    let gc_interval = Duration::from_secs(config.channel_gc_interval);
    let channel_gc = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(gc_interval);
        loop {
            ticker.tick().await;
            gc_world.chat.clean(None).await;
        }
    });

    let accept = server.accept_clients(config.bind_address, config.port);
    tokio::select! {
        result = accept => result,
        _ = updates => Ok(()),
        _ = channel_gc => Ok(()),
    }
}
