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

use runeward_mysql_auth::{MySqlAccountService, MySqlRealmList};

use crate::{
    authserver::AuthServer,
    conf::AuthServerConfig,
    opt::{Opt, OptCommand},
};

mod authserver;
mod conf;
mod connection;
mod opt;

#[tokio::main]
async fn main() -> Result<()> {
    setup_panic!();
    tracing_subscriber::fmt::init();

    let opts: Opt = Opt::from_args();

    match opts.command {
        Some(OptCommand::Init) => {
            AuthServerConfig::default().write(&opts.config).await?;
            info!("wrote default config to {}", opts.config.display());
        }
        Some(OptCommand::Account { username, password }) => {
            let config = AuthServerConfig::read(&opts.config).await?;
            let pool = MySqlPool::connect(&config.auth_database)
                .await
                .context("could not start the database pool")?;
            let accounts = MySqlAccountService::new(pool);

            let (verifier, salt) = runeward_srp::register(&username, &password);
            let id = runeward_game::accounts::AccountService::create_account(
                &accounts, &username, salt, verifier,
            )
            .await?;
            info!("created account {username} ({id})");
        }
        None => start_server(&opts).await?,
    }

    Ok(())
}

async fn start_server(opts: &Opt) -> Result<()> {
    let config = AuthServerConfig::read(&opts.config).await?;

    let pool = MySqlPool::connect(&config.auth_database)
        .await
        .context("could not start the database pool")?;

    let server = Arc::new(AuthServer {
        accounts: MySqlAccountService::new(pool.clone()),
        realms: MySqlRealmList::new(pool, Duration::from_secs(config.realm_update_interval)),
    });

    server.start(config.bind_address, config.port).await
}
