//! `cftp-server` — a dual-channel (control + data) file-transfer server
//! with opportunistic TLS upgrade. See SPEC_FULL.md for the full design.

#[global_allocator]
#[cfg(not(feature = "system_allocator"))]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod auth;
mod config;
mod error;
mod ipc;
mod stream;
mod supervisor;
mod tls;
mod worker;

use std::sync::Arc;

use auth::SystemAuthenticator;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::load()?);
    simple_logger::init_with_level(config.log_level.as_level())?;

    let tls_acceptor = Arc::new(tls::build_acceptor(&config.ssl_cert_file, &config.ssl_key_file)?);
    let authenticator = Arc::new(SystemAuthenticator);

    supervisor::run(config, authenticator, tls_acceptor).await?;
    Ok(())
}
