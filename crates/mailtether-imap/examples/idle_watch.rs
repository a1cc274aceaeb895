//! Watches a mailbox with IDLE and prints every change.
//!
//! ```text
//! IMAP_HOST=imap.example.com IMAP_USER=me IMAP_PASSWORD=secret \
//!     cargo run --example idle_watch -- INBOX
//! ```
//!
//! Ctrl-C ends the current IDLE (sending `DONE`) and logs out.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailtether_imap::{Capability, Config, Connection, Error, Response, Security, UntaggedResponse};

/// Servers drop IDLE after 30 minutes; restart well before that.
const IDLE_PERIOD: Duration = Duration::from_secs(25 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idle_watch=info,mailtether_imap=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = std::env::var("IMAP_HOST").context("IMAP_HOST is not set")?;
    let user = std::env::var("IMAP_USER").context("IMAP_USER is not set")?;
    let password = std::env::var("IMAP_PASSWORD").context("IMAP_PASSWORD is not set")?;
    let mailbox = std::env::args().nth(1).unwrap_or_else(|| "INBOX".to_string());

    let config = Config::builder(host)
        .security(Security::Implicit)
        .idle_timeout(Some(IDLE_PERIOD))
        .build();
    let connection = Connection::connect(&config).await?;
    let result = watch(&connection, &user, &password, &mailbox).await;

    if !connection.is_disconnected() {
        let _ = connection.logout().await;
    }
    connection.disconnect().await?;
    result
}

async fn watch(connection: &Connection, user: &str, password: &str, mailbox: &str) -> Result<()> {
    connection.login(user, password).await?;
    if !connection.has_capability(&Capability::Idle) {
        connection.capability().await?;
        if !connection.has_capability(&Capability::Idle) {
            bail!("server does not support IDLE");
        }
    }

    connection.select(mailbox).await?;
    if let Some(UntaggedResponse::Exists(n)) = connection.last_response("EXISTS") {
        info!(mailbox, messages = n, "watching");
    }

    loop {
        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        match connection
            .idle_until(Some(IDLE_PERIOD), ctrl_c, print_change)
            .await
        {
            Ok(_) => info!("restarting IDLE"),
            Err(Error::Cancelled) => {
                info!("interrupted");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn print_change(response: &Response) {
    match response {
        Response::Untagged(UntaggedResponse::Exists(n)) => println!("{n} messages"),
        Response::Untagged(UntaggedResponse::Expunge(seq)) => {
            println!("message {} expunged", seq.get());
        }
        Response::Untagged(UntaggedResponse::Fetch { seq, .. }) => {
            println!("message {} changed", seq.get());
        }
        _ => {}
    }
}
