//! Command-line probe for a Home Assistant hub.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use halink_connection::Connection;
use halink_connection::protocol::{CallServiceRequest, OneOrMany, Target};
use halink_pool::ConnectionPool;

use config::ProbeConfig;

/// Talk to a Home Assistant hub over its WebSocket API.
#[derive(Parser, Debug)]
#[command(name = "halink-probe")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: ~/.config/halink/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hub base URL, e.g. http://homeassistant.local:8123.
    #[arg(long, global = true, env = "HALINK_HUB_URL")]
    hub_url: Option<String>,

    /// Long-lived access token.
    #[arg(long, global = true, env = "HALINK_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect, authenticate and print the hub version.
    Check,
    /// List entity states.
    States {
        /// Only entities of this domain (e.g. `light`).
        #[arg(short, long)]
        domain: Option<String>,
        /// Print at most this many entities.
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Print one entity's full state.
    State { entity_id: String },
    /// Call a service.
    Call {
        domain: String,
        service: String,
        /// Target entity; repeatable.
        #[arg(short, long = "entity")]
        entities: Vec<String>,
        /// Service data as a JSON object.
        #[arg(long)]
        data: Option<String>,
        /// Ask the hub for the service response.
        #[arg(long)]
        return_response: bool,
    },
    /// Toggle an entity.
    Toggle { entity_id: String },
    /// Turn an entity on.
    TurnOn { entity_id: String },
    /// Turn an entity off.
    TurnOff { entity_id: String },
    /// Fire an event on the hub's bus.
    Fire {
        event_type: String,
        /// Event data as a JSON object.
        #[arg(long)]
        data: Option<String>,
    },
    /// Print pushed events until Ctrl-C.
    Watch {
        /// Only events of this type (default: all).
        #[arg(long)]
        event_type: Option<String>,
    },
    /// Round-trip an application-level ping.
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,halink=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut cfg = ProbeConfig::load(args.config.as_deref())?;
    cfg.apply_overrides(args.hub_url, args.token);
    let creds = cfg.credentials()?;

    let pool = ConnectionPool::new(cfg.pool_config());
    pool.start();
    let conn = pool.get_connection_for(&cfg.user_id, &creds).await;

    let outcome = run(&conn, args.command).await;
    pool.shutdown().await;
    outcome
}

async fn run(conn: &Connection, command: Command) -> Result<()> {
    match command {
        Command::Check => {
            let version = conn.check().await.context("hub check failed")?;
            println!(
                "connected to {} (Home Assistant {})",
                conn.hub_url(),
                version.as_deref().unwrap_or("unknown")
            );
        }
        Command::States { domain, limit } => {
            let states = match domain.as_deref() {
                Some(domain) => conn.get_states_in_domain(domain).await?,
                None => conn.get_states().await?,
            };
            let total = states.len();
            for state in states.iter().take(limit.unwrap_or(usize::MAX)) {
                println!(
                    "{:<40} {:<16} {}",
                    state.entity_id,
                    state.state,
                    state.friendly_name().unwrap_or("")
                );
            }
            println!("{total} entities");
        }
        Command::State { entity_id } => match conn.get_state(&entity_id).await? {
            Some(state) => print_json(&serde_json::to_value(state)?)?,
            None => anyhow::bail!("entity {entity_id} not found"),
        },
        Command::Call {
            domain,
            service,
            entities,
            data,
            return_response,
        } => {
            let mut request = CallServiceRequest::new(domain, service);
            if let Some(data) = data {
                request = request.with_data(parse_object(&data)?);
            }
            if !entities.is_empty() {
                request = request.with_target(Target::entities(OneOrMany::from(entities)));
            }
            if return_response {
                request = request.returning_response();
            }
            print_json(&conn.call_service(request).await?)?;
        }
        Command::Toggle { entity_id } => print_json(&conn.toggle(&entity_id).await?)?,
        Command::TurnOn { entity_id } => print_json(&conn.turn_on(&entity_id).await?)?,
        Command::TurnOff { entity_id } => print_json(&conn.turn_off(&entity_id).await?)?,
        Command::Fire { event_type, data } => {
            let data = data.as_deref().map(parse_object).transpose()?;
            print_json(&conn.fire_event(&event_type, data).await?)?;
        }
        Command::Watch { event_type } => {
            let id = conn
                .subscribe_events(event_type.as_deref(), |event| println!("{event}"))
                .await?;
            tracing::info!(subscription = id, "watching events, Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            if let Err(e) = conn.unsubscribe_events(id).await {
                tracing::warn!("unsubscribe failed: {e}");
            }
        }
        Command::Ping => {
            let started = std::time::Instant::now();
            conn.ping().await?;
            println!("pong in {} ms", started.elapsed().as_millis());
        }
    }
    Ok(())
}

fn parse_object(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("--data is not valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("--data must be a JSON object");
    }
    Ok(value)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
