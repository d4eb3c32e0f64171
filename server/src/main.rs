use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crm_server::{AppConfig, AppState, ServeConfig, http, proxy};
use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, DbPool, connect};
use platform_obs::{ObsConfig, init_tracing};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "crm-server", version, about = "CRM suite backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the REST API server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Insert the demo administrator and sample records.
    Seed,
    /// Run the forwarding proxy in front of the API.
    Proxy(ProxyCommand),
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,
    #[arg(long, default_value_t = 8000)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

impl From<&ServeCommand> for ServeConfig {
    fn from(value: &ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[derive(Args, Debug)]
struct ProxyCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, env = "PROXY_UPSTREAM", default_value = proxy::DEFAULT_UPSTREAM)]
    upstream: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::for_service("crm-server"))?;
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(cmd) => run_server(cmd).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up().await,
            MigrateCommand::Down => migrate_down().await,
        },
        Command::Seed => run_seed().await,
        Command::Proxy(cmd) => {
            proxy::run(SocketAddr::from((cmd.host, cmd.port)), &cmd.upstream).await
        }
    }
}

async fn setup_pool(settings: &DatabaseSettings) -> Result<DbPool> {
    connect(settings).await.map_err(Into::into)
}

async fn run_server(cmd: ServeCommand) -> Result<()> {
    let config = AppConfig::load().context("invalid configuration")?;
    let pool = setup_pool(&config.database).await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;
    if config.request_screening {
        info!("request screening enabled");
    }
    http::serve((&cmd).into(), AppState::new(pool, config)).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "{} pending migrations; run `crm-server migrate up` or pass --allow-dirty",
            pending.len()
        );
    }
    Ok(())
}

async fn run_seed() -> Result<()> {
    let pool = setup_pool(&DatabaseSettings::from_env()).await?;
    ensure_migrations(&pool, false).await?;
    let report = products_crm::seed::seed_demo(&pool)
        .await
        .context("seeding failed")?;
    if report.created {
        info!(
            admin_id = %report.admin_id,
            email = products_crm::seed::DEMO_EMAIL,
            "demo data seeded"
        );
    } else {
        info!("demo data already present; nothing to do");
    }
    Ok(())
}

async fn migrate_up() -> Result<()> {
    let pool = setup_pool(&DatabaseSettings::from_env()).await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down() -> Result<()> {
    let pool = setup_pool(&DatabaseSettings::from_env()).await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}
