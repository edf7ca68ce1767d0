use clap::{Parser, Subcommand};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use recipe_api::{
    actions::register_superuser,
    config::Config,
    jwt::SessionKeys,
    routes::{routes, Context},
    schema::NewUser,
    storage::MediaStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Create an account with staff and superuser rights
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        name: String,
    },
}

fn init_logging() {
    // Default to `info,sqlx=warn` if RUST_LOG is not set.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    dotenv().ok();
    init_logging();

    let config = Config::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Database migrations applied");

    match args.command.unwrap_or(Command::Serve) {
        Command::CreateSuperuser {
            email,
            password,
            name,
        } => {
            let user = register_superuser(
                NewUser {
                    email: Some(email),
                    password,
                    name,
                },
                &pool,
            )
            .await?;
            log::info!("Created superuser {} ({})", user.email, user.id);
        }
        Command::Serve => {
            let keys = SessionKeys::new(&config.jwt_secret, config.token_lifetime);
            let media = MediaStore::new(config.media_root.clone());
            let ctx = Context::new(pool, keys, media, config.max_upload_bytes);

            log::info!("Listening on {}:{}", config.address, config.port);
            warp::serve(routes(ctx))
                .run((config.address, config.port))
                .await;
        }
    }

    Ok(())
}
