use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::{Parser, Subcommand};
use std::io;

use task_manager::{configure_app, db, models::User, AuthSettings, Config};

#[derive(Parser)]
#[command(name = "task_manager", version, about = "Task tracking REST backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migrations and start the HTTP server (default)
    Serve,
    /// Create a staff superuser
    Createsuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// Password for the new account
        #[arg(long, env = "SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

fn io_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli = Cli::parse();
    let config = Config::from_env().map_err(io_error)?;

    let pool = db::connect(&config.database_url, config.database_max_connections)
        .await
        .map_err(io_error)?;
    db::migrate(&pool).await.map_err(io_error)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, pool).await,
        Commands::Createsuperuser {
            email,
            name,
            password,
        } => {
            let user = User::create_superuser(&pool, &email, &name, &password, config.bcrypt_cost)
                .await
                .map_err(io_error)?;
            println!("Superuser {} created.", user.email);
            Ok(())
        }
    }
}

async fn serve(config: Config, pool: sqlx::SqlitePool) -> io::Result<()> {
    let auth_settings = web::Data::new(AuthSettings::from_config(&config));
    let pool = web::Data::new(pool);

    log::info!("Starting task manager at {}", config.server_url());
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .app_data(pool.clone())
            .app_data(auth_settings.clone())
            .configure(configure_app)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
