use std::sync::Arc;

use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use supperclub::auth::{hash_password, TokenKeys};
use supperclub::config::Config;
use supperclub::db::{create_pool, init_db, queries, AppState};
use supperclub::handlers;
use supperclub::models::{CreateEvent, CreateMeal, CreateUser};
use supperclub::payments::StripeClient;

#[derive(Parser, Debug)]
#[command(name = "supperclub")]
#[command(about = "Marketplace backend for home-cooked meal events")]
struct Cli {
    /// Seed the database with dev data (two users, a meal, an event)
    #[arg(long)]
    seed: bool,
}

/// Seeds the database with dev data for local testing.
/// Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing = queries::get_user_by_email(&conn, "chef@supperclub.local")
        .expect("Failed to check for seed data");
    if existing.is_some() {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("Seeding dev data");

    let password_hash = hash_password("password123").expect("Failed to hash seed password");

    let chef = queries::create_user(
        &conn,
        &CreateUser {
            name: "Dev Chef".to_string(),
            email: "chef@supperclub.local".to_string(),
            password: "password123".to_string(),
            university: Some("Dev University".to_string()),
            description: Some("Seeded chef account".to_string()),
        },
        &password_hash,
    )
    .expect("Failed to create seed chef");

    let foodie = queries::create_user(
        &conn,
        &CreateUser {
            name: "Dev Foodie".to_string(),
            email: "foodie@supperclub.local".to_string(),
            password: "password123".to_string(),
            university: None,
            description: None,
        },
        &password_hash,
    )
    .expect("Failed to create seed foodie");

    let meal = queries::create_meal(
        &conn,
        &chef.id,
        &CreateMeal {
            title: "Ramen Night".to_string(),
            description: "Tonkotsu ramen from scratch".to_string(),
            ingredients: "pork bone broth, noodles, eggs, scallions".to_string(),
            image_url: None,
        },
    )
    .expect("Failed to create seed meal");

    let event = queries::create_event(
        &conn,
        &chef.id,
        &CreateEvent {
            meal_id: meal.id.clone(),
            title: "Ramen Night at Dev Chef's".to_string(),
            description: "Six seats around the kitchen counter".to_string(),
            max_participants: 6,
            location: "Dev Kitchen".to_string(),
            event_date: queries::now() + 7 * 24 * 3600,
            image_url: None,
            price: 2500,
            currency: "usd".to_string(),
        },
    )
    .expect("Failed to create seed event");

    tracing::info!("Seed chef:   {} (chef@supperclub.local / password123)", chef.id);
    tracing::info!("Seed foodie: {} (foodie@supperclub.local / password123)", foodie.id);
    tracing::info!("Seed meal:   {}", meal.id);
    tracing::info!("Seed event:  {}", event.id);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "supperclub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        gateway: Arc::new(StripeClient::new(&config)),
        tokens: TokenKeys::from_secret(&config.jwt_secret),
        frontend_url: config.frontend_url.clone(),
        require_host_approval: config.require_host_approval,
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set SUPPERCLUB_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = handlers::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Supperclub server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
