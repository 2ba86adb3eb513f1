//! Marketplace settlement service

use anyhow::Result;
use marketplace_settlement::api::{router, AppState};
use marketplace_settlement::config::AppConfig;
use marketplace_settlement::gateway::{Gateways, PaypalClient, StripeClient};
use marketplace_settlement::publisher::EventPublisher;
use marketplace_settlement::store::{MemoryStore, PgStore, SettlementStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let store: Arc<dyn SettlementStore> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Arc::new(PgStore::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url).await {
            Ok(client) => Some(client),
            Err(e) => { tracing::warn!(error = %e, "NATS unavailable, events will not be published"); None }
        },
        None => None,
    };

    let mut gateways = Gateways::default();
    if let Some(stripe) = &config.stripe {
        gateways.stripe = Some(Arc::new(StripeClient::new(stripe, config.gateway_timeout)?));
    }
    if let Some(paypal) = &config.paypal {
        gateways.paypal = Some(Arc::new(PaypalClient::new(paypal, config.gateway_timeout)?));
    }
    tracing::info!(stripe = gateways.stripe.is_some(), paypal = gateways.paypal.is_some(), "payment gateways");

    let state = AppState::new(store, EventPublisher::new(nats), gateways, &config.currency);
    let app = router(state);

    tracing::info!("Marketplace settlement listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
