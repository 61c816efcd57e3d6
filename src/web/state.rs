use std::{env, sync::Arc};

use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::{mail::Mailer, storage::ObjectStorage, web::codes::CodeGate};

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    mailer: Mailer,
    storage: ObjectStorage,
    code_gate: Arc<RwLock<CodeGate>>,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL env var is missing")?;

        let mailer = Mailer::from_env().context("failed to initialize mail client")?;
        let storage = ObjectStorage::from_env().context("failed to initialize storage client")?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .context("failed to connect to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        Ok(Self {
            pool,
            mailer,
            storage,
            code_gate: Arc::new(RwLock::new(CodeGate::default())),
        })
    }

    /// Make sure at least one coordinator exists so the system can be
    /// bootstrapped through the normal activation flow.
    pub async fn ensure_seed_coordinator(&self) -> Result<()> {
        let has_coordinator: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM practicum_coordinators)")
                .fetch_one(&self.pool)
                .await
                .context("failed to verify coordinator presence")?;

        if !has_coordinator {
            let email = env::var("SEED_COORDINATOR_EMAIL")
                .unwrap_or_else(|_| "coordinator@cca.edu.ph".to_string());

            sqlx::query(
                "INSERT INTO practicum_coordinators
                 (id, cca_email, last_name, first_name, password, activation_code, active_status, is_password_temp)
                 VALUES ($1, $2, $3, $4, '', '', FALSE, TRUE)",
            )
            .bind(Uuid::new_v4())
            .bind(&email)
            .bind("Coordinator")
            .bind("Practicum")
            .execute(&self.pool)
            .await
            .context("failed to insert seed coordinator")?;

            info!(%email, "Seeded practicum coordinator account (pending activation).");
        }

        Ok(())
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    pub fn pool_ref(&self) -> &PgPool {
        &self.pool
    }

    pub fn mailer(&self) -> &Mailer {
        &self.mailer
    }

    pub fn storage(&self) -> &ObjectStorage {
        &self.storage
    }

    pub fn code_gate(&self) -> &Arc<RwLock<CodeGate>> {
        &self.code_gate
    }
}
