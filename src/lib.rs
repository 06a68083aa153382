#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use crate::adapters::redis::RedisClient;
use crate::api::ApiClient;
use crate::config::{Config, StoreBackend, StoreConfig};
use crate::services::{AuthService, AuthenticatedClient, SessionBootstrapper};
use crate::storage::{CredentialStore, FileStore, MemoryStore, RedisStore};
use std::sync::Arc;

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod storage;
pub mod telemetry;

/// Opens the credential store selected by `config`.
///
/// # Errors
/// Returns an error if the redis backend is selected and cannot be reached.
pub async fn open_store(config: &StoreConfig) -> anyhow::Result<CredentialStore> {
    let store = match config.backend {
        StoreBackend::File => CredentialStore::new(Arc::new(FileStore::new(config.path.clone()))),
        StoreBackend::Memory => CredentialStore::new(Arc::new(MemoryStore::new())),
        StoreBackend::Redis => {
            let redis = RedisClient::connect(config).await?;
            CredentialStore::new(Arc::new(RedisStore::new(redis, config.redis_key.clone())))
        }
    };
    tracing::debug!(backend = ?config.backend, "Credential store opened");
    Ok(store)
}

/// The wired-up session boundary: one store, one executor, and the services on top.
#[derive(Debug, Clone)]
pub struct Client {
    pub auth: AuthService,
    pub bootstrapper: SessionBootstrapper,
}

impl Client {
    /// Wires the services around an already opened store.
    ///
    /// # Errors
    /// Returns a configuration error if the backend URL is missing or invalid.
    pub fn new(config: &Config, store: CredentialStore) -> error::Result<Self> {
        let api = ApiClient::new(&config.api)?;
        let guarded = AuthenticatedClient::new(api, store.clone());
        Ok(Self { auth: AuthService::new(guarded), bootstrapper: SessionBootstrapper::new(store) })
    }

    #[must_use]
    pub const fn requests(&self) -> &AuthenticatedClient {
        self.auth.client()
    }
}
