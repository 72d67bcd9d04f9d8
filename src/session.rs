use std::sync::Arc;

use crate::crypto::{DeriveError, KeyDeriver, KeyPair, Mnemonic, ValidationError};
use crate::storage::{KeyValueStore, SecretStore, StorageError};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Route {
    SetSeed,
    Dashboard,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Self::SetSeed => "/set-seed",
            Self::Dashboard => "/dashboard",
        }
    }
}

/// UI capabilities the session drives but does not own.
pub trait SessionPort: Send + Sync {
    fn set_loading(&self, loading: bool);

    fn navigate(&self, route: Route);
}

/// Port for headless use, only reports transitions to the log.
#[derive(Default, Copy, Clone)]
pub struct TracingPort;

impl SessionPort for TracingPort {
    fn set_loading(&self, loading: bool) {
        tracing::debug!(loading, "loading state changed");
    }

    fn navigate(&self, route: Route) {
        tracing::info!(route = route.path(), "navigate");
    }
}

/// Seed acceptance and restoration for one origin.
pub struct Session<S> {
    store: SecretStore<S>,
    deriver: KeyDeriver,
    port: Arc<dyn SessionPort>,
}

impl<S: KeyValueStore> Session<S> {
    pub fn new(store: SecretStore<S>, deriver: KeyDeriver, port: Arc<dyn SessionPort>) -> Self {
        Self {
            store,
            deriver,
            port,
        }
    }

    pub fn store(&self) -> &SecretStore<S> {
        &self.store
    }

    pub fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    /// Persists an already valid phrase and moves to the dashboard.
    pub fn accept_generated(&self, mnemonic: &Mnemonic) -> Result<(), SessionError> {
        self.accept(mnemonic, mnemonic.phrase())
    }

    /// Nothing is stored and no navigation happens unless the phrase is valid.
    /// A valid phrase is stored exactly as entered.
    pub fn enter_phrase(&self, input: &str) -> Result<Mnemonic, SessionError> {
        let mnemonic = Mnemonic::parse_phrase(input)?;
        self.accept(&mnemonic, input)?;
        Ok(mnemonic)
    }

    fn accept(&self, mnemonic: &Mnemonic, entered: &str) -> Result<(), SessionError> {
        self.port.set_loading(true);
        if let Err(e) = self.store.save_as_entered(mnemonic, entered) {
            self.port.set_loading(false);
            return Err(e.into());
        }
        self.port.navigate(Route::Dashboard);
        Ok(())
    }

    /// Address of the stored phrase, `None` without an active secret.
    pub fn restore(&self) -> Option<String> {
        match self.with_keypair(|keypair| keypair.address().to_owned()) {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!("failed to derive keys from the stored secret: {e}");
                None
            }
        }
    }

    /// Re-derives the keypair for the duration of `f` only.
    pub fn with_keypair<T, F>(&self, f: F) -> Result<Option<T>, DeriveError>
    where
        F: FnOnce(&KeyPair) -> T,
    {
        let Some(mnemonic) = self.store.load() else {
            return Ok(None);
        };
        let keypair = self.deriver.derive(&mnemonic)?;
        Ok(Some(f(&keypair)))
    }

    pub fn logout(&self) -> Result<(), SessionError> {
        self.store.clear()?;
        self.port.navigate(Route::SetSeed);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to store the seed phrase")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Derive(#[from] DeriveError),
}
