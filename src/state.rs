use std::sync::Arc;

use crate::{
    config::Config,
    identity::IdentityVerifier,
    models::Catalog,
    store::Store,
};

/// Everything a request handler can reach. Cheap to clone: all fields are shared.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub catalog: Arc<Catalog>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityVerifier>,
        catalog: Catalog,
        config: Config,
    ) -> Self {
        Self {
            store,
            identity,
            catalog: Arc::new(catalog),
            config: Arc::new(config),
        }
    }
}
