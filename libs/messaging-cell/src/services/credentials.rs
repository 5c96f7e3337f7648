use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::json;
use tracing::debug;

use shared_database::StoreClient;

use crate::error::MessagingError;
use crate::models::StoredCredential;

/// Store-backed persistence for session gateway credentials.
///
/// Blobs are opaque to the engine; each (category, cred_id) key is
/// written atomically via upsert so the session survives restarts.
pub struct CredentialStore {
    store: Arc<StoreClient>,
}

impl CredentialStore {
    pub fn new(store: Arc<StoreClient>) -> Self {
        Self { store }
    }

    pub async fn load_all(&self) -> Result<Vec<StoredCredential>, MessagingError> {
        let creds: Vec<StoredCredential> = self
            .store
            .select("session_credentials", "select=category,cred_id,data")
            .await?;
        debug!("Loaded {} session credential blobs", creds.len());
        Ok(creds)
    }

    pub async fn put(
        &self,
        category: &str,
        cred_id: &str,
        data: &[u8],
    ) -> Result<(), MessagingError> {
        let _: StoredCredential = self
            .store
            .upsert_returning(
                "session_credentials",
                "category,cred_id",
                json!({
                    "category": category,
                    "cred_id": cred_id,
                    "data": STANDARD.encode(data),
                }),
            )
            .await?;
        Ok(())
    }

    /// Wipes every stored blob. Called on explicit logout.
    pub async fn clear(&self) -> Result<(), MessagingError> {
        self.store
            .delete("session_credentials", "category=not.is.null")
            .await?;
        debug!("Cleared session credentials");
        Ok(())
    }
}
