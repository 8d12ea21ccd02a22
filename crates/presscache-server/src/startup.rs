use std::sync::Arc;

use anyhow::Result;
use presscache_core::{Config, FetchCache, HttpClient, RemoteClient, SessionManager};
use tracing::{info, warn};

/// Build the client, session and cache described by `config`.
pub fn build_cache(config: &Config) -> Result<FetchCache> {
    let client: Arc<dyn RemoteClient> = Arc::new(HttpClient::new(
        &config.api_host,
        config.endpoints.clone(),
        &config.http,
    )?);
    let session = SessionManager::new(client.clone(), config.credential()?, config.session.clone());
    Ok(FetchCache::new(session, client, config.cache.clone()))
}

/// Bring the session up before serving.
///
/// A configured `auth_key` is adopted when the upstream still accepts it;
/// otherwise a fresh login is made. Failure is logged and the server starts
/// anyway, requests answering "No open session" until a reopen succeeds.
pub async fn open_session(session: &SessionManager, auth_key: Option<&str>) {
    if let Some(token) = auth_key.filter(|t| !t.is_empty()) {
        if session.adopt(token).await {
            info!("Using configured auth key");
            return;
        }
        warn!("Configured auth key was rejected, logging in");
    }

    match session.open().await {
        Ok(opened) if opened.valid => info!(generation = opened.generation(), "Session open"),
        Ok(_) => warn!("Login returned a token that did not validate"),
        Err(err) => warn!(error = %err, "Failed to open session"),
    }
}
