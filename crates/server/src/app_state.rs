use session::SessionStore;
use upstream::UpstreamClient;

use crate::config::ValidatedSettings;

#[derive(Clone)]
pub struct AppState {
    pub upstream: UpstreamClient,
    pub sessions: SessionStore,
    pub secret: String,
}

impl AppState {
    pub fn from_settings(settings: &ValidatedSettings) -> Self {
        Self {
            upstream: UpstreamClient::new(settings.upstream_base_url.clone())
                .with_timeout(settings.upstream_timeout),
            sessions: SessionStore::new(settings.session_ttl),
            secret: settings.secret_key.clone(),
        }
    }
}
