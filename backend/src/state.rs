use std::sync::Arc;

use crate::{
    config::Config, coordination::RideRegistry, services::intercom_token::IntercomTokenSigner,
};

#[derive(Clone)]
pub struct AppState {
    pub rides: Arc<RideRegistry>,
    pub signer: IntercomTokenSigner,
    pub config: Config,
}

impl AppState {
    pub fn new(rides: Arc<RideRegistry>, config: Config) -> Self {
        let signer = IntercomTokenSigner::new(
            config.livekit_api_key.clone(),
            config.livekit_api_secret.clone(),
            config.livekit_url.clone(),
        );
        Self {
            rides,
            signer,
            config,
        }
    }
}
