//! Renders intercom grants into access tokens for a LiveKit compatible media
//! relay.

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::models::intercom::IntercomGrant;

/// Room permissions understood by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room: String,
    pub room_join: bool,
    pub can_publish: bool,
    pub can_subscribe: bool,
    pub can_publish_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayClaims {
    /// API key of this server.
    pub iss: String,
    /// Participant identity inside the room.
    pub sub: String,
    pub nbf: i64,
    pub exp: i64,
    pub video: VideoGrant,
}

/// A grant together with its signed token and the relay to present it to.
#[derive(Debug, Clone, Serialize)]
pub struct SignedGrant {
    #[serde(flatten)]
    pub grant: IntercomGrant,
    pub token: String,
    pub server_url: String,
}

#[derive(Clone)]
pub struct IntercomTokenSigner {
    api_key: String,
    api_secret: String,
    server_url: String,
}

impl IntercomTokenSigner {
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        server_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            server_url: server_url.into(),
        }
    }

    pub fn claims_for(&self, grant: &IntercomGrant) -> RelayClaims {
        RelayClaims {
            iss: self.api_key.clone(),
            sub: grant.identity_id.to_string(),
            nbf: grant.issued_at.timestamp(),
            exp: grant.expires_at.timestamp(),
            video: VideoGrant {
                room: grant.room.clone(),
                room_join: true,
                can_publish: grant.capability.can_publish(),
                can_subscribe: true,
                can_publish_data: true,
            },
        }
    }

    pub fn sign(&self, grant: IntercomGrant) -> anyhow::Result<SignedGrant> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            anyhow::bail!("intercom relay credentials are not configured");
        }
        let claims = self.claims_for(&grant);
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )?;
        Ok(SignedGrant {
            grant,
            token,
            server_url: self.server_url.clone(),
        })
    }
}

/// Seconds left on a grant, floored at zero.
pub fn remaining_seconds(grant: &IntercomGrant, now: DateTime<Utc>) -> i64 {
    (grant.expires_at - now).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::intercom::{room_name, IntercomCapability};
    use crate::types::{ParticipantId, RideId, UserId};
    use chrono::Duration;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn grant(capability: IntercomCapability) -> IntercomGrant {
        let ride_id = RideId::new();
        let now = Utc::now();
        IntercomGrant {
            ride_id,
            participant_id: ParticipantId::new(),
            identity_id: UserId::new(),
            capability,
            room: room_name(ride_id),
            issued_at: now,
            expires_at: now + Duration::minutes(60),
        }
    }

    #[test]
    fn signed_token_carries_room_permissions() {
        let signer = IntercomTokenSigner::new("key", "secret", "wss://relay.example");
        let signed = signer
            .sign(grant(IntercomCapability::SubscribeOnly))
            .expect("sign");

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;
        let decoded = decode::<RelayClaims>(
            &signed.token,
            &DecodingKey::from_secret(b"secret"),
            &validation,
        )
        .expect("decode");

        assert_eq!(decoded.claims.iss, "key");
        assert_eq!(decoded.claims.video.room, signed.grant.room);
        assert!(!decoded.claims.video.can_publish);
        assert!(decoded.claims.video.can_subscribe);
        assert_eq!(signed.server_url, "wss://relay.example");
    }

    #[test]
    fn lead_grant_can_publish() {
        let signer = IntercomTokenSigner::new("key", "secret", "wss://relay.example");
        let claims = signer.claims_for(&grant(IntercomCapability::PublishAndSubscribe));
        assert!(claims.video.can_publish);
        assert!(claims.video.room_join);
    }

    #[test]
    fn unconfigured_signer_refuses() {
        let signer = IntercomTokenSigner::new("", "", "");
        assert!(signer.sign(grant(IntercomCapability::SubscribeOnly)).is_err());
    }

    #[test]
    fn remaining_seconds_floors_at_zero() {
        let g = grant(IntercomCapability::SubscribeOnly);
        assert_eq!(remaining_seconds(&g, g.expires_at + Duration::seconds(5)), 0);
        assert_eq!(remaining_seconds(&g, g.issued_at), 3600);
    }
}
