use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Entity, UniqueKey};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub tour: Uuid,
    pub user: Uuid,
    /// Major currency units.
    pub price: f64,
    #[serde(default = "default_paid")]
    pub paid: bool,
    /// Payment provider event that produced this booking, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn default_paid() -> bool {
    true
}

impl Entity for Booking {
    const COLLECTION: &'static str = "bookings";
    const NAME: &'static str = "Booking";

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate(&self) -> CoreResult<()> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(CoreError::validation("Booking must have a price"));
        }
        Ok(())
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        self.provider_event_id
            .iter()
            .map(|event_id| UniqueKey::new("providerEventId", event_id.clone()))
            .collect()
    }
}
