use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Entity, UniqueKey};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: f64,
    pub tour: Uuid,
    pub user: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Entity for Review {
    const COLLECTION: &'static str = "reviews";
    const NAME: &'static str = "Review";

    fn id(&self) -> Uuid {
        self.id
    }

    fn normalize(&mut self) {
        self.review = self.review.trim().to_string();
    }

    fn validate(&self) -> CoreResult<()> {
        if self.review.is_empty() {
            return Err(CoreError::validation("Review can not be empty"));
        }
        if !(1.0..=5.0).contains(&self.rating) {
            return Err(CoreError::validation("Rating must be between 1 and 5"));
        }
        Ok(())
    }

    // one review per user and tour
    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("tour_user", format!("{}:{}", self.tour, self.user))]
    }
}
