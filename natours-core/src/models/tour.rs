use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::Entity;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    pub duration: u32,
    pub max_group_size: u32,
    pub difficulty: Difficulty,
    #[serde(default = "default_ratings_average")]
    pub ratings_average: f64,
    #[serde(default)]
    pub ratings_quantity: u32,
    /// Major currency units.
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Tour {
    /// Rating shown for tours nobody has reviewed yet.
    pub const DEFAULT_RATING: f64 = 4.5;
}

fn default_ratings_average() -> f64 {
    Tour::DEFAULT_RATING
}

impl Entity for Tour {
    const COLLECTION: &'static str = "tours";
    const NAME: &'static str = "Tour";

    fn id(&self) -> Uuid {
        self.id
    }

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.summary = self.summary.trim().to_string();
        self.slug = slugify(&self.name);
    }

    fn validate(&self) -> CoreResult<()> {
        let name_len = self.name.chars().count();
        if !(10..=40).contains(&name_len) {
            return Err(CoreError::validation("A tour name must have between 10 and 40 characters"));
        }
        if self.duration == 0 {
            return Err(CoreError::validation("A tour must have a duration"));
        }
        if self.max_group_size == 0 {
            return Err(CoreError::validation("A tour must have a group size"));
        }
        if !(1.0..=5.0).contains(&self.ratings_average) {
            return Err(CoreError::validation("Rating must be between 1.0 and 5.0"));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(CoreError::validation("A tour must have a positive price"));
        }
        if let Some(discount) = self.price_discount {
            if !discount.is_finite() || discount < 0.0 || discount >= self.price {
                return Err(CoreError::validation(format!(
                    "Discount price ({}) should be below regular price",
                    discount
                )));
            }
        }
        if self.summary.is_empty() {
            return Err(CoreError::validation("A tour must have a summary"));
        }
        if self.image_cover.trim().is_empty() {
            return Err(CoreError::validation("A tour must have a cover image"));
        }
        Ok(())
    }
}

/// Lower-cases and joins alphanumeric runs with `-`.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Snow Adventurer"), "the-snow-adventurer");
        assert_eq!(slugify("  The Wine--Taster! "), "the-wine-taster");
    }
}
