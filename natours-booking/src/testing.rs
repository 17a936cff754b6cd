use async_trait::async_trait;
use natours_core::entity;
use natours_core::notify::{MailMessage, Mailer};
use natours_core::{CoreResult, Tour, User};
use serde_json::json;
use std::sync::Mutex;

use crate::checkout::CheckoutSettings;

pub fn settings() -> CheckoutSettings {
    CheckoutSettings {
        base_url: "https://natours.test".to_string(),
        image_base_url: "https://natours.test/img/tours/".to_string(),
        currency: "usd".to_string(),
    }
}

pub fn sample_tour(name: &str, price: f64) -> Tour {
    entity::build(json!({
        "name": name,
        "duration": 7,
        "maxGroupSize": 15,
        "difficulty": "medium",
        "price": price,
        "summary": "Exploring the jaw-dropping US east coast by foot and by boat",
        "imageCover": "tour-cover.jpg"
    }))
    .unwrap()
}

pub fn sample_user(email: &str) -> User {
    entity::build(json!({ "name": "Laura Wilson", "email": email })).unwrap()
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<MailMessage>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> CoreResult<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}
