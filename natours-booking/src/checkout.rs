use natours_core::money::to_minor_units;
use natours_core::payment::{CheckoutSession, CheckoutSessionRequest, LineItem, PaymentProvider};
use natours_core::{CoreError, CoreResult, Repository, Tour, User};
use natours_shared::Masked;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Public site origin, without trailing slash.
    pub base_url: String,
    pub image_base_url: String,
    pub currency: String,
}

/// Opens provider checkout sessions for tours. Nothing is persisted here;
/// the booking is created later from the provider's completion event.
pub struct CheckoutService {
    tours: Arc<dyn Repository<Tour>>,
    provider: Arc<dyn PaymentProvider>,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        tours: Arc<dyn Repository<Tour>>,
        provider: Arc<dyn PaymentProvider>,
        settings: CheckoutSettings,
    ) -> Self {
        Self { tours, provider, settings }
    }

    pub async fn create_session(&self, tour_id: Uuid, user: &User) -> CoreResult<CheckoutSession> {
        let tour = self
            .tours
            .find_by_id(tour_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Tour", tour_id))?;

        let request = self.session_request(&tour, user);
        let session = self.provider.create_checkout_session(&request).await?;

        tracing::info!(
            session_id = %session.id,
            tour_id = %tour.id,
            customer = %Masked(&user.email),
            "Checkout session created"
        );
        Ok(session)
    }

    pub fn session_request(&self, tour: &Tour, user: &User) -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            payment_method_types: vec!["card".to_string()],
            mode: "payment".to_string(),
            success_url: format!("{}/my-tours?alert=booking", self.settings.base_url),
            cancel_url: format!("{}/tour/{}", self.settings.base_url, tour.slug),
            customer_email: user.email.clone(),
            client_reference_id: tour.id.to_string(),
            line_items: vec![LineItem {
                name: format!("{} Tour", tour.name),
                description: tour.summary.clone(),
                images: vec![format!(
                    "{}/{}",
                    self.settings.image_base_url.trim_end_matches('/'),
                    tour.image_cover
                )],
                unit_amount: to_minor_units(tour.price),
                currency: self.settings.currency.clone(),
                quantity: 1,
            }],
        }
    }
}
