use chrono::Utc;
use natours_core::entity::Entity;
use natours_core::money::from_minor_units;
use natours_core::notify::{MailMessage, Mailer};
use natours_core::webhook::WebhookEvent;
use natours_core::{Booking, CoreError, CoreResult, ListQuery, Repository, Tour, User};
use natours_shared::{mask_email, Masked};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Created(Booking),
    /// The provider event was already turned into a booking.
    Duplicate { event_id: String },
    Ignored { event_type: String },
}

/// Turns verified `checkout.session.completed` events into bookings.
///
/// The provider event id is stored on the booking under a unique key, so a
/// redelivered event is acknowledged without creating a second booking.
pub struct BookingReconciler {
    tours: Arc<dyn Repository<Tour>>,
    users: Arc<dyn Repository<User>>,
    bookings: Arc<dyn Repository<Booking>>,
    mailer: Arc<dyn Mailer>,
    base_url: String,
}

impl BookingReconciler {
    pub fn new(
        tours: Arc<dyn Repository<Tour>>,
        users: Arc<dyn Repository<User>>,
        bookings: Arc<dyn Repository<Booking>>,
        mailer: Arc<dyn Mailer>,
        base_url: String,
    ) -> Self {
        Self { tours, users, bookings, mailer, base_url }
    }

    pub async fn handle(&self, event: &WebhookEvent) -> CoreResult<ReconcileOutcome> {
        let Some(checkout) = event.completed_checkout()? else {
            tracing::debug!("Ignoring webhook event {} of type {}", event.id, event.event_type);
            return Ok(ReconcileOutcome::Ignored { event_type: event.event_type.clone() });
        };

        let tour_id = checkout
            .client_reference_id
            .as_deref()
            .ok_or_else(|| CoreError::validation("Checkout session has no client reference id"))?;
        let tour_id = Uuid::parse_str(tour_id)
            .map_err(|_| CoreError::validation(format!("Client reference id is not a tour id: {}", tour_id)))?;
        let email = checkout
            .purchaser_email()
            .ok_or_else(|| CoreError::validation("Checkout session has no customer email"))?
            .trim()
            .to_lowercase();
        let amount = checkout
            .amount_total
            .ok_or_else(|| CoreError::validation("Checkout session has no amount"))?;

        let tour = self
            .tours
            .find_by_id(tour_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Tour", tour_id))?;
        let user = self
            .users
            .find_one(ListQuery::by_field("email", email.clone()))
            .await?
            .ok_or_else(|| CoreError::not_found("User", mask_email(&email)))?;

        let booking = Booking {
            id: Uuid::new_v4(),
            tour: tour.id,
            user: user.id,
            price: from_minor_units(amount),
            paid: true,
            provider_event_id: Some(event.id.clone()),
            checkout_session_id: Some(checkout.id.clone()),
            created_at: Utc::now(),
        };
        booking.validate()?;

        match self.bookings.create(booking).await {
            Ok(booking) => {
                tracing::info!(
                    booking_id = %booking.id,
                    tour_id = %tour.id,
                    customer = %Masked(&user.email),
                    "Booking created from event {}",
                    event.id
                );
                self.send_confirmation(&user, &tour, &booking).await;
                Ok(ReconcileOutcome::Created(booking))
            }
            Err(CoreError::Conflict { .. }) => {
                tracing::info!("Event {} already reconciled, skipping", event.id);
                Ok(ReconcileOutcome::Duplicate { event_id: event.id.clone() })
            }
            Err(e) => Err(e),
        }
    }

    async fn send_confirmation(&self, user: &User, tour: &Tour, booking: &Booking) {
        let url = format!("{}/my-tours", self.base_url);
        let message = MailMessage::booking_confirmation(user, tour, booking, &url);
        if let Err(e) = self.mailer.send(message).await {
            tracing::warn!("Booking {} confirmation email failed: {}", booking.id, e);
        }
    }
}
