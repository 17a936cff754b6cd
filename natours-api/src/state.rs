use std::sync::Arc;

use natours_booking::{BookingReconciler, CheckoutService, CheckoutSettings};
use natours_core::notify::Mailer;
use natours_core::payment::PaymentProvider;
use natours_core::webhook::WebhookVerifier;
use natours_core::{Booking, Entity, Repository, Review, Tour, User};
use natours_store::app_config::Config;
use natours_store::{DbClient, MemoryRepository, PgRepository};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    pub cookie_secure: bool,
}

/// One repository handle per collection.
#[derive(Clone)]
pub struct Repositories {
    pub tours: Arc<dyn Repository<Tour>>,
    pub users: Arc<dyn Repository<User>>,
    pub reviews: Arc<dyn Repository<Review>>,
    pub bookings: Arc<dyn Repository<Booking>>,
}

impl Repositories {
    pub fn postgres(db: &DbClient) -> Self {
        Self {
            tours: Arc::new(PgRepository::<Tour>::new(db.pool.clone())),
            users: Arc::new(PgRepository::<User>::new(db.pool.clone())),
            reviews: Arc::new(PgRepository::<Review>::new(db.pool.clone())),
            bookings: Arc::new(PgRepository::<Booking>::new(db.pool.clone())),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            tours: Arc::new(MemoryRepository::<Tour>::new()),
            users: Arc::new(MemoryRepository::<User>::new()),
            reviews: Arc::new(MemoryRepository::<Review>::new()),
            bookings: Arc::new(MemoryRepository::<Booking>::new()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub checkout: Arc<CheckoutService>,
    pub reconciler: Arc<BookingReconciler>,
    pub webhooks: Arc<WebhookVerifier>,
    pub mailer: Arc<dyn Mailer>,
    pub auth: AuthConfig,
    pub base_url: String,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        payments: Arc<dyn PaymentProvider>,
        mailer: Arc<dyn Mailer>,
        config: &Config,
    ) -> Self {
        let base_url = config.site.base_url.trim_end_matches('/').to_string();

        let checkout = CheckoutService::new(
            repos.tours.clone(),
            payments,
            CheckoutSettings {
                base_url: base_url.clone(),
                image_base_url: config.site.image_base_url.clone(),
                currency: config.payments.currency.clone(),
            },
        );
        let reconciler = BookingReconciler::new(
            repos.tours.clone(),
            repos.users.clone(),
            repos.bookings.clone(),
            mailer.clone(),
            base_url.clone(),
        );
        let webhooks = WebhookVerifier::new(
            config.payments.webhook_secret.clone(),
            config.payments.signature_tolerance_seconds,
        );

        Self {
            repos,
            checkout: Arc::new(checkout),
            reconciler: Arc::new(reconciler),
            webhooks: Arc::new(webhooks),
            mailer,
            auth: AuthConfig {
                secret: config.auth.jwt_secret.clone(),
                expiration: config.auth.jwt_expiration_seconds,
                cookie_secure: config.auth.cookie_secure,
            },
            base_url,
        }
    }
}

/// Lets the generic CRUD handlers find the repository for an entity.
pub trait HasRepository<E: Entity> {
    fn repository(&self) -> &Arc<dyn Repository<E>>;
}

impl HasRepository<Tour> for AppState {
    fn repository(&self) -> &Arc<dyn Repository<Tour>> {
        &self.repos.tours
    }
}

impl HasRepository<User> for AppState {
    fn repository(&self) -> &Arc<dyn Repository<User>> {
        &self.repos.users
    }
}

impl HasRepository<Review> for AppState {
    fn repository(&self) -> &Arc<dyn Repository<Review>> {
        &self.repos.reviews
    }
}

impl HasRepository<Booking> for AppState {
    fn repository(&self) -> &Arc<dyn Repository<Booking>> {
        &self.repos.bookings
    }
}
