pub mod app_config;
pub mod database;
pub mod mailer;
pub mod memory_repo;
pub mod pg_repo;
pub mod stripe_client;

pub use database::DbClient;
pub use mailer::SmtpMailer;
pub use memory_repo::MemoryRepository;
pub use pg_repo::PgRepository;
pub use stripe_client::StripeClient;
