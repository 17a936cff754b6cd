pub mod booking;
pub mod review;
pub mod tour;
pub mod user;

pub use booking::Booking;
pub use review::Review;
pub use tour::{Difficulty, Tour};
pub use user::{Role, User};
