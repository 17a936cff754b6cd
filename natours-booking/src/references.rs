use natours_core::{Booking, CoreError, CoreResult, Repository, Tour, User};

/// A booking may only point at a tour and a user that exist.
pub async fn ensure_booking_references(
    tours: &dyn Repository<Tour>,
    users: &dyn Repository<User>,
    booking: &Booking,
) -> CoreResult<()> {
    if tours.find_by_id(booking.tour).await?.is_none() {
        return Err(CoreError::not_found("Tour", booking.tour));
    }
    if users.find_by_id(booking.user).await?.is_none() {
        return Err(CoreError::not_found("User", booking.user));
    }
    Ok(())
}
