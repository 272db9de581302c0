pub mod booking;
pub mod session;
pub mod slots;
pub mod user;

pub use booking::{Booking, BookingStatus};
pub use session::{BotSession, SessionData, SessionState};
pub use user::{User, UserRole, UserSummary};
