pub mod availability;
pub mod booking;
pub mod bot;
pub mod notify;
pub mod statistics;
