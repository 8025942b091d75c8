//! `gymhub-activity`: records hanging off a gym and a pair of participants.
//!
//! Every type here validates its own fields on construction; who may create
//! or read them is decided by the authorization policy in the services.

pub mod announcement;
pub mod booking;
pub mod log;
pub mod message;
pub mod plan;
pub mod review;

pub use announcement::Announcement;
pub use booking::{Booking, BookingStatus};
pub use log::{BodyLog, MacroLog};
pub use message::{MAX_MESSAGE_CHARS, Message};
pub use plan::{Plan, PlanKind};
pub use review::Review;
