use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gymhub_core::{BookingId, DomainError, DomainResult, Entity, GymId, UserId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Booked,
    Cancelled,
}

/// A member's session with a trainer of their gym.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub gym_id: GymId,
    pub member_id: UserId,
    pub trainer_id: UserId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: BookingStatus,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled_by: Option<UserId>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn new(
        gym_id: GymId,
        member_id: UserId,
        trainer_id: UserId,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if ends_at <= starts_at {
            return Err(DomainError::validation("booking must end after it starts"));
        }
        if starts_at < now {
            return Err(DomainError::validation("cannot book a session in the past"));
        }
        Ok(Self {
            id: BookingId::new(),
            gym_id,
            member_id,
            trainer_id,
            starts_at,
            ends_at,
            status: BookingStatus::Booked,
            note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            created_at: now,
            cancelled_by: None,
            cancelled_at: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Booked
    }

    /// Two active bookings of the same trainer whose windows intersect.
    /// Touching windows (one ends when the other starts) do not overlap.
    pub fn overlaps(&self, other: &Booking) -> bool {
        self.is_active()
            && other.is_active()
            && self.trainer_id == other.trainer_id
            && self.starts_at < other.ends_at
            && other.starts_at < self.ends_at
    }

    pub fn is_party(&self, user: UserId) -> bool {
        self.member_id == user || self.trainer_id == user
    }

    pub fn cancel(&mut self, by: UserId, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active() {
            return Err(DomainError::invalid_state("booking is already cancelled"));
        }
        self.status = BookingStatus::Cancelled;
        self.cancelled_by = Some(by);
        self.cancelled_at = Some(now);
        Ok(())
    }
}

impl Entity for Booking {
    type Id = BookingId;
    const COLLECTION: &'static str = "bookings";

    fn id(&self) -> BookingId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn booking(trainer: UserId, start_h: i64, end_h: i64) -> Booking {
        let base = Utc::now() + Duration::days(1);
        Booking::new(
            GymId::new(),
            UserId::new(),
            trainer,
            base + Duration::hours(start_h),
            base + Duration::hours(end_h),
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn window_must_be_positive_and_in_the_future() {
        let now = Utc::now();
        let start = now + Duration::hours(1);
        assert!(Booking::new(GymId::new(), UserId::new(), UserId::new(), start, start, None, now).is_err());
        assert!(
            Booking::new(
                GymId::new(),
                UserId::new(),
                UserId::new(),
                now - Duration::hours(2),
                now - Duration::hours(1),
                None,
                now
            )
            .is_err()
        );
    }

    #[test]
    fn overlap_requires_same_trainer_and_intersection() {
        let trainer = UserId::new();
        let a = booking(trainer, 0, 2);
        assert!(a.overlaps(&booking(trainer, 1, 3)));
        assert!(!a.overlaps(&booking(trainer, 2, 3)));
        assert!(!a.overlaps(&booking(UserId::new(), 0, 2)));
    }

    #[test]
    fn cancelled_bookings_do_not_overlap_and_cannot_be_cancelled_twice() {
        let trainer = UserId::new();
        let mut a = booking(trainer, 0, 2);
        a.cancel(a.member_id, Utc::now()).unwrap();
        assert!(!a.overlaps(&booking(trainer, 0, 2)));
        assert!(matches!(a.cancel(a.member_id, Utc::now()), Err(DomainError::InvalidState(_))));
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(s1 in 0i64..48, l1 in 1i64..6, s2 in 0i64..48, l2 in 1i64..6) {
            let trainer = UserId::new();
            let a = booking(trainer, s1, s1 + l1);
            let b = booking(trainer, s2, s2 + l2);
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }
    }
}
