use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gymhub_core::{DomainError, DomainResult, Entity, GymId, ReviewId, UserId};

const MAX_COMMENT_CHARS: usize = 2000;

/// A member's rating of a gym. One per (author, gym).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub gym_id: GymId,
    pub author_id: UserId,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(
        gym_id: GymId,
        author_id: UserId,
        rating: u8,
        comment: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !(1..=5).contains(&rating) {
            return Err(DomainError::validation("rating must be between 1 and 5"));
        }
        let comment = comment.trim();
        if comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(DomainError::validation("review comment is too long"));
        }
        Ok(Self {
            id: ReviewId::new(),
            gym_id,
            author_id,
            rating,
            comment: comment.to_string(),
            created_at: now,
        })
    }

    pub fn is_by(&self, author: UserId, gym: GymId) -> bool {
        self.author_id == author && self.gym_id == gym
    }
}

impl Entity for Review {
    type Id = ReviewId;
    const COLLECTION: &'static str = "reviews";

    fn id(&self) -> ReviewId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn rating_range_is_enforced(rating in any::<u8>()) {
            let result = Review::new(GymId::new(), UserId::new(), rating, "", Utc::now());
            prop_assert_eq!(result.is_ok(), (1..=5).contains(&rating));
        }
    }
}
