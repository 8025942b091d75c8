use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gymhub_core::{AnnouncementId, DomainError, DomainResult, Entity, GymId, UserId};

const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: AnnouncementId,
    pub gym_id: GymId,
    pub author_id: UserId,
    pub title: String,
    pub body: String,
    pub posted_at: DateTime<Utc>,
}

impl Announcement {
    pub fn new(gym_id: GymId, author_id: UserId, title: &str, body: &str, now: DateTime<Utc>) -> DomainResult<Self> {
        let title = title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
            return Err(DomainError::validation(format!(
                "title must be 1 to {MAX_TITLE_CHARS} characters"
            )));
        }
        let body = body.trim();
        if body.is_empty() {
            return Err(DomainError::validation("announcement body cannot be empty"));
        }
        Ok(Self {
            id: AnnouncementId::new(),
            gym_id,
            author_id,
            title: title.to_string(),
            body: body.to_string(),
            posted_at: now,
        })
    }
}

impl Entity for Announcement {
    type Id = AnnouncementId;
    const COLLECTION: &'static str = "announcements";

    fn id(&self) -> AnnouncementId {
        self.id
    }
}
