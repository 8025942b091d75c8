use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gymhub_core::{DomainError, DomainResult, Entity, GymId, MessageId, UserId};

pub const MAX_MESSAGE_CHARS: usize = 2000;

/// A chat message between two people of the same gym. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub gym_id: GymId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        gym_id: GymId,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if sender_id == receiver_id {
            return Err(DomainError::validation("cannot send a message to yourself"));
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::validation("message content cannot be empty"));
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(DomainError::validation(format!(
                "message content exceeds {MAX_MESSAGE_CHARS} characters"
            )));
        }

        Ok(Self {
            id: MessageId::new(),
            gym_id,
            sender_id,
            receiver_id,
            content: content.to_string(),
            sent_at: now,
        })
    }

    /// Whether this message belongs to the conversation between `a` and `b`
    /// in `gym`, in either direction.
    pub fn is_between(&self, gym: GymId, a: UserId, b: UserId) -> bool {
        self.gym_id == gym
            && ((self.sender_id == a && self.receiver_id == b)
                || (self.sender_id == b && self.receiver_id == a))
    }
}

impl Entity for Message {
    type Id = MessageId;
    const COLLECTION: &'static str = "messages";

    fn id(&self) -> MessageId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_oversized_and_self_addressed() {
        let gym = GymId::new();
        let a = UserId::new();
        let b = UserId::new();
        let now = Utc::now();

        assert!(Message::new(gym, a, b, "   ", now).is_err());
        assert!(Message::new(gym, a, a, "hi", now).is_err());
        assert!(Message::new(gym, a, b, &"x".repeat(MAX_MESSAGE_CHARS + 1), now).is_err());
        assert!(Message::new(gym, a, b, &"é".repeat(MAX_MESSAGE_CHARS), now).is_ok());
    }

    #[test]
    fn conversation_matches_both_directions_within_gym() {
        let gym = GymId::new();
        let a = UserId::new();
        let b = UserId::new();
        let msg = Message::new(gym, a, b, " hello ", Utc::now()).unwrap();
        assert_eq!(msg.content, "hello");
        assert!(msg.is_between(gym, a, b));
        assert!(msg.is_between(gym, b, a));
        assert!(!msg.is_between(GymId::new(), a, b));
        assert!(!msg.is_between(gym, a, UserId::new()));
    }
}
