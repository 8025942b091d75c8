use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;

use gymhub_activity::{Announcement, Booking, BodyLog, MacroLog, Message, Plan, PlanKind, Review};
use gymhub_auth::{Action, Actor, GymScope, Participant, Role, check_adjacency, check_conversation};
use gymhub_core::{BookingId, ExpectedVersion, GymId, RequestId, UserId};

use super::{ServiceContext, ensure_allowed, scope};
use crate::error::{ServiceError, ServiceResult};
use crate::store::{Filter, Versioned};

#[derive(Debug, Clone)]
pub struct NewPlan {
    pub kind: PlanKind,
    pub gym_id: GymId,
    pub member_id: UserId,
    pub title: String,
    pub content: String,
    /// Accepted workout/diet request this plan answers.
    pub request_id: Option<RequestId>,
}

#[derive(Debug, Clone, Copy)]
pub struct NewMacroLog {
    pub date: NaiveDate,
    pub calories: u32,
    pub protein_g: u32,
    pub carbs_g: u32,
    pub fat_g: u32,
}

#[derive(Debug, Clone)]
pub struct NewBodyLog {
    pub date: NaiveDate,
    pub weight_kg: f64,
    pub body_fat_pct: Option<f64>,
    /// URLs previously returned by object storage.
    pub photos: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub trainer_id: UserId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Messages, plans, progress logs, reviews, bookings and announcements.
#[derive(Clone)]
pub struct ActivityService {
    ctx: Arc<ServiceContext>,
}

impl ActivityService {
    pub(crate) fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    // --- messages ---

    /// Send a message inside a gym. Both the chat policy and the role-pair
    /// adjacency rule must allow it.
    pub async fn send_message(
        &self,
        actor: &Actor,
        gym_id: GymId,
        receiver_id: UserId,
        content: &str,
    ) -> ServiceResult<Message> {
        let gym = self.ctx.load_gym(gym_id).await?;
        let receiver = self.ctx.load_user(receiver_id).await?;
        ensure_allowed(actor, Action::SendMessage, scope(&gym.document), Some(receiver_id))?;

        let sender = Participant::new(actor.id, actor.role);
        let receiver = Participant::new(receiver.document.id, receiver.document.role);
        check_adjacency(&gym.document, &sender, &receiver).into_result()?;

        let message = Message::new(gym_id, actor.id, receiver_id, content, self.ctx.now())?;
        let saved = self.ctx.messages.insert(message).await?;
        tracing::debug!(message = %saved.document.id, gym = %gym_id, "message sent");
        Ok(saved.document)
    }

    /// Conversation between the caller and `peer` in a gym, oldest first.
    pub async fn conversation(&self, actor: &Actor, gym_id: GymId, peer_id: UserId) -> ServiceResult<Vec<Message>> {
        let gym = self.ctx.load_gym(gym_id).await?;
        let peer = self.ctx.load_user(peer_id).await?;
        ensure_allowed(actor, Action::ReadMessages, scope(&gym.document), Some(peer_id))?;

        let reader = Participant::new(actor.id, actor.role);
        let peer = Participant::new(peer.document.id, peer.document.role);
        check_conversation(&gym.document, &reader, &peer).into_result()?;

        let mut messages: Vec<Message> = self
            .ctx
            .messages
            .find(&Filter::new(json!({ "gym_id": gym_id })))
            .await?
            .into_iter()
            .map(|m| m.document)
            .filter(|m| m.is_between(gym_id, actor.id, peer_id))
            .collect();
        messages.sort_by_key(|m| m.sent_at);
        Ok(messages)
    }

    // --- plans ---

    pub async fn create_plan(&self, actor: &Actor, input: NewPlan) -> ServiceResult<Plan> {
        let gym = self.ctx.load_gym(input.gym_id).await?;
        ensure_allowed(actor, Action::CreatePlan, scope(&gym.document), Some(input.member_id))?;
        if !gym.document.has_member(input.member_id) {
            return Err(ServiceError::invalid_target("plan recipient is not a member of this gym"));
        }

        let mut plan = Plan::new(
            input.kind,
            input.gym_id,
            actor.id,
            input.member_id,
            &input.title,
            &input.content,
            self.ctx.now(),
        )?;
        if let Some(request_id) = input.request_id {
            let request = self
                .ctx
                .requests
                .get(request_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("request"))?;
            plan = plan.answering(&request.document)?;
        }

        let saved = self.ctx.plans.insert(plan).await?;
        tracing::info!(plan = %saved.document.id, member = %input.member_id, "plan created");
        Ok(saved.document)
    }

    /// Members see plans written for them; staff see plans they wrote.
    pub async fn my_plans(&self, actor: &Actor) -> ServiceResult<Vec<Plan>> {
        let filter = match actor.role {
            Role::Member => json!({ "member_id": actor.id }),
            Role::Owner | Role::GymOwner | Role::Trainer => json!({ "author_id": actor.id }),
        };
        Ok(documents(self.ctx.plans.find(&Filter::new(filter)).await?))
    }

    // --- progress logs ---

    pub async fn log_macros(&self, actor: &Actor, input: NewMacroLog) -> ServiceResult<MacroLog> {
        ensure_allowed(actor, Action::LogProgress, None, Some(actor.id))?;
        let log = MacroLog::new(
            actor.id,
            input.date,
            input.calories,
            input.protein_g,
            input.carbs_g,
            input.fat_g,
            self.ctx.now(),
        )?;
        Ok(self.ctx.macro_logs.insert(log).await?.document)
    }

    pub async fn log_body(&self, actor: &Actor, input: NewBodyLog) -> ServiceResult<BodyLog> {
        ensure_allowed(actor, Action::LogProgress, None, Some(actor.id))?;
        let log = BodyLog::new(
            actor.id,
            input.date,
            input.weight_kg,
            input.body_fat_pct,
            input.photos,
            self.ctx.now(),
        )?;
        Ok(self.ctx.body_logs.insert(log).await?.document)
    }

    pub async fn macro_logs(&self, actor: &Actor, member_id: UserId) -> ServiceResult<Vec<MacroLog>> {
        self.ensure_may_view_progress(actor, member_id).await?;
        let mut logs = documents(
            self.ctx
                .macro_logs
                .find(&Filter::new(json!({ "member_id": member_id })))
                .await?,
        );
        logs.sort_by_key(|l| l.date);
        Ok(logs)
    }

    pub async fn body_logs(&self, actor: &Actor, member_id: UserId) -> ServiceResult<Vec<BodyLog>> {
        self.ensure_may_view_progress(actor, member_id).await?;
        let mut logs = documents(
            self.ctx
                .body_logs
                .find(&Filter::new(json!({ "member_id": member_id })))
                .await?,
        );
        logs.sort_by_key(|l| l.date);
        Ok(logs)
    }

    /// A member's own data, or staff of the member's gym.
    async fn ensure_may_view_progress(&self, actor: &Actor, member_id: UserId) -> ServiceResult<()> {
        self.ctx.load_user(member_id).await?;
        let gym = match self.ctx.roster.links(member_id).member_gym {
            Some(gym_id) => self.ctx.gyms.get(gym_id).await?.map(|g| g.document),
            None => None,
        };
        let gym_scope: Option<&dyn GymScope> = gym.as_ref().filter(|g| g.is_live()).map(|g| g as &dyn GymScope);
        ensure_allowed(actor, Action::ViewProgress, gym_scope, Some(member_id))
    }

    // --- reviews ---

    /// One review per member and gym.
    pub async fn write_review(&self, actor: &Actor, gym_id: GymId, rating: u8, comment: &str) -> ServiceResult<Review> {
        let gym = self.ctx.load_gym(gym_id).await?;
        ensure_allowed(actor, Action::WriteReview, scope(&gym.document), Some(actor.id))?;

        let review = Review::new(gym_id, actor.id, rating, comment, self.ctx.now())?;
        let blocker = Filter::new(json!({ "gym_id": gym_id, "author_id": actor.id }));
        let saved = self
            .ctx
            .reviews
            .insert_unless(review, &blocker, "you have already reviewed this gym")
            .await?;
        Ok(saved.document)
    }

    pub async fn reviews(&self, actor: &Actor, gym_id: GymId) -> ServiceResult<Vec<Review>> {
        let gym = self.ctx.load_gym(gym_id).await?;
        ensure_allowed(actor, Action::ViewGym, scope(&gym.document), None)?;
        Ok(documents(
            self.ctx.reviews.find(&Filter::new(json!({ "gym_id": gym_id }))).await?,
        ))
    }

    // --- bookings ---

    /// Book a session with a trainer of the caller's gym. Overlapping active
    /// bookings of the same trainer conflict.
    pub async fn book_session(&self, actor: &Actor, gym_id: GymId, input: NewBooking) -> ServiceResult<Booking> {
        let gym = self.ctx.load_gym(gym_id).await?;
        ensure_allowed(actor, Action::BookSession, scope(&gym.document), Some(actor.id))?;
        if !gym.document.has_trainer(input.trainer_id) {
            return Err(ServiceError::invalid_target("trainer does not train at this gym"));
        }

        let booking = Booking::new(
            gym_id,
            actor.id,
            input.trainer_id,
            input.starts_at,
            input.ends_at,
            input.note,
            self.ctx.now(),
        )?;

        let _slots = self.ctx.booking_slots.lock().await;
        let taken = self
            .ctx
            .bookings
            .find(&Filter::new(json!({ "trainer_id": input.trainer_id, "status": "booked" })))
            .await?
            .iter()
            .any(|b| b.document.overlaps(&booking));
        if taken {
            return Err(ServiceError::conflict("trainer is already booked for that time"));
        }
        let saved = self.ctx.bookings.insert(booking).await?;
        tracing::info!(booking = %saved.document.id, trainer = %input.trainer_id, "session booked");
        Ok(saved.document)
    }

    /// Owners see every booking of the gym, trainers and members their own.
    pub async fn bookings(&self, actor: &Actor, gym_id: GymId) -> ServiceResult<Vec<Booking>> {
        let gym = self.ctx.load_gym(gym_id).await?;
        ensure_allowed(actor, Action::ViewBookings, scope(&gym.document), None)?;

        let sees_all = actor.is_super() || gym.document.owner_id() == actor.id;
        let mut bookings: Vec<Booking> = documents(
            self.ctx.bookings.find(&Filter::new(json!({ "gym_id": gym_id }))).await?,
        )
        .into_iter()
        .filter(|b| sees_all || b.is_party(actor.id))
        .collect();
        bookings.sort_by_key(|b| b.starts_at);
        Ok(bookings)
    }

    pub async fn cancel_booking(&self, actor: &Actor, id: BookingId) -> ServiceResult<Booking> {
        let Versioned { revision, mut document } = self
            .ctx
            .bookings
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("booking"))?;
        let gym = self.ctx.load_gym(document.gym_id).await?;
        let target = if document.is_party(actor.id) {
            actor.id
        } else {
            document.member_id
        };
        ensure_allowed(actor, Action::CancelBooking, scope(&gym.document), Some(target))?;

        document.cancel(actor.id, self.ctx.now())?;
        let saved = self
            .ctx
            .bookings
            .replace(document, ExpectedVersion::Exact(revision))
            .await?;
        tracing::info!(booking = %id, by = %actor.id, "booking cancelled");
        Ok(saved.document)
    }

    // --- announcements ---

    pub async fn post_announcement(
        &self,
        actor: &Actor,
        gym_id: GymId,
        title: &str,
        body: &str,
    ) -> ServiceResult<Announcement> {
        let gym = self.ctx.load_gym(gym_id).await?;
        ensure_allowed(actor, Action::PostAnnouncement, scope(&gym.document), None)?;
        let announcement = Announcement::new(gym_id, actor.id, title, body, self.ctx.now())?;
        let saved = self.ctx.announcements.insert(announcement).await?;
        tracing::info!(announcement = %saved.document.id, gym = %gym_id, "announcement posted");
        Ok(saved.document)
    }

    /// Newest first.
    pub async fn announcements(&self, actor: &Actor, gym_id: GymId) -> ServiceResult<Vec<Announcement>> {
        let gym = self.ctx.load_gym(gym_id).await?;
        ensure_allowed(actor, Action::ViewAnnouncements, scope(&gym.document), None)?;
        let mut posts = documents(
            self.ctx
                .announcements
                .find(&Filter::new(json!({ "gym_id": gym_id })))
                .await?,
        );
        posts.sort_by_key(|a| std::cmp::Reverse(a.posted_at));
        Ok(posts)
    }
}

fn documents<E>(found: Vec<Versioned<E>>) -> Vec<E> {
    found.into_iter().map(|v| v.document).collect()
}
