use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use gymhub_activity::PlanKind;
use gymhub_auth::{Profile, Role};
use gymhub_core::{ExpectedVersion, GymId, MembershipDuration, RequestId, UserId};
use gymhub_infra::services::{NewBodyLog, NewBooking, NewGym, NewMacroLog, NewMembership, NewPlan, NewRequest, SignupInput};
use gymhub_infra::{ServiceError, Versioned};
use gymhub_ledger::RequestKind;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl From<SignupRequest> for SignupInput {
    fn from(body: SignupRequest) -> Self {
        SignupInput {
            email: body.email,
            password: body.password,
            role: body.role,
            profile: Profile {
                name: body.name,
                phone: body.phone,
                bio: body.bio,
                photos: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateGymRequest {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
}

impl From<CreateGymRequest> for NewGym {
    fn from(body: CreateGymRequest) -> Self {
        NewGym {
            name: body.name,
            address: body.address,
            description: body.description,
        }
    }
}

/// Body of the trainer/member roster endpoints.
#[derive(Debug, Deserialize)]
pub struct RosterRequest {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct AddPlanRequest {
    pub name: String,
    pub duration: MembershipDuration,
    pub price_cents: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequestRequest {
    pub gym_id: GymId,
    pub kind: RequestKind,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub duration: Option<MembershipDuration>,
    #[serde(default)]
    pub trainer_id: Option<UserId>,
    #[serde(default)]
    pub note: Option<String>,
}

impl From<CreateRequestRequest> for NewRequest {
    fn from(body: CreateRequestRequest) -> Self {
        NewRequest {
            gym_id: body.gym_id,
            kind: body.kind,
            plan_name: body.plan_name,
            duration: body.duration,
            trainer_id: body.trainer_id,
            note: body.note,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AcceptRequestBody {
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestListQuery {
    #[serde(default)]
    pub pending: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateMembershipRequest {
    pub member_id: UserId,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub duration: Option<MembershipDuration>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl From<CreateMembershipRequest> for NewMembership {
    fn from(body: CreateMembershipRequest) -> Self {
        NewMembership {
            member_id: body.member_id,
            plan_name: body.plan_name,
            duration: body.duration,
            start_date: body.start_date,
            end_date: body.end_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub gym_id: GymId,
    pub receiver_id: UserId,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    pub kind: PlanKind,
    pub gym_id: GymId,
    pub member_id: UserId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub request_id: Option<RequestId>,
}

impl From<CreatePlanRequest> for NewPlan {
    fn from(body: CreatePlanRequest) -> Self {
        NewPlan {
            kind: body.kind,
            gym_id: body.gym_id,
            member_id: body.member_id,
            title: body.title,
            content: body.content,
            request_id: body.request_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MacroLogRequest {
    pub date: NaiveDate,
    pub calories: u32,
    pub protein_g: u32,
    pub carbs_g: u32,
    pub fat_g: u32,
}

impl From<MacroLogRequest> for NewMacroLog {
    fn from(body: MacroLogRequest) -> Self {
        NewMacroLog {
            date: body.date,
            calories: body.calories,
            protein_g: body.protein_g,
            carbs_g: body.carbs_g,
            fat_g: body.fat_g,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BodyLogRequest {
    pub date: NaiveDate,
    pub weight_kg: f64,
    #[serde(default)]
    pub body_fat_pct: Option<f64>,
    #[serde(default)]
    pub photos: Vec<String>,
}

impl From<BodyLogRequest> for NewBodyLog {
    fn from(body: BodyLogRequest) -> Self {
        NewBodyLog {
            date: body.date,
            weight_kg: body.weight_kg,
            body_fat_pct: body.body_fat_pct,
            photos: body.photos,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    pub trainer_id: UserId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
}

impl From<BookingRequest> for NewBooking {
    fn from(body: BookingRequest) -> Self {
        NewBooking {
            trainer_id: body.trainer_id,
            starts_at: body.starts_at,
            ends_at: body.ends_at,
            note: body.note,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementRequest {
    pub title: String,
    pub body: String,
}

// -------------------------
// Parsing helpers
// -------------------------

/// Parse a path segment into a typed identifier.
pub fn parse_id<T>(raw: &str) -> Result<T, ServiceError>
where
    T: core::str::FromStr<Err = gymhub_core::DomainError>,
{
    raw.parse::<T>().map_err(ServiceError::from)
}

/// `If-Match: <revision>` (quotes and a weak `W/` prefix tolerated) becomes an
/// exact revision precondition; no header means no precondition.
pub fn precondition(headers: &HeaderMap) -> Result<ExpectedVersion, ServiceError> {
    let Some(value) = headers.get(header::IF_MATCH) else {
        return Ok(ExpectedVersion::Any);
    };
    let raw = value
        .to_str()
        .map_err(|_| ServiceError::validation("If-Match must be ASCII"))?
        .trim();
    if raw == "*" {
        return Ok(ExpectedVersion::Any);
    }
    let digits = raw.trim_start_matches("W/").trim_matches('"');
    digits
        .parse::<u64>()
        .map(ExpectedVersion::Exact)
        .map_err(|_| ServiceError::validation(format!("If-Match must be a revision number, got '{raw}'")))
}

// -------------------------
// Response mapping
// -------------------------

/// Flatten a stored document and its revision into one JSON object.
pub fn versioned_to_json<E: Serialize>(v: &Versioned<E>) -> JsonValue {
    let mut body = serde_json::to_value(&v.document).unwrap_or(JsonValue::Null);
    if let JsonValue::Object(map) = &mut body {
        map.insert("revision".into(), v.revision.into());
    }
    body
}

/// JSON body plus an `ETag` carrying the revision, for If-Match round trips.
pub fn versioned_response<E: Serialize>(status: StatusCode, v: &Versioned<E>) -> Response {
    let mut response = (status, Json(versioned_to_json(v))).into_response();
    if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", v.revision)) {
        response.headers_mut().insert(header::ETAG, etag);
    }
    response
}

pub fn items<T: Serialize>(items: impl IntoIterator<Item = T>) -> Response {
    let items: Vec<JsonValue> = items
        .into_iter()
        .map(|i| serde_json::to_value(i).unwrap_or(JsonValue::Null))
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub fn versioned_items<E: Serialize>(found: &[Versioned<E>]) -> Response {
    items(found.iter().map(versioned_to_json))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn if_match(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_MATCH, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn if_match_forms() {
        assert_eq!(precondition(&HeaderMap::new()), Ok(ExpectedVersion::Any));
        assert_eq!(precondition(&if_match("*")), Ok(ExpectedVersion::Any));
        assert_eq!(precondition(&if_match("3")), Ok(ExpectedVersion::Exact(3)));
        assert_eq!(precondition(&if_match("\"7\"")), Ok(ExpectedVersion::Exact(7)));
        assert_eq!(precondition(&if_match("W/\"9\"")), Ok(ExpectedVersion::Exact(9)));
        assert!(matches!(precondition(&if_match("abc")), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn versioned_json_carries_the_revision() {
        #[derive(Serialize)]
        struct Doc {
            name: &'static str,
        }
        let json = versioned_to_json(&Versioned {
            revision: 4,
            document: Doc { name: "x" },
        });
        assert_eq!(json, serde_json::json!({ "name": "x", "revision": 4 }));
    }

    #[test]
    fn malformed_ids_are_validation_errors() {
        let err = parse_id::<GymId>("not-a-uuid").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
