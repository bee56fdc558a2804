//! Domain records and the collection/field naming contract.
//!
//! The collection and field names here are shared with the client applications
//! and must not change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::{Document, Fields, get_str, get_timestamp};
use crate::error::{CoreError, Result};
use crate::time::Timestamp;

/// Collection names.
pub mod collections {
    pub const USERS: &str = "users";
    pub const INTERESTS: &str = "interests";
    pub const FRIENDSHIPS: &str = "friendships";
    pub const CHAT_BATCHES: &str = "chat_batches";
    /// Nested under each chat batch.
    pub const MESSAGES: &str = "messages";
    pub const PROCESSED_EVENTS: &str = "processed_events";
}

/// Field names.
pub mod fields {
    pub const FROM_USER_ID: &str = "fromUserId";
    pub const TO_USER_ID: &str = "toUserId";
    pub const CREATED_AT: &str = "createdAt";

    pub const USER1_ID: &str = "user1Id";
    pub const USER2_ID: &str = "user2Id";
    pub const SENDER_ID: &str = "senderId";
    pub const RECEIVER_ID: &str = "receiverId";
    pub const STATUS: &str = "status";

    pub const START_TIMESTAMP: &str = "startTimestamp";

    pub const DEVICE_TOKEN: &str = "deviceToken";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const TOTAL_INTERESTS_COUNT: &str = "totalInterestsCount";
    pub const TOTAL_FRIEND_REQUESTS_COUNT: &str = "totalFriendRequestsCount";

    // Older app builds wrote these.
    pub const LEGACY_DEVICE_TOKEN: &str = "fcmToken";
    pub const LEGACY_DISPLAY_NAME: &str = "name";

    pub const HANDLER: &str = "handler";
    pub const SOURCE_PATH: &str = "sourcePath";
    pub const PROCESSED_AT: &str = "processedAt";
}

/// Denormalized counters kept on user documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Counter {
    #[serde(rename = "totalInterestsCount")]
    TotalInterests,
    #[serde(rename = "totalFriendRequestsCount")]
    TotalFriendRequests,
}

impl Counter {
    pub const ALL: [Counter; 2] = [Counter::TotalInterests, Counter::TotalFriendRequests];

    /// Field name on the user document.
    pub fn field(&self) -> &'static str {
        match self {
            Counter::TotalInterests => fields::TOTAL_INTERESTS_COUNT,
            Counter::TotalFriendRequests => fields::TOTAL_FRIEND_REQUESTS_COUNT,
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

impl FromStr for Counter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Counter::ALL
            .into_iter()
            .find(|c| c.field() == s)
            .ok_or_else(|| CoreError::UnknownCounter(s.to_string()))
    }
}

/// A user as seen by the notification path.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub device_token: Option<String>,
    pub display_name: Option<String>,
    pub total_interests_count: Option<i64>,
    pub total_friend_requests_count: Option<i64>,
}

impl User {
    /// Reads a user document. Never fails: every field is optional.
    pub fn from_document(doc: &Document) -> Self {
        let f = &doc.fields;
        Self {
            id: doc.id().to_string(),
            device_token: get_str(f, fields::DEVICE_TOKEN)
                .or_else(|| get_str(f, fields::LEGACY_DEVICE_TOKEN))
                .map(str::to_string),
            display_name: get_str(f, fields::DISPLAY_NAME)
                .or_else(|| get_str(f, fields::LEGACY_DISPLAY_NAME))
                .map(str::to_string),
            total_interests_count: doc.get_i64(fields::TOTAL_INTERESTS_COUNT),
            total_friend_requests_count: doc.get_i64(fields::TOTAL_FRIEND_REQUESTS_COUNT),
        }
    }

    pub fn counter(&self, counter: Counter) -> Option<i64> {
        match counter {
            Counter::TotalInterests => self.total_interests_count,
            Counter::TotalFriendRequests => self.total_friend_requests_count,
        }
    }
}

/// One user expressing interest in another.
#[derive(Debug, Clone, PartialEq)]
pub struct Interest {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub created_at: Option<Timestamp>,
}

impl Interest {
    pub fn from_fields(id: &str, f: &Fields) -> Result<Self> {
        Ok(Self {
            id: id.to_string(),
            from_user_id: required(f, fields::FROM_USER_ID)?,
            to_user_id: required(f, fields::TO_USER_ID)?,
            created_at: get_timestamp(f, fields::CREATED_AT),
        })
    }

    pub fn from_document(doc: &Document) -> Result<Self> {
        Self::from_fields(doc.id(), &doc.fields)
    }
}

/// Lifecycle state of a friend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Declined,
    Other(String),
}

impl FriendshipStatus {
    pub const PENDING: &'static str = "pending";

    pub fn as_str(&self) -> &str {
        match self {
            FriendshipStatus::Pending => Self::PENDING,
            FriendshipStatus::Accepted => "accepted",
            FriendshipStatus::Declined => "declined",
            FriendshipStatus::Other(s) => s,
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            Self::PENDING => FriendshipStatus::Pending,
            "accepted" => FriendshipStatus::Accepted,
            "declined" => FriendshipStatus::Declined,
            other => FriendshipStatus::Other(other.to_string()),
        }
    }
}

/// A friend request between two users, with the receiving side resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Friendship {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: FriendshipStatus,
    pub created_at: Option<Timestamp>,
}

impl Friendship {
    /// Decodes a friendship record.
    ///
    /// The receiver is `receiverId` when present; otherwise it is whichever of
    /// `user1Id`/`user2Id` is not `senderId`.
    pub fn from_fields(id: &str, f: &Fields) -> Result<Self> {
        let status = get_str(f, fields::STATUS)
            .map(FriendshipStatus::parse)
            .unwrap_or(FriendshipStatus::Pending);
        let created_at = get_timestamp(f, fields::CREATED_AT);

        if let Some(receiver) = get_str(f, fields::RECEIVER_ID) {
            let sender = match get_str(f, fields::SENDER_ID) {
                Some(sender) => sender.to_string(),
                None => other_participant(f, receiver)?,
            };
            if sender == receiver {
                return Err(CoreError::invalid_field(
                    fields::RECEIVER_ID,
                    "receiver equals sender",
                ));
            }
            return Ok(Self {
                id: id.to_string(),
                sender_id: sender,
                receiver_id: receiver.to_string(),
                status,
                created_at,
            });
        }

        let user1 = required(f, fields::USER1_ID)?;
        let user2 = required(f, fields::USER2_ID)?;
        let sender = required(f, fields::SENDER_ID)?;
        if user1 == user2 {
            return Err(CoreError::invalid_field(
                fields::USER2_ID,
                "both participants are the same user",
            ));
        }
        let receiver = if sender == user1 {
            user2
        } else if sender == user2 {
            user1
        } else {
            return Err(CoreError::invalid_field(
                fields::SENDER_ID,
                "sender matches neither participant",
            ));
        };

        Ok(Self {
            id: id.to_string(),
            sender_id: sender,
            receiver_id: receiver,
            status,
            created_at,
        })
    }

    pub fn from_document(doc: &Document) -> Result<Self> {
        Self::from_fields(doc.id(), &doc.fields)
    }

    pub fn is_pending(&self) -> bool {
        self.status == FriendshipStatus::Pending
    }
}

/// A batch of chat messages; owns the `messages` nested collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatBatch {
    pub id: String,
    pub start_timestamp: Timestamp,
}

impl ChatBatch {
    pub fn from_document(doc: &Document) -> Result<Self> {
        Ok(Self {
            id: doc.id().to_string(),
            start_timestamp: doc
                .get_timestamp(fields::START_TIMESTAMP)
                .ok_or_else(|| CoreError::missing_field(fields::START_TIMESTAMP))?,
        })
    }
}

fn required(f: &Fields, field: &str) -> Result<String> {
    get_str(f, field)
        .map(str::to_string)
        .ok_or_else(|| CoreError::missing_field(field))
}

fn other_participant(f: &Fields, known: &str) -> Result<String> {
    match (get_str(f, fields::USER1_ID), get_str(f, fields::USER2_ID)) {
        (Some(a), Some(b)) if a == known => Ok(b.to_string()),
        (Some(a), Some(b)) if b == known => Ok(a.to_string()),
        _ => Err(CoreError::missing_field(fields::SENDER_ID)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentPath, Value};
    use crate::time::now_utc;

    fn fields_of(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn test_interest_requires_both_ids() {
        let ok = Interest::from_fields("i1", &fields_of(&[("fromUserId", "A"), ("toUserId", "B")]))
            .unwrap();
        assert_eq!(ok.to_user_id, "B");

        let err = Interest::from_fields("i2", &fields_of(&[("fromUserId", "A")])).unwrap_err();
        assert!(matches!(err, CoreError::MissingField { ref field } if field == "toUserId"));

        let err = Interest::from_fields("i3", &fields_of(&[("fromUserId", ""), ("toUserId", "B")]))
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingField { ref field } if field == "fromUserId"));
    }

    #[test]
    fn test_friendship_receiver_is_the_non_sender() {
        let f = Friendship::from_fields(
            "f1",
            &fields_of(&[("user1Id", "X"), ("user2Id", "Y"), ("senderId", "X")]),
        )
        .unwrap();
        assert_eq!(f.receiver_id, "Y");
        assert!(f.is_pending());

        let f = Friendship::from_fields(
            "f2",
            &fields_of(&[("user1Id", "X"), ("user2Id", "Y"), ("senderId", "Y")]),
        )
        .unwrap();
        assert_eq!(f.receiver_id, "X");
    }

    #[test]
    fn test_friendship_explicit_receiver() {
        let f = Friendship::from_fields(
            "f3",
            &fields_of(&[("senderId", "X"), ("receiverId", "Y"), ("status", "accepted")]),
        )
        .unwrap();
        assert_eq!(f.sender_id, "X");
        assert_eq!(f.receiver_id, "Y");
        assert_eq!(f.status, FriendshipStatus::Accepted);
    }

    #[test]
    fn test_friendship_rejects_unknown_sender() {
        let err = Friendship::from_fields(
            "f4",
            &fields_of(&[("user1Id", "X"), ("user2Id", "Y"), ("senderId", "Z")]),
        )
        .unwrap_err();
        assert!(err.is_validation_error());

        assert!(
            Friendship::from_fields(
                "f5",
                &fields_of(&[("user1Id", "X"), ("user2Id", "X"), ("senderId", "X")]),
            )
            .is_err()
        );
    }

    #[test]
    fn test_user_reads_legacy_fields() {
        let now = now_utc();
        let doc = Document {
            path: DocumentPath::new("users", "B").unwrap(),
            fields: fields_of(&[("fcmToken", "tok-legacy"), ("name", "Bob")]),
            create_time: now,
            update_time: now,
        };
        let user = User::from_document(&doc);
        assert_eq!(user.device_token.as_deref(), Some("tok-legacy"));
        assert_eq!(user.display_name.as_deref(), Some("Bob"));
        assert_eq!(user.counter(Counter::TotalInterests), None);
    }

    #[test]
    fn test_counter_names_round_trip() {
        for counter in Counter::ALL {
            assert_eq!(counter.field().parse::<Counter>().unwrap(), counter);
        }
        assert!("likes".parse::<Counter>().is_err());
    }
}
