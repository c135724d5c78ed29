use chrono::{DateTime, Utc};
use diesel::{Queryable, Selectable};
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{friend_requests, friends};

use super::User;

/// One row per friendship, lower uuid first. Both directions of the
/// relationship resolve to the same key, which is what keeps the
/// symmetry invariant out of application code.
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b { (a, b) } else { (b, a) }
}

#[derive(Serialize, Queryable, Selectable, Clone)]
#[diesel(table_name = friends)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Friend {
    pub uuid1: Uuid,
    pub uuid2: Uuid,
    pub accepted_at: DateTime<Utc>,
}

/// A pending request. Row existence is the pending state; accepting or
/// declining deletes the row.
#[derive(Serialize, Queryable, Selectable, Clone)]
#[diesel(table_name = friend_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FriendRequest {
    pub uuid: Uuid,
    pub sender: Uuid,
    pub receiver: Uuid,
    pub requested_at: DateTime<Utc>,
}

#[derive(Serialize, Clone)]
pub struct PendingRequest {
    pub uuid: Uuid,
    pub from_user: User,
    pub requested_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_pair_puts_lower_uuid_first() {
        let low = Uuid::parse_str("00000000-0000-7000-8000-000000000001").unwrap();
        let high = Uuid::parse_str("00000000-0000-7000-8000-000000000002").unwrap();

        assert_eq!(ordered_pair(low, high), (low, high));
        assert_eq!(ordered_pair(high, low), (low, high));
    }

    #[test]
    fn ordered_pair_is_direction_independent() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();

        assert_eq!(ordered_pair(a, b), ordered_pair(b, a));
    }
}
