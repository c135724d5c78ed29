use chrono::{DateTime, Utc};
use diesel::{
    BoolExpressionMethods, ExpressionMethods, QueryDsl, Queryable, Selectable, SelectableHelper,
    delete, dsl::insert_into,
};
use diesel_async::{AsyncConnection, RunQueryDsl, scoped_futures::ScopedFutureExt};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    Conn,
    error::Error,
    schema::{friend_requests, friends, users},
};

use super::{Friend, FriendRequest, PendingRequest, User, friend::ordered_pair, load_or_empty};

#[derive(Serialize, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Me {
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Me {
    pub async fn get(conn: &mut Conn, user_uuid: Uuid) -> Result<Self, Error> {
        use users::dsl;
        let me: Me = dsl::users
            .filter(dsl::uuid.eq(user_uuid))
            .select(Me::as_select())
            .get_result(conn)
            .await?;

        Ok(me)
    }

    pub async fn friends_with(
        &self,
        conn: &mut Conn,
        user_uuid: Uuid,
    ) -> Result<Option<Friend>, Error> {
        let (uuid1, uuid2) = ordered_pair(self.uuid, user_uuid);

        use friends::dsl;
        match dsl::friends
            .find((uuid1, uuid2))
            .select(Friend::as_select())
            .get_result(conn)
            .await
        {
            Ok(friend) => Ok(Some(friend)),
            Err(diesel::result::Error::NotFound) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Creates a pending request towards `target_uuid`. The pair unique
    /// index backstops concurrent senders, a second request in either
    /// direction surfaces as a unique violation (409). The whole
    /// check-then-insert runs in a transaction, and the friendship is
    /// re-checked after the insert: an accept on this pair can commit
    /// between the first check and the insert (freeing the pair index
    /// by deleting the old request row), which would otherwise leave a
    /// pending request between users who are already friends.
    pub async fn send_friend_request(
        &self,
        conn: &mut Conn,
        target_uuid: Uuid,
    ) -> Result<FriendRequest, Error> {
        if target_uuid == self.uuid {
            return Err(Error::BadRequest(
                "you cannot send a friend request to yourself".to_string(),
            ));
        }

        // 404 before anything else if the target does not exist
        use users::dsl as udsl;
        udsl::users
            .find(target_uuid)
            .select(udsl::uuid)
            .get_result::<Uuid>(conn)
            .await?;

        let me_uuid = self.uuid;
        let (uuid1, uuid2) = ordered_pair(me_uuid, target_uuid);

        conn.transaction::<FriendRequest, Error, _>(|conn| {
            async move {
                use friends::dsl as fdsl;
                ensure_not_friends(
                    fdsl::friends
                        .find((uuid1, uuid2))
                        .select(Friend::as_select())
                        .get_result(conn)
                        .await,
                )?;

                use friend_requests::dsl;
                let pending = dsl::friend_requests
                    .filter(
                        dsl::sender
                            .eq(me_uuid)
                            .and(dsl::receiver.eq(target_uuid))
                            .or(dsl::sender.eq(target_uuid).and(dsl::receiver.eq(me_uuid))),
                    )
                    .select(FriendRequest::as_select())
                    .get_result(conn)
                    .await;

                match pending {
                    Ok(_) => {
                        return Err(Error::Conflict(
                            "a friend request is already pending".to_string(),
                        ));
                    }
                    Err(diesel::result::Error::NotFound) => (),
                    Err(error) => return Err(error.into()),
                }

                let request: FriendRequest = insert_into(friend_requests::table)
                    .values((
                        dsl::uuid.eq(Uuid::now_v7()),
                        dsl::sender.eq(me_uuid),
                        dsl::receiver.eq(target_uuid),
                    ))
                    .get_result(conn)
                    .await?;

                // Re-check: a concurrent accept may have committed since
                // the first look; erroring here rolls the insert back.
                ensure_not_friends(
                    fdsl::friends
                        .find((uuid1, uuid2))
                        .select(Friend::as_select())
                        .get_result(conn)
                        .await,
                )?;

                Ok(request)
            }
            .scope_boxed()
        })
        .await
    }

    /// Turns a pending request into a friendship. Inserting the
    /// friendship row and deleting the request happen in one
    /// transaction, a concurrent accept on the same request loses with
    /// 404 (row already consumed) or 409 (friendship already exists).
    pub async fn accept_friend_request(
        &self,
        conn: &mut Conn,
        request_uuid: Uuid,
    ) -> Result<Friend, Error> {
        let me_uuid = self.uuid;

        conn.transaction::<Friend, Error, _>(|conn| {
            async move {
                use friend_requests::dsl;
                let request: FriendRequest = dsl::friend_requests
                    .find(request_uuid)
                    .select(FriendRequest::as_select())
                    .for_update()
                    .get_result(conn)
                    .await?;

                if request.receiver != me_uuid {
                    return Err(Error::Forbidden(
                        "only the receiver can accept a friend request".to_string(),
                    ));
                }

                let (uuid1, uuid2) = ordered_pair(request.sender, request.receiver);

                use friends::dsl as fdsl;
                let friend: Friend = insert_into(friends::table)
                    .values((fdsl::uuid1.eq(uuid1), fdsl::uuid2.eq(uuid2)))
                    .get_result(conn)
                    .await?;

                delete(friend_requests::table.find(request_uuid))
                    .execute(conn)
                    .await?;

                Ok(friend)
            }
            .scope_boxed()
        })
        .await
    }

    /// Withdraw (as sender) or reject (as receiver) a pending request.
    /// Either way the row is deleted, nothing is retained.
    pub async fn decline_friend_request(
        &self,
        conn: &mut Conn,
        request_uuid: Uuid,
    ) -> Result<(), Error> {
        use friend_requests::dsl;
        let request: FriendRequest = dsl::friend_requests
            .find(request_uuid)
            .select(FriendRequest::as_select())
            .get_result(conn)
            .await?;

        if request.sender != self.uuid && request.receiver != self.uuid {
            return Err(Error::Forbidden(
                "this friend request does not involve you".to_string(),
            ));
        }

        delete(friend_requests::table.find(request_uuid))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn remove_friend(&self, conn: &mut Conn, user_uuid: Uuid) -> Result<(), Error> {
        let (uuid1, uuid2) = ordered_pair(self.uuid, user_uuid);

        let deleted = delete(friends::table.find((uuid1, uuid2)))
            .execute(conn)
            .await?;

        if deleted == 0 {
            return Err(diesel::result::Error::NotFound.into());
        }

        Ok(())
    }

    pub async fn get_friends(
        &self,
        conn: &mut Conn,
        cache_pool: &redis::Client,
    ) -> Result<Vec<User>, Error> {
        use friends::dsl;
        let rows: Vec<Friend> = load_or_empty(
            dsl::friends
                .filter(dsl::uuid1.eq(self.uuid).or(dsl::uuid2.eq(self.uuid)))
                .order(dsl::accepted_at.desc())
                .select(Friend::as_select())
                .load(conn)
                .await,
        )?;

        let mut friends = Vec::with_capacity(rows.len());

        for row in rows {
            let other = if row.uuid1 == self.uuid {
                row.uuid2
            } else {
                row.uuid1
            };

            let mut user = User::fetch_one(conn, cache_pool, other).await?;

            user.friends_since = Some(row.accepted_at);
            user.is_friend = Some(true);

            friends.push(user);
        }

        Ok(friends)
    }

    pub async fn get_pending_requests(
        &self,
        conn: &mut Conn,
        cache_pool: &redis::Client,
    ) -> Result<Vec<PendingRequest>, Error> {
        use friend_requests::dsl;
        let rows: Vec<FriendRequest> = load_or_empty(
            dsl::friend_requests
                .filter(dsl::receiver.eq(self.uuid))
                .order(dsl::requested_at.desc())
                .select(FriendRequest::as_select())
                .load(conn)
                .await,
        )?;

        let mut requests = Vec::with_capacity(rows.len());

        for row in rows {
            let from_user = User::fetch_one(conn, cache_pool, row.sender).await?;

            requests.push(PendingRequest {
                uuid: row.uuid,
                from_user,
                requested_at: row.requested_at,
            });
        }

        Ok(requests)
    }
}

/// Turns a friendship lookup into a guard: an existing row is a 409,
/// absence is fine, anything else propagates.
fn ensure_not_friends(
    lookup: Result<Friend, diesel::result::Error>,
) -> Result<(), Error> {
    match lookup {
        Ok(_) => Err(Error::Conflict("you are already friends".to_string())),
        Err(diesel::result::Error::NotFound) => Ok(()),
        Err(error) => Err(error.into()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn existing_friendship_blocks_a_request() {
        let friend = Friend {
            uuid1: Uuid::now_v7(),
            uuid2: Uuid::now_v7(),
            accepted_at: Utc::now(),
        };

        // The same guard runs again after the insert, so a friendship
        // committed by a concurrent accept rolls the new request back
        assert!(matches!(
            ensure_not_friends(Ok(friend)),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn absent_friendship_lets_the_request_through() {
        assert!(ensure_not_friends(Err(diesel::result::Error::NotFound)).is_ok());
    }

    #[test]
    fn lookup_failures_propagate() {
        assert!(matches!(
            ensure_not_friends(Err(diesel::result::Error::RollbackTransaction)),
            Err(Error::SqlError(_))
        ));
    }
}
