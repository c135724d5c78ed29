use chrono::{DateTime, Utc};
use diesel::{
    ExpressionMethods, PgTextExpressionMethods, QueryDsl, Queryable, Selectable, SelectableHelper,
};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Conn,
    error::Error,
    objects::Me,
    schema::{spots, users},
    utils::CacheFns,
};

use super::load_or_empty;

#[derive(Deserialize, Serialize, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserBuilder {
    uuid: Uuid,
    username: String,
    created_at: DateTime<Utc>,
}

impl UserBuilder {
    pub async fn build(self, conn: &mut Conn) -> Result<User, Error> {
        let spots_count = count_spots(conn, self.uuid).await?;

        Ok(User {
            uuid: self.uuid,
            username: self.username,
            created_at: self.created_at,
            spots_count,
            friends_since: None,
            is_friend: None,
        })
    }
}

/// Public view of a user. `friends_since` and `is_friend` are relative
/// to the caller and filled in after the cacheable part is fetched.
#[derive(Deserialize, Serialize, Clone)]
pub struct User {
    pub uuid: Uuid,
    pub username: String,
    created_at: DateTime<Utc>,
    pub spots_count: i64,
    pub friends_since: Option<DateTime<Utc>>,
    pub is_friend: Option<bool>,
}

impl User {
    pub async fn fetch_one(
        conn: &mut Conn,
        cache_pool: &redis::Client,
        user_uuid: Uuid,
    ) -> Result<Self, Error> {
        if let Ok(cache_hit) = cache_pool.get_cache_key(user_uuid.to_string()).await {
            return Ok(cache_hit);
        }

        use users::dsl;
        let user_builder: UserBuilder = dsl::users
            .filter(dsl::uuid.eq(user_uuid))
            .select(UserBuilder::as_select())
            .get_result(conn)
            .await?;

        let user = user_builder.build(conn).await?;

        cache_pool
            .set_cache_key(user_uuid.to_string(), user.clone(), 1800)
            .await?;

        Ok(user)
    }

    pub async fn fetch_one_with_friendship(
        conn: &mut Conn,
        cache_pool: &redis::Client,
        me: &Me,
        user_uuid: Uuid,
    ) -> Result<Self, Error> {
        let mut user = Self::fetch_one(conn, cache_pool, user_uuid).await?;

        if let Some(friend) = me.friends_with(conn, user_uuid).await? {
            user.friends_since = Some(friend.accepted_at);
            user.is_friend = Some(true);
        } else {
            user.is_friend = Some(false);
        }

        Ok(user)
    }

    /// Case-insensitive substring search on usernames. Queries shorter
    /// than two characters return nothing, and the caller is never part
    /// of the result.
    pub async fn search(conn: &mut Conn, me: &Me, query: &str) -> Result<Vec<Self>, Error> {
        let query = query.trim();

        if query.chars().count() < 2 {
            return Ok(Vec::new());
        }

        use users::dsl;
        let user_builders: Vec<UserBuilder> = load_or_empty(
            dsl::users
                .filter(dsl::username.ilike(search_pattern(query)))
                .filter(dsl::uuid.ne(me.uuid))
                .order(dsl::username.asc())
                .select(UserBuilder::as_select())
                .load(conn)
                .await,
        )?;

        let mut users = Vec::with_capacity(user_builders.len());

        for user_builder in user_builders {
            let mut user = user_builder.build(conn).await?;

            user.is_friend = Some(me.friends_with(conn, user.uuid).await?.is_some());

            users.push(user);
        }

        Ok(users)
    }
}

pub async fn count_spots(conn: &mut Conn, owner_uuid: Uuid) -> Result<i64, Error> {
    use spots::dsl;
    Ok(dsl::spots
        .filter(dsl::owner_uuid.eq(Some(owner_uuid)))
        .count()
        .get_result(conn)
        .await?)
}

/// ILIKE treats `%`, `_` and `\` as pattern syntax, escape them so the
/// search stays a literal substring match.
fn search_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");

    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_wraps_query_in_wildcards() {
        assert_eq!(search_pattern("al"), "%al%");
    }

    #[test]
    fn pattern_escapes_like_syntax() {
        assert_eq!(search_pattern("50%"), "%50\\%%");
        assert_eq!(search_pattern("a_b"), "%a\\_b%");
        assert_eq!(search_pattern("a\\b"), "%a\\\\b%");
    }
}
