use chrono::{DateTime, Utc};
use diesel::{
    ExpressionMethods, QueryDsl, Queryable, Selectable, SelectableHelper, dsl::insert_into, update,
};
use diesel_async::{AsyncConnection, RunQueryDsl, scoped_futures::ScopedFutureExt};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    Conn,
    error::Error,
    schema::{ratings, spots},
    utils::CacheFns,
};

#[derive(Serialize, Queryable, Selectable, Clone)]
#[diesel(table_name = ratings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Rating {
    pub spot_uuid: Uuid,
    pub user_uuid: Uuid,
    pub value: i16,
    pub created_at: DateTime<Utc>,
}

/// The sum/count pair a spot's average is derived from.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RatingTally {
    pub rating_sum: i64,
    pub rating_count: i64,
}

impl RatingTally {
    pub fn average(&self) -> f64 {
        if self.rating_count == 0 {
            return 0.0;
        }

        self.rating_sum as f64 / self.rating_count as f64
    }

    /// How the aggregate moves for a submission: a resubmission swaps
    /// the old value out of the sum and leaves the count alone, a first
    /// rating adds to both.
    pub fn deltas(previous: Option<i16>, value: i16) -> (i64, i64) {
        match previous {
            Some(old_value) => (i64::from(value) - i64::from(old_value), 0),
            None => (i64::from(value), 1),
        }
    }
}

impl Rating {
    /// Insert-or-replace the caller's rating and move the spot's
    /// aggregate by the matching delta. The spot row is locked for the
    /// duration of the transaction and the aggregate update is relative
    /// arithmetic in SQL, so concurrent raters cannot lose increments.
    pub async fn submit(
        conn: &mut Conn,
        cache_pool: &redis::Client,
        spot_uuid: Uuid,
        user_uuid: Uuid,
        value: i16,
    ) -> Result<RatingTally, Error> {
        if !(1..=5).contains(&value) {
            return Err(Error::BadRequest(
                "rating must be between 1 and 5".to_string(),
            ));
        }

        let tally = conn
            .transaction::<RatingTally, Error, _>(|conn| {
                async move {
                    use ratings::dsl as rdsl;
                    use spots::dsl as sdsl;

                    sdsl::spots
                        .find(spot_uuid)
                        .select(sdsl::uuid)
                        .for_update()
                        .get_result::<Uuid>(conn)
                        .await?;

                    let previous: Option<i16> = match rdsl::ratings
                        .find((spot_uuid, user_uuid))
                        .select(Rating::as_select())
                        .get_result::<Rating>(conn)
                        .await
                    {
                        Ok(rating) => Some(rating.value),
                        Err(diesel::result::Error::NotFound) => None,
                        Err(error) => return Err(error.into()),
                    };

                    let (sum_delta, count_delta) = RatingTally::deltas(previous, value);

                    if previous.is_some() {
                        update(ratings::table.find((spot_uuid, user_uuid)))
                            .set(rdsl::value.eq(value))
                            .execute(conn)
                            .await?;
                    } else {
                        insert_into(ratings::table)
                            .values((
                                rdsl::spot_uuid.eq(spot_uuid),
                                rdsl::user_uuid.eq(user_uuid),
                                rdsl::value.eq(value),
                            ))
                            .execute(conn)
                            .await?;
                    }

                    let (rating_sum, rating_count): (i64, i64) =
                        update(spots::table.find(spot_uuid))
                            .set((
                                sdsl::rating_sum.eq(sdsl::rating_sum + sum_delta),
                                sdsl::rating_count.eq(sdsl::rating_count + count_delta),
                            ))
                            .returning((sdsl::rating_sum, sdsl::rating_count))
                            .get_result(conn)
                            .await?;

                    Ok(RatingTally {
                        rating_sum,
                        rating_count,
                    })
                }
                .scope_boxed()
            })
            .await?;

        // Cached spot carries the old aggregate
        cache_pool.del_cache_key(spot_uuid.to_string()).await?;

        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(tally: RatingTally, previous: Option<i16>, value: i16) -> RatingTally {
        let (sum_delta, count_delta) = RatingTally::deltas(previous, value);

        RatingTally {
            rating_sum: tally.rating_sum + sum_delta,
            rating_count: tally.rating_count + count_delta,
        }
    }

    #[test]
    fn first_rating_counts() {
        let tally = apply(
            RatingTally {
                rating_sum: 0,
                rating_count: 0,
            },
            None,
            4,
        );

        assert_eq!(tally.rating_sum, 4);
        assert_eq!(tally.rating_count, 1);
        assert_eq!(tally.average(), 4.0);
    }

    #[test]
    fn resubmission_replaces_instead_of_accumulating() {
        let mut tally = RatingTally {
            rating_sum: 0,
            rating_count: 0,
        };

        tally = apply(tally, None, 4);
        tally = apply(tally, Some(4), 2);

        assert_eq!(tally.rating_count, 1);
        assert_eq!(tally.average(), 2.0);
    }

    #[test]
    fn two_raters_average_out() {
        let mut tally = RatingTally {
            rating_sum: 0,
            rating_count: 0,
        };

        tally = apply(tally, None, 3);
        tally = apply(tally, None, 5);

        assert_eq!(tally.rating_count, 2);
        assert_eq!(tally.average(), 4.0);
    }

    #[test]
    fn empty_tally_averages_to_zero() {
        let tally = RatingTally {
            rating_sum: 0,
            rating_count: 0,
        };

        assert_eq!(tally.average(), 0.0);
    }
}
