use chrono::{DateTime, Utc};
use diesel::{
    BoolExpressionMethods, ExpressionMethods, QueryDsl, Queryable, Selectable, SelectableHelper,
    delete, dsl::insert_into,
};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Conn,
    error::Error,
    schema::{friends, spots},
    utils::CacheFns,
};

use super::{RatingTally, load_or_empty};

/// Which slice of the map a viewer gets. `Own` and `Friends` need an
/// authenticated viewer, `Global` works anonymously.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityFilter {
    #[default]
    Global,
    Own,
    Friends,
}

impl VisibilityFilter {
    pub fn requires_auth(&self) -> bool {
        !matches!(self, VisibilityFilter::Global)
    }
}

#[derive(Deserialize, Serialize, Clone, Queryable, Selectable)]
#[diesel(table_name = spots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SpotBuilder {
    uuid: Uuid,
    owner_uuid: Option<Uuid>,
    title: String,
    description: String,
    photo: Option<String>,
    latitude: f64,
    longitude: f64,
    rating_sum: i64,
    rating_count: i64,
    created_at: DateTime<Utc>,
}

impl SpotBuilder {
    pub fn build(self) -> Spot {
        let average_rating = RatingTally {
            rating_sum: self.rating_sum,
            rating_count: self.rating_count,
        }
        .average();

        Spot {
            uuid: self.uuid,
            owner_uuid: self.owner_uuid,
            title: self.title,
            description: self.description,
            photo: self.photo,
            latitude: self.latitude,
            longitude: self.longitude,
            rating_sum: self.rating_sum,
            rating_count: self.rating_count,
            average_rating,
            created_at: self.created_at,
        }
    }
}

/// A point of interest on the map. `average_rating` is derived from the
/// sum/count pair on every read, it is never stored.
#[derive(Deserialize, Serialize, Clone)]
pub struct Spot {
    pub uuid: Uuid,
    pub owner_uuid: Option<Uuid>,
    title: String,
    description: String,
    photo: Option<String>,
    latitude: f64,
    longitude: f64,
    rating_sum: i64,
    pub rating_count: i64,
    pub average_rating: f64,
    created_at: DateTime<Utc>,
}

impl Spot {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        conn: &mut Conn,
        cache_pool: &redis::Client,
        owner_uuid: Uuid,
        title: String,
        description: String,
        photo: Option<String>,
        latitude: f64,
        longitude: f64,
    ) -> Result<Self, Error> {
        validate_title(&title)?;
        validate_description(&description)?;
        validate_coordinates(latitude, longitude)?;

        use spots::dsl;
        let spot_builder: SpotBuilder = insert_into(spots::table)
            .values((
                dsl::uuid.eq(Uuid::now_v7()),
                dsl::owner_uuid.eq(Some(owner_uuid)),
                dsl::title.eq(&title),
                dsl::description.eq(&description),
                dsl::photo.eq(&photo),
                dsl::latitude.eq(latitude),
                dsl::longitude.eq(longitude),
            ))
            .get_result(conn)
            .await?;

        // The owner's cached profile carries a spots_count
        cache_pool.del_cache_key(owner_uuid.to_string()).await?;

        Ok(spot_builder.build())
    }

    pub async fn fetch_one(
        conn: &mut Conn,
        cache_pool: &redis::Client,
        spot_uuid: Uuid,
    ) -> Result<Self, Error> {
        if let Ok(cache_hit) = cache_pool.get_cache_key(spot_uuid.to_string()).await {
            return Ok(cache_hit);
        }

        use spots::dsl;
        let spot_builder: SpotBuilder = dsl::spots
            .filter(dsl::uuid.eq(spot_uuid))
            .select(SpotBuilder::as_select())
            .get_result(conn)
            .await?;

        let spot = spot_builder.build();

        cache_pool
            .set_cache_key(spot_uuid.to_string(), spot.clone(), 1800)
            .await?;

        Ok(spot)
    }

    /// Ordering is pinned to `created_at` then uuid, both descending,
    /// so repeated calls return the same sequence absent mutation.
    pub async fn fetch_visible(
        conn: &mut Conn,
        viewer: Option<Uuid>,
        filter: VisibilityFilter,
        friends_filter_includes_self: bool,
    ) -> Result<Vec<Self>, Error> {
        use spots::dsl;

        let spot_builders: Vec<SpotBuilder> = match filter {
            VisibilityFilter::Global => load_or_empty(
                dsl::spots
                    .order((dsl::created_at.desc(), dsl::uuid.desc()))
                    .select(SpotBuilder::as_select())
                    .load(conn)
                    .await,
            )?,
            VisibilityFilter::Own => {
                let viewer = require_viewer(viewer)?;

                load_or_empty(
                    dsl::spots
                        .filter(dsl::owner_uuid.eq(Some(viewer)))
                        .order((dsl::created_at.desc(), dsl::uuid.desc()))
                        .select(SpotBuilder::as_select())
                        .load(conn)
                        .await,
                )?
            }
            VisibilityFilter::Friends => {
                let viewer = require_viewer(viewer)?;

                use friends::dsl as fdsl;
                let rows: Vec<(Uuid, Uuid)> = load_or_empty(
                    fdsl::friends
                        .filter(fdsl::uuid1.eq(viewer).or(fdsl::uuid2.eq(viewer)))
                        .select((fdsl::uuid1, fdsl::uuid2))
                        .load(conn)
                        .await,
                )?;

                let owners = friend_owner_set(rows, viewer, friends_filter_includes_self);

                load_or_empty(
                    dsl::spots
                        .filter(dsl::owner_uuid.eq_any(owners))
                        .order((dsl::created_at.desc(), dsl::uuid.desc()))
                        .select(SpotBuilder::as_select())
                        .load(conn)
                        .await,
                )?
            }
        };

        Ok(spot_builders
            .into_iter()
            .map(|spot_builder| spot_builder.build())
            .collect())
    }

    pub async fn delete(
        self,
        conn: &mut Conn,
        cache_pool: &redis::Client,
        acting_user: Uuid,
    ) -> Result<(), Error> {
        if self.owner_uuid != Some(acting_user) {
            return Err(Error::Forbidden(
                "only the owner can delete a spot".to_string(),
            ));
        }

        // Ratings go with the spot (ON DELETE CASCADE)
        delete(spots::table.find(self.uuid)).execute(conn).await?;

        cache_pool.del_cache_key(self.uuid.to_string()).await?;
        cache_pool.del_cache_key(acting_user.to_string()).await?;

        Ok(())
    }
}

/// Resolves the viewer's friendship rows to the owners whose spots the
/// `friends` filter shows. Each canonical pair row contributes its other
/// half, and the viewer joins the set only when configured to.
fn friend_owner_set(
    rows: Vec<(Uuid, Uuid)>,
    viewer: Uuid,
    include_self: bool,
) -> Vec<Option<Uuid>> {
    let mut owners: Vec<Option<Uuid>> = rows
        .into_iter()
        .map(|(uuid1, uuid2)| {
            if uuid1 == viewer {
                Some(uuid2)
            } else {
                Some(uuid1)
            }
        })
        .collect();

    if include_self {
        owners.push(Some(viewer));
    }

    owners
}

fn require_viewer(viewer: Option<Uuid>) -> Result<Uuid, Error> {
    viewer.ok_or_else(|| Error::Unauthorized("this filter requires authentication".to_string()))
}

fn validate_title(title: &str) -> Result<(), Error> {
    if title.trim().is_empty() || title.chars().count() > 100 {
        return Err(Error::BadRequest(
            "title must be between 1 and 100 characters".to_string(),
        ));
    }

    Ok(())
}

fn validate_description(description: &str) -> Result<(), Error> {
    if description.chars().count() > 2000 {
        return Err(Error::BadRequest(
            "description may be at most 2000 characters".to_string(),
        ));
    }

    Ok(())
}

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), Error> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(Error::BadRequest(
            "latitude must be between -90 and 90".to_string(),
        ));
    }

    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::BadRequest(
            "longitude must be between -180 and 180".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_parses_from_query_values() {
        assert_eq!(
            serde_json::from_str::<VisibilityFilter>("\"global\"").unwrap(),
            VisibilityFilter::Global
        );
        assert_eq!(
            serde_json::from_str::<VisibilityFilter>("\"own\"").unwrap(),
            VisibilityFilter::Own
        );
        assert_eq!(
            serde_json::from_str::<VisibilityFilter>("\"friends\"").unwrap(),
            VisibilityFilter::Friends
        );
        assert!(serde_json::from_str::<VisibilityFilter>("\"nearby\"").is_err());
    }

    #[test]
    fn only_global_is_anonymous() {
        assert!(!VisibilityFilter::Global.requires_auth());
        assert!(VisibilityFilter::Own.requires_auth());
        assert!(VisibilityFilter::Friends.requires_auth());
    }

    #[test]
    fn friends_filter_shows_exactly_the_friends() {
        let viewer = Uuid::now_v7();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();

        // Canonical pair rows put the viewer on either side
        let rows = vec![
            super::super::friend::ordered_pair(viewer, alice),
            super::super::friend::ordered_pair(bob, viewer),
        ];

        let owners = friend_owner_set(rows, viewer, false);

        assert_eq!(owners.len(), 2);
        assert!(owners.contains(&Some(alice)));
        assert!(owners.contains(&Some(bob)));
        assert!(!owners.contains(&Some(viewer)));
    }

    #[test]
    fn friends_filter_includes_self_when_configured() {
        let viewer = Uuid::now_v7();
        let alice = Uuid::now_v7();

        let rows = vec![super::super::friend::ordered_pair(viewer, alice)];

        let owners = friend_owner_set(rows, viewer, true);

        assert_eq!(owners.len(), 2);
        assert!(owners.contains(&Some(alice)));
        assert!(owners.contains(&Some(viewer)));
    }

    #[test]
    fn friendless_viewer_sees_no_owners() {
        assert!(friend_owner_set(Vec::new(), Uuid::now_v7(), false).is_empty());
    }

    #[test]
    fn anonymous_viewer_is_rejected() {
        assert!(require_viewer(None).is_err());
        assert!(require_viewer(Some(Uuid::now_v7())).is_ok());
    }

    #[test]
    fn coordinates_are_range_checked() {
        assert!(validate_coordinates(0.0, 0.0).is_ok());
        assert!(validate_coordinates(-90.0, 180.0).is_ok());
        assert!(validate_coordinates(90.1, 0.0).is_err());
        assert!(validate_coordinates(0.0, -180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn titles_are_length_checked() {
        assert!(validate_title("skate ledge").is_ok());
        assert!(validate_title("  ").is_err());
        assert!(validate_title(&"x".repeat(101)).is_err());
    }

    #[test]
    fn built_spot_derives_the_average() {
        let spot = SpotBuilder {
            uuid: Uuid::now_v7(),
            owner_uuid: None,
            title: String::from("old bridge"),
            description: String::new(),
            photo: None,
            latitude: 51.1,
            longitude: 4.4,
            rating_sum: 8,
            rating_count: 2,
            created_at: Utc::now(),
        }
        .build();

        assert_eq!(spot.average_rating, 4.0);
    }

    #[test]
    fn unrated_spot_averages_to_zero() {
        let spot = SpotBuilder {
            uuid: Uuid::now_v7(),
            owner_uuid: None,
            title: String::from("old bridge"),
            description: String::new(),
            photo: None,
            latitude: 51.1,
            longitude: 4.4,
            rating_sum: 0,
            rating_count: 0,
            created_at: Utc::now(),
        }
        .build();

        assert_eq!(spot.average_rating, 0.0);
    }
}
