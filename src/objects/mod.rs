mod friend;
mod me;
mod rating;
mod spot;
mod user;

pub use friend::Friend;
pub use friend::FriendRequest;
pub use friend::PendingRequest;
pub use me::Me;
pub use rating::Rating;
pub use rating::RatingTally;
pub use spot::Spot;
pub use spot::VisibilityFilter;
pub use user::User;

fn load_or_empty<T>(
    query_result: Result<Vec<T>, diesel::result::Error>,
) -> Result<Vec<T>, diesel::result::Error> {
    match query_result {
        Ok(vec) => Ok(vec),
        Err(diesel::result::Error::NotFound) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}
