use std::sync::LazyLock;

use axum_extra::extract::cookie::{Cookie, SameSite};
use getrandom::fill;
use hex::encode;
use regex::Regex;
use serde::{Serialize, de::DeserializeOwned};
use time::Duration;

use crate::error::Error;

pub static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-A-Za-z0-9!#$%&'*+/=?^_`{|}~]+(?:\.[-A-Za-z0-9!#$%&'*+/=?^_`{|}~]+)*@(?:[A-Za-z0-9](?:[-A-Za-z0-9]*[A-Za-z0-9])?\.)+[A-Za-z0-9](?:[-A-Za-z0-9]*[A-Za-z0-9])?").unwrap()
});

pub static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_.-]+$").unwrap());

pub fn generate_token<const N: usize>() -> Result<String, getrandom::Error> {
    let mut buf = [0u8; N];
    fill(&mut buf)?;
    Ok(encode(buf))
}

pub fn generate_device_name() -> String {
    let charset = "abcdefghijklmnopqrstuvwxyz0123456789";

    random_string::generate(16, charset)
}

pub fn new_refresh_token_cookie(refresh_token: String) -> Cookie<'static> {
    Cookie::build(("refresh_token", refresh_token))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/api")
        .max_age(Duration::days(30))
        .build()
}

#[allow(async_fn_in_trait)]
pub trait CacheFns {
    async fn set_cache_key(
        &self,
        key: String,
        value: impl Serialize + Send,
        expire: u32,
    ) -> Result<(), Error>;
    async fn get_cache_key<T: DeserializeOwned>(&self, key: String) -> Result<T, Error>;
    async fn del_cache_key(&self, key: String) -> Result<(), Error>;
}

impl CacheFns for redis::Client {
    async fn set_cache_key(
        &self,
        key: String,
        value: impl Serialize + Send,
        expire: u32,
    ) -> Result<(), Error> {
        let mut conn = self.get_multiplexed_tokio_connection().await?;

        let key_encoded = encode(key);

        let value_json = serde_json::to_string(&value)?;

        redis::cmd("SET")
            .arg(&[key_encoded.clone(), value_json])
            .exec_async(&mut conn)
            .await?;

        redis::cmd("EXPIRE")
            .arg(&[key_encoded, expire.to_string()])
            .exec_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn get_cache_key<T: DeserializeOwned>(&self, key: String) -> Result<T, Error> {
        let mut conn = self.get_multiplexed_tokio_connection().await?;

        let key_encoded = encode(key);

        let value_json: String = redis::cmd("GET")
            .arg(key_encoded)
            .query_async(&mut conn)
            .await?;

        Ok(serde_json::from_str(&value_json)?)
    }

    async fn del_cache_key(&self, key: String) -> Result<(), Error> {
        let mut conn = self.get_multiplexed_tokio_connection().await?;

        let key_encoded = encode(key);

        redis::cmd("DEL")
            .arg(key_encoded)
            .exec_async(&mut conn)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(EMAIL_REGEX.is_match("alice@example.com"));
        assert!(EMAIL_REGEX.is_match("al.ice+spots@sub.example.org"));
        assert!(!EMAIL_REGEX.is_match("not-an-email"));
    }

    #[test]
    fn username_regex_rejects_uppercase_and_spaces() {
        assert!(USERNAME_REGEX.is_match("alice_0.1-two"));
        assert!(!USERNAME_REGEX.is_match("Alice"));
        assert!(!USERNAME_REGEX.is_match("al ice"));
    }

    #[test]
    fn refresh_cookie_is_scoped_to_the_api() {
        let cookie = new_refresh_token_cookie(String::from("deadbeef"));

        assert_eq!(cookie.name(), "refresh_token");
        assert_eq!(cookie.path(), Some("/api"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
    }
}
