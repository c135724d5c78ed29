use axum::http::{HeaderValue, Method, header};
use log::{debug, warn};
use serde::Deserialize;
use tokio::fs::read_to_string;
use tower_http::cors::{Any, CorsLayer};

use crate::error::Error;

#[derive(Debug, Deserialize)]
pub struct ConfigBuilder {
    database: Database,
    cache_database: CacheDatabase,
    web: Option<WebBuilder>,
    instance: Option<InstanceBuilder>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Database {
    username: String,
    password: String,
    host: String,
    database: String,
    port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheDatabase {
    username: Option<String>,
    password: Option<String>,
    host: String,
    database: Option<String>,
    port: u16,
}

#[derive(Debug, Deserialize)]
struct WebBuilder {
    url: Option<String>,
    port: Option<u16>,
    cors_origins: Option<Vec<String>>,
    _ssl: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct InstanceBuilder {
    registration: Option<bool>,
    friends_filter_includes_self: Option<bool>,
}

impl ConfigBuilder {
    pub async fn load(path: String) -> Result<Self, Error> {
        debug!("loading config from: {}", path);
        let raw = read_to_string(path).await?;

        let config = toml::from_str(&raw)?;

        Ok(config)
    }

    pub fn build(self) -> Config {
        let web = if let Some(web) = self.web {
            Web {
                url: web.url.unwrap_or(String::from("0.0.0.0")),
                port: web.port.unwrap_or(8080),
                cors_origins: web.cors_origins.unwrap_or_default(),
            }
        } else {
            Web {
                url: String::from("0.0.0.0"),
                port: 8080,
                cors_origins: Vec::new(),
            }
        };

        let instance = if let Some(instance) = self.instance {
            Instance {
                registration: instance.registration.unwrap_or(true),
                friends_filter_includes_self: instance
                    .friends_filter_includes_self
                    .unwrap_or(false),
            }
        } else {
            Instance {
                registration: true,
                friends_filter_includes_self: false,
            }
        };

        Config {
            database: self.database,
            cache_database: self.cache_database,
            web,
            instance,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: Database,
    pub cache_database: CacheDatabase,
    pub web: Web,
    pub instance: Instance,
}

#[derive(Debug, Clone)]
pub struct Web {
    pub url: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub registration: bool,
    pub friends_filter_includes_self: bool,
}

impl Database {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

impl CacheDatabase {
    pub fn url(&self) -> String {
        let mut url = String::from("redis://");

        if let Some(username) = &self.username {
            url += username;
        }

        if let Some(password) = &self.password {
            url += &format!(":{}@", password);
        }

        url += &format!("{}:{}", self.host, self.port);

        if let Some(database) = &self.database {
            url += &format!("/{}", database);
        }

        url
    }
}

impl Web {
    /// Browsers only accept credentialed CORS responses for explicitly
    /// listed origins, so the permissive layer is reserved for the
    /// no-origins (development) case.
    pub fn cors_layer(&self) -> CorsLayer {
        if self.cors_origins.is_empty() {
            return CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
        }

        let origins: Vec<HeaderValue> = self
            .cors_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("ignoring invalid cors origin: {}", origin);
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::PATCH])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let raw = r#"
            [database]
            username = "dropspot"
            password = "hunter2"
            host = "localhost"
            database = "dropspot"
            port = 5432

            [cache_database]
            host = "localhost"
            port = 6379
        "#;

        let builder: ConfigBuilder = toml::from_str(raw).unwrap();
        let config = builder.build();

        assert_eq!(config.web.url, "0.0.0.0");
        assert_eq!(config.web.port, 8080);
        assert!(config.web.cors_origins.is_empty());
        assert!(config.instance.registration);
        assert!(!config.instance.friends_filter_includes_self);
    }

    #[test]
    fn instance_flags_are_read() {
        let raw = r#"
            [database]
            username = "dropspot"
            password = "hunter2"
            host = "localhost"
            database = "dropspot"
            port = 5432

            [cache_database]
            host = "localhost"
            port = 6379

            [instance]
            registration = false
            friends_filter_includes_self = true
        "#;

        let config: Config = toml::from_str::<ConfigBuilder>(raw).unwrap().build();

        assert!(!config.instance.registration);
        assert!(config.instance.friends_filter_includes_self);
    }

    #[test]
    fn database_urls_are_assembled() {
        let database = Database {
            username: String::from("dropspot"),
            password: String::from("hunter2"),
            host: String::from("db"),
            database: String::from("spots"),
            port: 5432,
        };

        assert_eq!(database.url(), "postgres://dropspot:hunter2@db:5432/spots");

        let cache = CacheDatabase {
            username: None,
            password: None,
            host: String::from("cache"),
            database: None,
            port: 6379,
        };

        assert_eq!(cache.url(), "redis://cache:6379");
    }
}
