//! REST client for the auth provider's admin API.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use stellwerk_core::RoleGrantPort;
use stellwerk_domain::{AdapterError, AdapterResult, AuthProviderConfig};
use tracing::{debug, info, instrument};
use url::Url;

use crate::errors::InfraError;
use crate::http::HttpClient;

/// Grants and revokes realm roles on provider users. The person id doubles
/// as the provider user id.
pub struct AuthProviderClient {
    config: AuthProviderConfig,
    http: HttpClient,
    token_cache: Cache<(), CachedToken>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    lifetime: Duration,
}

/// Evicts tokens a configured margin before their actual expiry so requests
/// never go out with a token about to lapse mid-flight.
struct TokenExpiry {
    margin: Duration,
}

impl Expiry<(), CachedToken> for TokenExpiry {
    fn expire_after_create(
        &self,
        _key: &(),
        value: &CachedToken,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.lifetime.saturating_sub(self.margin))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoleRef {
    id: String,
    name: String,
}

impl AuthProviderClient {
    pub fn new(config: AuthProviderConfig) -> AdapterResult<Self> {
        let http = HttpClient::builder().timeout(config.timeout()).build()?;
        let token_cache = Cache::builder()
            .max_capacity(1)
            .expire_after(TokenExpiry {
                margin: config.token_refresh_margin(),
            })
            .build();
        Ok(Self {
            config,
            http,
            token_cache,
        })
    }

    fn build_url(&self, segments: &[&str]) -> AdapterResult<String> {
        let mut url = Url::parse(&self.config.base_url).map_err(|e| {
            AdapterError::RemoteValidation(format!("invalid auth provider base url: {e}"))
        })?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                AdapterError::RemoteValidation(String::from(
                    "auth provider base url cannot carry a path",
                ))
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url.to_string())
    }

    async fn fetch_token(&self) -> AdapterResult<CachedToken> {
        debug!("fetching admin access token");
        let url = self.build_url(&[
            "realms",
            &self.config.realm,
            "protocol",
            "openid-connect",
            "token",
        ])?;
        let request = self.http.request(Method::POST, url.as_str()).form(&[
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ]);
        let response = self.http.send_checked(request).await?;
        let token: TokenResponse = response.json().await.map_err(InfraError::from)?;
        Ok(CachedToken {
            access_token: token.access_token,
            lifetime: Duration::from_secs(token.expires_in),
        })
    }

    /// Cached admin token; concurrent callers share one fetch.
    async fn access_token(&self) -> AdapterResult<String> {
        let token = self
            .token_cache
            .try_get_with((), self.fetch_token())
            .await
            .map_err(|err| (*err).clone())?;
        Ok(token.access_token)
    }

    /// Sends an admin request. A 401 means the cached token went stale
    /// before its TTL; it is dropped and the failure reported as transport
    /// so the retry layer refetches.
    async fn send_admin(&self, request: reqwest::RequestBuilder) -> AdapterResult<reqwest::Response> {
        let response = self.http.send(request).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.token_cache.invalidate(&()).await;
            return Err(AdapterError::Transport(String::from(
                "auth provider rejected the admin token",
            )));
        }
        response
            .error_for_status()
            .map_err(|e| InfraError::from(e).into())
    }

    async fn resolve_role(&self, token: &str, name: &str) -> AdapterResult<RoleRef> {
        let url = self.build_url(&["admin", "realms", &self.config.realm, "roles", name])?;
        let request = self.http.request(Method::GET, url.as_str()).bearer_auth(token);
        let response = self.send_admin(request).await?;
        response.json().await.map_err(|e| InfraError::from(e).into())
    }
}

#[async_trait]
impl RoleGrantPort for AuthProviderClient {
    #[instrument(skip(self))]
    async fn grant(&self, person_id: &str, name: &str) -> AdapterResult<()> {
        let token = self.access_token().await?;
        let role = self.resolve_role(&token, name).await?;
        let url = self.build_url(&[
            "admin",
            "realms",
            &self.config.realm,
            "users",
            person_id,
            "role-mappings",
            "realm",
        ])?;
        let request = self
            .http
            .request(Method::POST, url.as_str())
            .bearer_auth(&token)
            .json(&[role]);
        self.send_admin(request).await?;
        info!("role granted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn revoke(&self, person_id: &str, name: &str) -> AdapterResult<()> {
        let token = self.access_token().await?;
        let role = self.resolve_role(&token, name).await?;
        let url = self.build_url(&[
            "admin",
            "realms",
            &self.config.realm,
            "users",
            person_id,
            "role-mappings",
            "realm",
        ])?;
        let request = self
            .http
            .request(Method::DELETE, url.as_str())
            .bearer_auth(&token)
            .json(&[role]);
        self.send_admin(request).await?;
        info!("role revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with_base(base_url: &str) -> AuthProviderClient {
        let config = AuthProviderConfig {
            base_url: base_url.to_owned(),
            ..AuthProviderConfig::default()
        };
        AuthProviderClient::new(config).unwrap()
    }

    #[test]
    fn urls_are_rooted_at_the_base() {
        let client = client_with_base("http://localhost:8080");
        let url = client
            .build_url(&["admin", "realms", "stellwerk", "roles", "teachers"])
            .unwrap();
        assert_eq!(
            url,
            "http://localhost:8080/admin/realms/stellwerk/roles/teachers"
        );
    }

    #[test]
    fn trailing_slash_and_reserved_characters_are_handled() {
        let client = client_with_base("http://localhost:8080/");
        let url = client
            .build_url(&["admin", "realms", "stellwerk", "roles", "lehr kräfte"])
            .unwrap();
        assert_eq!(
            url,
            "http://localhost:8080/admin/realms/stellwerk/roles/lehr%20kr%C3%A4fte"
        );
    }

    #[test]
    fn tokens_expire_a_margin_before_their_lifetime() {
        let expiry = TokenExpiry {
            margin: Duration::from_secs(30),
        };
        let token = CachedToken {
            access_token: "t".to_owned(),
            lifetime: Duration::from_secs(300),
        };
        let ttl = expiry.expire_after_create(&(), &token, std::time::Instant::now());
        assert_eq!(ttl, Some(Duration::from_secs(270)));

        let short = CachedToken {
            access_token: "t".to_owned(),
            lifetime: Duration::from_secs(10),
        };
        let ttl = expiry.expire_after_create(&(), &short, std::time::Instant::now());
        assert_eq!(ttl, Some(Duration::ZERO));
    }
}
