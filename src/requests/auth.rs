//! Account endpoints. Input is checked locally first, so malformed forms never reach the network.

use serde::{Deserialize, Serialize};

use super::query_utils::take_field;
use super::{Error, Result};
use crate::executor::RequestSpec;
use crate::transport::Transport;
use crate::VaaniClient;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Bearer token and the account it belongs to
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

#[derive(Serialize, Deserialize, Debug, Clone, bon::Builder)]
pub struct RegisterRequest {
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub email: String,
    #[builder(into)]
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, bon::Builder)]
pub struct LoginRequest {
    #[builder(into)]
    pub email: String,
    #[builder(into)]
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "name is required"));
        }
        validate_email(&self.email)?;

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::validation(
                "password",
                format!("password must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }

        Ok(())
    }
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;

        if self.password.is_empty() {
            return Err(Error::validation("password", "password is required"));
        }

        Ok(())
    }
}

fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(Error::validation("email", "email is required"));
    }

    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    };

    if well_formed {
        Ok(())
    } else {
        Err(Error::validation("email", "not a valid email address"))
    }
}

impl<T: Transport> VaaniClient<T> {
    #[tracing::instrument(skip_all, fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthSession> {
        request.validate()?;

        let body = serde_json::json!({
            "name": request.name.trim(),
            "email": request.email.trim(),
            "password": request.password,
        });
        let resp = self
            .executor
            .execute(&RequestSpec::post("/auth/register", body)?)
            .await?;

        Self::parse_session(resp)
    }

    #[tracing::instrument(skip_all, fields(email = %request.email))]
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthSession> {
        request.validate()?;

        let body = serde_json::json!({
            "email": request.email.trim(),
            "password": request.password,
        });
        let resp = self
            .executor
            .execute(&RequestSpec::post("/auth/login", body)?)
            .await?;

        Self::parse_session(resp)
    }

    /// Account behind `token`
    #[tracing::instrument(skip_all)]
    pub async fn profile(&self, token: &str) -> Result<User> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::validation("token", "not signed in"));
        }

        let request =
            RequestSpec::get("/auth/profile")?.with_header("Authorization", format!("Bearer {token}"));
        let resp = self.executor.execute(&request).await?;

        let mut body = Self::parse_envelope(resp)?;
        take_field(&mut body, "user")
    }

    fn parse_session(resp: crate::transport::ApiResponse) -> Result<AuthSession> {
        let mut body = Self::parse_envelope(resp)?;

        Ok(AuthSession {
            token: take_field(&mut body, "token")?,
            user: take_field(&mut body, "user")?,
        })
    }
}
