//! Endpoint tables for the portal API.
//!
//! Each method binds a URL template to one `ApiClient` call and unwraps the
//! response envelope. No behavior lives here beyond that binding.

use uuid::Uuid;

use crate::client::ApiClient;
use crate::config::RequestOptions;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::http::Transport;
use crate::query::Query;
use crate::types::{
    AuthTokens, CreateJob, Empty, Job, JobFilter, JobList, LoginRequest, RefreshRequest,
    UpdateJob, User,
};

impl<T: Transport> ApiClient<T> {
    pub fn auth(&self) -> AuthApi<'_, T> {
        AuthApi { client: self }
    }

    pub fn jobs(&self) -> JobsApi<'_, T> {
        JobsApi { client: self }
    }
}

pub struct AuthApi<'a, T> {
    client: &'a ApiClient<T>,
}

impl<T: Transport> AuthApi<'_, T> {
    /// Sent without a bearer token so a stale one is never presented.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthTokens, ApiError> {
        self.client
            .post::<Envelope<AuthTokens>, _>(
                "/api/auth/login",
                Some(request),
                RequestOptions::new().skip_auth(),
            )
            .await
            .map(Envelope::into_data)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, ApiError> {
        let request = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.client
            .post::<Envelope<AuthTokens>, _>(
                "/api/auth/refresh",
                Some(&request),
                RequestOptions::new().skip_auth(),
            )
            .await
            .map(Envelope::into_data)
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.client
            .post::<Empty, ()>("/api/auth/logout", None, RequestOptions::default())
            .await
            .map(|_| ())
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        self.client
            .get::<Envelope<User>>("/api/auth/me", None, RequestOptions::default())
            .await
            .map(Envelope::into_data)
    }
}

pub struct JobsApi<'a, T> {
    client: &'a ApiClient<T>,
}

impl<T: Transport> JobsApi<'_, T> {
    pub async fn list(&self, filter: &JobFilter) -> Result<JobList, ApiError> {
        let query = Query::from_serialize(filter)?;
        self.client
            .get::<Envelope<JobList>>("/api/jobs", Some(&query), RequestOptions::default())
            .await
            .map(Envelope::into_data)
    }

    pub async fn get(&self, id: Uuid) -> Result<Job, ApiError> {
        self.client
            .get::<Envelope<Job>>(&format!("/api/jobs/{id}"), None, RequestOptions::default())
            .await
            .map(Envelope::into_data)
    }

    pub async fn create(&self, input: &CreateJob) -> Result<Job, ApiError> {
        self.client
            .post::<Envelope<Job>, _>("/api/jobs", Some(input), RequestOptions::default())
            .await
            .map(Envelope::into_data)
    }

    pub async fn update(&self, id: Uuid, input: &UpdateJob) -> Result<Job, ApiError> {
        self.client
            .put::<Envelope<Job>, _>(
                &format!("/api/jobs/{id}"),
                Some(input),
                RequestOptions::default(),
            )
            .await
            .map(Envelope::into_data)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        self.client
            .delete::<Empty>(&format!("/api/jobs/{id}"), RequestOptions::default())
            .await
            .map(|_| ())
    }
}
