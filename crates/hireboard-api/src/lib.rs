// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use hireboard_app::{
    PageQuery, PagedEnvelope, ProcessId, ReasonDetailsForm, Row, RowId, RowSource,
    ScoreDetailsForm, ScoreTypeId,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const BENEFITS_PATH: &str = "InfoWelfareBenefit/info-welfare-benefits";
pub const SCORE_TYPES_PATH: &str = "ScoreSetting/types";

pub fn score_type_path(id: ScoreTypeId) -> String {
    format!("{SCORE_TYPES_PATH}/{id}")
}

pub fn reasons_path(process: ProcessId) -> String {
    format!("RecruitmentStages/{process}/categories/with-reasons")
}

/// Failure of one backend call. Pages branch on the kind: conflicts and
/// rejections revert optimistic edits, the rest only get logged.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("server rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("cannot reach {url} -- check [api].base_url and that the backend is running ({source})")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid API path {0:?}")]
    InvalidPath(String),
}

impl ApiError {
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether the server looked at the request and refused it.
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Rejected { .. })
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// List endpoints answer either with a bare array or a paged envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Envelope(PagedEnvelope<Row>),
    Bare(Vec<Row>),
}

#[derive(Debug, Deserialize)]
struct ProblemDetails {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct ActivePatch {
    active: bool,
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let base_url = Url::parse(&format!("{trimmed}/"))
            .with_context(|| format!("api.base_url {trimmed:?} is not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "api.base_url {trimmed:?} must use http or https, got {}",
                base_url.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn endpoint(&self, path: &str) -> ApiResult<Url> {
        let relative = path.trim_start_matches('/');
        if relative.is_empty() || relative.contains("://") {
            return Err(ApiError::InvalidPath(path.to_owned()));
        }
        self.base_url
            .join(relative)
            .map_err(|_| ApiError::InvalidPath(path.to_owned()))
    }

    /// Fetches one page of rows. Bare array responses count as a single,
    /// complete page.
    pub fn fetch_page(&self, path: &str, query: &PageQuery) -> ApiResult<PagedEnvelope<Row>> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut().extend_pairs(query.pairs());
        log::debug!("GET {url}");
        match self.send(self.http.get(url.clone()), &url)? {
            ListResponse::Envelope(envelope) => Ok(envelope),
            ListResponse::Bare(rows) => Ok(PagedEnvelope::single_page(rows)),
        }
    }

    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = self.endpoint(path)?;
        self.send(self.http.get(url.clone()), &url)
    }

    pub fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ApiResult<T> {
        let url = self.endpoint(path)?;
        self.send(self.http.post(url.clone()).json(body), &url)
    }

    pub fn put_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ApiResult<T> {
        let url = self.endpoint(path)?;
        self.send(self.http.put(url.clone()).json(body), &url)
    }

    pub fn patch<B: Serialize>(&self, path: &str, body: &B) -> ApiResult<()> {
        let url = self.endpoint(path)?;
        self.execute(self.http.patch(url.clone()).json(body), &url)
            .map(drop)
    }

    pub fn delete(&self, path: &str) -> ApiResult<()> {
        let url = self.endpoint(path)?;
        self.execute(self.http.delete(url.clone()), &url).map(drop)
    }

    pub fn score_types(&self) -> ListEndpoint<'_> {
        ListEndpoint::new(self, SCORE_TYPES_PATH)
    }

    pub fn set_score_type_active(&self, id: ScoreTypeId, active: bool) -> ApiResult<()> {
        self.patch(
            &format!("{}/active", score_type_path(id)),
            &ActivePatch { active },
        )
    }

    pub fn create_score_type(&self, row: &Row) -> ApiResult<Row> {
        self.post_json(SCORE_TYPES_PATH, row)
    }

    pub fn update_score_type(&self, id: RowId, row: &Row) -> ApiResult<Row> {
        self.put_json(&score_type_path(ScoreTypeId::new(id.get())), row)
    }

    pub fn delete_score_type(&self, id: RowId) -> ApiResult<()> {
        self.delete(&score_type_path(ScoreTypeId::new(id.get())))
    }

    pub fn score_details(&self, id: ScoreTypeId) -> ApiResult<ScoreDetailsForm> {
        self.get_json(&format!("{}/details", score_type_path(id)))
    }

    pub fn save_score_details(&self, form: &ScoreDetailsForm) -> ApiResult<ScoreDetailsForm> {
        self.put_json(
            &format!("{}/details", score_type_path(form.score_type_id)),
            form,
        )
    }

    pub fn reason_details(&self, process: ProcessId) -> ApiResult<ReasonDetailsForm> {
        self.get_json(&reasons_path(process))
    }

    pub fn save_reason_details(&self, form: &ReasonDetailsForm) -> ApiResult<ReasonDetailsForm> {
        self.put_json(&reasons_path(form.process_id), form)
    }

    fn execute(&self, request: RequestBuilder, url: &Url) -> ApiResult<Response> {
        let response = request.send().map_err(|source| ApiError::Unreachable {
            url: self.base_url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            log::warn!("{url} answered {}", status.as_u16());
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, url: &Url) -> ApiResult<T> {
        let response = self.execute(request, url)?;
        let body = response.text().map_err(|error| ApiError::Decode {
            url: url.to_string(),
            message: error.to_string(),
        })?;
        serde_json::from_str(&body).map_err(|error| ApiError::Decode {
            url: url.to_string(),
            message: error.to_string(),
        })
    }
}

/// One paged list endpoint, usable as a [`RowSource`].
pub struct ListEndpoint<'a> {
    client: &'a Client,
    path: String,
}

impl<'a> ListEndpoint<'a> {
    pub fn new(client: &'a Client, path: &str) -> Self {
        Self {
            client,
            path: path.to_owned(),
        }
    }
}

impl RowSource for ListEndpoint<'_> {
    fn fetch_rows(&self, query: &PageQuery) -> Result<PagedEnvelope<Row>> {
        Ok(self.client.fetch_page(&self.path, query)?)
    }
}

fn clean_error_response(status: StatusCode, body: &str) -> ApiError {
    let message = match serde_json::from_str::<ProblemDetails>(body) {
        Ok(problem) => problem
            .detail
            .or(problem.message)
            .or(problem.title)
            .filter(|message| !message.trim().is_empty()),
        Err(_) => None,
    }
    .or_else(|| {
        let trimmed = body.trim();
        (!trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{'))
            .then(|| trimmed.to_owned())
    })
    .unwrap_or_else(|| format!("server returned {}", status.as_u16()));

    if status == StatusCode::CONFLICT {
        ApiError::Conflict { message }
    } else {
        ApiError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}
