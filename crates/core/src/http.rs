//! HTTP vocabulary shared by the resilience components
//!
//! An [`Endpoint`] is a method plus a concrete path. Its [`Endpoint::key`]
//! collapses identifier segments into `:id`, so `GET /products/42` and
//! `GET /products/43` share one circuit breaker.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static ID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d+|[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}|[0-9a-fA-F]{24})$",
    )
    .expect("static id segment regex")
});

static PAYMENT_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)/(payments?|transactions?|checkout|payouts?|transfers?)(/|$)")
        .expect("static payment path regex")
});

/// HTTP request methods the client issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether the method changes server state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A method and path pair identifying one logical API operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    method: HttpMethod,
    path: String,
    payment_submission: Option<bool>,
}

impl Endpoint {
    /// Create an endpoint; any query string is dropped from the path
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if let Some(idx) = path.find('?') {
            path.truncate(idx);
        }
        Self {
            method,
            path,
            payment_submission: None,
        }
    }

    /// Force (or clear) the payment-submission marker instead of inferring it
    #[must_use]
    pub fn with_payment_submission(mut self, submission: Option<bool>) -> Self {
        self.payment_submission = submission;
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path with identifier segments replaced by `:id`
    pub fn path_template(&self) -> String {
        self.path
            .split('/')
            .map(|segment| {
                if ID_SEGMENT.is_match(segment) {
                    ":id"
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Stable key in the form `METHOD:/path/:id`
    pub fn key(&self) -> String {
        format!("{}:{}", self.method, self.path_template())
    }

    /// Whether the path addresses payments or money movement
    pub fn is_payment(&self) -> bool {
        PAYMENT_PATH.is_match(&self.path)
    }

    /// Whether this call moves money and must never be retried automatically.
    ///
    /// An explicit marker wins; otherwise any mutating call to a payment path
    /// counts as a submission, while reads (status checks) do not.
    pub fn is_payment_submission(&self) -> bool {
        match self.payment_submission {
            Some(flag) => flag,
            None => self.is_payment() && self.method.is_mutating(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
