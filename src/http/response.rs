//! Response building and connection dispositions.
//!
//! # Responsibilities
//! - Render the payload page
//! - Mark responses whose connection must be dropped (`Abort`)
//! - Mark responses that count as a delivery (`Delivered`)
//! - Contain per-request failures
//!
//! # Design Decisions
//! - Markers ride in response extensions; the connection service in
//!   `net::connection` reads them before anything reaches the wire
//! - An aborted response never produces bytes, not even a status line

use askama::Template;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::payload::DataLoadError;

/// Drop the connection without answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort;

impl IntoResponse for Abort {
    fn into_response(self) -> Response {
        let mut response = StatusCode::NO_CONTENT.into_response();
        response.extensions_mut().insert(Abort);
        response
    }
}

/// The payload was handed to the client in this response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered;

/// Page that carries the payload.
#[derive(Template)]
#[template(path = "secret.html")]
pub struct SecretPage<'a> {
    pub data: &'a str,
    pub stop: bool,
}

impl SecretPage<'_> {
    /// Render into a `200` delivery response.
    pub fn into_delivery(self) -> Result<Response, RequestHandlingError> {
        let html = self.render()?;
        let mut response = (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))],
            html,
        )
            .into_response();
        response.extensions_mut().insert(Delivered);
        Ok(response)
    }
}

/// Failure while serving a single request. Never fatal to the server.
#[derive(Debug, Error)]
pub enum RequestHandlingError {
    #[error("failed to load data: {0}")]
    Payload(#[from] DataLoadError),

    #[error("failed to render page: {0}")]
    Render(#[from] askama::Error),
}

impl IntoResponse for RequestHandlingError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed, dropping connection");
        Abort.into_response()
    }
}
