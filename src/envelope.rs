use crate::errors::ProviderFailure;
use crate::models::{MailSent, RecordMutated, SearchResults, TextGenerated};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Outcome of one action request.
#[derive(Debug)]
pub enum ProviderResult {
    MailSent(MailSent),
    TextGenerated(TextGenerated),
    RecordMutated(RecordMutated),
    SearchResults(SearchResults),
    Failure(ProviderFailure),
}

/// `{success: true, ...fields}`
#[derive(Serialize)]
struct Success<'a, T: Serialize> {
    success: bool,
    #[serde(flatten)]
    data: &'a T,
}

fn success<T: Serialize>(data: &T) -> Response {
    (
        StatusCode::OK,
        Json(Success {
            success: true,
            data,
        }),
    )
        .into_response()
}

impl IntoResponse for ProviderResult {
    fn into_response(self) -> Response {
        match self {
            ProviderResult::MailSent(sent) => success(&sent),
            ProviderResult::TextGenerated(generated) => success(&generated),
            ProviderResult::RecordMutated(record) => success(&record),
            ProviderResult::SearchResults(results) => success(&results),
            ProviderResult::Failure(failure) => failure.into_response(),
        }
    }
}

impl From<ProviderFailure> for ProviderResult {
    fn from(failure: ProviderFailure) -> Self {
        ProviderResult::Failure(failure)
    }
}
