//! Request extractors whose rejections are JSON `AppError`s.
//!
//! axum's own `Json` and `Path` reject with plain-text bodies (and `Json`
//! uses 422 for type errors). These wrappers route every rejection through
//! [`AppError::Validation`] so clients always get a 400 with a `detail`.

use axum::extract::rejection::PathRejection;
use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// JSON request body; malformed or mistyped bodies are a 400.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ValidJson<T>(pub T);

/// Path parameters; unparseable segments are a 400.
#[derive(Debug, Clone, Copy, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ValidPath<T>(pub T);

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}
