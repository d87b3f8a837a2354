use actix_web::http::header::CONTENT_RANGE;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::thumbnails::ThumbnailError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Requested range not satisfiable")]
    RangeNotSatisfiable { total_size: u64 },
    #[error("{0}")]
    BadRequest(String),
    #[error("Thumbnail unavailable: {0}")]
    Thumbnail(#[from] ThumbnailError),
    #[error("Internal server error")]
    Internal(String),
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Thumbnail(ThumbnailError::InvalidId(_)) => StatusCode::NOT_FOUND,
            ApiError::Thumbnail(ThumbnailError::Generation(_)) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        if let ApiError::RangeNotSatisfiable { total_size } = self {
            response.insert_header((CONTENT_RANGE, format!("bytes */{}", total_size)));
        }
        response
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}
