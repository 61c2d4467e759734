use log::error;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::Request;

pub const UNAVAILABLE_MESSAGE: &str = "meetup seems to be down";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Meetup(#[from] meetup_client::Error),
}

impl<'r> Responder<'r, 'static> for ApiError {
    /// The cause stays in the server log, callers get an opaque message.
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        error!("{} {}: {}", req.method(), req.uri(), self);

        let status = match self {
            ApiError::Meetup(_) => Status::InternalServerError,
        };
        (status, UNAVAILABLE_MESSAGE).respond_to(req)
    }
}
