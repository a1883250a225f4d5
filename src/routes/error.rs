use crate::middleware::rate_limit::RateLimitRetryAfter;
use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::serde::Serialize;
use rocket::serde::json::Json;
use rocket::{Request, Response, catch};
use std::io::Cursor;

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct Error {
    pub message: String,
}

#[catch(404)]
pub fn not_found(_: &Request) -> Json<Error> {
    Json(Error {
        message: "Not found".to_string(),
    })
}

#[catch(409)]
pub fn conflict(_: &Request) -> Json<Error> {
    Json(Error {
        message: "Conflict".to_string(),
    })
}

pub struct TooManyRequests {
    retry_after: u64,
}

impl<'r> Responder<'r, 'static> for TooManyRequests {
    fn respond_to(self, _: &Request<'_>) -> rocket::response::Result<'static> {
        let body = serde_json::json!({ "message": "Too many requests" }).to_string();
        Response::build()
            .status(Status::TooManyRequests)
            .header(ContentType::JSON)
            .raw_header("Retry-After", self.retry_after.to_string())
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

#[catch(429)]
pub fn too_many_requests(req: &Request) -> TooManyRequests {
    let retry_after = req
        .local_cache(|| None::<RateLimitRetryAfter>)
        .as_ref()
        .map(|r| r.0)
        .unwrap_or(60);

    TooManyRequests { retry_after }
}
