use crate::auth::{CurrentUser, Operation, parse_session_cookie_value};
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::{AuthRateLimit, RateLimit};
use crate::models::user::{LoginRequest, UserRequest, UserResponse};
use chrono::Utc;
use rocket::http::{Cookie, CookieJar, Status};
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use validator::Validate;

const SESSION_TTL_HOURS: i64 = 12;

/// Log in with email and password; issues the session cookie
#[openapi(skip)]
#[post("/login", data = "<payload>")]
pub async fn login(
    pool: &State<PgPool>,
    cookies: &CookieJar<'_>,
    _rate_limit: AuthRateLimit,
    payload: Json<LoginRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };

    let Some(user) = repo.get_user_by_email(&payload.email).await? else {
        // Burn the same hashing time for unknown emails.
        PostgresRepository::dummy_verify(&payload.password);
        return Err(AppError::InvalidCredentials);
    };
    repo.verify_password(&user, &payload.password).await?;

    let expires_at = Utc::now() + chrono::Duration::hours(SESSION_TTL_HOURS);
    let session = repo.create_session(&user.id, expires_at).await?;

    let value = format!("{}:{}", session.id, user.id);
    cookies.add_private(Cookie::build(("user", value)).path("/").build());

    Ok(Json(UserResponse::from(&user)))
}

/// Log out and invalidate the session
#[openapi(skip)]
#[post("/logout")]
pub async fn logout(pool: &State<PgPool>, cookies: &CookieJar<'_>) -> Result<Status, AppError> {
    if let Some(cookie) = cookies.get_private("user")
        && let Some((session_id, _)) = parse_session_cookie_value(cookie.value())
    {
        let repo = PostgresRepository { pool: pool.inner().clone() };
        repo.delete_session(&session_id).await?;
    }

    cookies.remove_private(Cookie::build("user").build());
    Ok(Status::NoContent)
}

/// Who am I: the logged-in user with their role
#[openapi(tag = "Users")]
#[get("/me")]
pub async fn me(current_user: CurrentUser) -> Json<UserResponse> {
    Json(UserResponse {
        id: current_user.id,
        name: current_user.name,
        email: current_user.email,
        role: current_user.role,
    })
}

/// Provision a desk account (admin only)
#[openapi(tag = "Users")]
#[post("/", data = "<payload>")]
pub async fn create_user(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    payload: Json<UserRequest>,
) -> Result<Created<Json<UserResponse>>, AppError> {
    current_user.authorize(Operation::ManageUsers)?;
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    if repo.get_user_by_email(&payload.email).await?.is_some() {
        return Err(AppError::UserAlreadyExists(payload.email.clone()));
    }

    let user = repo.create_user(&payload.name, &payload.email, &payload.password, payload.role).await?;
    let location = format!("/users/{}", user.id);
    Ok(Created::new(location).body(Json(UserResponse::from(&user))))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![login, logout, me, create_user]
}
