/// Error responses.
pub mod error;

use std::sync::Arc;

use poem::{
    get, handler,
    http::StatusCode,
    middleware::Tracing,
    post,
    web::{Data, Json, Path, RemoteAddr},
    Endpoint, EndpointExt, Request, Route,
};
use quest_engine::{
    model::{Address, ClaimId, CustomCode, TaskKind, UserId},
    progress::{Progress, TaskState},
    referral::ReferralStats,
    store::{Claim, RewardQuota},
};
use serde::{Deserialize, Serialize};

use crate::app::App;

pub use error::ApiError;

type Shared = Arc<App>;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build the HTTP endpoint.
///
/// Admin routes live under `/admin` and require `Authorization: Bearer <token>`.
pub fn routes(app: Shared) -> impl Endpoint {
    Route::new()
        .at("/progress/:user_id/:task", get(get_progress))
        .at("/tasks/:user_id", get(task_status))
        .at("/claims", post(request_claim))
        .at("/claims/:user_id", get(claims))
        .at("/referrals/link", post(link_referral))
        .at("/referrals/code", post(set_custom_code))
        .at("/referrals/:user_id", get(referral_stats))
        .at("/quota", get(quotas))
        .at("/admin/claims/pending", get(pending_claims))
        .at("/admin/claims/:id/approve", post(approve_claim))
        .at("/admin/claims/:id/reject", post(reject_claim))
        .at("/admin/callback", post(admin_callback))
        .at("/admin/users", post(register_user))
        .data(app)
        .with(Tracing)
}

fn authorize(req: &Request, app: &App) -> Result<(), ApiError> {
    let Some(token) = app.admin_token() else {
        return Err(ApiError::AdminDisabled);
    };
    let provided = req
        .header("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "));
    if provided != Some(token) {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

/// Client IP used as part of the rate limit key.
///
/// Taken from the first `X-Forwarded-For` entry when present, so it is only
/// as trustworthy as the proxy in front of the daemon.
fn client_ip(req: &Request, remote: &RemoteAddr) -> String {
    req.header("X-Forwarded-For")
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| remote.as_socket_addr().map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_task(task: &str) -> Result<TaskKind, ApiError> {
    task.parse()
        .map_err(|_| quest_engine::Error::invalid_argument(format!("unknown task `{task}`")).into())
}

#[handler]
async fn get_progress(
    Path((user, task)): Path<(UserId, String)>,
    app: Data<&Shared>,
) -> ApiResult<Progress> {
    let task = parse_task(&task)?;
    Ok(Json(app.engine().get_progress(user, task).await?))
}

#[handler]
async fn task_status(Path(user): Path<UserId>, app: Data<&Shared>) -> ApiResult<Vec<TaskState>> {
    Ok(Json(app.engine().task_status(user).await?))
}

#[derive(Debug, Deserialize)]
struct ClaimRequest {
    user_id: UserId,
    task: String,
}

#[handler]
async fn request_claim(Json(body): Json<ClaimRequest>, app: Data<&Shared>) -> ApiResult<Claim> {
    let task = parse_task(&body.task)?;
    Ok(Json(app.engine().request_claim(body.user_id, task).await?))
}

#[handler]
async fn claims(Path(user): Path<UserId>, app: Data<&Shared>) -> ApiResult<Vec<Claim>> {
    Ok(Json(app.engine().claims(user).await?))
}

#[derive(Debug, Deserialize)]
struct CodeRequest {
    user_id: UserId,
    address: String,
    code: String,
}

#[derive(Debug, Serialize)]
struct LinkResponse {
    referrer_id: UserId,
}

#[handler]
async fn link_referral(
    req: &Request,
    remote: &RemoteAddr,
    Json(body): Json<CodeRequest>,
    app: Data<&Shared>,
) -> ApiResult<LinkResponse> {
    let referrer_id = app
        .engine()
        .link_referral(body.user_id, &body.address, &body.code, &client_ip(req, remote))
        .await?;
    Ok(Json(LinkResponse { referrer_id }))
}

#[derive(Debug, Serialize)]
struct CodeResponse {
    code: CustomCode,
}

#[handler]
async fn set_custom_code(
    req: &Request,
    remote: &RemoteAddr,
    Json(body): Json<CodeRequest>,
    app: Data<&Shared>,
) -> ApiResult<CodeResponse> {
    let code = app
        .engine()
        .set_custom_code(body.user_id, &body.address, &body.code, &client_ip(req, remote))
        .await?;
    Ok(Json(CodeResponse { code }))
}

#[handler]
async fn referral_stats(
    Path(user): Path<UserId>,
    app: Data<&Shared>,
) -> ApiResult<ReferralStats> {
    Ok(Json(app.engine().referral_stats(user).await?))
}

#[handler]
async fn quotas(app: Data<&Shared>) -> ApiResult<Vec<RewardQuota>> {
    Ok(Json(app.engine().quotas().await?))
}

#[handler]
async fn pending_claims(req: &Request, app: Data<&Shared>) -> ApiResult<Vec<Claim>> {
    authorize(req, &app)?;
    Ok(Json(app.engine().pending_claims().await?))
}

#[handler]
async fn approve_claim(
    req: &Request,
    Path(id): Path<ClaimId>,
    app: Data<&Shared>,
) -> ApiResult<Claim> {
    authorize(req, &app)?;
    Ok(Json(app.engine().approve_claim(id).await?))
}

#[handler]
async fn reject_claim(
    req: &Request,
    Path(id): Path<ClaimId>,
    app: Data<&Shared>,
) -> ApiResult<Claim> {
    authorize(req, &app)?;
    Ok(Json(app.engine().reject_claim(id).await?))
}

#[derive(Debug, Deserialize)]
struct CallbackRequest {
    data: String,
}

#[handler]
async fn admin_callback(
    req: &Request,
    Json(body): Json<CallbackRequest>,
    app: Data<&Shared>,
) -> ApiResult<Claim> {
    authorize(req, &app)?;
    Ok(Json(app.engine().handle_admin_action(&body.data).await?))
}

#[derive(Debug, Deserialize)]
struct RegisterUser {
    user_id: UserId,
    #[serde(default)]
    address: Option<Address>,
    #[serde(default)]
    banned: bool,
}

/// Register a user or update its banned flag, standing in for the user
/// management service.
#[handler]
async fn register_user(
    req: &Request,
    Json(body): Json<RegisterUser>,
    app: Data<&Shared>,
) -> Result<StatusCode, ApiError> {
    authorize(req, &app)?;
    app.store().register(body.user_id, body.banned, body.address)?;
    tracing::info!(user = %body.user_id, "user registered");
    Ok(StatusCode::CREATED)
}
