//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;
use valentine_core::domain::{Code, Reply, ValentineRecord};
use valentine_core::ports::PortError;
use valentine_core::session::{create_valentine, CreateError};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_valentine_handler,
        get_valentine_handler,
        record_reply_handler,
    ),
    components(
        schemas(
            CreateValentineRequest,
            CreateValentineResponse,
            ValentineResponse,
            ReplyRequest,
            ReplyValue,
        )
    ),
    tags(
        (name = "Valentine API", description = "Create, share and answer valentines.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CreateValentineRequest {
    pub sender_name: String,
    #[serde(default)]
    pub recipient_name: Option<String>,
}

/// The response payload sent after successfully creating a valentine.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct CreateValentineResponse {
    pub code: String,
    pub answer_url: String,
    pub results_url: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyValue {
    Yes,
    No,
}

impl From<ReplyValue> for Reply {
    fn from(value: ReplyValue) -> Self {
        match value {
            ReplyValue::Yes => Reply::Yes,
            ReplyValue::No => Reply::No,
        }
    }
}

impl From<Reply> for ReplyValue {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Yes => ReplyValue::Yes,
            Reply::No => ReplyValue::No,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReplyRequest {
    pub reply: ReplyValue,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ValentineResponse {
    pub id: Uuid,
    pub code: String,
    pub sender_name: String,
    pub recipient_name: Option<String>,
    pub reply: Option<ReplyValue>,
    pub created_at: DateTime<Utc>,
    pub replied_at: Option<DateTime<Utc>>,
}

impl From<ValentineRecord> for ValentineResponse {
    fn from(record: ValentineRecord) -> Self {
        Self {
            id: record.id,
            code: record.code.to_string(),
            sender_name: record.sender_name.to_string(),
            recipient_name: record.recipient_name.map(|n| n.as_str().to_string()),
            reply: record.reply.map(ReplyValue::from),
            created_at: record.created_at,
            replied_at: record.replied_at,
        }
    }
}

fn not_found(code: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Valentine {} not found", code))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a new valentine and get its share links.
#[utoipa::path(
    post,
    path = "/valentines",
    request_body = CreateValentineRequest,
    responses(
        (status = 201, description = "Valentine created", body = CreateValentineResponse),
        (status = 400, description = "Sender or recipient name is empty or too long"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_valentine_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<CreateValentineRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let result = create_valentine(
        app_state.store.as_ref(),
        &request.sender_name,
        request.recipient_name.as_deref(),
        &mut OsRng,
    )
    .await;

    match result {
        Ok(record) => {
            let links = app_state.links.links(&record.code);
            let response = CreateValentineResponse {
                code: links.code.to_string(),
                answer_url: links.answer_url,
                results_url: links.results_url,
            };
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(CreateError::Validation(e)) => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => {
            error!("Failed to create valentine: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create valentine".to_string(),
            ))
        }
    }
}

/// Look up a valentine by its code.
#[utoipa::path(
    get,
    path = "/valentines/{code}",
    responses(
        (status = 200, description = "The valentine", body = ValentineResponse),
        (status = 404, description = "No valentine has this code"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("code" = String, Path, description = "The valentine's share code.")
    )
)]
pub async fn get_valentine_handler(
    State(app_state): State<Arc<AppState>>,
    Path(raw_code): Path<String>,
) -> Result<Json<ValentineResponse>, (StatusCode, String)> {
    let code = Code::parse(&raw_code).ok_or_else(|| not_found(&raw_code))?;
    match app_state.store.find_by_code(&code).await {
        Ok(Some(record)) => Ok(Json(record.into())),
        Ok(None) => Err(not_found(code.as_str())),
        Err(e) => {
            error!("Failed to load valentine {}: {:?}", code, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load valentine".to_string(),
            ))
        }
    }
}

/// Record the recipient's reply. Only the first reply is kept.
#[utoipa::path(
    put,
    path = "/valentines/{code}/reply",
    request_body = ReplyRequest,
    responses(
        (status = 200, description = "Reply recorded", body = ValentineResponse),
        (status = 404, description = "No valentine has this code"),
        (status = 409, description = "The valentine was already answered"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("code" = String, Path, description = "The valentine's share code.")
    )
)]
pub async fn record_reply_handler(
    State(app_state): State<Arc<AppState>>,
    Path(raw_code): Path<String>,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<ValentineResponse>, (StatusCode, String)> {
    let code = Code::parse(&raw_code).ok_or_else(|| not_found(&raw_code))?;
    match app_state.store.record_reply(&code, request.reply.into()).await {
        Ok(record) => {
            info!("Reply recorded for valentine {}", code);
            Ok(Json(record.into()))
        }
        Err(PortError::NotFound(_)) => Err(not_found(code.as_str())),
        Err(PortError::AlreadyAnswered(msg)) => Err((StatusCode::CONFLICT, msg)),
        Err(e) => {
            error!("Failed to record reply for {}: {:?}", code, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to record reply".to_string(),
            ))
        }
    }
}
