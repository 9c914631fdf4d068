//! Simple REST API server example for the ledger engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /accounts` - Open an account
//! - `GET /accounts` - List all accounts
//! - `GET /accounts/{id}` - Get an account by user ID
//! - `POST /accounts/{id}/blocked` - Set or clear the block flag
//! - `GET /accounts/{id}/entries` - Ledger entries for a user
//! - `GET /accounts/{id}/bills` - Bills paid by a user
//! - `GET /accounts/{id}/goals` - A user's savings goals
//! - `GET /accounts/{id}/investments` - A user's investments
//! - `POST /transfers` - Transfer money by card number and national id
//! - `POST /bills` - Pay a bill
//! - `POST /goals` - Create a savings goal
//! - `POST /goals/{id}/fund` - Move money into a goal
//! - `DELETE /goals/{id}` - Delete a goal and refund its amount
//! - `POST /projects` - Create a crowdfunding project
//! - `GET /projects` - List all projects
//! - `GET /projects/{id}` - Get a project
//! - `PATCH /projects/{id}` - Update a project without confirmed investments
//! - `DELETE /projects/{id}` - Delete a project without confirmed investments
//! - `GET /projects/{id}/investments` - A project's investments
//! - `GET /projects/{id}/history` - A project's funding total history
//! - `POST /projects/{id}/recompute` - Re-derive a project's status
//! - `POST /projects/{id}/investments` - Request an investment
//! - `POST /investments/{id}/accept` - Accept a pending investment
//! - `POST /investments/{id}/decline` - Decline a pending investment
//! - `DELETE /investments/{id}` - Cancel own investment
//!
//! ## Example Usage
//!
//! ```bash
//! # Open two accounts
//! curl -X POST http://localhost:3000/accounts \
//!   -H "Content-Type: application/json" \
//!   -d '{"user": 1, "card_no": "4000-0001", "national_id": "19900101-0001", "initial_balance": "1000.00"}'
//!
//! curl -X POST http://localhost:3000/accounts \
//!   -H "Content-Type: application/json" \
//!   -d '{"user": 2, "card_no": "4000-0002", "national_id": "19900101-0002", "initial_balance": "500.00"}'
//!
//! # Transfer by card number and national id
//! curl -X POST http://localhost:3000/transfers \
//!   -H "Content-Type: application/json" \
//!   -d '{"sender": 1, "card_no": "4000-0002", "national_id": "19900101-0002", "amount": "200.00", "description": "rent"}'
//!
//! # List all accounts
//! curl http://localhost:3000/accounts
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use moneta::{
    AccountSnapshot, AmountHistoryRecord, Bill, Engine, GoalId, GoalSnapshot, InvestmentId,
    InvestmentSnapshot, LedgerEntry, LedgerError, ProjectId, ProjectSnapshot, ProjectStatus,
    ProjectUpdate, ReceiverRef, StatusSweeper, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

// === Request/Response DTOs ===

/// Request body for opening an account.
#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub user: u32,
    pub card_no: String,
    pub national_id: String,
    pub initial_balance: Decimal,
}

/// Request body for setting the block flag.
#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub blocked: bool,
}

/// Request body for a transfer. The receiver is addressed by card
/// number plus national id, never by user id.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub sender: u32,
    pub card_no: String,
    pub national_id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub entry: u64,
}

/// Request body for paying a bill.
#[derive(Debug, Deserialize)]
pub struct BillRequest {
    pub user: u32,
    pub reference: String,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BillResponse {
    pub bill: u64,
}

/// Request body for creating a savings goal.
#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    pub owner: u32,
    pub title: String,
    pub target_amount: Decimal,
    pub deadline: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct GoalResponse {
    pub goal: u64,
}

/// Request body for funding a goal.
#[derive(Debug, Deserialize)]
pub struct FundGoalRequest {
    pub owner: u32,
    pub amount: Decimal,
}

/// Request body for owner-authorized goal deletion.
#[derive(Debug, Deserialize)]
pub struct OwnerRequest {
    pub owner: u32,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub refunded: Decimal,
}

/// Request body for creating a project.
#[derive(Debug, Deserialize)]
pub struct ProjectRequest {
    pub owner: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub goal_amount: Decimal,
    pub deadline: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub project: u64,
}

/// Request body for a partial project update.
#[derive(Debug, Deserialize)]
pub struct ProjectPatchRequest {
    pub caller: u32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub goal_amount: Option<Decimal>,
    pub deadline: Option<NaiveDate>,
}

/// Request body naming the acting user.
#[derive(Debug, Deserialize)]
pub struct CallerRequest {
    pub caller: u32,
}

/// Request body for requesting an investment.
#[derive(Debug, Deserialize)]
pub struct InvestRequest {
    pub investor: u32,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct InvestResponse {
    pub investment: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: ProjectStatus,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the ledger engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

// === Error Handling ===

/// Wrapper for converting `LedgerError` into HTTP responses.
pub struct AppError(LedgerError);

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            LedgerError::InvalidAmount => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            LedgerError::DeadlineNotFuture => (StatusCode::BAD_REQUEST, "DEADLINE_NOT_FUTURE"),
            LedgerError::InsufficientFunds => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_FUNDS")
            }
            LedgerError::AccountNotFound => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            LedgerError::ReceiverNotFound => (StatusCode::NOT_FOUND, "RECEIVER_NOT_FOUND"),
            LedgerError::IdentityMismatch => {
                (StatusCode::UNPROCESSABLE_ENTITY, "IDENTITY_MISMATCH")
            }
            LedgerError::SelfTransfer => (StatusCode::BAD_REQUEST, "SELF_TRANSFER"),
            LedgerError::DuplicateAccount => (StatusCode::CONFLICT, "DUPLICATE_ACCOUNT"),
            LedgerError::GoalNotFound => (StatusCode::NOT_FOUND, "GOAL_NOT_FOUND"),
            LedgerError::GoalAlreadyAchieved => (StatusCode::CONFLICT, "GOAL_ALREADY_ACHIEVED"),
            LedgerError::SelfInvestment => (StatusCode::BAD_REQUEST, "SELF_INVESTMENT"),
            LedgerError::ProjectNotFound => (StatusCode::NOT_FOUND, "PROJECT_NOT_FOUND"),
            LedgerError::InvestmentNotFound => (StatusCode::NOT_FOUND, "INVESTMENT_NOT_FOUND"),
            LedgerError::InvalidTransition => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            LedgerError::ProjectLocked => (StatusCode::CONFLICT, "PROJECT_LOCKED"),
            LedgerError::Timeout => (StatusCode::SERVICE_UNAVAILABLE, "TIMEOUT"),
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /accounts - Open a new account.
async fn open_account(
    State(state): State<AppState>,
    Json(request): Json<OpenAccountRequest>,
) -> Result<StatusCode, AppError> {
    state.engine.open_account(
        UserId(request.user),
        &request.card_no,
        &request.national_id,
        request.initial_balance,
    )?;
    Ok(StatusCode::CREATED)
}

/// GET /accounts - List all accounts.
async fn list_accounts(State(state): State<AppState>) -> Json<Vec<AccountSnapshot>> {
    Json(state.engine.accounts())
}

/// GET /accounts/{id} - Get account by user ID.
async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<AccountSnapshot>, AppError> {
    Ok(Json(state.engine.get_account(UserId(id))?))
}

/// POST /accounts/{id}/blocked - Set or clear the block flag.
async fn set_blocked(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<BlockRequest>,
) -> Result<StatusCode, AppError> {
    state.engine.set_account_blocked(UserId(id), request.blocked)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /accounts/{id}/entries - Ledger entries for a user.
async fn list_entries(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Json<Vec<LedgerEntry>> {
    Json(state.engine.entries_for(UserId(id)))
}

/// GET /accounts/{id}/bills - Bills paid by a user.
async fn list_bills(State(state): State<AppState>, Path(id): Path<u32>) -> Json<Vec<Bill>> {
    Json(state.engine.bills_for(UserId(id)))
}

/// GET /accounts/{id}/goals - A user's savings goals.
async fn list_goals(State(state): State<AppState>, Path(id): Path<u32>) -> Json<Vec<GoalSnapshot>> {
    Json(state.engine.goals_for(UserId(id)))
}

/// GET /accounts/{id}/investments - A user's investments.
async fn list_user_investments(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Json<Vec<InvestmentSnapshot>> {
    Json(state.engine.investments_by(UserId(id)))
}

/// POST /transfers - Transfer money between accounts.
async fn create_transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransferResponse>), AppError> {
    let receiver = ReceiverRef::new(request.card_no, request.national_id);
    let entry = state.engine.transfer(
        UserId(request.sender),
        &receiver,
        request.amount,
        &request.description,
    )?;
    Ok((StatusCode::CREATED, Json(TransferResponse { entry: entry.0 })))
}

/// POST /bills - Pay a bill.
async fn create_bill(
    State(state): State<AppState>,
    Json(request): Json<BillRequest>,
) -> Result<(StatusCode, Json<BillResponse>), AppError> {
    let bill = state
        .engine
        .pay_bill(UserId(request.user), &request.reference, request.amount)?;
    Ok((StatusCode::CREATED, Json(BillResponse { bill: bill.0 })))
}

/// POST /goals - Create a savings goal.
async fn create_goal(
    State(state): State<AppState>,
    Json(request): Json<GoalRequest>,
) -> Result<(StatusCode, Json<GoalResponse>), AppError> {
    let goal = state.engine.create_goal(
        UserId(request.owner),
        &request.title,
        request.target_amount,
        request.deadline,
    )?;
    Ok((StatusCode::CREATED, Json(GoalResponse { goal: goal.0 })))
}

/// POST /goals/{id}/fund - Move money into a goal.
async fn fund_goal(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<FundGoalRequest>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .fund_goal(UserId(request.owner), GoalId(id), request.amount)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /goals/{id} - Delete a goal and refund its saved amount.
async fn delete_goal(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<OwnerRequest>,
) -> Result<Json<RefundResponse>, AppError> {
    let refunded = state.engine.delete_goal(UserId(request.owner), GoalId(id))?;
    Ok(Json(RefundResponse { refunded }))
}

/// POST /projects - Create a crowdfunding project.
async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<ProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), AppError> {
    let project = state.engine.create_project(
        UserId(request.owner),
        &request.title,
        &request.description,
        request.goal_amount,
        request.deadline,
    )?;
    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse { project: project.0 }),
    ))
}

/// GET /projects - List all projects.
async fn list_projects(State(state): State<AppState>) -> Json<Vec<ProjectSnapshot>> {
    Json(state.engine.projects())
}

/// GET /projects/{id} - Get a project.
async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ProjectSnapshot>, AppError> {
    Ok(Json(state.engine.get_project(ProjectId(id))?))
}

/// PATCH /projects/{id} - Update a project without confirmed investments.
async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ProjectPatchRequest>,
) -> Result<StatusCode, AppError> {
    let update = ProjectUpdate {
        title: request.title,
        description: request.description,
        goal_amount: request.goal_amount,
        deadline: request.deadline,
    };
    state
        .engine
        .update_project(UserId(request.caller), ProjectId(id), update)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /projects/{id} - Delete a project without confirmed investments.
async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<CallerRequest>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .delete_project(UserId(request.caller), ProjectId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /projects/{id}/investments - A project's investments.
async fn list_project_investments(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<InvestmentSnapshot>>, AppError> {
    Ok(Json(state.engine.investments_for(ProjectId(id))?))
}

/// GET /projects/{id}/history - A project's funding total history.
async fn project_history(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<AmountHistoryRecord>>, AppError> {
    Ok(Json(state.engine.amount_history(ProjectId(id))?))
}

/// POST /projects/{id}/recompute - Re-derive a project's status.
async fn recompute_status(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<StatusResponse>, AppError> {
    let status = state.engine.recompute_project_status(ProjectId(id))?;
    Ok(Json(StatusResponse { status }))
}

/// POST /projects/{id}/investments - Request an investment.
async fn create_investment(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<InvestRequest>,
) -> Result<(StatusCode, Json<InvestResponse>), AppError> {
    let investment = state.engine.request_investment(
        UserId(request.investor),
        ProjectId(id),
        request.amount,
    )?;
    Ok((
        StatusCode::CREATED,
        Json(InvestResponse {
            investment: investment.0,
        }),
    ))
}

/// POST /investments/{id}/accept - Accept a pending investment.
async fn accept_investment(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<CallerRequest>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .accept_investment(UserId(request.caller), InvestmentId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /investments/{id}/decline - Decline a pending investment.
async fn decline_investment(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<CallerRequest>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .decline_investment(UserId(request.caller), InvestmentId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /investments/{id} - Cancel the caller's own investment.
async fn cancel_investment(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<CallerRequest>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .cancel_investment(UserId(request.caller), InvestmentId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/accounts", get(list_accounts).post(open_account))
        .route("/accounts/{id}", get(get_account))
        .route("/accounts/{id}/blocked", post(set_blocked))
        .route("/accounts/{id}/entries", get(list_entries))
        .route("/accounts/{id}/bills", get(list_bills))
        .route("/accounts/{id}/goals", get(list_goals))
        .route("/accounts/{id}/investments", get(list_user_investments))
        .route("/transfers", post(create_transfer))
        .route("/bills", post(create_bill))
        .route("/goals", post(create_goal))
        .route("/goals/{id}", axum::routing::delete(delete_goal))
        .route("/goals/{id}/fund", post(fund_goal))
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_project)
                .patch(update_project)
                .delete(delete_project),
        )
        .route(
            "/projects/{id}/investments",
            get(list_project_investments).post(create_investment),
        )
        .route("/projects/{id}/history", get(project_history))
        .route("/projects/{id}/recompute", post(recompute_status))
        .route("/investments/{id}", axum::routing::delete(cancel_investment))
        .route("/investments/{id}/accept", post(accept_investment))
        .route("/investments/{id}/decline", post(decline_investment))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let engine = Arc::new(Engine::new());
    // Close overdue projects even when nobody touches them.
    let _sweeper = StatusSweeper::spawn(Arc::clone(&engine), Duration::from_secs(60));

    let state = AppState { engine };
    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Ledger API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST   /accounts                    - Open an account");
    println!("  GET    /accounts                    - List all accounts");
    println!("  GET    /accounts/:id                - Get account by ID");
    println!("  POST   /accounts/:id/blocked        - Set the block flag");
    println!("  GET    /accounts/:id/entries        - Ledger entries for a user");
    println!("  GET    /accounts/:id/bills          - Bills paid by a user");
    println!("  GET    /accounts/:id/goals          - A user's savings goals");
    println!("  GET    /accounts/:id/investments    - A user's investments");
    println!("  POST   /transfers                   - Transfer money");
    println!("  POST   /bills                       - Pay a bill");
    println!("  POST   /goals                       - Create a savings goal");
    println!("  POST   /goals/:id/fund              - Fund a goal");
    println!("  DELETE /goals/:id                   - Delete a goal (refund)");
    println!("  POST   /projects                    - Create a project");
    println!("  GET    /projects                    - List all projects");
    println!("  GET    /projects/:id                - Get a project");
    println!("  PATCH  /projects/:id                - Update a project");
    println!("  DELETE /projects/:id                - Delete a project");
    println!("  GET    /projects/:id/investments    - A project's investments");
    println!("  POST   /projects/:id/investments    - Request an investment");
    println!("  GET    /projects/:id/history        - Funding total history");
    println!("  POST   /projects/:id/recompute      - Re-derive project status");
    println!("  POST   /investments/:id/accept      - Accept an investment");
    println!("  POST   /investments/:id/decline     - Decline an investment");
    println!("  DELETE /investments/:id             - Cancel own investment");

    axum::serve(listener, app).await.unwrap();
}
