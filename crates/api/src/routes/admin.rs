//! Admin console routes.
//!
//! Every route is a `POST` with a JSON body that names the calling
//! administrator. Authorization happens in the ledger core; handlers only
//! decode the body and shape the response.

use std::str::FromStr;

use axum::{
    Json, Router,
    extract::State,
    routing::post,
};
use chrono::NaiveDate;
use ledgerdesk_core::ledger::{ApproveWithdrawalInput, DepositInput, RejectWithdrawalInput};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};

use super::method_not_allowed;
use crate::{AppState, error::ApiError, extractors::JsonBody};

/// Creates the admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/deposit", post(deposit))
        .route("/withdrawals/approve", post(approve_withdrawal))
        .route("/withdrawals/reject", post(reject_withdrawal))
        .route("/accrual/run", post(run_accrual))
        .route("/overview", post(overview))
        .route("/accounts/reconcile", post(reconcile))
        .method_not_allowed_fallback(method_not_allowed)
}

/// Request body for a deposit.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    /// Calling administrator.
    #[serde(alias = "adminUid")]
    pub caller_identity: Option<String>,
    /// Account to credit.
    #[serde(alias = "userId")]
    pub target_user_id: Option<String>,
    /// Amount as a JSON number or numeric string.
    pub amount: Option<Value>,
}

/// Request body for approving a withdrawal.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveWithdrawalRequest {
    /// Calling administrator.
    #[serde(alias = "adminUid")]
    pub caller_identity: Option<String>,
    /// Withdrawal to approve.
    pub withdrawal_id: Option<String>,
    /// Requester as shown in the console.
    pub user_id: Option<String>,
    /// Amount as shown in the console.
    pub amount: Option<Value>,
}

/// Request body for rejecting a withdrawal.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectWithdrawalRequest {
    /// Calling administrator.
    #[serde(alias = "adminUid")]
    pub caller_identity: Option<String>,
    /// Withdrawal to reject.
    pub withdrawal_id: Option<String>,
}

/// Request body for a manual accrual run.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAccrualRequest {
    /// Calling administrator.
    #[serde(alias = "adminUid")]
    pub caller_identity: Option<String>,
    /// Date to accrue for (YYYY-MM-DD); today in UTC if absent.
    pub run_date: Option<NaiveDate>,
}

/// Request body for routes that need only the caller.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerRequest {
    /// Calling administrator.
    #[serde(alias = "adminUid")]
    pub caller_identity: Option<String>,
}

/// Request body for reconciling one account.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    /// Calling administrator.
    #[serde(alias = "adminUid")]
    pub caller_identity: Option<String>,
    /// Account to replay.
    pub user_id: Option<String>,
}

/// Reads a monetary amount without going through a float.
///
/// JSON numbers are taken from their literal text (`serde_json` is built with
/// `arbitrary_precision`), so long amounts keep every digit. Anything that is not a
/// number or a numeric string yields `None` and is refused by the ledger.
fn parse_amount(value: Option<&Value>) -> Option<Decimal> {
    let text = match value? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn success(message: String) -> Json<Value> {
    Json(json!({ "status": "success", "message": message }))
}

/// POST `/admin/deposit` - Credit an account.
async fn deposit(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<DepositRequest>,
) -> Result<Json<Value>, ApiError> {
    let input = DepositInput {
        target_user_id: body.target_user_id,
        amount: parse_amount(body.amount.as_ref()),
    };
    let receipt = state
        .ledger
        .deposit(body.caller_identity.as_deref(), input)
        .await?;
    Ok(success(receipt.message()))
}

/// POST `/admin/withdrawals/approve` - Pay out a pending withdrawal.
async fn approve_withdrawal(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ApproveWithdrawalRequest>,
) -> Result<Json<Value>, ApiError> {
    let input = ApproveWithdrawalInput {
        withdrawal_id: body.withdrawal_id,
        user_id: body.user_id,
        amount: parse_amount(body.amount.as_ref()),
    };
    let receipt = state
        .ledger
        .approve_withdrawal(body.caller_identity.as_deref(), input)
        .await?;
    Ok(success(receipt.message()))
}

/// POST `/admin/withdrawals/reject` - Decline a pending withdrawal.
async fn reject_withdrawal(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RejectWithdrawalRequest>,
) -> Result<Json<Value>, ApiError> {
    let input = RejectWithdrawalInput {
        withdrawal_id: body.withdrawal_id,
    };
    let receipt = state
        .ledger
        .reject_withdrawal(body.caller_identity.as_deref(), input)
        .await?;
    Ok(success(receipt.message()))
}

/// POST `/admin/accrual/run` - Run the daily ROI accrual now.
async fn run_accrual(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RunAccrualRequest>,
) -> Result<Json<Value>, ApiError> {
    let report = state
        .ledger
        .run_accrual_as_admin(body.caller_identity.as_deref(), body.run_date)
        .await?;
    Ok(Json(json!({
        "status": "success",
        "message": report.message(),
        "report": report,
    })))
}

/// POST `/admin/overview` - Aggregates and latest activity.
async fn overview(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CallerRequest>,
) -> Result<Json<Value>, ApiError> {
    let overview = state
        .ledger
        .overview(body.caller_identity.as_deref())
        .await?;
    Ok(Json(json!({ "status": "success", "overview": overview })))
}

/// POST `/admin/accounts/reconcile` - Replay one account's history.
async fn reconcile(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ReconcileRequest>,
) -> Result<Json<Value>, ApiError> {
    let reconciliation = state
        .ledger
        .reconcile(body.caller_identity.as_deref(), body.user_id.as_deref())
        .await?;
    Ok(Json(json!({ "status": "success", "reconciliation": reconciliation })))
}
