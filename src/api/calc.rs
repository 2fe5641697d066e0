//! Calculator handlers.

use axum::Json;
use axum::extract::Query;
use axum::extract::rejection::QueryRejection;

use super::types::BalanceQuery;
use crate::calc::{self, AmmoniaBalance, LcohBreakdown, LcohInputs};
use crate::error::{ServiceError, ServiceResult};

fn query<T>(q: Result<Query<T>, QueryRejection>) -> ServiceResult<T> {
    q.map(|Query(v)| v)
        .map_err(|e| ServiceError::InvalidInput(e.body_text()))
}

/// Levelized cost of hydrogen; omitted parameters take the reference values.
///
/// `GET /calc/lcoh?elec_price=..&capex=..&capacity=..&h2prod=..&lifetime=..&discount=..`
pub async fn lcoh(q: Result<Query<LcohInputs>, QueryRejection>) -> ServiceResult<Json<LcohBreakdown>> {
    Ok(Json(calc::levelized_cost(query(q)?)?))
}

/// Ammonia plant balance.
///
/// `GET /calc/nh3-balance?mw=..` (default 1000 MW)
pub async fn nh3_balance(
    q: Result<Query<BalanceQuery>, QueryRejection>,
) -> ServiceResult<Json<AmmoniaBalance>> {
    let mw = query(q)?.mw.unwrap_or(calc::ammonia::DEFAULT_MW);
    Ok(Json(calc::ammonia_balance(mw)?))
}
