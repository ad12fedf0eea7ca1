use axum::extract::State;
use axum::response::Json;

use crate::error::AppResult;
use crate::services::hours_calculator::{self, HoursCalculation, HoursCalculatorRequest};
use crate::state::AppState;

pub async fn calculate(
    State(state): State<AppState>,
    Json(request): Json<HoursCalculatorRequest>,
) -> AppResult<Json<HoursCalculation>> {
    tracing::info!(
        employment_type = %request.employment_type,
        employment_status = %request.employment_status,
        start = %request.start_date,
        end = %request.end_date,
        "Calculating hours from gross pay"
    );
    let calculation = hours_calculator::calculate_hours(&state.config.calculator, &request).await?;
    Ok(Json(calculation))
}
