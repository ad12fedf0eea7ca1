use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::CalculatorConfig;
use crate::date_utils::parse_date;
use crate::error::{AppError, AppResult};

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Pay stub details to estimate worked hours from.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoursCalculatorRequest {
    pub employment_type: String,
    pub employment_status: String,
    pub gross_salary: f64,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoursCalculation {
    pub calculation: String,
}

/// A request whose fields passed validation.
#[derive(Debug, Clone)]
struct PayPeriod<'a> {
    employment_type: &'a str,
    employment_status: &'a str,
    gross_salary: f64,
    start: NaiveDate,
    end: NaiveDate,
}

impl HoursCalculatorRequest {
    fn validate(&self) -> AppResult<PayPeriod<'_>> {
        if !self.gross_salary.is_finite() || self.gross_salary <= 0.0 {
            return Err(AppError::validation(
                "grossSalary",
                "grossSalary must be a positive number",
            ));
        }
        let start = parse_date("startDate", &self.start_date)?;
        let end = parse_date("endDate", &self.end_date)?;
        if end < start {
            return Err(AppError::validation(
                "endDate",
                "endDate must not be before startDate",
            ));
        }
        Ok(PayPeriod {
            employment_type: self.employment_type.trim(),
            employment_status: self.employment_status.trim(),
            gross_salary: self.gross_salary,
            start,
            end,
        })
    }
}

/// Create an HTTP client with appropriate timeout
fn create_client() -> AppResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))
}

fn build_system_prompt() -> String {
    r#"You are an expert in Ontario, Canada employment law and payroll calculations. You help calculate the number of hours worked based on bi-weekly gross salary.

Key Ontario employment considerations:
1. Minimum wage (2024): $16.55/hour general, $15.60/hour for students under 18 working under 28 hours a week
2. Vacation pay: 4% of gross earnings is included in the gross salary
3. Taxes and deductions:
   - CPP (Canada Pension Plan) employee contribution: 5.95% on earnings above $3,500 annually
   - EI (Employment Insurance) employee premium: 1.58% on earnings up to $63,200 annually
   - Federal income tax: progressive rates based on annual income brackets
   - Ontario provincial income tax: progressive rates
4. Statutory holidays: Ontario has 9 public holidays. If worked, employees get 1.5x pay or premium pay plus a day off
5. Full-time vs part-time: different benefit considerations but the same minimum wage
6. Student vs working professional: students under 18 may have a different minimum wage

Calculate the approximate hours worked considering:
- The gross salary includes vacation pay (4%)
- Deductions reduce take-home pay but do not affect the hours calculation
- Whether the bi-weekly period includes any Ontario public holidays
- The employment type and status for wage rates

Ontario public holidays: New Year's Day (Jan 1), Family Day (3rd Monday in Feb), Good Friday, Victoria Day (Monday before May 25), Canada Day (Jul 1), Labour Day (1st Monday in Sep), Thanksgiving (2nd Monday in Oct), Christmas Day (Dec 25), Boxing Day (Dec 26).

Provide a breakdown showing:
1. Estimated hourly rate
2. Estimated hours worked
3. How vacation pay was accounted for
4. Whether any statutory holidays fall in the period
5. A brief explanation of the calculation"#
        .to_string()
}

fn build_user_prompt(period: &PayPeriod<'_>) -> String {
    format!(
        "Calculate hours worked for:\n\
         - Employment type: {}\n\
         - Employment status: {}\n\
         - Bi-weekly gross salary: ${:.2}\n\
         - Period: {} to {}\n\n\
         Provide the estimated hourly rate, total hours worked (vacation pay is included in \
         gross), a breakdown of the calculation and any statutory holiday considerations.",
        period.employment_type,
        period.employment_status,
        period.gross_salary,
        period.start.format("%Y-%m-%d"),
        period.end.format("%Y-%m-%d"),
    )
}

/// Asks the configured chat-completions endpoint to estimate hours worked and
/// returns its explanation text.
pub async fn calculate_hours(
    config: &CalculatorConfig,
    request: &HoursCalculatorRequest,
) -> AppResult<HoursCalculation> {
    let period = request.validate()?;
    let api_key = config
        .api_key
        .as_deref()
        .ok_or_else(|| AppError::Internal("hours calculator is not configured".into()))?;

    let client = create_client()?;
    let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

    #[derive(Serialize)]
    struct Message {
        role: &'static str,
        content: String,
    }

    #[derive(Serialize)]
    struct ChatRequest<'a> {
        model: &'a str,
        messages: Vec<Message>,
    }

    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ChoiceMessage,
    }

    #[derive(Deserialize)]
    struct ChoiceMessage {
        content: String,
    }

    let body = ChatRequest {
        model: &config.model,
        messages: vec![
            Message {
                role: "system",
                content: build_system_prompt(),
            },
            Message {
                role: "user",
                content: build_user_prompt(&period),
            },
        ],
    };

    debug!(
        model = %config.model,
        start = %period.start,
        end = %period.end,
        "Sending hours calculation request"
    );

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| AppError::Upstream(format!("Calculator request failed: {}", e)))?;

    match response.status() {
        StatusCode::TOO_MANY_REQUESTS => return Err(AppError::RateLimited),
        StatusCode::PAYMENT_REQUIRED => return Err(AppError::PaymentRequired),
        status if !status.is_success() => {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, body = %text, "Calculator gateway error");
            return Err(AppError::Upstream(format!(
                "Calculator gateway returned {}",
                status
            )));
        }
        _ => {}
    }

    let parsed: ChatResponse = response
        .json()
        .await
        .map_err(|e| AppError::Upstream(format!("Failed to parse calculator response: {}", e)))?;

    let calculation = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| AppError::Upstream("Calculator returned no choices".into()))?;

    Ok(HoursCalculation { calculation })
}
