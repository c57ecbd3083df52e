//! OTP generate, verify and resend endpoints.
//!
//! Handlers only parse input and map outcomes; every lifecycle rule lives in
//! the engine.

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
};
use otp_common::{OtpCode, OtpError, PairKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairRequest {
    user_id: String,
    offer_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    user_id: Option<String>,
    offer_id: Option<String>,
    otp: String,
}

/// Query string of issued links
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LinkQuery {
    user_id: Option<String>,
    offer_id: Option<String>,
    otp: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpLinkResponse {
    otp_link: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    success: bool,
    message: &'static str,
}

const VERIFIED_MESSAGE: &str = "OTP verified successfully and transaction confirmed";

/// Some mail clients turn `userId=x` into `userId==x`
fn clean_param(value: &str) -> &str {
    value.strip_prefix('=').unwrap_or(value)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| OtpError::InvalidInput(rejection.body_text()).into())
}

/// Body values win; a missing, empty or nil one is taken from the query string
fn merge_pair<'a>(
    body_user: Option<&'a str>,
    body_offer: Option<&'a str>,
    params: &'a LinkQuery,
) -> Result<PairKey, OtpError> {
    let user_id = body_user
        .map(str::trim)
        .filter(|v| !v.is_empty() && Uuid::parse_str(v).map_or(true, |u| !u.is_nil()))
        .or_else(|| params.user_id.as_deref().map(clean_param));
    let offer_id = body_offer
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| params.offer_id.as_deref().map(clean_param));

    match (user_id, offer_id) {
        (Some(user_id), Some(offer_id)) => PairKey::parse(user_id, offer_id),
        _ => Err(OtpError::InvalidInput(
            "Both userId and offerId are required".to_string(),
        )),
    }
}

fn pair_from_query(params: &LinkQuery) -> Result<PairKey, OtpError> {
    match (params.user_id.as_deref(), params.offer_id.as_deref()) {
        (Some(user_id), Some(offer_id)) => PairKey::parse(clean_param(user_id), clean_param(offer_id)),
        _ => Err(OtpError::InvalidInput(
            "userId and offerId are required query parameters".to_string(),
        )),
    }
}

/// Issue a code for the pair (or return the outstanding one)
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<PairRequest>, JsonRejection>,
) -> Result<Json<OtpLinkResponse>, ApiError> {
    let request = json_body(payload)?;
    let key = PairKey::parse(&request.user_id, &request.offer_id)?;

    let otp_link = state.engine.generate(&key).await?;
    Ok(Json(OtpLinkResponse { otp_link }))
}

/// Verify a code submitted in the body; ids fall back to the query string
pub async fn verify(
    State(state): State<AppState>,
    Query(params): Query<LinkQuery>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let request = json_body(payload)?;
    let code = OtpCode::parse(&request.otp)?;

    let key = merge_pair(
        request.user_id.as_deref(),
        request.offer_id.as_deref(),
        &params,
    )?;

    tracing::debug!(user_id = %key.user_id, offer_id = %key.offer_id, "Verifying OTP");

    state.engine.verify(&key, &code).await?;
    Ok(Json(SuccessResponse {
        success: true,
        message: VERIFIED_MESSAGE,
    }))
}

/// Verify through the link sent to the user
pub async fn verify_link(
    State(state): State<AppState>,
    Query(params): Query<LinkQuery>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let key = pair_from_query(&params)?;
    let code = OtpCode::parse(clean_param(params.otp.as_deref().unwrap_or_default()))?;

    state.engine.verify(&key, &code).await?;
    Ok(Json(SuccessResponse {
        success: true,
        message: VERIFIED_MESSAGE,
    }))
}

/// Replace the outstanding code with a fresh one
pub async fn resend(
    State(state): State<AppState>,
    payload: Result<Json<PairRequest>, JsonRejection>,
) -> Result<Json<OtpLinkResponse>, ApiError> {
    let request = json_body(payload)?;
    let key = PairKey::parse(&request.user_id, &request.offer_id)?;

    let otp_link = state.engine.resend(&key).await?;
    Ok(Json(OtpLinkResponse { otp_link }))
}

/// Resend through a link
pub async fn resend_link(
    State(state): State<AppState>,
    Query(params): Query<LinkQuery>,
) -> Result<Json<OtpLinkResponse>, ApiError> {
    let key = pair_from_query(&params)?;

    let otp_link = state.engine.resend(&key).await?;
    Ok(Json(OtpLinkResponse { otp_link }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_param() {
        assert_eq!(clean_param("=abc"), "abc");
        assert_eq!(clean_param("abc"), "abc");
        assert_eq!(clean_param("==abc"), "=abc");
    }

    #[test]
    fn test_pair_from_query_requires_both() {
        let params = LinkQuery {
            user_id: Some("6f1c2a9e-0d4b-4c55-9a1e-3f2b7c8d9e01".to_string()),
            ..Default::default()
        };
        assert!(matches!(pair_from_query(&params), Err(OtpError::InvalidInput(_))));

        let params = LinkQuery {
            user_id: Some("=6f1c2a9e-0d4b-4c55-9a1e-3f2b7c8d9e01".to_string()),
            offer_id: Some("=offer".to_string()),
            otp: None,
        };
        let key = pair_from_query(&params).unwrap();
        assert_eq!(key.offer_id, "offer");
    }

    #[test]
    fn test_merge_pair_resolves_each_field() {
        let body_user = "6f1c2a9e-0d4b-4c55-9a1e-3f2b7c8d9e01";
        let query_user = "0b6a3c1e-5f2d-4e8a-b7c9-1d2e3f4a5b6c";
        let params = LinkQuery {
            user_id: Some(format!("={}", query_user)),
            offer_id: Some("offer-q".to_string()),
            otp: None,
        };

        // Body user kept, missing offer taken from the query
        let key = merge_pair(Some(body_user), None, &params).unwrap();
        assert_eq!(key.user_id.to_string(), body_user);
        assert_eq!(key.offer_id, "offer-q");

        // Nil body user falls back, body offer kept
        let nil = Uuid::nil().to_string();
        let key = merge_pair(Some(&nil), Some("offer-b"), &params).unwrap();
        assert_eq!(key.user_id.to_string(), query_user);
        assert_eq!(key.offer_id, "offer-b");

        // Empty offer falls back as well
        let key = merge_pair(Some(body_user), Some(""), &params).unwrap();
        assert_eq!(key.offer_id, "offer-q");

        // A malformed body user is an error, not a fallback
        assert!(matches!(
            merge_pair(Some("nope"), Some("offer-b"), &params),
            Err(OtpError::InvalidInput(_))
        ));

        // Nothing anywhere
        assert!(matches!(
            merge_pair(None, None, &LinkQuery::default()),
            Err(OtpError::InvalidInput(_))
        ));
    }
}
