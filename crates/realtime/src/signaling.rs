//! Credential fetch and SDP exchange with the realtime endpoint.

use crate::error::TransportError;
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
struct SessionTokenResponse {
    client_secret: ClientSecret,
}

#[derive(Deserialize)]
struct ClientSecret {
    value: String,
}

/// Fetches the short-lived bearer token from the backend, passing the selected
/// voice along.
pub async fn fetch_client_secret(
    http: &reqwest::Client,
    session_url: &str,
    voice: &str,
) -> Result<String, TransportError> {
    let response = http
        .get(session_url)
        .query(&[("voice", voice)])
        .send()
        .await
        .map_err(|e| TransportError::Credential(e.to_string()))?
        .error_for_status()
        .map_err(|e| TransportError::Credential(e.to_string()))?;
    let token: SessionTokenResponse = response
        .json()
        .await
        .map_err(|e| TransportError::Credential(format!("invalid session payload: {e}")))?;
    debug!("Obtained ephemeral client secret");
    Ok(token.client_secret.value)
}

/// Posts the local SDP offer to the realtime endpoint and returns the remote
/// answer.
pub async fn exchange_sdp(
    http: &reqwest::Client,
    realtime_url: &str,
    model: &str,
    bearer: &str,
    offer_sdp: &str,
) -> Result<String, TransportError> {
    let response = http
        .post(realtime_url)
        .query(&[("model", model)])
        .bearer_auth(bearer)
        .header(reqwest::header::CONTENT_TYPE, "application/sdp")
        .body(offer_sdp.to_string())
        .send()
        .await
        .map_err(|e| TransportError::Negotiation(e.to_string()))?;
    if !response.status().is_success() {
        return Err(TransportError::Negotiation(format!(
            "realtime endpoint returned {}",
            response.status()
        )));
    }
    let answer = response
        .text()
        .await
        .map_err(|e| TransportError::Negotiation(e.to_string()))?;
    if answer.trim().is_empty() {
        return Err(TransportError::Negotiation(
            "empty answer from realtime endpoint".to_string(),
        ));
    }
    debug!(bytes = answer.len(), "Received SDP answer");
    Ok(answer)
}
