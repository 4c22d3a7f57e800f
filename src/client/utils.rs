use secrecy::ExposeSecret;

use crate::client::config::Config;
use crate::client::consts::{AUTHORIZATION_HEADER, CONTENT_TYPE_HEADER, SDP_CONTENT_TYPE};
use crate::credential::Credential;
use crate::error::{Error, Result};

pub fn build_request(
    http: &reqwest::Client,
    config: &Config,
    credential: &Credential,
    offer: &str,
) -> reqwest::RequestBuilder {
    http.post(config.base_url())
        .query(&[("model", config.model())])
        .header(
            AUTHORIZATION_HEADER,
            format!("Bearer {}", credential.ephemeral_key().expose_secret()),
        )
        .header(CONTENT_TYPE_HEADER, SDP_CONTENT_TYPE)
        .body(offer.to_string())
}

/// Posts the local offer and returns the remote answer SDP.
pub async fn exchange_offer(
    http: &reqwest::Client,
    config: &Config,
    credential: &Credential,
    offer: &str,
) -> Result<String> {
    let response = build_request(http, config, credential, offer)
        .send()
        .await
        .map_err(|e| Error::Negotiation(format!("offer exchange failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Negotiation(format!("failed to read answer: {}", e)))?;

    if !status.is_success() {
        return Err(Error::Negotiation(format!(
            "negotiation endpoint returned {}: {}",
            status,
            body.trim()
        )));
    }
    if body.trim().is_empty() {
        return Err(Error::Negotiation("negotiation endpoint returned an empty answer".to_string()));
    }
    Ok(body)
}
