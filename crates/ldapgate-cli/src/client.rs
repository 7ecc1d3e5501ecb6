//! Exec credential plugin
//!
//! Posts the user's credentials to `/auth` and prints the returned
//! ExecCredential for kubectl.

use anyhow::{bail, Context, Result};
use ldapgate_core::types::{Credentials, ExecCredential};
use std::time::Duration;
use tracing::debug;

use crate::AuthenticateArgs;

pub async fn authenticate(args: &AuthenticateArgs) -> Result<()> {
    let url = auth_url(&args.endpoint);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()
        .context("Failed to build HTTP client")?;

    debug!(url = %url, username = %args.username, "Requesting credential");

    let response = client
        .post(&url)
        .json(&Credentials::new(&args.username, &args.password))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("{} returned {}: {}", url, status, body.trim());
    }

    let credential: ExecCredential = response
        .json()
        .await
        .context("Server returned an invalid ExecCredential")?;

    debug!(expiration = %credential.status.expiration_timestamp, "Received credential");

    println!("{}", serde_json::to_string_pretty(&credential)?);
    Ok(())
}

fn auth_url(endpoint: &str) -> String {
    format!("{}/auth", endpoint.trim_end_matches('/'))
}
