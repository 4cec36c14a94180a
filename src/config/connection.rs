//! Azure storage connection strings
//!
//! Parses the `Key=Value;Key=Value` format produced by the Azure portal and
//! Azurite. Only the keys needed to reach the blob endpoint are kept.

use super::loader::ConfigError;
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct AzureConnection {
    pub account: Option<String>,
    pub access_key: Option<String>,
    pub sas_token: Option<String>,
    /// Full blob endpoint URL, when the connection string names one
    pub blob_endpoint: Option<String>,
    pub use_emulator: bool,
}

impl fmt::Debug for AzureConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConnection")
            .field("account", &self.account)
            .field("access_key", &self.access_key.as_ref().map(|_| "***"))
            .field("sas_token", &self.sas_token.as_ref().map(|_| "***"))
            .field("blob_endpoint", &self.blob_endpoint)
            .field("use_emulator", &self.use_emulator)
            .finish()
    }
}

impl AzureConnection {
    pub fn parse(connection_string: &str) -> Result<Self, ConfigError> {
        let mut account = None;
        let mut access_key = None;
        let mut sas_token = None;
        let mut blob_endpoint = None;
        let mut endpoint_suffix = None;
        let mut protocol = None;
        let mut use_emulator = false;

        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Values (account keys, SAS tokens) may themselves contain '='
            let (key, value) = part.split_once('=').ok_or_else(|| {
                ConfigError::InvalidDestination(format!(
                    "malformed connection string segment '{}'",
                    redact(part)
                ))
            })?;

            match key.trim() {
                "AccountName" => account = Some(value.to_string()),
                "AccountKey" => access_key = Some(value.to_string()),
                "SharedAccessSignature" => {
                    sas_token = Some(value.trim_start_matches('?').to_string())
                }
                "BlobEndpoint" => blob_endpoint = Some(value.trim_end_matches('/').to_string()),
                "EndpointSuffix" => endpoint_suffix = Some(value.to_string()),
                "DefaultEndpointsProtocol" => protocol = Some(value.to_string()),
                "UseDevelopmentStorage" => use_emulator = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if !use_emulator {
            if account.is_none() && blob_endpoint.is_none() {
                return Err(ConfigError::InvalidDestination(
                    "connection string must contain AccountName or BlobEndpoint".to_string(),
                ));
            }
            if access_key.is_none() && sas_token.is_none() {
                return Err(ConfigError::InvalidDestination(
                    "connection string must contain AccountKey or SharedAccessSignature"
                        .to_string(),
                ));
            }
        }

        // Sovereign clouds publish a different suffix; derive the endpoint from it
        if blob_endpoint.is_none() {
            if let (Some(acct), Some(suffix)) = (&account, &endpoint_suffix) {
                if suffix != "core.windows.net" {
                    let scheme = protocol.as_deref().unwrap_or("https");
                    blob_endpoint = Some(format!("{}://{}.blob.{}", scheme, acct, suffix));
                }
            }
        }

        Ok(Self {
            account,
            access_key,
            sas_token,
            blob_endpoint,
            use_emulator,
        })
    }
}

fn redact(segment: &str) -> String {
    match segment.split_once('=') {
        Some((key, _)) => format!("{}=***", key),
        None => "***".to_string(),
    }
}
