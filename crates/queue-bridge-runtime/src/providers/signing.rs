//! AWS Signature Version 4 request signing and the shared query-API request path.
//!
//! SQS and SNS both expose a query API: every operation is a POST whose
//! parameters travel in the query string and whose response is XML. This module
//! signs such requests and maps transport-level and service-level failures to
//! [`TransportError`].

use crate::error::TransportError;
use crate::provider::AwsCredentials;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client as HttpClient;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

#[cfg(test)]
#[path = "signing_tests.rs"]
mod tests;

type HmacSha256 = Hmac<Sha256>;

/// AWS Signature Version 4 signer for request authentication
///
/// Implements the AWS Signature V4 signing process:
/// 1. Create canonical request (method, URI, query, headers, payload)
/// 2. Create string to sign (algorithm, timestamp, scope, request hash)
/// 3. Derive signing key (4-level HMAC chain)
/// 4. Calculate signature and build Authorization header
#[derive(Clone)]
pub(crate) struct AwsV4Signer {
    credentials: AwsCredentials,
    region: String,
    service: String,
}

impl AwsV4Signer {
    pub(crate) fn new(credentials: AwsCredentials, region: String, service: &str) -> Self {
        Self {
            credentials,
            region,
            service: service.to_string(),
        }
    }

    /// Sign a request and return the headers to attach to it
    ///
    /// The returned headers are `Authorization`, `x-amz-date` and, for
    /// temporary credentials, `x-amz-security-token`.
    pub(crate) fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        query_params: &BTreeMap<String, String>,
        body: &str,
        timestamp: &DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        let canonical_query_string = canonical_query(query_params);

        // Canonical headers must be sorted by lowercase name
        let mut canonical_headers = format!("host:{}\nx-amz-date:{}\n", host, amz_date);
        let mut signed_headers = "host;x-amz-date".to_string();
        if let Some(token) = &self.credentials.session_token {
            canonical_headers.push_str(&format!("x-amz-security-token:{}\n", token));
            signed_headers.push_str(";x-amz-security-token");
        }

        let payload_hash = hex::encode(Sha256::digest(body.as_bytes()));

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, path, canonical_query_string, canonical_headers, signed_headers, payload_hash
        );

        let algorithm = "AWS4-HMAC-SHA256";
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let canonical_request_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            algorithm, amz_date, credential_scope, canonical_request_hash
        );

        let signature = self.calculate_signature(&string_to_sign, &date_stamp);

        let authorization_header = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            algorithm, self.credentials.access_key_id, credential_scope, signed_headers, signature
        );

        let mut headers = vec![
            ("Authorization".to_string(), authorization_header),
            ("x-amz-date".to_string(), amz_date),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        headers
    }

    /// Derive the signing key and sign `string_to_sign`
    ///
    /// kSecret = "AWS4" + secret, then HMAC over date, region, service and
    /// the literal "aws4_request" in turn.
    fn calculate_signature(&self, string_to_sign: &str, date_stamp: &str) -> String {
        let k_secret = format!("AWS4{}", self.credentials.secret_access_key);
        let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        let k_signing = hmac_sha256(&k_service, b"aws4_request");
        let signature = hmac_sha256(&k_signing, string_to_sign.as_bytes());

        hex::encode(signature)
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Sorted, RFC 3986 encoded query string
pub(crate) fn canonical_query(query_params: &BTreeMap<String, String>) -> String {
    query_params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Signed HTTP client for one AWS query-API endpoint
#[derive(Clone)]
pub(crate) struct QueryApiClient {
    http_client: HttpClient,
    signer: Option<AwsV4Signer>,
    endpoint: Url,
    provider: &'static str,
}

impl QueryApiClient {
    pub(crate) fn new(
        endpoint: &str,
        credentials: Option<AwsCredentials>,
        region: String,
        service: &str,
        provider: &'static str,
        timeout: std::time::Duration,
    ) -> Result<Self, TransportError> {
        let endpoint = Url::parse(endpoint).map_err(|e| TransportError::Configuration {
            message: format!("invalid endpoint '{}': {}", endpoint, e),
        })?;
        if endpoint.host_str().is_none() {
            return Err(TransportError::Configuration {
                message: format!("endpoint '{}' has no host", endpoint),
            });
        }

        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Configuration {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            signer: credentials.map(|c| AwsV4Signer::new(c, region, service)),
            endpoint,
            provider,
        })
    }

    pub(crate) fn has_credentials(&self) -> bool {
        self.signer.is_some()
    }

    /// Host header value, including a non-default port
    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Execute one signed query-API call and return the response body
    pub(crate) async fn call(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<String, TransportError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| TransportError::AuthenticationFailed {
                message: "No credentials configured".to_string(),
            })?;

        let path = match self.endpoint.path() {
            "" => "/",
            p => p,
        };
        let host = self.host();
        let timestamp = Utc::now();
        let auth_headers = signer.sign_request("POST", &host, path, params, "", &timestamp);

        let mut url = self.endpoint.clone();
        url.set_query(Some(&canonical_query(params)));

        let mut request = self.http_client.post(url);
        for (key, value) in auth_headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::ConnectionFailed {
                    message: format!("Request timeout: {}", e),
                }
            } else if e.is_connect() {
                TransportError::ConnectionFailed {
                    message: format!("Connection failed: {}", e),
                }
            } else {
                TransportError::ConnectionFailed {
                    message: format!("HTTP request failed: {}", e),
                }
            }
        })?;

        let status = response.status();
        let response_body =
            response
                .text()
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    message: format!("Failed to read response body: {}", e),
                })?;

        if !status.is_success() {
            return Err(parse_error_response(
                self.provider,
                &response_body,
                status.as_u16(),
            ));
        }

        Ok(response_body)
    }
}

/// Map an AWS XML error document to a transport error
pub(crate) fn parse_error_response(provider: &str, xml: &str, status_code: u16) -> TransportError {
    let code = first_element_text(xml, b"Code").unwrap_or_else(|| "Unknown".to_string());
    let message =
        first_element_text(xml, b"Message").unwrap_or_else(|| "Unknown error".to_string());

    match code.as_str() {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" | "NotFound" => {
            TransportError::NotFound { name: message }
        }
        "InvalidClientTokenId"
        | "UnrecognizedClientException"
        | "SignatureDoesNotMatch"
        | "AccessDenied"
        | "AuthorizationError"
        | "ExpiredToken" => TransportError::AuthenticationFailed {
            message: format!("{}: {}", code, message),
        },
        "ReceiptHandleIsInvalid" | "InvalidReceiptHandle" => {
            TransportError::ReceiptNotFound { receipt: message }
        }
        "Throttling" | "ThrottlingException" | "RequestThrottled" => {
            TransportError::Throttled { message }
        }
        "InvalidParameterValue" | "InvalidMessageContents" | "MissingParameter" => {
            TransportError::MessageRejected {
                reason: format!("{}: {}", code, message),
            }
        }
        _ if status_code == 401 || status_code == 403 => TransportError::AuthenticationFailed {
            message: format!("{}: {}", code, message),
        },
        _ if status_code == 400 => TransportError::MessageRejected {
            reason: format!("{}: {}", code, message),
        },
        _ => TransportError::ProviderError {
            provider: provider.to_string(),
            code,
            message,
        },
    }
}

/// Text of the first element named `name`, unescaped
pub(crate) fn first_element_text(xml: &str, name: &[u8]) -> Option<String> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut inside = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == name => inside = true,
            Ok(Event::Text(e)) if inside => {
                return e.unescape().ok().map(|s| s.into_owned());
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == name => inside = false,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}
