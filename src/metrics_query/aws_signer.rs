//! AWS SigV4 request signing for Amazon Managed Service for Prometheus.
//!
//! Grounded on `core/integrations/prometheus/prometheus_utils.py`'s
//! `generate_prometheus_config`, which loads a boto3 session (profile or
//! default credential chain), freezes its credentials, and signs every
//! request against the `"aps"` service name. This signer takes the same
//! inputs (region, access/secret key, service name) but resolves them from
//! explicit config rather than a boto3 session, since the AWS credential
//! provider chain itself is out of scope here.

use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;
use tracing::warn;

use super::vendors::Signer;

pub struct AwsSigV4Signer {
    region: String,
    service: String,
    credentials: Credentials,
}

impl AwsSigV4Signer {
    pub fn new(
        region: impl Into<String>,
        service: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        AwsSigV4Signer {
            region: region.into(),
            service: service.into(),
            credentials: Credentials::new(access_key.into(), secret_key.into(), session_token, None, "krr-eks-managed-prom"),
        }
    }
}

impl Signer for AwsSigV4Signer {
    fn sign(&self, method: &str, url: &str, body: &str) -> Vec<(String, String)> {
        let identity = self.credentials.clone().into();
        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(&self.service)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build();
        let params = match params {
            Ok(params) => params.into(),
            Err(e) => {
                warn!(error = %e, "failed to build sigv4 signing params, request will be sent unsigned");
                return Vec::new();
            }
        };

        let headers = [("content-type", "application/x-www-form-urlencoded")];
        let signable = SignableRequest::new(method, url, headers.into_iter(), SignableBody::Bytes(body.as_bytes()));
        let signable = match signable {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "failed to build sigv4 signable request");
                return Vec::new();
            }
        };

        match sign(signable, &params) {
            Ok(output) => output.output().headers().map(|(name, value)| (name.to_string(), value.to_string())).collect(),
            Err(e) => {
                warn!(error = %e, "failed to sign request for aws managed prometheus");
                Vec::new()
            }
        }
    }
}
