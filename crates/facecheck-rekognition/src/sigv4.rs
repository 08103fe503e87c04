//! AWS Signature Version 4 request signing.
//!
//! Only what a single-shot JSON POST needs: no query string canonicalization
//! beyond passing it through, no chunked payloads.

use crate::config::Credentials;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// What is being signed, minus the credentials.
#[derive(Debug, Clone)]
pub struct SigningRequest<'a> {
    pub method: &'a str,
    /// Host header value, including a non-default port.
    pub host: &'a str,
    pub path: &'a str,
    /// Already-canonical query string (empty for POST bodies).
    pub query: &'a str,
    /// Extra headers to sign, beyond `host` and `x-amz-date`.
    pub headers: &'a [(&'a str, &'a str)],
    pub payload: &'a [u8],
}

/// Headers to attach to the outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub authorization: String,
    pub amz_date: String,
    pub security_token: Option<String>,
}

pub fn sign(
    request: &SigningRequest<'_>,
    credentials: &Credentials,
    region: &str,
    service: &str,
    time: DateTime<Utc>,
) -> Signature {
    let amz_date = time.format("%Y%m%dT%H%M%SZ").to_string();
    let date = time.format("%Y%m%d").to_string();
    let scope = format!("{date}/{region}/{service}/aws4_request");

    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    headers.push(("host".into(), request.host.to_string()));
    headers.push(("x-amz-date".into(), amz_date.clone()));
    if let Some(token) = &credentials.session_token {
        headers.push(("x-amz-security-token".into(), token.clone()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let (canonical, signed_headers) = canonical_request(request, &headers);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical.as_bytes()))
    );

    let key = signing_key(&credentials.secret_access_key, &date, region, service);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    Signature {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
        amz_date,
        security_token: credentials.session_token.clone(),
    }
}

/// Canonical request text and the `;`-joined signed header list.
/// `headers` must be lowercase and sorted by name.
fn canonical_request(request: &SigningRequest<'_>, headers: &[(String, String)]) -> (String, String) {
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let payload_hash = hex::encode(Sha256::digest(request.payload));

    let canonical = format!(
        "{}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
        request.method, request.path, request.query
    );
    (canonical, signed_headers)
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_credentials() -> Credentials {
        Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
    }

    fn example_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    #[test]
    fn test_get_vanilla_vector() {
        // aws-sig-v4-test-suite: get-vanilla
        let request = SigningRequest {
            method: "GET",
            host: "example.amazon.com",
            path: "/",
            query: "",
            headers: &[],
            payload: b"",
        };
        let sig = sign(
            &request,
            &example_credentials(),
            "us-east-1",
            "service",
            example_time(),
        );

        assert_eq!(sig.amz_date, "20150830T123600Z");
        assert_eq!(
            sig.authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert!(sig.security_token.is_none());
    }

    #[test]
    fn test_canonical_request_layout() {
        let request = SigningRequest {
            method: "POST",
            host: "rekognition.ap-south-1.amazonaws.com",
            path: "/",
            query: "",
            headers: &[],
            payload: b"{}",
        };
        let headers = vec![
            ("content-type".to_string(), "application/x-amz-json-1.1".to_string()),
            ("host".to_string(), "rekognition.ap-south-1.amazonaws.com".to_string()),
        ];
        let (canonical, signed) = canonical_request(&request, &headers);

        assert_eq!(signed, "content-type;host");
        let lines: Vec<&str> = canonical.split('\n').collect();
        assert_eq!(lines[0], "POST");
        assert_eq!(lines[1], "/");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "content-type:application/x-amz-json-1.1");
        assert_eq!(lines[4], "host:rekognition.ap-south-1.amazonaws.com");
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "content-type;host");
        // sha256("{}")
        assert_eq!(
            lines[7],
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_extra_headers_are_signed_sorted_and_lowercased() {
        let request = SigningRequest {
            method: "POST",
            host: "rekognition.ap-south-1.amazonaws.com",
            path: "/",
            query: "",
            headers: &[
                ("X-Amz-Target", "RekognitionService.CompareFaces"),
                ("Content-Type", " application/x-amz-json-1.1 "),
            ],
            payload: b"{}",
        };
        let creds = example_credentials().with_session_token("session");
        let sig = sign(&request, &creds, "ap-south-1", "rekognition", example_time());

        assert!(sig.authorization.contains(
            "SignedHeaders=content-type;host;x-amz-date;x-amz-security-token;x-amz-target,"
        ));
        assert!(sig
            .authorization
            .contains("Credential=AKIDEXAMPLE/20150830/ap-south-1/rekognition/aws4_request"));
        assert_eq!(sig.security_token.as_deref(), Some("session"));
    }

    #[test]
    fn test_signature_depends_on_payload() {
        let make = |payload: &'static [u8]| {
            let request = SigningRequest {
                method: "POST",
                host: "example.amazon.com",
                path: "/",
                query: "",
                headers: &[],
                payload,
            };
            sign(&request, &example_credentials(), "us-east-1", "service", example_time())
        };
        assert_ne!(make(b"a").authorization, make(b"b").authorization);
    }
}
