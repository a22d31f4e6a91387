use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http::HeaderMap;

/// Checks the `Proxy-Authorization` header on an inbound CONNECT against the
/// configured `user:password` string. `None` means auth is not required and
/// every CONNECT is authorized.
pub fn check_connect_auth(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };

    let Some(header) = headers.get(http::header::PROXY_AUTHORIZATION) else {
        return false;
    };
    let Ok(header) = header.to_str() else {
        return false;
    };

    let mut parts = header.splitn(2, char::is_whitespace);
    let (Some(_scheme), Some(encoded)) = (parts.next(), parts.next()) else {
        return false;
    };

    match BASE64.decode(encoded.trim()) {
        Ok(decoded) => decoded == expected.as_bytes(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            http::header::PROXY_AUTHORIZATION,
            HeaderValue::from_str(value).unwrap(),
        );
        h
    }

    #[test]
    fn no_auth_configured_always_passes() {
        assert!(check_connect_auth(&HeaderMap::new(), None));
    }

    #[test]
    fn missing_header_rejected_when_auth_required() {
        assert!(!check_connect_auth(&HeaderMap::new(), Some("u:p")));
    }

    #[test]
    fn correct_basic_credentials_accepted() {
        // base64("u:p") == "dTpw"
        let headers = headers_with("Basic dTpw");
        assert!(check_connect_auth(&headers, Some("u:p")));
    }

    #[test]
    fn wrong_credentials_rejected() {
        // base64("wrong") == "d3Jvbmc="
        let headers = headers_with("Basic d3Jvbmc=");
        assert!(!check_connect_auth(&headers, Some("u:p")));
    }

    #[test]
    fn malformed_header_rejected() {
        let headers = headers_with("NotTwoTokens");
        assert!(!check_connect_auth(&headers, Some("u:p")));
    }

    #[test]
    fn invalid_base64_rejected() {
        let headers = headers_with("Basic ***not-base64***");
        assert!(!check_connect_auth(&headers, Some("u:p")));
    }
}
