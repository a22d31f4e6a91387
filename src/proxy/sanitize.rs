use http::header::{HeaderName, CONNECTION, TRANSFER_ENCODING};
use http::HeaderMap;

/// Strip hop-by-hop headers before a request or response crosses a proxy
/// boundary. `Proxy-Connection` is the non-standard but widely sent sibling
/// of `Connection` and is stripped alongside it.
pub fn remove_hop_headers(headers: &mut HeaderMap) {
    let hop_headers: &[HeaderName] = &[
        CONNECTION,
        HeaderName::from_static("keep-alive"),
        HeaderName::from_static("proxy-authenticate"),
        HeaderName::from_static("proxy-authorization"),
        HeaderName::from_static("proxy-connection"),
        HeaderName::from_static("te"),
        HeaderName::from_static("trailer"),
        TRANSFER_ENCODING,
        HeaderName::from_static("upgrade"),
    ];

    for h in hop_headers {
        headers.remove(h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn strips_all_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            HeaderName::from_static("proxy-connection"),
            HeaderValue::from_static("keep-alive"),
        );
        headers.insert(
            HeaderName::from_static("proxy-authorization"),
            HeaderValue::from_static("Basic abc"),
        );
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(
            HeaderName::from_static("trailer"),
            HeaderValue::from_static("x-checksum"),
        );
        headers.insert("x-custom", HeaderValue::from_static("keep-me"));

        remove_hop_headers(&mut headers);

        assert!(headers.get(CONNECTION).is_none());
        assert!(headers.get("proxy-connection").is_none());
        assert!(headers.get("proxy-authorization").is_none());
        assert!(headers.get(TRANSFER_ENCODING).is_none());
        assert!(headers.get("trailer").is_none());
        assert_eq!(headers.get("x-custom").unwrap(), "keep-me");
    }
}
