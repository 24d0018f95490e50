//! `data:` URL parsing and formatting (RFC 2397).

use base64::Engine;

use crate::error::IoError;

const DATA_URL_PREFIX: &str = "data:";

pub fn is_data_url(url: &str) -> bool {
    url.starts_with(DATA_URL_PREFIX)
}

/// Decode a `data:` URL into its media type and payload bytes.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), IoError> {
    let rest = url
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or_else(|| IoError::InvalidDataUrl("URL does not start with 'data:'".to_string()))?;
    let (metadata, data) = rest
        .split_once(',')
        .ok_or_else(|| IoError::InvalidDataUrl("Missing comma in data URL".to_string()))?;

    let mut parts = metadata.split(';');
    let media_type = parts.next().unwrap_or("").trim();
    let is_base64 = parts.any(|p| p.trim().eq_ignore_ascii_case("base64"));
    let media_type = if media_type.is_empty() {
        "text/plain".to_string()
    } else {
        media_type.to_string()
    };

    let bytes = if is_base64 {
        let cleaned: Vec<u8> = data.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| IoError::InvalidDataUrl(format!("Invalid base64: {e}")))?
    } else {
        percent_decode(data)?
    };
    Ok((media_type, bytes))
}

/// Format bytes as a base64 `data:` URL.
pub fn encode_data_url(media_type: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("{DATA_URL_PREFIX}{media_type};base64,{payload}")
}

fn percent_decode(input: &str) -> Result<Vec<u8>, IoError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input
                .get(i + 1..i + 3)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| IoError::InvalidDataUrl("Bad percent-escape".to_string()))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_round_trip() {
        let url = encode_data_url("image/png", &[1, 2, 3, 250]);
        assert!(url.starts_with("data:image/png;base64,"));
        let (media_type, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(media_type, "image/png");
        assert_eq!(bytes, vec![1, 2, 3, 250]);
    }

    #[test]
    fn test_percent_encoded_payload() {
        let (media_type, bytes) = decode_data_url("data:,a%20b").unwrap();
        assert_eq!(media_type, "text/plain");
        assert_eq!(bytes, b"a b");
        assert!(decode_data_url("data:,%2").is_err());
    }

    #[test]
    fn test_rejects_non_data_urls() {
        assert!(!is_data_url("images/a.png"));
        assert!(matches!(
            decode_data_url("images/a.png"),
            Err(IoError::InvalidDataUrl(_))
        ));
        assert!(decode_data_url("data:image/png;base64").is_err());
    }
}
