//! DSON reference strings.
//!
//! Grammar (every component optional):
//!
//! ```text
//! [id://|name://][<node_path>:][<file_path>]#<asset_id>[?<property_path>]
//! ```
//!
//! Parsing is positional and strictly left to right. Components are
//! percent-decoded after the split, so an encoded `%23` never acts as a
//! separator.
//!
//! # Example
//!
//! ```
//! use dson_core::uri::Uri;
//!
//! let uri = Uri::parse("lThigh:/data/Figure%20One.dsf#lThigh?rotation/x").unwrap();
//! assert_eq!(uri.node_path, "lThigh");
//! assert_eq!(uri.file_path, "/data/Figure One.dsf");
//! assert_eq!(uri.asset_id, "lThigh");
//! assert_eq!(uri.property_path, "rotation/x");
//! ```

use std::fmt;

use crate::error::{DsonError, DsonResult};

/// Addressing scheme of a reference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scheme {
    #[default]
    Id,
    Name,
}

impl Scheme {
    fn prefix(self) -> &'static str {
        match self {
            Scheme::Id => "id://",
            Scheme::Name => "name://",
        }
    }
}

/// A parsed reference string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Uri {
    pub scheme: Scheme,
    pub node_path: String,
    pub file_path: String,
    pub asset_id: String,
    pub property_path: String,

    // Which optional markers were present, so `Display` can rebuild the input.
    explicit_scheme: bool,
    has_node_separator: bool,
    has_id_separator: bool,
    has_property_separator: bool,
}

impl Uri {
    /// Split a reference string into its components.
    ///
    /// The only parse failure is an unknown `scheme://` prefix; anything else
    /// that is structurally odd shows up later as a failed lookup.
    pub fn parse(s: &str) -> DsonResult<Uri> {
        let mut uri = Uri::default();
        let mut rest = s;

        if let Some(r) = rest.strip_prefix(Scheme::Id.prefix()) {
            uri.explicit_scheme = true;
            rest = r;
        } else if let Some(r) = rest.strip_prefix(Scheme::Name.prefix()) {
            uri.scheme = Scheme::Name;
            uri.explicit_scheme = true;
            rest = r;
        } else if s.contains("://") {
            return Err(DsonError::InvalidUri(s.to_string()));
        }

        if let Some((node, r)) = rest.split_once(':') {
            uri.node_path = node.to_string();
            uri.has_node_separator = true;
            rest = r;
        }

        match rest.split_once('#') {
            Some((file, r)) => {
                uri.file_path = file.to_string();
                uri.has_id_separator = true;
                rest = r;
            }
            None => {
                uri.file_path = rest.to_string();
                rest = "";
            }
        }

        match rest.split_once('?') {
            Some((id, property)) => {
                uri.asset_id = id.to_string();
                uri.property_path = property.to_string();
                uri.has_property_separator = true;
            }
            None => uri.asset_id = rest.to_string(),
        }

        uri.node_path = percent_decode(&uri.node_path);
        uri.file_path = percent_decode(&uri.file_path);
        uri.asset_id = percent_decode(&uri.asset_id);
        uri.property_path = percent_decode(&uri.property_path);
        Ok(uri)
    }

    /// True when the reference points into another document.
    pub fn is_external(&self) -> bool {
        !self.file_path.is_empty()
    }

    /// True when the reference carries a `#` id separator.
    pub fn has_asset_id(&self) -> bool {
        self.has_id_separator
    }

    /// Property path segments, e.g. `rotation/x` -> `["rotation", "x"]`.
    pub fn property_segments(&self) -> impl Iterator<Item = &str> {
        self.property_path.split('/').filter(|s| !s.is_empty())
    }
}

/// Rebuilds the reference with [`percent_encode`]d components; see there for
/// the canonical escape form.
impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.explicit_scheme {
            f.write_str(self.scheme.prefix())?;
        }
        if self.has_node_separator {
            write!(f, "{}:", percent_encode(&self.node_path))?;
        }
        f.write_str(&percent_encode(&self.file_path))?;
        if self.has_id_separator {
            write!(f, "#{}", percent_encode(&self.asset_id))?;
        }
        if self.has_property_separator {
            write!(f, "?{}", percent_encode(&self.property_path))?;
        }
        Ok(())
    }
}

/// Decode `%XX` escapes. Malformed escapes are kept verbatim and invalid
/// UTF-8 is replaced.
pub fn percent_decode(s: &str) -> String {
    if !s.contains('%') {
        return s.to_string();
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Encode everything outside the unreserved set (plus `/` and `@`, which
/// appear unescaped in DSON paths and node selections).
///
/// Escapes are written in uppercase hex, so a reference using lowercase
/// escapes, `%2F` or `%40` displays in this canonical form instead of
/// byte for byte.
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b"-._~/@".contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_reference() {
        let uri = Uri::parse("name://@selection:/data/Gen%20X/base.dsf#hip?rotation/x/value").unwrap();
        assert_eq!(uri.scheme, Scheme::Name);
        assert_eq!(uri.node_path, "@selection");
        assert_eq!(uri.file_path, "/data/Gen X/base.dsf");
        assert_eq!(uri.asset_id, "hip");
        assert_eq!(uri.property_path, "rotation/x/value");
        assert!(uri.is_external());
    }

    #[test]
    fn test_local_reference() {
        let uri = Uri::parse("#hip").unwrap();
        assert_eq!(uri.scheme, Scheme::Id);
        assert_eq!(uri.node_path, "");
        assert_eq!(uri.file_path, "");
        assert_eq!(uri.asset_id, "hip");
        assert!(!uri.is_external());
    }

    #[test]
    fn test_scheme_prefix_does_not_leak_into_node_path() {
        let uri = Uri::parse("id://thigh:#thigh?rotation/x").unwrap();
        assert_eq!(uri.node_path, "thigh");
        assert_eq!(uri.asset_id, "thigh");
    }

    #[test]
    fn test_missing_hash_yields_file_path_only() {
        let uri = Uri::parse("/data/figure.dsf").unwrap();
        assert_eq!(uri.file_path, "/data/figure.dsf");
        assert_eq!(uri.asset_id, "");
        assert_eq!(uri.property_path, "");
    }

    #[test]
    fn test_unknown_scheme_is_rejected() {
        let err = Uri::parse("http://example.com/x#y").unwrap_err();
        assert!(matches!(err, DsonError::InvalidUri(_)));
    }

    #[test]
    fn test_decoding_happens_after_split() {
        let uri = Uri::parse("/a%23b.dsf#id%3Fx").unwrap();
        assert_eq!(uri.file_path, "/a#b.dsf");
        assert_eq!(uri.asset_id, "id?x");
        assert_eq!(uri.property_path, "");
    }

    #[test]
    fn test_display_reconstructs_input() {
        let inputs = [
            "#hip",
            "id://#hip",
            "name://@selection:/data/Gen%20X/base.dsf#hip?rotation/x/value",
            "lThigh:/data/figure.dsf#lThigh?rotation/x",
            "thigh:#thigh?center_point/y",
            "/data/figure.dsf",
            "/data/figure.dsf#",
            ":#x?",
        ];
        for input in inputs {
            let uri = Uri::parse(input).unwrap();
            assert_eq!(uri.to_string(), input);
        }
    }

    #[test]
    fn test_display_uses_canonical_escapes() {
        let uri = Uri::parse("/data/caf%c3%a9.dsf#a%2Fb?x%40y").unwrap();
        assert_eq!(uri.file_path, "/data/café.dsf");
        assert_eq!(uri.asset_id, "a/b");
        assert_eq!(uri.to_string(), "/data/caf%C3%A9.dsf#a/b?x@y");

        let again = Uri::parse(&uri.to_string()).unwrap();
        assert_eq!(again, uri);
    }

    #[test]
    fn test_percent_decode_malformed_escape() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz%41"), "%zzA");
        assert_eq!(percent_decode("a%2"), "a%2");
    }

    #[test]
    fn test_property_segments() {
        let uri = Uri::parse("#m?rotation/x/value").unwrap();
        let segments: Vec<&str> = uri.property_segments().collect();
        assert_eq!(segments, vec!["rotation", "x", "value"]);
    }
}
