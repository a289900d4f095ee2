//! Absolute module id resolution.
//!
//! Requests are split on `!` and every loader-plugin segment is normalized on
//! its own, so `text!./tpl.html` from `app/view` becomes `dojo/text!app/tpl.html`
//! when `text` is aliased to `dojo/text`.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::Arc;

use crate::loader::has::{HasExpr, HAS_PLUGIN};
use crate::loader::ToAbsMid;

/// Separator between loader-plugin segments.
pub const PLUGIN_SEPARATOR: char = '!';

/// Characters kept verbatim in an encoded `absMid` query value. `!` and `&`
/// are always escaped since they terminate the value.
const ABS_MID_VALUE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Computes canonical absolute module ids through the loader.
#[derive(Clone)]
pub struct AbsMidResolver {
    loader: Arc<dyn ToAbsMid>,
}

impl std::fmt::Debug for AbsMidResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbsMidResolver").finish_non_exhaustive()
    }
}

impl AbsMidResolver {
    #[must_use]
    pub fn new(loader: Arc<dyn ToAbsMid>) -> Self {
        Self { loader }
    }

    /// Resolve `request` against the module id `issuer`.
    ///
    /// An empty request is returned unchanged. Segments that are still
    /// relative after normalization (no issuer) stay relative.
    #[must_use]
    pub fn resolve(&self, request: &str, issuer: Option<&str>) -> String {
        if request.is_empty() {
            return String::new();
        }

        let mut segments: Vec<String> = Vec::new();
        for segment in request.split(PLUGIN_SEPARATOR) {
            let after_has = segments.last().is_some_and(|prev| prev == HAS_PLUGIN);
            let resolved = if after_has && segment.contains('?') {
                HasExpr::parse(segment)
                    .resolve(&|feature: &str| self.loader.has_feature(feature), &|mid: &str| {
                        self.loader.to_abs_mid(mid, issuer)
                    })
                    .to_string()
            } else {
                self.loader.to_abs_mid(segment, issuer)
            };
            segments.push(resolved);
        }
        segments.join("!")
    }
}

/// An `absMid` query value that does not decode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed absMid value '{value}': {reason}")]
pub struct AbsMidQueryError {
    pub value: String,
    pub reason: &'static str,
}

/// Split a trailing `?absMid=` / `&absMid=` marker off `request`.
///
/// Returns the remaining request and the decoded id. The encoded value may
/// not contain `!` or `&`. A value with a bad escape or invalid UTF-8 is an
/// error.
pub fn split_abs_mid_query(request: &str) -> Result<Option<(String, String)>, AbsMidQueryError> {
    const KEY: &str = "absMid=";
    let marker = request.rmatch_indices(KEY).find_map(|(idx, _)| {
        let value = &request[idx + KEY.len()..];
        if value.contains(['!', '&']) {
            return None;
        }
        let head = &request[..idx];
        let prefix = head.strip_suffix('?').or_else(|| head.strip_suffix('&'))?;
        Some((prefix, value))
    });
    let Some((prefix, value)) = marker else {
        return Ok(None);
    };
    let abs_mid = decode_component(value)?;
    Ok(Some((prefix.to_string(), abs_mid)))
}

fn decode_component(value: &str) -> Result<String, AbsMidQueryError> {
    let error = |reason| AbsMidQueryError {
        value: value.to_string(),
        reason,
    };
    let bytes = value.as_bytes();
    for (idx, _) in value.match_indices('%') {
        let escape = bytes.get(idx + 1..idx + 3);
        if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
            return Err(error("'%' not followed by two hex digits"));
        }
    }
    percent_decode_str(value)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| error("not valid UTF-8"))
}

/// Append an `absMid` marker carrying `abs_mid` to `request`.
#[must_use]
pub fn with_abs_mid_query(request: &str, abs_mid: &str) -> String {
    let sep = if request.contains('?') { '&' } else { '?' };
    format!(
        "{request}{sep}absMid={}",
        utf8_percent_encode(abs_mid, ABS_MID_VALUE_SET)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{DojoLoader, LoaderConfig};
    use serde_json::json;

    fn resolver(config: serde_json::Value) -> AbsMidResolver {
        let loader = DojoLoader::new(LoaderConfig::from_json(config).unwrap()).unwrap();
        AbsMidResolver::new(Arc::new(loader))
    }

    #[test]
    fn test_relative_and_plugin_segments() {
        let r = resolver(json!({"aliases": [["^text$", "dojo/text"]]}));
        assert_eq!(r.resolve("./a", Some("pkg/x")), "pkg/a");
        assert_eq!(
            r.resolve("text!./tpl.html", Some("app/view")),
            "dojo/text!app/tpl.html"
        );
        assert_eq!(r.resolve("", Some("pkg/x")), "");
        assert_eq!(r.resolve("./entry", None), "./entry");
    }

    #[test]
    fn test_deterministic() {
        let r = resolver(json!({"packages": ["dojo"]}));
        let first = r.resolve("dojo!../x!./y", Some("app/a/b"));
        let second = r.resolve("dojo!../x!./y", Some("app/a/b"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_segment_count_preserved() {
        let r = resolver(json!({}));
        for request in ["a", "a!b", "./p!../q!r", "x!!y", "plugin!"] {
            let resolved = r.resolve(request, Some("pkg/m/n"));
            assert_eq!(
                resolved.matches('!').count(),
                request.matches('!').count(),
                "{request} -> {resolved}"
            );
        }
        assert_eq!(r.resolve("./p!../q!r", Some("pkg/m/n")), "pkg/m/p!pkg/q!r");
    }

    #[test]
    fn test_has_conditionals() {
        let r = resolver(json!({"has": {"dom": true, "host-node": false}}));
        assert_eq!(
            r.resolve("dojo/has!dom?./a:./b", Some("pkg/x")),
            "dojo/has!pkg/a"
        );
        assert_eq!(
            r.resolve("dojo/has!host-node?./a:./b", Some("pkg/x")),
            "dojo/has!pkg/b"
        );
        assert_eq!(
            r.resolve("dojo/has!later?./a:./b", Some("pkg/x")),
            "dojo/has!later?pkg/a:pkg/b"
        );
    }

    #[test]
    fn test_abs_mid_query_roundtrip() {
        assert_eq!(
            split_abs_mid_query("foo?absMid=pkg%2Ffoo"),
            Ok(Some(("foo".to_string(), "pkg/foo".to_string())))
        );
        assert_eq!(
            split_abs_mid_query("foo?x=1&absMid=a%21b"),
            Ok(Some(("foo?x=1".to_string(), "a!b".to_string())))
        );
        assert_eq!(split_abs_mid_query("foo?absMid=a!b"), Ok(None));
        assert_eq!(split_abs_mid_query("foo"), Ok(None));
        assert_eq!(
            split_abs_mid_query("a?absMid=xabsMid=y"),
            Ok(Some(("a".to_string(), "xabsMid=y".to_string())))
        );

        let request = with_abs_mid_query("./foo", "dojo/text!app/t.html");
        assert_eq!(request, "./foo?absMid=dojo%2Ftext%21app%2Ft.html");
        assert_eq!(
            split_abs_mid_query(&request).unwrap().map(|(_, mid)| mid),
            Some("dojo/text!app/t.html".to_string())
        );
    }

    #[test]
    fn test_malformed_abs_mid_query_rejected() {
        let err = split_abs_mid_query("foo?absMid=%FF").unwrap_err();
        assert_eq!(err.value, "%FF");
        assert_eq!(err.reason, "not valid UTF-8");

        for value in ["pkg%zz", "pkg%2", "pkg%"] {
            let err = split_abs_mid_query(&format!("foo?absMid={value}")).unwrap_err();
            assert_eq!(err.value, value);
            assert!(err.to_string().contains("hex digits"), "{err}");
        }

        assert_eq!(
            split_abs_mid_query("foo?absMid=caf%C3%A9"),
            Ok(Some(("foo".to_string(), "caf\u{e9}".to_string())))
        );
    }
}
