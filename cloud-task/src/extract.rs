use serde_json::Value;

/// The services are inconsistent about where they place results (`result.X`
/// in some responses, `output.X` in others, sometimes a bare URL string and
/// sometimes an object wrapping one). Callers list the known locations in
/// priority order; the first structurally valid match is authoritative.
pub fn probe<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a Value> {
    for path in paths {
        let mut current = value;
        let mut matched = true;
        for key in *path {
            match current.get(key) {
                Some(next) => current = next,
                None => {
                    matched = false;
                    break;
                }
            }
        }
        if matched {
            return Some(current);
        }
    }
    None
}

/// First path that resolves to a non-empty string.
pub fn probe_string(value: &Value, paths: &[&[&str]]) -> Option<String> {
    for path in paths.iter().copied() {
        if let Some(s) = probe(value, &[path]).and_then(Value::as_str) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

/// First path that resolves to a usable download URL. Accepts either a bare
/// string or an object carrying a `url` field. The URL must be https; when
/// `required_ext` is given, the path component (query string stripped) must
/// end with that extension. The full URL is returned: servers need the
/// query parameters, only the validation ignores them.
pub fn probe_url(value: &Value, paths: &[&[&str]], required_ext: Option<&str>) -> Option<String> {
    for path in paths.iter().copied() {
        let Some(candidate) = probe(value, &[path]) else {
            continue;
        };
        let url = match candidate {
            Value::String(s) => s.as_str(),
            Value::Object(_) => match candidate.get("url").and_then(Value::as_str) {
                Some(s) => s,
                None => continue,
            },
            _ => continue,
        };
        if !url.starts_with("https://") {
            continue;
        }
        if let Some(ext) = required_ext {
            if !strip_query(url).to_ascii_lowercase().ends_with(ext) {
                continue;
            }
        }
        return Some(url.to_string());
    }
    None
}

/// Drops the query string. Presigned URLs carry long signatures that break
/// extension checks and occasionally the download itself.
pub fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_location_wins_over_output() {
        let payload = json!({
            "result": {"text": "from result"},
            "output": {"text": "from output"},
        });
        let text = probe_string(&payload, &[&["result", "text"], &["output", "text"]]);
        assert_eq!(text.as_deref(), Some("from result"));
    }

    #[test]
    fn falls_back_to_output_location() {
        let payload = json!({"output": {"text": "from output"}});
        let text = probe_string(&payload, &[&["result", "text"], &["output", "text"]]);
        assert_eq!(text.as_deref(), Some("from output"));
    }

    #[test]
    fn empty_string_is_not_a_match() {
        let payload = json!({
            "result": {"text": ""},
            "output": {"text": "fallback"},
        });
        let text = probe_string(&payload, &[&["result", "text"], &["output", "text"]]);
        assert_eq!(text.as_deref(), Some("fallback"));
    }

    #[test]
    fn url_from_object_shape() {
        let payload = json!({
            "result": {"pbr_model": {"url": "https://cdn.example.com/model.glb?sig=abc"}},
        });
        let url = probe_url(
            &payload,
            &[&["result", "pbr_model"], &["output", "pbr_model"]],
            None,
        );
        assert_eq!(
            url.as_deref(),
            Some("https://cdn.example.com/model.glb?sig=abc")
        );
    }

    #[test]
    fn url_from_bare_string_shape() {
        let payload = json!({
            "output": {"pbr_model": "https://cdn.example.com/model.glb"},
        });
        let url = probe_url(
            &payload,
            &[&["result", "pbr_model"], &["output", "pbr_model"]],
            None,
        );
        assert_eq!(url.as_deref(), Some("https://cdn.example.com/model.glb"));
    }

    #[test]
    fn extension_checked_with_query_stripped() {
        let payload = json!({
            "output": {"model": "https://cdn.example.com/model.STL?Expires=1&Signature=xyz"},
        });
        let url = probe_url(&payload, &[&["output", "model"]], Some(".stl"));
        assert_eq!(
            url.as_deref(),
            Some("https://cdn.example.com/model.STL?Expires=1&Signature=xyz")
        );
    }

    #[test]
    fn wrong_extension_falls_through_to_next_path() {
        let payload = json!({
            "output": {"model": "https://cdn.example.com/model.glb?sig=a"},
            "result": {"model": {"url": "https://cdn.example.com/model.stl?sig=b"}},
        });
        let url = probe_url(
            &payload,
            &[&["output", "model"], &["result", "model"]],
            Some(".stl"),
        );
        assert_eq!(
            url.as_deref(),
            Some("https://cdn.example.com/model.stl?sig=b")
        );
    }

    #[test]
    fn non_https_is_rejected() {
        let payload = json!({"output": {"model": "http://cdn.example.com/model.stl"}});
        assert_eq!(probe_url(&payload, &[&["output", "model"]], Some(".stl")), None);
    }

    #[test]
    fn strip_query_handles_plain_urls() {
        assert_eq!(
            strip_query("https://cdn.example.com/a.jpg"),
            "https://cdn.example.com/a.jpg"
        );
        assert_eq!(
            strip_query("https://cdn.example.com/a.jpg?x=1&y=2"),
            "https://cdn.example.com/a.jpg"
        );
    }
}
