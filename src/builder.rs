//! Pure helpers: URL template substitution and configuration merging.

use serde_json::{Map, Value as JsonValue};

use crate::{Params, RequestConfig};

/// Cross-cutting field always copied by [`common_options`].
const COMMON_KEY: &str = "expire";

/// Substitutes `{key}` tokens in `url` and prefixes `base_url` for relative results.
///
/// Every occurrence of each key's token is replaced with the value's string
/// form. Results starting with `http://` or `https://` are returned as-is.
/// Values are not percent-encoded.
///
/// Example: `build_params("/{id}/status", Some(&Params::named([("id", 123)])), None)`
/// → `"/123/status"`
pub fn build_params(url: &str, params: Option<&Params>, base_url: Option<&str>) -> String {
    let mut url = url.to_owned();
    if !url.is_empty() {
        if let Some(params) = params {
            for (key, value) in params.entries() {
                let token = format!("{{{key}}}");
                if url.contains(&token) {
                    url = url.replace(&token, &value.to_string());
                }
            }
        }
    }

    if url.starts_with("https://") || url.starts_with("http://") {
        url
    } else {
        format!("{}{url}", base_url.unwrap_or_default())
    }
}

/// Lays `customize` over `defaults` without touching either.
///
/// Fields are whole-value overrides except `headers`, which merge per header
/// name, and `extensions`, which merge per key. `customize` wins collisions.
pub fn merge_config<T>(customize: &RequestConfig<T>, defaults: &RequestConfig<T>) -> RequestConfig<T> {
    let headers = match (&customize.headers, &defaults.headers) {
        (Some(custom), Some(default)) => {
            let mut merged = default.clone();
            merged.extend(custom.iter().map(|(name, value)| (name.clone(), value.clone())));
            Some(merged)
        }
        (custom, default) => custom.clone().or_else(|| default.clone()),
    };

    let mut extensions = defaults.extensions.clone();
    extensions.extend(
        customize
            .extensions
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );

    RequestConfig {
        base_url: customize.base_url.clone().or_else(|| defaults.base_url.clone()),
        headers,
        params: customize.params.clone().or_else(|| defaults.params.clone()),
        retry: customize.retry.clone().or_else(|| defaults.retry.clone()),
        timestamp: customize.timestamp.clone().or_else(|| defaults.timestamp.clone()),
        disable_online: customize.disable_online.or(defaults.disable_online),
        transform_send: customize
            .transform_send
            .clone()
            .or_else(|| defaults.transform_send.clone()),
        transform_response: customize
            .transform_response
            .clone()
            .or_else(|| defaults.transform_response.clone()),
        cancel_token: customize
            .cancel_token
            .clone()
            .or_else(|| defaults.cancel_token.clone()),
        timeout_ms: customize.timeout_ms.or(defaults.timeout_ms),
        response_type: customize.response_type.or(defaults.response_type),
        extensions,
    }
}

/// Copies `expire` and each of `extend_keys` from `options` into `data`.
///
/// Keys absent from `options` leave `data` untouched.
pub fn common_options<'a>(
    data: &'a mut Map<String, JsonValue>,
    options: &Map<String, JsonValue>,
    extend_keys: &[&str],
) -> &'a mut Map<String, JsonValue> {
    for key in std::iter::once(COMMON_KEY).chain(extend_keys.iter().copied()) {
        if let Some(value) = options.get(key) {
            data.insert(key.to_owned(), value.clone());
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use super::{build_params, common_options, merge_config};
    use crate::{headers, Params, RequestConfig, Response, Scalar};

    #[test]
    fn substitutes_named_tokens() {
        let params = Params::named([("id", 123)]);
        assert_eq!(build_params("/{id}/status", Some(&params), None), "/123/status");
    }

    #[test]
    fn replaces_every_occurrence_and_ignores_unused_keys() {
        let params = Params::named([("id", Scalar::from(7)), ("unused", Scalar::text("x"))]);
        assert_eq!(
            build_params("/{id}/children/{id}", Some(&params), None),
            "/7/children/7"
        );
    }

    #[test]
    fn substitution_is_case_sensitive() {
        let params = Params::named([("id", 1)]);
        assert_eq!(build_params("/{ID}/{id}", Some(&params), None), "/{ID}/1");
    }

    #[test]
    fn substitutes_positional_tokens() {
        let params = Params::positional([Scalar::text("users"), Scalar::from(9)]);
        assert_eq!(
            build_params("/{0}/{1}", Some(&params), Some("https://api")),
            "https://api/users/9"
        );
    }

    #[test]
    fn absolute_url_ignores_base() {
        let params = Params::named([("id", 5)]);
        assert_eq!(
            build_params("http://x/{id}", Some(&params), Some("https://base")),
            "http://x/5"
        );
    }

    #[test]
    fn relative_url_gets_base_or_nothing() {
        assert_eq!(build_params("/ping", None, Some("https://base")), "https://base/ping");
        assert_eq!(build_params("/ping", None, None), "/ping");
    }

    #[test]
    fn values_are_not_percent_encoded() {
        let params = Params::named([("q", "a b/c")]);
        assert_eq!(build_params("/s/{q}", Some(&params), None), "/s/a b/c");
    }

    #[test]
    fn merge_combines_headers_with_customize_winning() {
        let customize: RequestConfig<Response> =
            RequestConfig::new().with_headers(headers([("a", 1), ("shared", 3)]));
        let defaults: RequestConfig<Response> = RequestConfig::new()
            .with_headers(headers([("b", 2), ("shared", 4)]))
            .with_extension("expire", json!(10));

        let merged = merge_config(&customize, &defaults);

        assert_eq!(
            merged.headers,
            Some(headers([("a", 1), ("b", 2), ("shared", 3)]))
        );
        assert_eq!(merged.extensions.get("expire"), Some(&json!(10)));
    }

    #[test]
    fn merge_overrides_whole_values_and_keeps_defaults_intact() {
        let customize: RequestConfig<Response> = RequestConfig::new()
            .with_params(Params::named([("id", 1)]))
            .with_retry(1);
        let defaults: RequestConfig<Response> = RequestConfig::new()
            .with_base_url("https://base")
            .with_params(Params::named([("id", 2), ("other", 3)]))
            .with_retry(5)
            .with_headers(headers([("b", 2)]));

        let merged = merge_config(&customize, &defaults);

        assert_eq!(merged.base_url.as_deref(), Some("https://base"));
        assert_eq!(merged.params, Some(Params::named([("id", 1)])));
        assert!(matches!(merged.retry, Some(crate::RetryPolicy::Count(1))));
        assert_eq!(merged.headers, Some(headers([("b", 2)])));
        assert!(matches!(defaults.retry, Some(crate::RetryPolicy::Count(5))));
        assert_eq!(defaults.params, Some(Params::named([("id", 2), ("other", 3)])));
    }

    #[test]
    fn common_options_copies_expire_and_extend_keys() {
        let mut data = Map::new();
        data.insert("keep".to_owned(), json!("mine"));
        data.insert("scope".to_owned(), json!("mine"));

        let mut options = Map::new();
        options.insert("expire".to_owned(), json!(60));
        options.insert("keep".to_owned(), json!("theirs"));
        options.insert("ignored".to_owned(), json!(true));

        common_options(&mut data, &options, &["keep", "scope"]);

        assert_eq!(data.get("expire"), Some(&json!(60)));
        assert_eq!(data.get("keep"), Some(&json!("theirs")));
        assert_eq!(data.get("scope"), Some(&json!("mine")));
        assert!(data.get("ignored").is_none());
    }
}
