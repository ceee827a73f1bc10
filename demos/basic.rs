use mini_request::{headers, CancelToken, Http, Params, RequestConfig};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = std::env::var("MINI_REQUEST_BASE_URL")?;

    let http: Http = Http::with_reqwest(
        RequestConfig::new()
            .with_base_url(base_url)
            .with_headers(headers([("accept", "application/json")]))
            .with_retry(2)
            .with_timeout_ms(5_000),
    );

    let created = http
        .post(
            "/users",
            Some(json!({"name": "Kit"}).into()),
            RequestConfig::new(),
        )
        .await?;
    println!("created: {} {:?}", created.status, created.body);

    let source = CancelToken::source();
    let fetched = http
        .get(
            "/users/{name}",
            None,
            RequestConfig::new()
                .with_params(Params::named([("name", "Kit")]))
                .with_cancel_token(source.token.clone()),
        )
        .await?;
    println!("fetched: {} {:?}", fetched.status, fetched.body);

    Ok(())
}
