use reqwest::Method;
use serde_json::Value;

use crate::{
    Res,
    cli::Context,
    error::Error,
    spotify::{Feature, Requester},
    types::RequestOptions,
};

/// Sends one authenticated request and prints the JSON result.
pub async fn call(
    ctx: &Context,
    method: &str,
    path: &str,
    feature: Option<Feature>,
    query: Vec<(String, String)>,
    body: Option<String>,
) -> Res<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::Config(format!("invalid HTTP method `{method}`")))?;

    let mut options = RequestOptions::new();
    for (key, value) in query {
        options = options.query(key, value);
    }
    if let Some(body) = body {
        options = options.body(serde_json::from_str::<Value>(&body)?);
    }

    let value = ctx.client().execute(method, path, feature, options).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// clap value parser for `--query key=value`.
pub fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}
