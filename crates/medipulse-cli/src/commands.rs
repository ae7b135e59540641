//! Subcommand handlers.

use anyhow::{anyhow, Context};
use medipulse_auth::{ApiClient, ApiRequest, ApiResponse, Method};
use medipulse_config_and_utils::Config;
use serde_json::{json, Value};
use tracing::info;

pub async fn login(client: &ApiClient, email: &str, password: &str) -> anyhow::Result<()> {
    client.login(email, password).await?;
    info!("Login command completed");
    println!("Logged in as {}", email);
    Ok(())
}

pub async fn register(
    client: &ApiClient,
    name: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let session = client
        .register(&json!({ "name": name, "email": email, "password": password }))
        .await?;

    if session.access_token.is_some() {
        println!("Registered and logged in as {}", email);
    } else {
        println!("Registered {}. Run `medipulse login` to sign in.", email);
    }
    Ok(())
}

pub async fn logout(client: &ApiClient) -> anyhow::Result<()> {
    client.logout().await;
    println!("Logged out");
    Ok(())
}

pub fn status(client: &ApiClient, config: &Config) -> anyhow::Result<()> {
    let mut report = serde_json::to_value(client.snapshot())?;
    if let Value::Object(map) = &mut report {
        map.insert("apiUrl".to_string(), Value::String(config.api_url.clone()));
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn request(
    client: &ApiClient,
    method: &str,
    path: &str,
    data: Option<&str>,
    query: &[String],
) -> anyhow::Result<()> {
    let request = build_request(method, path, data, query)?;
    let response = client.execute(request).await?;
    print_response(&response)
}

fn build_request(
    method: &str,
    path: &str,
    data: Option<&str>,
    query: &[String],
) -> anyhow::Result<ApiRequest> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow!("invalid HTTP method: {}", method))?;

    let mut request = ApiRequest::new(method, path);
    if let Some(data) = data {
        let body: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
        request = request.body(body);
    }
    for pair in query {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("query parameter must be key=value, got {}", pair))?;
        request = request.query(key, value);
    }
    Ok(request)
}

fn print_response(response: &ApiResponse) -> anyhow::Result<()> {
    match response.json_value() {
        Ok(Value::Null) => {}
        Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
        Err(_) => println!("{}", response.text()),
    }
    Ok(())
}
