//! Built-in capabilities for the demo binary and quick experiments

use crate::capability::{Capability, CapabilityRegistry, CapabilitySchema};
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Map, Value};

const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

fn number(args: &Map<String, Value>, name: &str) -> Result<f64> {
    args.get(name)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| anyhow!("'{}' must be a number", name))
}

/// Integer when both inputs are integers, decimal otherwise
fn arithmetic(args: &Map<String, Value>, int_op: fn(i64, i64) -> Option<i64>, float_op: fn(f64, f64) -> f64) -> Result<Value> {
    if let (Some(a), Some(b)) = (
        args.get("a").and_then(|v| v.as_i64()),
        args.get("b").and_then(|v| v.as_i64()),
    ) {
        return int_op(a, b).map(Value::from).ok_or_else(|| anyhow!("integer overflow"));
    }
    let result = float_op(number(args, "a")?, number(args, "b")?);
    Ok(json!(result))
}

pub fn add_capability() -> Capability {
    let schema = CapabilitySchema::new("add", "Add two numbers and return the sum.")
        .with_number_param("a", "first addend", true)
        .with_number_param("b", "second addend", true);

    Capability::from_fn(schema, |args| arithmetic(&args, i64::checked_add, |a, b| a + b))
}

pub fn multiply_capability() -> Capability {
    let schema = CapabilitySchema::new("multiply", "Multiply two numbers and return the product.")
        .with_number_param("a", "first factor", true)
        .with_number_param("b", "second factor", true);

    Capability::from_fn(schema, |args| arithmetic(&args, i64::checked_mul, |a, b| a * b))
}

pub fn echo_capability() -> Capability {
    let schema = CapabilitySchema::new("echo", "Return the given value unchanged.")
        .with_any_param("text", "value to return", true);

    Capability::from_fn(schema, |args| Ok(args.get("text").cloned().unwrap_or(Value::Null)))
}

/// Current temperature (celsius) from Open-Meteo
pub fn weather_capability() -> Capability {
    let schema = CapabilitySchema::new(
        "get_weather",
        "Get current temperature for provided coordinates in celsius.",
    )
    .with_number_param("latitude", "location latitude", true)
    .with_number_param("longitude", "location longitude", true);

    let client = reqwest::Client::new();
    Capability::new(schema, move |args| {
        let client = client.clone();
        async move {
            let latitude = number(&args, "latitude")?;
            let longitude = number(&args, "longitude")?;

            let data: Value = client
                .get(OPEN_METEO_URL)
                .query(&[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("current", "temperature_2m,wind_speed_10m".to_string()),
                ])
                .send()
                .await
                .context("weather request failed")?
                .error_for_status()?
                .json()
                .await?;

            data.pointer("/current/temperature_2m")
                .cloned()
                .ok_or_else(|| anyhow!("temperature missing from weather response"))
        }
    })
}

/// Registry with every built-in capability
pub fn default_registry() -> CapabilityRegistry {
    CapabilityRegistry::new()
        .with(add_capability())
        .with(multiply_capability())
        .with(echo_capability())
        .with(weather_capability())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_arithmetic() {
        let add = add_capability();
        assert_eq!(add.invoke(args(json!({"a": 2, "b": 3}))).await.unwrap(), json!(5));
        assert_eq!(add.invoke(args(json!({"a": 2.5, "b": 1}))).await.unwrap(), json!(3.5));
        assert!(add.invoke(args(json!({"a": i64::MAX, "b": 1}))).await.is_err());

        let multiply = multiply_capability();
        assert_eq!(multiply.invoke(args(json!({"a": 4, "b": 3}))).await.unwrap(), json!(12));
    }

    #[tokio::test]
    async fn test_echo() {
        let echo = echo_capability();
        assert_eq!(echo.invoke(args(json!({"text": [1, 2]}))).await.unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_default_registry() {
        let registry = default_registry();
        assert_eq!(registry.names(), vec!["add", "multiply", "echo", "get_weather"]);
    }
}
