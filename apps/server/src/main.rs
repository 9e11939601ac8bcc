#![warn(clippy::all, clippy::pedantic)]

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use probe::request::validation::validate_timeout;
use probe::{Executor, ExecutorOptions};
use tracing::info;

mod error;
mod routes;

use error::AppError;

/// Runtime environment first, then whatever `.env` held at build time
macro_rules! setting {
    ($name:literal) => {
        std::env::var($name).ok().or_else(|| option_env!($name).map(str::to_string))
    };
}

fn parse_setting<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| AppError::Env { name, reason: e.to_string() }),
        None => Ok(default),
    }
}

fn executor_options() -> Result<ExecutorOptions, AppError> {
    options_from(setting!("HTTPMON_LOCATION"), setting!("HTTPMON_TIMEOUT_MS"))
}

fn options_from(location: Option<String>, timeout: Option<String>) -> Result<ExecutorOptions, AppError> {
    let defaults = ExecutorOptions::default();
    let timeout_ms = parse_setting(
        "HTTPMON_TIMEOUT_MS",
        timeout,
        u64::try_from(defaults.timeout.as_millis()).unwrap_or(u64::MAX),
    )?;
    validate_timeout(timeout_ms)
        .map_err(|e| AppError::Env { name: "HTTPMON_TIMEOUT_MS", reason: e.to_string() })?;

    Ok(ExecutorOptions {
        location: location.unwrap_or_else(|| defaults.location.clone()),
        timeout: Duration::from_millis(timeout_ms),
        ..defaults
    })
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    logger::init();

    let ip: IpAddr = setting!("BIND").as_deref().unwrap_or("0.0.0.0").parse()?;
    let port = parse_setting("PORT", setting!("PORT"), 8080u16)?;

    let executor =
        Executor::system(executor_options()?).map_err(|e| AppError::Tls(e.to_string()))?;

    run_server(SocketAddr::new(ip, port), executor).await
}

async fn run_server(addr: SocketAddr, executor: Executor) -> Result<(), AppError> {
    info!(%addr, location = %executor.options().location, "Starting server");

    let executor = web::Data::new(executor);
    HttpServer::new(move || App::new().app_data(executor.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_setting_is_range_checked() {
        let options = options_from(Some("eu-west".into()), Some(" 2500 ".into())).unwrap();
        assert_eq!(options.location, "eu-west");
        assert_eq!(options.timeout, Duration::from_millis(2500));

        let defaults = options_from(None, None).unwrap();
        assert_eq!(defaults.timeout, ExecutorOptions::default().timeout);

        for raw in ["0", "50", "600000"] {
            let err = options_from(None, Some(raw.into())).unwrap_err();
            assert!(
                matches!(err, AppError::Env { name: "HTTPMON_TIMEOUT_MS", .. }),
                "{raw} accepted"
            );
        }
        assert!(options_from(None, Some("soon".into())).is_err());
    }
}
