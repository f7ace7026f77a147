use std::{env, net::SocketAddr};

use crate::error::AppError;

pub const DEFAULT_COST_PRECISION: u32 = 2;
pub const DEFAULT_SHARE_TOKEN_BYTES: usize = 32;
const MIN_SHARE_TOKEN_BYTES: usize = 16;
const MAX_COST_PRECISION: u32 = 10;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    /// Decimal places used when rounding `cost_per_day` for display.
    pub cost_precision: u32,
    pub share_token_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://itinera.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let cost_precision = match env::var("COST_PRECISION") {
            Ok(raw) => parse_cost_precision(&raw)?,
            Err(_) => DEFAULT_COST_PRECISION,
        };

        let share_token_bytes = match env::var("SHARE_TOKEN_BYTES") {
            Ok(raw) => parse_share_token_bytes(&raw)?,
            Err(_) => DEFAULT_SHARE_TOKEN_BYTES,
        };

        Ok(Self {
            database_url,
            listen_addr,
            cost_precision,
            share_token_bytes,
        })
    }
}

fn parse_cost_precision(raw: &str) -> Result<u32, AppError> {
    let value: u32 = raw
        .trim()
        .parse()
        .map_err(|err| AppError::Config(format!("invalid COST_PRECISION: {err}")))?;
    if value > MAX_COST_PRECISION {
        return Err(AppError::Config(format!(
            "COST_PRECISION must be at most {MAX_COST_PRECISION}"
        )));
    }
    Ok(value)
}

fn parse_share_token_bytes(raw: &str) -> Result<usize, AppError> {
    let value: usize = raw
        .trim()
        .parse()
        .map_err(|err| AppError::Config(format!("invalid SHARE_TOKEN_BYTES: {err}")))?;
    // 128 bits of entropy is the floor for an unguessable link.
    if value < MIN_SHARE_TOKEN_BYTES {
        return Err(AppError::Config(format!(
            "SHARE_TOKEN_BYTES must be at least {MIN_SHARE_TOKEN_BYTES}"
        )));
    }
    Ok(value)
}
