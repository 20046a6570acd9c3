use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use ordermart_bucket::S3Config;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Object names of the four required spreadsheets inside the triggering bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputNames {
    pub customers: String,
    pub products: String,
    pub orders: String,
    pub order_details: String,
}

impl Default for InputNames {
    fn default() -> Self {
        Self {
            customers: "customers.xlsx".to_string(),
            products: "products.xlsx".to_string(),
            orders: "orders.xlsx".to_string(),
            order_details: "order_details.xlsx".to_string(),
        }
    }
}

impl InputNames {
    /// Load order: customers, products, orders, order details.
    pub fn all(&self) -> [&str; 4] {
        [
            self.customers.as_str(),
            self.products.as_str(),
            self.orders.as_str(),
            self.order_details.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    Warehouse,
    Archive,
}

impl FromStr for SinkKind {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "warehouse" => Ok(SinkKind::Warehouse),
            "archive" => Ok(SinkKind::Archive),
            _ => Err("expected `warehouse` or `archive`"),
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Warehouse => f.write_str("warehouse"),
            SinkKind::Archive => f.write_str("archive"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub inputs: InputNames,
    pub sink: SinkKind,
    pub dataset: String,
    pub archive_name: String,
    pub scratch_root: Option<PathBuf>,
    pub warehouse_stringify_time: bool,
    pub surface_failures: bool,
    pub database_url: Option<String>,
    pub storage: S3Config,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            inputs: InputNames::default(),
            sink: SinkKind::Warehouse,
            dataset: "data_mining".to_string(),
            archive_name: "etl_output.zip".to_string(),
            scratch_root: None,
            warehouse_stringify_time: true,
            surface_failures: false,
            database_url: None,
            storage: S3Config::default(),
        }
    }
}

impl EtlConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source. Unset and empty variables fall
    /// back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = EtlConfig::default();

        if let Some(value) = get("ORDERMART_INPUT_CUSTOMERS") {
            config.inputs.customers = value;
        }
        if let Some(value) = get("ORDERMART_INPUT_PRODUCTS") {
            config.inputs.products = value;
        }
        if let Some(value) = get("ORDERMART_INPUT_ORDERS") {
            config.inputs.orders = value;
        }
        if let Some(value) = get("ORDERMART_INPUT_ORDER_DETAILS") {
            config.inputs.order_details = value;
        }
        if let Some(value) = get("ORDERMART_SINK") {
            config.sink = value.parse().map_err(|reason| ConfigError::Invalid {
                name: "ORDERMART_SINK",
                value: value.clone(),
                reason,
            })?;
        }
        if let Some(value) = get("ORDERMART_DATASET") {
            config.dataset = value;
        }
        if let Some(value) = get("ORDERMART_ARCHIVE_NAME") {
            config.archive_name = value;
        }
        config.scratch_root = get("ORDERMART_SCRATCH_ROOT").map(PathBuf::from);
        config.warehouse_stringify_time = parse_flag(
            "ORDERMART_WAREHOUSE_STRINGIFY_TIME",
            get("ORDERMART_WAREHOUSE_STRINGIFY_TIME"),
            true,
        )?;
        config.surface_failures = parse_flag(
            "ORDERMART_SURFACE_FAILURES",
            get("ORDERMART_SURFACE_FAILURES"),
            false,
        )?;
        config.database_url = get("DATABASE_URL").or_else(|| get("ORDERMART_DATABASE_URL"));

        if let Some(value) = get("ORDERMART_S3_REGION") {
            config.storage.region = value;
        }
        config.storage.endpoint = get("ORDERMART_S3_ENDPOINT");
        config.storage.access_key_id = get("ORDERMART_S3_ACCESS_KEY_ID");
        config.storage.secret_access_key = get("ORDERMART_S3_SECRET_ACCESS_KEY");
        config.storage.force_path_style = parse_flag(
            "ORDERMART_S3_FORCE_PATH_STYLE",
            get("ORDERMART_S3_FORCE_PATH_STYLE"),
            false,
        )?;

        Ok(config)
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL (or ORDERMART_DATABASE_URL)"))
    }
}

fn parse_flag(
    name: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value,
            reason: "expected a boolean",
        }),
    }
}
