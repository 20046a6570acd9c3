use polars::prelude::DataFrame;
use tracing::info;

use crate::error::Result;
use crate::loader::SourceTables;
use crate::shaper::{build_time_dimension, project_fact, stringify_all, stringify_columns};
use crate::transform::{enrich_with_aggregates, join_orders, ORDER_DATE, SHIP_DATE, SIGNUP_DATE};

pub const CUSTOMER_DIMENSION: &str = "Customer_Dimension";
pub const PRODUCT_DIMENSION: &str = "Product_Dimension";
pub const ORDER_FACT: &str = "Order_Fact";
pub const TIME_DIMENSION: &str = "Time_Dimension";

#[derive(Debug, Clone, Copy)]
pub struct ShapeOptions {
    /// Render every time-dimension column, numbers included, as text. On by default.
    pub stringify_time_dimension: bool,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self {
            stringify_time_dimension: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StarSchema {
    pub customer_dimension: DataFrame,
    pub product_dimension: DataFrame,
    pub order_fact: DataFrame,
    pub time_dimension: DataFrame,
}

#[derive(Debug, Clone, Copy)]
pub struct OutputTable<'a> {
    pub name: &'static str,
    pub frame: &'a DataFrame,
}

impl StarSchema {
    /// Tables in delivery order.
    pub fn tables(&self) -> [OutputTable<'_>; 4] {
        [
            OutputTable {
                name: CUSTOMER_DIMENSION,
                frame: &self.customer_dimension,
            },
            OutputTable {
                name: PRODUCT_DIMENSION,
                frame: &self.product_dimension,
            },
            OutputTable {
                name: ORDER_FACT,
                frame: &self.order_fact,
            },
            OutputTable {
                name: TIME_DIMENSION,
                frame: &self.time_dimension,
            },
        ]
    }
}

/// Join, aggregate, project, and normalize the inputs into the four output tables.
pub fn build_star_schema(sources: &SourceTables, options: ShapeOptions) -> Result<StarSchema> {
    let joined = join_orders(&sources.orders, &sources.order_details)?;
    let enriched = enrich_with_aggregates(&joined)?;

    let mut order_fact = project_fact(&enriched)?;
    let mut time_dimension = build_time_dimension(&sources.orders)?;

    stringify_columns(&mut order_fact, "order fact", &[ORDER_DATE, SHIP_DATE])?;
    let mut customer_dimension = sources.customers.clone();
    stringify_columns(&mut customer_dimension, "customers", &[SIGNUP_DATE])?;
    if options.stringify_time_dimension {
        stringify_all(&mut time_dimension, "time dimension")?;
    }

    info!(
        fact_rows = order_fact.height(),
        dates = time_dimension.height(),
        customers = customer_dimension.height(),
        products = sources.products.height(),
        "built star schema"
    );

    Ok(StarSchema {
        customer_dimension,
        product_dimension: sources.products.clone(),
        order_fact,
        time_dimension,
    })
}
