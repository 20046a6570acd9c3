use polars::prelude::*;
use tracing::debug;

use crate::error::{EtlError, Result};

pub const ORDER_ID: &str = "OrderID";
pub const CUSTOMER_ID: &str = "CustomerID";
pub const PRODUCT_ID: &str = "ProductID";
pub const ORDER_DATE: &str = "OrderDate";
pub const SHIP_DATE: &str = "ShipDate";
pub const QUANTITY: &str = "Quantity";
pub const DISCOUNT: &str = "Discount";
pub const SIGNUP_DATE: &str = "SignupDate";

pub const CUSTOMER_ORDER_COUNT: &str = "CustomerOrderCount";
pub const CUSTOMER_MEAN_DISCOUNT: &str = "CustomerMeanDiscount";
pub const PRODUCT_ORDER_COUNT: &str = "ProductOrderCount";
pub const PRODUCT_TOTAL_QUANTITY: &str = "ProductTotalQuantity";

const LEFT_ROW: &str = "__left_row";
const RIGHT_ROW: &str = "__right_row";

pub(crate) fn require_columns(
    df: &DataFrame,
    table: &'static str,
    columns: &[&str],
) -> Result<()> {
    for column in columns {
        if df.column(column).is_err() {
            return Err(EtlError::MissingColumn {
                table,
                column: (*column).to_string(),
            });
        }
    }
    Ok(())
}

/// Inner join of orders and order line items on `OrderID`.
///
/// Unmatched rows on either side are dropped, and a null `OrderID` never matches
/// anything, including another null. Output follows the order rows, then the detail
/// rows within each order.
pub fn join_orders(orders: &DataFrame, details: &DataFrame) -> Result<DataFrame> {
    require_columns(orders, "orders", &[ORDER_ID])?;
    require_columns(details, "order_details", &[ORDER_ID])?;

    let (left_key, right_key) = aligned_key_types(orders, details, ORDER_ID)?;
    let mut left = orders.clone().lazy();
    let mut right = details.clone().lazy();
    if let Some(dtype) = left_key {
        left = left.with_column(col(ORDER_ID).cast(dtype));
    }
    if let Some(dtype) = right_key {
        right = right.with_column(col(ORDER_ID).cast(dtype));
    }

    let joined = left
        .with_row_index(LEFT_ROW, None)
        .join(
            right.with_row_index(RIGHT_ROW, None),
            [col(ORDER_ID)],
            [col(ORDER_ID)],
            JoinArgs::new(JoinType::Inner),
        )
        .sort([LEFT_ROW, RIGHT_ROW], SortMultipleOptions::default())
        .collect()?
        .drop(LEFT_ROW)?
        .drop(RIGHT_ROW)?;

    debug!(
        orders = orders.height(),
        details = details.height(),
        joined = joined.height(),
        "joined orders with order details"
    );
    Ok(joined)
}

/// Casts needed on each side so the join keys share a type: numeric keys meet as
/// `Float64`, anything else as text.
fn aligned_key_types(
    left: &DataFrame,
    right: &DataFrame,
    key: &str,
) -> Result<(Option<DataType>, Option<DataType>)> {
    let left_type = left.column(key)?.dtype().clone();
    let right_type = right.column(key)?.dtype().clone();
    if left_type == right_type {
        return Ok((None, None));
    }

    let target = if left_type.is_primitive_numeric() && right_type.is_primitive_numeric() {
        DataType::Float64
    } else {
        DataType::String
    };
    let cast_if_needed = |dtype: &DataType| (dtype != &target).then(|| target.clone());
    Ok((cast_if_needed(&left_type), cast_if_needed(&right_type)))
}

/// Adds per-customer and per-product aggregates to every joined row.
///
/// Rows keep their position. A row whose key has no aggregate (a null key) receives
/// nulls.
pub fn enrich_with_aggregates(joined: &DataFrame) -> Result<DataFrame> {
    require_columns(
        joined,
        "joined orders",
        &[ORDER_ID, CUSTOMER_ID, PRODUCT_ID, QUANTITY, DISCOUNT],
    )?;

    let base = joined.clone().lazy();

    let customer_agg = base
        .clone()
        .filter(col(CUSTOMER_ID).is_not_null())
        .group_by([col(CUSTOMER_ID)])
        .agg([
            col(ORDER_ID)
                .count()
                .cast(DataType::Int64)
                .alias(CUSTOMER_ORDER_COUNT),
            col(DISCOUNT).mean().alias(CUSTOMER_MEAN_DISCOUNT),
        ]);

    let product_agg = base
        .clone()
        .filter(col(PRODUCT_ID).is_not_null())
        .group_by([col(PRODUCT_ID)])
        .agg([
            col(ORDER_ID)
                .count()
                .cast(DataType::Int64)
                .alias(PRODUCT_ORDER_COUNT),
            col(QUANTITY).sum().alias(PRODUCT_TOTAL_QUANTITY),
        ]);

    let enriched = base
        .with_row_index(LEFT_ROW, None)
        .join(
            customer_agg,
            [col(CUSTOMER_ID)],
            [col(CUSTOMER_ID)],
            JoinArgs::new(JoinType::Left),
        )
        .join(
            product_agg,
            [col(PRODUCT_ID)],
            [col(PRODUCT_ID)],
            JoinArgs::new(JoinType::Left),
        )
        .sort([LEFT_ROW], SortMultipleOptions::default())
        .collect()?
        .drop(LEFT_ROW)?;

    Ok(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> DataFrame {
        df![
            "OrderID" => [1i64, 2, 3, 4],
            "CustomerID" => [10i64, 10, 20, 30],
        ]
        .expect("orders")
    }

    fn details() -> DataFrame {
        df![
            "OrderID" => [2i64, 1, 2, 5],
            "ProductID" => [100i64, 100, 200, 300],
            "Quantity" => [1i64, 2, 3, 4],
            "Discount" => [0.0f64, 0.1, 0.2, 0.3],
        ]
        .expect("details")
    }

    #[test]
    fn inner_join_drops_unmatched_rows_and_keeps_order() {
        let joined = join_orders(&orders(), &details()).expect("join");

        let ids: Vec<Option<i64>> = joined.column("OrderID").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(2)]);
        let products: Vec<Option<i64>> = joined
            .column("ProductID")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(products, vec![Some(100), Some(100), Some(200)]);
        assert!(joined.column(LEFT_ROW).is_err());
        assert!(joined.column(RIGHT_ROW).is_err());
    }

    #[test]
    fn join_aligns_integer_and_float_keys() {
        let details = df![
            "OrderID" => [Some(1.0f64), None],
            "ProductID" => [100i64, 200],
        ]
        .expect("details");

        let joined = join_orders(&orders(), &details).expect("join");
        assert_eq!(joined.height(), 1);
        assert_eq!(joined.column("OrderID").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn join_falls_back_to_text_keys() {
        let details = df![
            "OrderID" => ["2", "1", "A-7"],
            "ProductID" => [100i64, 200, 300],
        ]
        .expect("details");

        let joined = join_orders(&orders(), &details).expect("join");
        assert_eq!(joined.column("OrderID").unwrap().dtype(), &DataType::String);
        let ids: Vec<Option<&str>> = joined.column("OrderID").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(ids, vec![Some("1"), Some("2")]);
        let products = joined.column("ProductID").unwrap().i64().unwrap();
        assert_eq!(products.get(0), Some(200));
    }

    #[test]
    fn null_order_ids_never_pair() {
        let orders = df![
            "OrderID" => [Some(1i64), None],
            "CustomerID" => [10i64, 20],
        ]
        .expect("orders");
        let details = df![
            "OrderID" => [Some(1i64), None],
            "ProductID" => [100i64, 200],
        ]
        .expect("details");

        let joined = join_orders(&orders, &details).expect("join");
        assert_eq!(joined.height(), 1);
        let ids = joined.column("OrderID").unwrap().i64().unwrap();
        assert_eq!(ids.get(0), Some(1));
    }

    #[test]
    fn missing_key_column_is_reported() {
        let details = df!["ProductID" => [1i64]].expect("details");
        let err = join_orders(&orders(), &details).unwrap_err();
        assert!(matches!(
            err,
            EtlError::MissingColumn { table: "order_details", ref column } if column == "OrderID"
        ));
    }

    #[test]
    fn aggregates_are_attached_to_every_row() {
        let joined = join_orders(&orders(), &details()).expect("join");
        let enriched = enrich_with_aggregates(&joined).expect("aggregate");

        assert_eq!(enriched.height(), 3);
        let counts = enriched.column(CUSTOMER_ORDER_COUNT).unwrap().i64().unwrap();
        assert_eq!(counts.get(0), Some(3));
        let means = enriched.column(CUSTOMER_MEAN_DISCOUNT).unwrap().f64().unwrap();
        let expected = (0.1 + 0.0 + 0.2) / 3.0;
        assert!((means.get(0).unwrap() - expected).abs() < 1e-12);

        let product_counts = enriched.column(PRODUCT_ORDER_COUNT).unwrap().i64().unwrap();
        let totals = enriched.column(PRODUCT_TOTAL_QUANTITY).unwrap().i64().unwrap();
        // Rows are (1,100), (2,100), (2,200).
        assert_eq!(product_counts.get(0), Some(2));
        assert_eq!(totals.get(0), Some(3));
        assert_eq!(product_counts.get(2), Some(1));
        assert_eq!(totals.get(2), Some(3));
    }

    #[test]
    fn null_group_keys_receive_null_aggregates() {
        let joined = df![
            "OrderID" => [1i64, 2],
            "CustomerID" => [Some(10i64), None],
            "ProductID" => [100i64, 100],
            "Quantity" => [1i64, 1],
            "Discount" => [0.5f64, 0.25],
        ]
        .expect("joined");

        let enriched = enrich_with_aggregates(&joined).expect("aggregate");
        let counts = enriched.column(CUSTOMER_ORDER_COUNT).unwrap().i64().unwrap();
        assert_eq!(counts.get(0), Some(1));
        assert_eq!(counts.get(1), None);
        let product_counts = enriched.column(PRODUCT_ORDER_COUNT).unwrap().i64().unwrap();
        assert_eq!(product_counts.get(1), Some(2));
    }
}
