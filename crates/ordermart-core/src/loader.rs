use ordermart_bucket::BucketStore;
use polars::prelude::DataFrame;
use tracing::info;

use crate::config::InputNames;
use crate::decode::SheetDecoder;
use crate::error::{EtlError, Result};

/// The four decoded spreadsheets a run works from.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub customers: DataFrame,
    pub products: DataFrame,
    pub orders: DataFrame,
    pub order_details: DataFrame,
}

/// Fetches and decodes every required input.
///
/// Existence of all objects is checked before anything is downloaded, so a missing
/// input aborts the run without any parsing.
pub async fn load_inputs(
    store: &dyn BucketStore,
    names: &InputNames,
    decoder: &dyn SheetDecoder,
) -> Result<SourceTables> {
    for object in names.all() {
        if !store.exists(object).await? {
            return Err(EtlError::MissingInput {
                object: object.to_string(),
                bucket: store.bucket().to_string(),
            });
        }
    }

    let customers = load_one(store, &names.customers, decoder).await?;
    let products = load_one(store, &names.products, decoder).await?;
    let orders = load_one(store, &names.orders, decoder).await?;
    let order_details = load_one(store, &names.order_details, decoder).await?;

    Ok(SourceTables {
        customers,
        products,
        orders,
        order_details,
    })
}

async fn load_one(
    store: &dyn BucketStore,
    object: &str,
    decoder: &dyn SheetDecoder,
) -> Result<DataFrame> {
    let bytes = store.get_object(object).await?;
    let frame = decoder.decode(object, &bytes)?;
    info!(
        bucket = store.bucket(),
        object,
        rows = frame.height(),
        columns = frame.width(),
        "loaded input"
    );
    Ok(frame)
}
