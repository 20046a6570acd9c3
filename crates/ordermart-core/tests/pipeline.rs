mod support;

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use ordermart_bucket::{MemoryBucketStore, MemoryConnector};
use ordermart_core::{EtlConfig, EtlRunner, RunStatus, SinkKind, StorageEvent, XlsxDecoder};

const BUCKET: &str = "sales-drop";

fn seed(store: &MemoryBucketStore, skip: Option<&str>) {
    let inputs = [
        ("customers.xlsx", support::customers()),
        ("products.xlsx", support::products()),
        ("orders.xlsx", support::orders()),
        ("order_details.xlsx", support::order_details()),
    ];
    for (name, rows) in inputs {
        if Some(name) != skip {
            store.insert(name, support::workbook(&rows));
        }
    }
}

fn archive_runner(connector: &MemoryConnector) -> EtlRunner {
    let config = EtlConfig {
        sink: SinkKind::Archive,
        ..EtlConfig::default()
    };
    EtlRunner::new(Arc::new(connector.clone()), Arc::new(XlsxDecoder), config)
}

fn unpack(bytes: &[u8]) -> BTreeMap<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).expect("zip");
    let mut files = BTreeMap::new();
    for idx in 0..archive.len() {
        let mut entry = archive.by_index(idx).expect("entry");
        let mut body = String::new();
        entry.read_to_string(&mut body).expect("utf-8 csv");
        files.insert(entry.name().to_string(), body);
    }
    files
}

async fn run_archive(connector: &MemoryConnector) -> Vec<u8> {
    let report = archive_runner(connector)
        .run_event(&StorageEvent::new(BUCKET, "order_details.xlsx"))
        .await;
    assert_eq!(report.status, RunStatus::Success, "{:?}", report.error);
    connector
        .bucket(BUCKET)
        .object("etl_output.zip")
        .expect("archive uploaded")
        .to_vec()
}

#[tokio::test]
async fn archive_holds_the_four_star_tables() {
    let connector = MemoryConnector::new();
    seed(&connector.bucket(BUCKET), None);

    let files = unpack(&run_archive(&connector).await);
    assert_eq!(
        files.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![
            "Customer_Dimension.csv",
            "Order_Fact.csv",
            "Product_Dimension.csv",
            "Time_Dimension.csv"
        ]
    );

    assert_eq!(
        files["Customer_Dimension.csv"],
        "CustomerID,Name,SignupDate\n1,Ada,2023-01-05\n2,Grace,2023-02-11\n3,Linus,2023-03-01\n"
    );
    assert_eq!(
        files["Product_Dimension.csv"],
        "ProductID,Name,Price\n10,Widget,2.5\n11,Gadget,4.0\n"
    );
}

#[tokio::test]
async fn order_fact_carries_joined_rows_and_aggregates() {
    let connector = MemoryConnector::new();
    seed(&connector.bucket(BUCKET), None);

    let files = unpack(&run_archive(&connector).await);
    let fact = &files["Order_Fact.csv"];
    let lines: Vec<&str> = fact.lines().collect();

    assert_eq!(
        lines[0],
        "OrderID,CustomerID,ProductID,OrderDate,ShipDate,CustomerOrderCount,\
         CustomerMeanDiscount,ProductOrderCount,ProductTotalQuantity"
    );
    // Order 103 has no details and detail 999 has no order.
    assert_eq!(lines.len(), 5);

    let keys: Vec<(&str, &str)> = lines[1..]
        .iter()
        .map(|line| {
            let fields: Vec<&str> = line.split(',').collect();
            (fields[0], fields[2])
        })
        .collect();
    assert_eq!(keys, vec![("100", "10"), ("100", "11"), ("101", "10"), ("102", "11")]);

    assert_eq!(lines[3], "101,2,10,2024-03-08,2024-03-09,1,0.2,2,7");

    for line in [lines[1], lines[2], lines[4]] {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields[1], "1");
        assert_eq!(fields[5], "3");
        let mean: f64 = fields[6].parse().expect("mean discount");
        assert!((mean - 0.4 / 3.0).abs() < 1e-12);
    }
    let product_11: Vec<&str> = lines[2].split(',').collect();
    assert_eq!(&product_11[7..], &["2", "4"]);
}

#[tokio::test]
async fn time_dimension_lists_every_order_and_ship_date() {
    let connector = MemoryConnector::new();
    seed(&connector.bucket(BUCKET), None);

    let files = unpack(&run_archive(&connector).await);
    assert_eq!(
        files["Time_Dimension.csv"],
        "Date,TimeID,Year,Month,Day,WeekDay\n\
         2024-03-07,20240307,2024,3,7,Thursday\n\
         2024-03-08,20240308,2024,3,8,Friday\n\
         2024-03-09,20240309,2024,3,9,Saturday\n\
         2024-03-10,20240310,2024,3,10,Sunday\n\
         2024-03-11,20240311,2024,3,11,Monday\n"
    );
}

#[tokio::test]
async fn repeated_runs_upload_identical_archives() {
    let connector = MemoryConnector::new();
    seed(&connector.bucket(BUCKET), None);

    let first = run_archive(&connector).await;
    let second = run_archive(&connector).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn missing_products_aborts_without_output() {
    let connector = MemoryConnector::new();
    seed(&connector.bucket(BUCKET), Some("products.xlsx"));

    let report = archive_runner(&connector)
        .run_event(&StorageEvent::new(BUCKET, "orders.xlsx"))
        .await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(
        report.error.as_deref(),
        Some("File products.xlsx not found in bucket sales-drop.")
    );
    assert!(report.destinations.is_empty());
    assert_eq!(
        connector.bucket(BUCKET).keys(),
        vec!["customers.xlsx", "order_details.xlsx", "orders.xlsx"]
    );
}

#[tokio::test]
async fn corrupt_workbook_is_a_failed_run() {
    let connector = MemoryConnector::new();
    let store = connector.bucket(BUCKET);
    seed(&store, None);
    store.insert("orders.xlsx", &b"not a workbook"[..]);

    let report = archive_runner(&connector)
        .run_event(&StorageEvent::new(BUCKET, "orders.xlsx"))
        .await;

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report
        .error
        .as_deref()
        .is_some_and(|message| message.starts_with("failed to parse orders.xlsx")));
}
