use bigdecimal::BigDecimal;
use std::path::Path;
use std::str::FromStr;
use stock_aggregator::config::{AppConfig, AGGREGATED_KEY, RUN_REPORT_KEY};
use stock_aggregator::models::{AggregatedProduct, StockRecord};
use stock_aggregator::{BlobStore, StockPipeline};
use tempfile::{tempdir, TempDir};

const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn sources(product: &AggregatedProduct) -> Vec<&str> {
    product.available_on.iter().map(|a| a.source.as_str()).collect()
}

/// 临时数据目录 + 指定的原始数据文件
fn workspace(feeds: &[&str]) -> (TempDir, AppConfig) {
    let dir = tempdir().unwrap();
    let mut config = AppConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();

    let store = BlobStore::new(dir.path());
    for source in &config.sources {
        let file = Path::new(&source.raw_key).file_name().unwrap().to_str().unwrap();
        if feeds.contains(&file) {
            let bytes = std::fs::read(Path::new(FIXTURES).join(file)).unwrap();
            store.write_bytes(&source.raw_key, &bytes).unwrap();
        }
    }
    (dir, config)
}

#[test]
fn csv_and_xml_records_join_on_identifier() {
    let (_dir, config) = workspace(&["action-stock.csv", "molos-stock.xml"]);
    let run = StockPipeline::from_config(&config).unwrap().run().unwrap();

    let widget = run.products.iter().find(|p| p.identifier == "123").unwrap();
    assert_eq!(widget.available_on.len(), 2);

    let action = &widget.available_on[0];
    assert_eq!(action.source, "action");
    assert_eq!(action.name, "Widget");
    assert_eq!(action.quantity, 5);
    assert_eq!(action.vat_rate, dec("0.23"));

    let molos = &widget.available_on[1];
    assert_eq!(molos.source, "molos");
    assert_eq!(molos.price_net, dec("9.00"));
    assert_eq!(molos.price_gross, dec("10.80"));
    assert_eq!(molos.vat_rate, dec("0.2"));

    let apilo = &run.report.sources[0];
    assert_eq!(apilo.source, "apilo");
    assert!(apilo.failure.is_some());
    assert_eq!(apilo.records, 0);
}

#[test]
fn full_run_writes_every_blob() {
    let (dir, config) = workspace(&["apilo-stock.json", "action-stock.csv", "molos-stock.xml"]);
    let run = StockPipeline::from_config(&config).unwrap().run().unwrap();

    let ids: Vec<_> = run.products.iter().map(|p| p.identifier.as_str()).collect();
    assert_eq!(ids, ["5901234123457", "4006381333931", "123"]);

    assert_eq!(sources(&run.products[0]), ["apilo", "action"]);
    assert_eq!(sources(&run.products[1]), ["apilo", "molos"]);
    assert_eq!(sources(&run.products[2]), ["action", "molos"]);
    assert_eq!(run.report.total_records, 6);
    assert_eq!(run.report.products, 3);

    let action = &run.report.sources[1];
    assert_eq!(action.report.malformed_rows, 1);
    assert_eq!(action.report.invalid_values, 1);
    assert_eq!(action.report.missing_identifiers, 1);
    assert_eq!(run.report.sources[2].as_of.as_deref(), Some("2024-11-05T08:30:00+01:00"));

    let store = BlobStore::new(dir.path());
    let stored: Vec<AggregatedProduct> = store.read_json(AGGREGATED_KEY).unwrap().unwrap();
    assert_eq!(stored, run.products);

    let apilo: Vec<StockRecord> = store.read_json("processed/apilo-processed.json").unwrap().unwrap();
    assert_eq!(apilo.len(), 2);
    assert!(apilo.iter().all(|r| !r.identifier.is_empty()));

    let report: serde_json::Value = store.read_json(RUN_REPORT_KEY).unwrap().unwrap();
    assert_eq!(report["products"], 3);
    assert_eq!(report["sources"][1]["report"]["malformed_rows"], 1);
}

#[test]
fn broken_source_does_not_block_the_others() {
    let (dir, config) = workspace(&["action-stock.csv"]);
    let store = BlobStore::new(dir.path());
    store
        .write_bytes("warehouses/molos/molos-stock.xml", b"<products><product><ean>1</ean></products>")
        .unwrap();
    store.write_bytes("warehouses/apilo/apilo-stock.json", b"{\"products\": 5}").unwrap();

    let run = StockPipeline::from_config(&config).unwrap().run().unwrap();

    assert_eq!(run.products.len(), 2);
    assert!(run.report.sources[0].failure.is_some());
    assert!(run.report.sources[1].failure.is_none());
    assert!(run.report.sources[2].failure.is_some());
}

#[test]
fn reruns_are_identical() {
    let (_dir, config) = workspace(&["apilo-stock.json", "action-stock.csv", "molos-stock.xml"]);
    let pipeline = StockPipeline::from_config(&config).unwrap();

    let first = pipeline.run().unwrap();
    let second = pipeline.run().unwrap();
    assert_eq!(first.products, second.products);
    assert_eq!(
        serde_json::to_string(&first.products).unwrap(),
        serde_json::to_string(&second.products).unwrap()
    );
}
