// src/enrichment/mobile.rs - Shipment lookup by consignee mobile number
use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::dispatch::batch::{BatchDispatcher, BatchTask, DispatchReport};
use crate::enrichment::client::LookupService;
use crate::errors::ReconcileError;
use crate::matching::columns::{effective_column, MOBILE_HINT, UPLOAD_MOBILE_ALIASES};
use crate::matching::phone::lookup_search_value;
use crate::models::record::{mobile_value, scalar_to_string, value_or_empty, Record};

pub const NO_SHIPMENTS_FOUND: &str = "No shipments found";
pub const INVALID_STRUCTURE: &str = "API returned invalid structure";
const PARCEL_SEPARATOR: &str = " | ";

const SHIPMENT_FIELDS: [&str; 15] = [
    "status",
    "track_number",
    "service_code",
    "order_reference",
    "customer_id_reference",
    "invoice",
    "incoterm",
    "currency",
    "price",
    "cod_value",
    "cod_currency",
    "category",
    "label_format",
    "estimated_delivery_date",
    "scheduled_delivery_date",
];
const CONSIGNEE_FIELDS: [&str; 8] = [
    "name", "phone", "email", "city", "state", "country", "address1", "address2",
];
const SHIPPER_FIELDS: [&str; 5] = ["name", "phone", "city", "country", "address1"];
/// (output column, parcel field)
const PARCEL_FIELDS: [(&str, &str); 6] = [
    ("parcel_description", "description"),
    ("parcel_warehouse", "warehouse"),
    ("product_sku", "product_sku"),
    ("product_description", "product_description"),
    ("product_quantity", "product_quantity"),
    ("product_image_url", "product_image_url"),
];

/// One phone number queued for lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MobileLookupItem {
    pub mobile: Value,
    pub clean_mobile: String,
    /// Position among the rows that had a mobile number.
    pub row_index: usize,
}

impl MobileLookupItem {
    pub fn new(mobile: Value, row_index: usize) -> Self {
        let clean_mobile = lookup_search_value(&mobile);
        Self {
            mobile,
            clean_mobile,
            row_index,
        }
    }

    fn base_record(&self, found: bool, error: Option<&str>) -> Record {
        let mut record = Map::new();
        record.insert("mobile".to_string(), self.mobile.clone());
        record.insert("clean_mobile".to_string(), Value::from(self.clean_mobile.as_str()));
        record.insert("row_index".to_string(), Value::from(self.row_index));
        record.insert("found".to_string(), Value::Bool(found));
        record.insert(
            "error".to_string(),
            error.map(Value::from).unwrap_or(Value::Null),
        );
        record
    }

    /// The `found = false` row emitted when a lookup yields nothing usable.
    pub fn not_found(&self, error: &str) -> Record {
        self.base_record(false, Some(error))
    }

    /// One output row per shipment returned for this number.
    pub fn flatten_shipment(&self, shipment: &Value) -> Record {
        let mut record = self.base_record(true, None);

        for field in SHIPMENT_FIELDS {
            record.insert(field.to_string(), value_or_empty(shipment.get(field)));
        }
        let consignee = shipment.get("consignee_address");
        for field in CONSIGNEE_FIELDS {
            record.insert(
                format!("consignee_{}", field),
                value_or_empty(consignee.and_then(|a| a.get(field))),
            );
        }
        let shipper = shipment.get("shipper_address");
        for field in SHIPPER_FIELDS {
            record.insert(
                format!("shipper_{}", field),
                value_or_empty(shipper.and_then(|a| a.get(field))),
            );
        }

        let parcels: &[Value] = shipment
            .get("parcels")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        for (column, field) in PARCEL_FIELDS {
            let joined = parcels
                .iter()
                .map(|p| scalar_to_string(&value_or_empty(p.get(field))).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(PARCEL_SEPARATOR);
            record.insert(column.to_string(), Value::String(joined));
        }
        record
    }

    /// Map a shipment-list response to output rows.
    pub fn rows_from_response(&self, body: &Value) -> Vec<Record> {
        match body {
            Value::Null => vec![self.not_found(NO_SHIPMENTS_FOUND)],
            Value::Array(shipments) if shipments.is_empty() => vec![self.not_found(NO_SHIPMENTS_FOUND)],
            Value::Array(shipments) => shipments.iter().map(|s| self.flatten_shipment(s)).collect(),
            other => {
                warn!("Unexpected API response for {}: {}", self.clean_mobile, other);
                vec![self.not_found(INVALID_STRUCTURE)]
            }
        }
    }
}

/// Detect the mobile column and queue every row that has a number.
///
/// Errors when no column can be found or when no row has a mobile value.
pub fn prepare_mobile_items(
    records: &[Record],
    mobile_col: Option<&str>,
) -> Result<(String, Vec<MobileLookupItem>), ReconcileError> {
    if records.is_empty() {
        return Err(ReconcileError::configuration("File is empty"));
    }
    let column = effective_column(mobile_col, records.first(), &UPLOAD_MOBILE_ALIASES, MOBILE_HINT)
        .ok_or_else(|| {
            ReconcileError::configuration(
                "Could not find a mobile number column (e.g., mobile, phone, tel)",
            )
        })?;

    let items: Vec<MobileLookupItem> = records
        .iter()
        .filter_map(|r| mobile_value(r, &column).cloned())
        .enumerate()
        .map(|(row_index, mobile)| MobileLookupItem::new(mobile, row_index))
        .collect();

    if items.is_empty() {
        return Err(ReconcileError::configuration("No rows with valid mobile numbers found"));
    }
    info!(
        "Using mobile column '{}': {} of {} rows have a number",
        column,
        items.len(),
        records.len()
    );
    Ok((column, items))
}

#[derive(Clone)]
pub struct MobileStage {
    service: Arc<dyn LookupService>,
}

impl MobileStage {
    pub fn new(service: Arc<dyn LookupService>) -> Self {
        Self { service }
    }

    pub async fn process_item(&self, item: &MobileLookupItem) -> Vec<Record> {
        match self.service.lookup(&item.clean_mobile).await {
            Ok(body) => item.rows_from_response(&body),
            Err(e) => {
                let message = e.to_string();
                let message = if message.is_empty() { "API Error".to_string() } else { message };
                let err = ReconcileError::item(item.clean_mobile.as_str(), message.as_str());
                warn!("Error processing mobile lookup: {}", err);
                vec![item.not_found(&message)]
            }
        }
    }

    /// All numbers in the batch are looked up together; one number can
    /// expand into several shipment rows.
    pub async fn process_batch(&self, items: &[MobileLookupItem]) -> Vec<Record> {
        join_all(items.iter().map(|item| self.process_item(item)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    pub async fn run(&self, items: Vec<MobileLookupItem>, dispatcher: &BatchDispatcher) -> DispatchReport<Record> {
        let stage = self.clone();
        dispatcher
            .run(
                items,
                move |task: BatchTask<MobileLookupItem>| {
                    let stage = stage.clone();
                    async move { Ok::<_, anyhow::Error>(stage.process_batch(&task.items).await) }
                },
                |task: &BatchTask<MobileLookupItem>, err: &anyhow::Error| {
                    let message = format!("Batch starting at row {} failed: {:#}", task.offset + 1, err);
                    task.items.iter().map(|item| item.not_found(&message)).collect()
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::client::fake::FakeLookup;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn shipment() -> Value {
        json!({
            "status": "delivered",
            "track_number": "SL100",
            "price": 0,
            "cod_value": 120.5,
            "consignee_address": {"name": "Noura", "city": "Riyadh", "phone": "0551234567"},
            "shipper_address": {"name": "Shop"},
            "parcels": [
                {"description": "Shoes", "product_quantity": 1},
                {"description": "Bag", "product_sku": "B-2"}
            ]
        })
    }

    #[test]
    fn test_prepare_filters_blank_mobiles() {
        let rows = vec![
            record(json!({"Phone": "055 123 4567"})),
            record(json!({"Phone": "  "})),
            record(json!({"Phone": null})),
            record(json!({"Phone": 551234568})),
        ];
        let (column, items) = prepare_mobile_items(&rows, None).unwrap();
        assert_eq!(column, "Phone");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].clean_mobile, "966551234567");
        assert_eq!(items[1].row_index, 1);
        assert_eq!(items[1].clean_mobile, "966551234568");
    }

    #[test]
    fn test_prepare_rejects_unusable_input() {
        assert!(prepare_mobile_items(&[], None).unwrap_err().is_fatal());
        let rows = vec![record(json!({"name": "x"}))];
        assert!(prepare_mobile_items(&rows, None).is_err());
        let rows = vec![record(json!({"mobile": ""}))];
        assert!(prepare_mobile_items(&rows, None).is_err());
    }

    #[test]
    fn test_flatten_shipment() {
        let item = MobileLookupItem::new(json!("0551234567"), 4);
        let row = item.flatten_shipment(&shipment());
        assert_eq!(row["found"], true);
        assert_eq!(row["error"], Value::Null);
        assert_eq!(row["row_index"], 4);
        assert_eq!(row["track_number"], "SL100");
        assert_eq!(row["price"], "");
        assert_eq!(row["cod_value"], 120.5);
        assert_eq!(row["consignee_name"], "Noura");
        assert_eq!(row["consignee_email"], "");
        assert_eq!(row["shipper_phone"], "");
        assert_eq!(row["parcel_description"], "Shoes | Bag");
        assert_eq!(row["product_sku"], " | B-2");
        assert_eq!(row["product_quantity"], "1 | ");
    }

    #[test]
    fn test_rows_from_response_shapes() {
        let item = MobileLookupItem::new(json!("551234567"), 0);
        assert_eq!(item.rows_from_response(&json!([]))[0]["error"], NO_SHIPMENTS_FOUND);
        assert_eq!(item.rows_from_response(&Value::Null)[0]["found"], false);
        assert_eq!(
            item.rows_from_response(&json!({"data": []}))[0]["error"],
            INVALID_STRUCTURE
        );
        assert_eq!(item.rows_from_response(&json!([shipment(), shipment()])).len(), 2);
    }

    #[tokio::test]
    async fn test_stage_expands_and_marks_failures() {
        let fake = FakeLookup::default()
            .with_response("966551234567", json!([shipment(), shipment()]))
            .with_failure("966551234568", "Invalid token");
        let stage = MobileStage::new(Arc::new(fake));
        let items = vec![
            MobileLookupItem::new(json!("0551234567"), 0),
            MobileLookupItem::new(json!("0551234568"), 1),
            MobileLookupItem::new(json!("0551234569"), 2),
        ];
        let dispatcher = BatchDispatcher::new(3, 1).unwrap();
        let report = stage.run(items, &dispatcher).await;

        assert_eq!(report.results.len(), 4);
        assert_eq!(report.results[0]["found"], true);
        assert_eq!(report.results[1]["found"], true);
        assert_eq!(report.results[2]["error"], "Invalid token");
        assert_eq!(report.results[3]["error"], NO_SHIPMENTS_FOUND);
    }
}
