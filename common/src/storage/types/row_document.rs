use std::collections::BTreeMap;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};
use uuid::Uuid;

/// Columns the builder recognizes. Any subset may be present in an upload;
/// everything else in the CSV is ignored.
pub const RECOGNIZED_COLUMNS: [&str; 16] = [
    "SupplierName",
    "SupplierID",
    "ItemName",
    "ItemCategory",
    "POID",
    "PODate",
    "TotalAmount",
    "Unit",
    "UnitPrice",
    "OnTimeDelivery%",
    "QualityScore",
    "SupplierRiskLevel",
    "RiskDescription",
    "ContractID",
    "ContractEndDate",
    "ComplianceStatus",
];

stored_object!(RowDocument, "row_document", {
    text: String,
    embedding: Vec<f32>,
    supplier_id: String,
    supplier_name: String,
    item_category: String,
    risk_level: String,
    source: String,
    row_index: String
});

impl RowDocument {
    /// Builds the retrievable unit for one tabular record.
    ///
    /// The text rendering is fixed in order and shape: the text, not the
    /// metadata, is what gets embedded, so the same row must render
    /// byte-identically on every ingestion. Absent or empty fields render a
    /// documented default token instead of being omitted.
    pub fn from_row(row: &BTreeMap<String, String>, source: &str, row_index: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            text: render_row_text(row),
            embedding: Vec::new(),
            supplier_id: field(row, "SupplierID", "").to_owned(),
            supplier_name: field(row, "SupplierName", "").to_owned(),
            item_category: field(row, "ItemCategory", "").to_owned(),
            risk_level: field(row, "SupplierRiskLevel", "").to_owned(),
            source: source.to_owned(),
            row_index: row_index.to_string(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    /// Removes every document ingested from the named source file.
    pub async fn delete_by_source(
        source: &str,
        db_client: &SurrealDbClient,
    ) -> Result<(), AppError> {
        db_client
            .query(format!(
                "DELETE {} WHERE source = $source",
                Self::table_name()
            ))
            .bind(("source", source.to_owned()))
            .await?;

        Ok(())
    }

    pub async fn count_by_source(
        source: &str,
        db_client: &SurrealDbClient,
    ) -> Result<usize, AppError> {
        let mut response = db_client
            .query(format!(
                "SELECT count() AS total FROM {} WHERE source = $source GROUP ALL",
                Self::table_name()
            ))
            .bind(("source", source.to_owned()))
            .await?;

        let counts: Vec<serde_json::Value> = response.take(0)?;
        Ok(counts
            .first()
            .and_then(|row| row.get("total"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as usize)
    }
}

/// Renders the eight fixed semantic groups, one line each.
fn render_row_text(row: &BTreeMap<String, String>) -> String {
    format!(
        "Supplier: {supplier} (ID: {supplier_id})\n\
         Item: {item} (Category: {category})\n\
         PO: {po} | Date: {po_date}\n\
         Cost: {amount} {unit} | Price: {price}\n\
         Performance: Delivery {delivery}%, Quality {quality}\n\
         Risk: {risk} - {risk_description}\n\
         Contract: {contract} (Expires: {contract_end})\n\
         Compliance: {compliance}",
        supplier = field(row, "SupplierName", "N/A"),
        supplier_id = field(row, "SupplierID", "N/A"),
        item = field(row, "ItemName", "N/A"),
        category = field(row, "ItemCategory", "N/A"),
        po = field(row, "POID", "N/A"),
        po_date = field(row, "PODate", "N/A"),
        amount = field(row, "TotalAmount", "0"),
        unit = field(row, "Unit", ""),
        price = field(row, "UnitPrice", "0"),
        delivery = field(row, "OnTimeDelivery%", "N/A"),
        quality = field(row, "QualityScore", "N/A"),
        risk = field(row, "SupplierRiskLevel", "Low"),
        risk_description = field(row, "RiskDescription", "None"),
        contract = field(row, "ContractID", "N/A"),
        contract_end = field(row, "ContractEndDate", "N/A"),
        compliance = field(row, "ComplianceStatus", "Unknown"),
    )
}

// Empty cells count as absent so a sparse CSV still renders every group.
fn field<'a>(row: &'a BTreeMap<String, String>, column: &str, default: &'a str) -> &'a str {
    row.get(column)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
}
