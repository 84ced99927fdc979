//! Built-in Business Central catalog
//!
//! Every company is a root record; per-company entities hang below it and
//! general ledger entries fan out once more into their dimension lines and
//! the matching OData vendor ledger entries.
//!
//! ```text
//! companies
//! ├── company_information, items, vendors, ... (per company)
//! └── general_ledger_entries
//!     ├── gl_entries_dimensions
//!     └── vendor_ledger_entries (OData, once per document number)
//! ```

use crate::error::Result;
use crate::stream::{ApiRoot, Catalog, ExtractionContext, StreamDescriptor};

/// Replication key shared by every incremental Business Central entity
pub const LAST_MODIFIED: &str = "lastModifiedDateTime";

/// Build the full Business Central stream catalog, every stream selected
pub fn business_central_catalog() -> Result<Catalog> {
    Catalog::new(descriptors())
}

/// All Business Central stream descriptors in sync order
pub fn descriptors() -> Vec<StreamDescriptor> {
    vec![
        companies(),
        company_child("company_information", "companyInformation"),
        company_child("items", "items")
            .with_primary_keys(["id", LAST_MODIFIED])
            .with_replication_key(LAST_MODIFIED)
            .with_expand("itemCategory,picture"),
        company_child("sales_invoices", "salesInvoices")
            .with_primary_keys(["id", LAST_MODIFIED])
            .with_replication_key(LAST_MODIFIED)
            .with_expand("salesInvoiceLines"),
        company_child("purchase_invoices", "purchaseInvoices")
            .with_primary_keys(["id", LAST_MODIFIED])
            .with_replication_key(LAST_MODIFIED)
            .with_expand(
                "purchaseInvoiceLines, dimensionSetLines, purchaseInvoiceLines($expand=dimensionSetLines)",
            ),
        company_child("vendors", "vendors")
            .with_primary_keys(["id", LAST_MODIFIED])
            .with_replication_key(LAST_MODIFIED)
            .with_expand("defaultDimensions"),
        company_child("vendor_purchases", "vendorPurchases").with_primary_keys(["vendorId"]),
        company_child("vendor_payment_journals", "vendorPaymentJournals")
            .with_replication_key(LAST_MODIFIED),
        company_child("accounts", "accounts"),
        company_child("locations", "locations"),
        company_child("sales_orders", "salesOrders")
            .with_primary_keys(["id", LAST_MODIFIED])
            .with_replication_key(LAST_MODIFIED)
            .with_expand("salesOrderLines"),
        general_ledger_entries(),
        StreamDescriptor::new(
            "gl_entries_dimensions",
            "/companies({company_id})/generalLedgerEntries({gl_entry_id})/dimensionSetLines",
        )
        .with_parent("general_ledger_entries"),
        vendor_ledger_entries(),
        company_child("dimensions", "dimensions"),
        company_child("dimension_values", "dimensionValues").with_root(ApiRoot::ReportsFinance),
        company_child("customers", "customers")
            .with_primary_keys(["id", LAST_MODIFIED])
            .with_replication_key(LAST_MODIFIED),
        company_child("currencies", "currencies").with_replication_key(LAST_MODIFIED),
        company_child("payment_terms", "paymentTerms").with_replication_key(LAST_MODIFIED),
    ]
}

fn companies() -> StreamDescriptor {
    StreamDescriptor::new("companies", "/companies")
        .with_access_probe("/companies({company_id})/companyInformation")
        .with_child_context(|record, _| {
            ExtractionContext::new()
                .with_field("company_id", record, "id")?
                .with_field("company_name", record, "name")
        })
}

/// A per-company entity under `/companies({company_id})/<segment>`
///
/// Bookmarks are keyed by company id alone so a renamed company keeps them.
fn company_child(name: &str, segment: &str) -> StreamDescriptor {
    StreamDescriptor::new(name, format!("/companies({{company_id}})/{segment}"))
        .with_parent("companies")
        .with_partition_fields(["company_id"])
}

fn general_ledger_entries() -> StreamDescriptor {
    company_child("general_ledger_entries", "generalLedgerEntries")
        .with_replication_key(LAST_MODIFIED)
        .with_expand("dimensionSetLines")
        .with_child_context(|record, context| {
            context
                .retain(&["company_id", "company_name"])
                .with_field("gl_entry_id", record, "id")?
                .with_field("gl_doc_no", record, "documentNumber")
        })
}

/// Requires the tenant to publish page 29 as the `VendorLedgerEntries` web service
fn vendor_ledger_entries() -> StreamDescriptor {
    StreamDescriptor::new(
        "vendor_ledger_entries",
        "/Company('{company_name}')/VendorLedgerEntries",
    )
    .with_parent("general_ledger_entries")
    .with_root(ApiRoot::OData)
    .with_primary_keys(["Document_No", "company_id"])
    .with_filter("Document_No eq '{gl_doc_no}'")
    .with_dedup_key("gl_doc_no")
    .with_partition_fields(["company_id"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JsonObject, SyncMode};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: serde_json::Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_catalog_shape() {
        let catalog = business_central_catalog().unwrap();
        assert_eq!(catalog.len(), 19);

        let roots: Vec<_> = catalog.roots().map(|s| s.name.as_str()).collect();
        assert_eq!(roots, vec!["companies"]);

        assert_eq!(catalog.children("companies").count(), 16);
        let gl_children: Vec<_> = catalog
            .children("general_ledger_entries")
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(gl_children, vec!["gl_entries_dimensions", "vendor_ledger_entries"]);
    }

    #[test]
    fn test_sync_modes() {
        let catalog = business_central_catalog().unwrap();
        let incremental: Vec<_> = catalog
            .streams()
            .iter()
            .filter(|s| s.sync_mode() == SyncMode::Incremental)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(
            incremental,
            vec![
                "items",
                "sales_invoices",
                "purchase_invoices",
                "vendors",
                "vendor_payment_journals",
                "sales_orders",
                "general_ledger_entries",
                "customers",
                "currencies",
                "payment_terms",
            ]
        );
    }

    #[test]
    fn test_company_context() {
        let catalog = business_central_catalog().unwrap();
        let companies = catalog.get("companies").unwrap();

        let ctx = companies
            .child_context(&record(json!({"id": "C1", "name": "CRONUS"})), &ExtractionContext::new())
            .unwrap();
        assert_eq!(ctx.key(), "company_id=C1|company_name=CRONUS");

        assert!(companies
            .child_context(&record(json!({"name": "CRONUS"})), &ExtractionContext::new())
            .is_none());
    }

    #[test]
    fn test_company_streams_partition_by_id() {
        let catalog = business_central_catalog().unwrap();
        let before = ExtractionContext::new()
            .with("company_id", "C1")
            .with("company_name", "CRONUS");
        let renamed = ExtractionContext::new()
            .with("company_id", "C1")
            .with("company_name", "CRONUS International");

        for stream in catalog.streams().iter().filter(|s| s.sync_mode() == SyncMode::Incremental) {
            let partition = stream.partition_of(&before);
            assert_eq!(partition.key(), "company_id=C1", "stream {}", stream.name);
            assert_eq!(partition, stream.partition_of(&renamed));
        }
    }

    #[test]
    fn test_gl_entry_context() {
        let catalog = business_central_catalog().unwrap();
        let gl = catalog.get("general_ledger_entries").unwrap();
        let company = ExtractionContext::new()
            .with("company_id", "C1")
            .with("company_name", "CRONUS");

        let ctx = gl
            .child_context(
                &record(json!({"id": "E1", "documentNumber": "INV-1001", "amount": 5})),
                &company,
            )
            .unwrap();

        assert_eq!(ctx.get_string("gl_entry_id").as_deref(), Some("E1"));
        assert_eq!(ctx.get_string("gl_doc_no").as_deref(), Some("INV-1001"));
        assert_eq!(ctx.get_string("company_name").as_deref(), Some("CRONUS"));
        assert_eq!(ctx.len(), 4);
    }

    #[test]
    fn test_vendor_ledger_entries_descriptor() {
        let catalog = business_central_catalog().unwrap();
        let vle = catalog.get("vendor_ledger_entries").unwrap();

        assert_eq!(vle.root, ApiRoot::OData);
        assert_eq!(vle.dedup_key.as_deref(), Some("gl_doc_no"));
        assert_eq!(vle.primary_keys, vec!["Document_No", "company_id"]);
        assert_eq!(vle.sync_mode(), SyncMode::FullRefresh);

        let ctx = ExtractionContext::new()
            .with("company_id", "C1")
            .with("company_name", "CRONUS")
            .with("gl_doc_no", "INV-1");
        assert_eq!(vle.partition_of(&ctx).key(), "company_id=C1");
    }

    #[test]
    fn test_roots_and_paths() {
        let catalog = business_central_catalog().unwrap();
        assert_eq!(
            catalog.get("dimension_values").unwrap().root,
            ApiRoot::ReportsFinance
        );
        assert_eq!(
            catalog.get("payment_terms").unwrap().path,
            "/companies({company_id})/paymentTerms"
        );
        assert_eq!(
            catalog.get("companies").unwrap().access_probe.as_deref(),
            Some("/companies({company_id})/companyInformation")
        );
    }
}
