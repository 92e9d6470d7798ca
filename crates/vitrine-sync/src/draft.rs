//! Projection of a record onto remote entry fields.

use vitrine_catalog::{EntryDraft, EntryPatch, Metafield, RemoteCatalogEntry};
use vitrine_core::CatalogRecord;

/// Namespace of the descriptive watch attributes.
pub const NS_WATCH: &str = "watch";

/// Namespace of the inventory bookkeeping fields.
pub const NS_INVENTORY: &str = "inventory";

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Display title: designer, model and reference, falling back to the key.
#[must_use]
pub fn title(record: &CatalogRecord) -> String {
    let parts: Vec<&str> = [&record.designer, &record.model, &record.reference_number]
        .into_iter()
        .filter_map(present)
        .collect();
    if parts.is_empty() {
        record.business_key().to_string()
    } else {
        parts.join(" ")
    }
}

#[must_use]
pub fn description(record: &CatalogRecord) -> String {
    present(&record.description).unwrap_or_default().to_string()
}

#[must_use]
pub fn images(record: &CatalogRecord) -> Vec<String> {
    let mut images: Vec<String> = Vec::with_capacity(record.image_urls.len());
    for url in record.image_urls.iter().map(|u| u.trim()) {
        if !url.is_empty() && !images.iter().any(|i| i == url) {
            images.push(url.to_string());
        }
    }
    images
}

/// Metafields in a stable order.
#[must_use]
pub fn metafields(record: &CatalogRecord) -> Vec<Metafield> {
    let watch_fields = [
        ("designer", &record.designer),
        ("model", &record.model),
        ("material", &record.material),
        ("dial", &record.dial),
        ("diameter", &record.diameter),
        ("condition", &record.condition),
        ("year", &record.year),
        ("serial_number", &record.serial_number),
        ("reference_number", &record.reference_number),
        ("category", &record.category),
        ("style", &record.style),
    ];

    let mut fields: Vec<Metafield> = watch_fields
        .into_iter()
        .filter_map(|(key, value)| present(value).map(|v| Metafield::new(NS_WATCH, key, v)))
        .collect();

    fields.push(Metafield::new(NS_INVENTORY, "tag_number", record.business_key()));
    fields.push(Metafield::new(
        NS_INVENTORY,
        "status",
        record.status.trim().to_uppercase(),
    ));
    if let Some(price) = record.price {
        fields.push(Metafield::new(NS_INVENTORY, "price", price.normalize().to_string()));
    }
    fields
}

/// Draft for a new remote entry. The SKU is the business key.
#[must_use]
pub fn build_draft(record: &CatalogRecord) -> EntryDraft {
    EntryDraft {
        title: title(record),
        description: description(record),
        sku: record.business_key().to_string(),
        images: images(record),
        metafields: metafields(record),
    }
}

/// Patch carrying only the scalar fields that differ from `entry`.
#[must_use]
pub fn build_patch(record: &CatalogRecord, entry: &RemoteCatalogEntry) -> EntryPatch {
    let title = title(record);
    let description = description(record);
    let images = images(record);
    let metafields = metafields(record);

    let mut current_metafields = entry.metafields.clone();
    current_metafields.sort();
    let mut desired_metafields = metafields.clone();
    desired_metafields.sort();

    EntryPatch {
        title: (entry.title != title).then_some(title),
        description: (entry.description != description).then_some(description),
        images: (entry.images != images).then_some(images),
        metafields: (current_metafields != desired_metafields).then_some(metafields),
    }
}
