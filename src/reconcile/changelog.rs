//! Field-level change records for updated listings

use crate::model::{ChangeRecord, Listing, TrackedField};

/// Emits one record per field whose value differs between the two versions
///
/// The record is stamped with the fresh version's scrape time and category.
pub fn generate_changelog<'a, I>(pairs: I, fields: &[TrackedField]) -> Vec<ChangeRecord>
where
    I: IntoIterator<Item = (&'a Listing, &'a Listing)>,
{
    let mut records = Vec::new();

    for (previous, current) in pairs {
        for field in fields {
            let old_value = field.value_of(previous);
            let new_value = field.value_of(current);
            if old_value == new_value {
                continue;
            }

            records.push(ChangeRecord {
                url: current.url.clone(),
                field: *field,
                old_value,
                new_value,
                category_num: current.category_num,
                detected_at: current.datetime_scraped,
            });
        }
    }

    records
}
