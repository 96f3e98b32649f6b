//! New / updated / unchanged classification of scanned listings

use crate::model::{Listing, TrackedField};
use std::collections::HashMap;

/// A stored listing and the fresh version that differs from it
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedListing {
    pub previous: Listing,
    pub current: Listing,
}

/// Every candidate lands in exactly one of the three sets
#[derive(Debug, Default, PartialEq)]
pub struct Classification {
    pub new_listings: Vec<Listing>,
    pub updated: Vec<UpdatedListing>,
    pub unchanged: Vec<Listing>,
}

impl Classification {
    pub fn len(&self) -> usize {
        self.new_listings.len() + self.updated.len() + self.unchanged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether any of `fields` differs between the two versions
pub fn differs(previous: &Listing, current: &Listing, fields: &[TrackedField]) -> bool {
    fields
        .iter()
        .any(|field| field.value_of(previous) != field.value_of(current))
}

/// Classifies candidates against the latest stored version of each url
///
/// # Arguments
///
/// * `candidates` - Fresh for-sale listings
/// * `known` - Latest stored base version per url
/// * `fields` - The compared field set
pub fn classify(
    candidates: Vec<Listing>,
    known: &HashMap<String, Listing>,
    fields: &[TrackedField],
) -> Classification {
    let mut classification = Classification::default();

    for current in candidates {
        match known.get(&current.url) {
            None => classification.new_listings.push(current),
            Some(previous) if differs(previous, &current, fields) => {
                classification.updated.push(UpdatedListing {
                    previous: previous.clone(),
                    current,
                });
            }
            Some(_) => classification.unchanged.push(current),
        }
    }

    classification
}
