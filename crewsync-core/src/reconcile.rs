//! Contact field reconciliation ahead of a merge
//!
//! The merge coordinator only moves references. Before calling it, the caller
//! folds the duplicate's contact details into the surviving record so nothing
//! submitted under the duplicate is lost. The result is a superset meant for
//! human review: the target's company and name are kept as-is.

use std::collections::HashSet;

use crewsync_common::db::Contractor;
use serde::{Deserialize, Serialize};

use crate::normalize::{normalize_email, normalize_phone, normalize_text, split_list};

/// Separator used when writing reconciled lists back to the delimited columns
const JOIN_SEPARATOR: &str = ", ";

/// Field values to write onto the merge target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledFields {
    pub emails: String,
    pub phone_numbers: String,
    pub departure_locations: Vec<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl ReconciledFields {
    /// True when applying these fields would leave the target unchanged.
    /// Lists compare by normalized entries, so separators and spelling
    /// differences the union would have absorbed do not count as changes.
    pub fn is_noop_for(&self, target: &Contractor) -> bool {
        let same_emails =
            delimited_keys(&self.emails, normalize_email) == delimited_keys(&target.emails, normalize_email);
        let same_phones = delimited_keys(&self.phone_numbers, phone_key)
            == delimited_keys(&target.phone_numbers, phone_key);
        let same_locations =
            location_keys(&self.departure_locations) == location_keys(&target.departure_locations);

        same_emails
            && same_phones
            && same_locations
            && self.category == target.category
            && self.city == target.city
            && self.state == target.state
            && self.zip == target.zip
    }
}

/// Compute the reconciled contact fields for `target` absorbing `source`
///
/// Lists are unioned target-first and de-duplicated by normalized key, keeping
/// the first spelling seen. Scalar fields come from the source only where the
/// target has nothing.
pub fn reconcile(source: &Contractor, target: &Contractor) -> ReconciledFields {
    let emails = union_delimited(&target.emails, &source.emails, normalize_email);
    let phone_numbers = union_delimited(&target.phone_numbers, &source.phone_numbers, phone_key);

    let departure_locations = union_entries(
        target
            .departure_locations
            .iter()
            .chain(source.departure_locations.iter())
            .map(String::as_str),
        normalize_text,
    );

    ReconciledFields {
        emails: emails.join(JOIN_SEPARATOR),
        phone_numbers: phone_numbers.join(JOIN_SEPARATOR),
        departure_locations,
        category: fill(&target.category, &source.category),
        city: fill(&target.city, &source.city),
        state: fill(&target.state, &source.state),
        zip: fill(&target.zip, &source.zip),
    }
}

/// Unparseable phone entries are kept verbatim, keyed by their text
fn phone_key(phone: &str) -> String {
    let key = normalize_phone(phone);
    if key.is_empty() {
        normalize_text(phone)
    } else {
        key
    }
}

/// De-duplicated normalized keys of a delimited column, in stored order
fn delimited_keys<F>(text: &str, key: F) -> Vec<String>
where
    F: Fn(&str) -> String,
{
    union_delimited(text, "", &key)
        .iter()
        .map(|entry| key(entry))
        .collect()
}

fn location_keys(locations: &[String]) -> Vec<String> {
    union_entries(locations.iter().map(String::as_str), normalize_text)
        .iter()
        .map(|entry| normalize_text(entry))
        .collect()
}

fn union_delimited<F>(first: &str, second: &str, key: F) -> Vec<String>
where
    F: Fn(&str) -> String,
{
    union_entries(split_list(first).into_iter().chain(split_list(second)), key)
}

fn union_entries<'a, I, F>(entries: I, key: F) -> Vec<String>
where
    I: Iterator<Item = &'a str>,
    F: Fn(&str) -> String,
{
    let mut seen = HashSet::new();
    entries
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter(|entry| seen.insert(key(entry)))
        .map(str::to_string)
        .collect()
}

fn fill(target: &Option<String>, source: &Option<String>) -> Option<String> {
    match target {
        Some(value) if !value.trim().is_empty() => Some(value.clone()),
        _ => source
            .as_ref()
            .filter(|value| !value.trim().is_empty())
            .cloned()
            .or_else(|| target.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emails_unioned_target_first() {
        let target = Contractor::new("Acme Corp", "John Doe").with_emails("j@acme.com");
        let source = Contractor::new("ACME corp", "john doe").with_emails("J@Acme.com; john@acme.com");

        let fields = reconcile(&source, &target);
        assert_eq!(fields.emails, "j@acme.com, john@acme.com");
    }

    #[test]
    fn test_phones_deduplicated_by_digits() {
        let target = Contractor::new("Acme", "A").with_phone_numbers("(555) 123-4567");
        let source = Contractor::new("Acme", "A").with_phone_numbers("+1 555 123 4567, 555-000-1111, call office");

        let fields = reconcile(&source, &target);
        assert_eq!(fields.phone_numbers, "(555) 123-4567, 555-000-1111, call office");
    }

    #[test]
    fn test_departure_locations_unioned() {
        let mut target = Contractor::new("Acme", "A");
        target.departure_locations = vec!["Tampa, FL".into()];
        let mut source = Contractor::new("Acme", "A");
        source.departure_locations = vec!["tampa, fl".into(), "Mobile, AL".into()];

        let fields = reconcile(&source, &target);
        assert_eq!(fields.departure_locations, vec!["Tampa, FL", "Mobile, AL"]);
    }

    #[test]
    fn test_scalars_filled_only_when_target_empty() {
        let mut target = Contractor::new("Acme", "A");
        target.city = Some("Houston".into());
        target.state = Some("  ".into());
        let mut source = Contractor::new("Acme", "A");
        source.city = Some("Dallas".into());
        source.state = Some("TX".into());
        source.category = Some("Line Clearance".into());

        let fields = reconcile(&source, &target);
        assert_eq!(fields.city.as_deref(), Some("Houston"));
        assert_eq!(fields.state.as_deref(), Some("TX"));
        assert_eq!(fields.category.as_deref(), Some("Line Clearance"));
        assert_eq!(fields.zip, None);
    }

    #[test]
    fn test_identical_records_reconcile_to_noop() {
        let target = Contractor::new("Acme", "A")
            .with_emails("a@acme.com")
            .with_phone_numbers("555-123-4567");
        let source = target.clone();

        assert!(reconcile(&source, &target).is_noop_for(&target));
    }

    #[test]
    fn test_reformatted_lists_reconcile_to_noop() {
        let mut target = Contractor::new("Acme", "A")
            .with_emails("a@x.com;b@x.com")
            .with_phone_numbers("555.123.4567\n(555) 000-1111");
        target.departure_locations = vec!["Tampa, FL".into()];
        let mut source = Contractor::new("Acme", "A")
            .with_emails("A@x.com")
            .with_phone_numbers("+1 555 123 4567");
        source.departure_locations = vec!["  tampa, fl".into()];

        let fields = reconcile(&source, &target);
        assert_eq!(fields.emails, "a@x.com, b@x.com");
        assert!(fields.is_noop_for(&target));

        source.emails = "c@x.com".into();
        assert!(!reconcile(&source, &target).is_noop_for(&target));
    }
}
