//! Contractor match resolution
//!
//! Resolves an incoming identity against the existing contractor set using a
//! strictly ordered cascade of rules. The first rule that hits decides the
//! result; later rules are never consulted. There is no scoring: reordering
//! the cascade changes which duplicates get auto-associated.
//!
//! The two company-less rules (`UniqueEmail`, `UniquePhone`) only fire when
//! exactly one contractor carries the key. Shared keys are ambiguous and fall
//! through to "no match".

use crewsync_common::db::Contractor;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::normalize::{
    is_matchable_phone, normalize_email, normalize_email_list, normalize_phone,
    normalize_phone_list, normalize_text,
};

/// Identity extracted from an import row or form submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    pub company_name: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl CandidateIdentity {
    pub fn new(company_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            name: name.into(),
            email: None,
            phone: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Rule that produced a match, recorded for audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    CompanyAndName,
    CompanyAndEmail,
    CompanyAndPhone,
    UniqueEmail,
    UniquePhone,
}

impl MatchStrategy {
    /// Evaluation order of the cascade
    pub const CASCADE: [MatchStrategy; 5] = [
        MatchStrategy::CompanyAndName,
        MatchStrategy::CompanyAndEmail,
        MatchStrategy::CompanyAndPhone,
        MatchStrategy::UniqueEmail,
        MatchStrategy::UniquePhone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::CompanyAndName => "company_and_name",
            MatchStrategy::CompanyAndEmail => "company_and_email",
            MatchStrategy::CompanyAndPhone => "company_and_phone",
            MatchStrategy::UniqueEmail => "unique_email",
            MatchStrategy::UniquePhone => "unique_phone",
        }
    }
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved match with the rule that found it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractorMatch {
    pub contractor: Contractor,
    pub strategy: MatchStrategy,
}

/// Precomputed comparison keys for one identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedIdentity {
    pub company: String,
    pub name: String,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
}

impl NormalizedIdentity {
    pub fn of_contractor(contractor: &Contractor) -> Self {
        Self {
            company: normalize_text(&contractor.company_name),
            name: normalize_text(&contractor.name),
            emails: normalize_email_list(&contractor.emails),
            phones: normalize_phone_list(&contractor.phone_numbers)
                .into_iter()
                .filter(|p| is_matchable_phone(p))
                .collect(),
        }
    }

    pub fn of_candidate(candidate: &CandidateIdentity) -> Self {
        let email = candidate.email.as_deref().map(normalize_email).unwrap_or_default();
        let phone = candidate.phone.as_deref().map(normalize_phone).unwrap_or_default();

        Self {
            company: normalize_text(&candidate.company_name),
            name: normalize_text(&candidate.name),
            emails: if email.is_empty() { Vec::new() } else { vec![email] },
            phones: if is_matchable_phone(&phone) { vec![phone] } else { Vec::new() },
        }
    }

    fn email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    fn phone(&self) -> Option<&str> {
        self.phones.first().map(String::as_str)
    }

    fn same_company(&self, other: &NormalizedIdentity) -> bool {
        !self.company.is_empty() && self.company == other.company
    }
}

/// Read-only resolver over a snapshot of the contractor set
///
/// Soft-deleted contractors are skipped. Within a rule, the first contractor in
/// snapshot order wins, so callers must supply a stable order.
pub struct MatchResolver<'a> {
    entries: Vec<(&'a Contractor, NormalizedIdentity)>,
}

impl<'a> MatchResolver<'a> {
    pub fn new(contractors: &'a [Contractor]) -> Self {
        let entries = contractors
            .iter()
            .filter(|c| c.deleted_at.is_none())
            .map(|c| (c, NormalizedIdentity::of_contractor(c)))
            .collect();
        Self { entries }
    }

    /// Number of contractors eligible for matching
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the cascade for one candidate
    pub fn resolve(&self, candidate: &CandidateIdentity) -> Option<ContractorMatch> {
        let keys = NormalizedIdentity::of_candidate(candidate);

        for strategy in MatchStrategy::CASCADE {
            if let Some(contractor) = self.apply(strategy, &keys) {
                debug!(
                    strategy = %strategy,
                    contractor_id = %contractor.guid,
                    "Candidate matched existing contractor"
                );
                return Some(ContractorMatch {
                    contractor: contractor.clone(),
                    strategy,
                });
            }
        }

        debug!(
            company = %keys.company,
            name = %keys.name,
            "No contractor matched candidate"
        );
        None
    }

    /// Resolve many candidates against the same snapshot
    pub fn resolve_batch(&self, candidates: &[CandidateIdentity]) -> Vec<Option<ContractorMatch>> {
        candidates.iter().map(|c| self.resolve(c)).collect()
    }

    fn apply(&self, strategy: MatchStrategy, keys: &NormalizedIdentity) -> Option<&'a Contractor> {
        match strategy {
            MatchStrategy::CompanyAndName => {
                if keys.name.is_empty() {
                    return None;
                }
                self.first(|k| keys.same_company(k) && k.name == keys.name)
            }
            MatchStrategy::CompanyAndEmail => {
                let email = keys.email()?;
                self.first(|k| keys.same_company(k) && k.emails.iter().any(|e| e == email))
            }
            MatchStrategy::CompanyAndPhone => {
                let phone = keys.phone()?;
                self.first(|k| keys.same_company(k) && k.phones.iter().any(|p| p == phone))
            }
            MatchStrategy::UniqueEmail => {
                let email = keys.email()?;
                self.unique(strategy, |k| k.emails.iter().any(|e| e == email))
            }
            MatchStrategy::UniquePhone => {
                let phone = keys.phone()?;
                self.unique(strategy, |k| k.phones.iter().any(|p| p == phone))
            }
        }
    }

    fn first<F>(&self, predicate: F) -> Option<&'a Contractor>
    where
        F: Fn(&NormalizedIdentity) -> bool,
    {
        self.entries
            .iter()
            .find(|(_, keys)| predicate(keys))
            .map(|(contractor, _)| *contractor)
    }

    fn unique<F>(&self, strategy: MatchStrategy, predicate: F) -> Option<&'a Contractor>
    where
        F: Fn(&NormalizedIdentity) -> bool,
    {
        let mut hits = self.entries.iter().filter(|(_, keys)| predicate(keys));
        let first = hits.next()?;
        let others = hits.count();

        if others > 0 {
            debug!(
                strategy = %strategy,
                contenders = others + 1,
                "Ambiguous key shared by several contractors; not matching"
            );
            return None;
        }

        Some(first.0)
    }
}

/// Resolve one candidate against a contractor snapshot
pub fn resolve_match(
    candidate: &CandidateIdentity,
    contractors: &[Contractor],
) -> Option<ContractorMatch> {
    MatchResolver::new(contractors).resolve(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contractor(company: &str, name: &str, emails: &str, phones: &str) -> Contractor {
        Contractor::new(company, name)
            .with_emails(emails)
            .with_phone_numbers(phones)
    }

    #[test]
    fn test_company_and_name_beats_differing_email() {
        let existing = vec![contractor("Acme Corp", "John Doe", "j@acme.com", "")];
        let candidate = CandidateIdentity::new("Acme Corp", "John Doe").with_email("john@acme.com");

        let found = resolve_match(&candidate, &existing).expect("should match");
        assert_eq!(found.strategy, MatchStrategy::CompanyAndName);
        assert_eq!(found.contractor.guid, existing[0].guid);
    }

    #[test]
    fn test_company_and_name_is_case_and_space_insensitive() {
        let existing = vec![contractor("  ACME corp", "john DOE ", "", "")];
        let candidate = CandidateIdentity::new("acme Corp", "John Doe");

        let found = resolve_match(&candidate, &existing).unwrap();
        assert_eq!(found.strategy, MatchStrategy::CompanyAndName);
    }

    #[test]
    fn test_company_and_email_matches_any_listed_email() {
        let existing = vec![contractor(
            "Acme Corp",
            "Jane Roe",
            "ops@acme.com; dispatch@acme.com",
            "",
        )];
        let candidate =
            CandidateIdentity::new("Acme Corp", "J. Roe").with_email(" Dispatch@ACME.com ");

        let found = resolve_match(&candidate, &existing).unwrap();
        assert_eq!(found.strategy, MatchStrategy::CompanyAndEmail);
    }

    #[test]
    fn test_company_and_phone_uses_normalized_digits() {
        let existing = vec![contractor("Acme Corp", "Jane Roe", "", "(555) 123-4567")];
        let candidate = CandidateIdentity::new("Acme Corp", "Someone").with_phone("+1 555.123.4567");

        let found = resolve_match(&candidate, &existing).unwrap();
        assert_eq!(found.strategy, MatchStrategy::CompanyAndPhone);
    }

    #[test]
    fn test_unique_email_across_companies() {
        let existing = vec![
            contractor("Acme Corp", "Jane Roe", "jane@roe.net", ""),
            contractor("Other LLC", "Bob Smith", "bob@other.com", ""),
        ];
        let candidate = CandidateIdentity::new("ACME Corporation", "Jane").with_email("jane@roe.net");

        let found = resolve_match(&candidate, &existing).unwrap();
        assert_eq!(found.strategy, MatchStrategy::UniqueEmail);
        assert_eq!(found.contractor.guid, existing[0].guid);
    }

    #[test]
    fn test_shared_email_is_ambiguous() {
        let existing = vec![
            contractor("Acme Corp", "Jane Roe", "office@shared.com", ""),
            contractor("Other LLC", "Bob Smith", "office@shared.com", ""),
        ];
        let candidate = CandidateIdentity::new("Third Co", "Nobody").with_email("office@shared.com");

        assert!(resolve_match(&candidate, &existing).is_none());
    }

    #[test]
    fn test_shared_phone_across_companies_is_ambiguous() {
        let existing = vec![
            contractor("Acme Corp", "Jane Roe", "", "555-123-4567"),
            contractor("Other LLC", "Bob Smith", "", "555-123-4567"),
        ];
        let candidate = CandidateIdentity::new("Third Co", "Nobody").with_phone("555-123-4567");

        assert!(resolve_match(&candidate, &existing).is_none());
    }

    #[test]
    fn test_unique_phone_matches_single_holder() {
        let existing = vec![
            contractor("Acme Corp", "Jane Roe", "", "555-123-4567"),
            contractor("Other LLC", "Bob Smith", "", "555-987-6543"),
        ];
        let candidate = CandidateIdentity::new("", "").with_phone("5559876543 x12");

        let found = resolve_match(&candidate, &existing).unwrap();
        assert_eq!(found.strategy, MatchStrategy::UniquePhone);
        assert_eq!(found.contractor.guid, existing[1].guid);
    }

    #[test]
    fn test_short_phone_never_matches() {
        let existing = vec![contractor("Acme Corp", "Jane Roe", "", "123-4567")];
        let candidate = CandidateIdentity::new("Acme Corp", "Other").with_phone("123-4567");

        assert!(resolve_match(&candidate, &existing).is_none());
    }

    #[test]
    fn test_empty_company_and_name_do_not_match_each_other() {
        let existing = vec![contractor("", "", "", "")];
        let candidate = CandidateIdentity::new("", "");

        assert!(resolve_match(&candidate, &existing).is_none());
    }

    #[test]
    fn test_cascade_prefers_earlier_strategy() {
        // Candidate hits strategy 2 on the first record and strategy 1 on the second
        let by_email = contractor("Acme Corp", "Jane Roe", "john@acme.com", "");
        let by_name = contractor("Acme Corp", "John Doe", "", "");
        let existing = vec![by_email, by_name.clone()];
        let candidate = CandidateIdentity::new("Acme Corp", "John Doe").with_email("john@acme.com");

        let found = resolve_match(&candidate, &existing).unwrap();
        assert_eq!(found.strategy, MatchStrategy::CompanyAndName);
        assert_eq!(found.contractor.guid, by_name.guid);
    }

    #[test]
    fn test_first_in_order_wins_within_strategy() {
        let first = contractor("Acme Corp", "John Doe", "", "");
        let second = contractor("Acme Corp", "John Doe", "", "");
        let existing = vec![first.clone(), second];

        let found = resolve_match(&CandidateIdentity::new("Acme Corp", "John Doe"), &existing).unwrap();
        assert_eq!(found.contractor.guid, first.guid);
    }

    #[test]
    fn test_soft_deleted_contractors_are_ignored() {
        let mut deleted = contractor("Acme Corp", "John Doe", "", "");
        deleted.deleted_at = Some(chrono::Utc::now());
        let existing = vec![deleted];

        let resolver = MatchResolver::new(&existing);
        assert!(resolver.is_empty());
        assert!(resolver.resolve(&CandidateIdentity::new("Acme Corp", "John Doe")).is_none());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let existing = vec![
            contractor("Acme Corp", "Jane Roe", "jane@roe.net", "555-123-4567"),
            contractor("Other LLC", "Bob Smith", "bob@other.com", "555-987-6543"),
        ];
        let candidate = CandidateIdentity::new("x", "y").with_email("bob@other.com");
        let resolver = MatchResolver::new(&existing);

        let first = resolver.resolve(&candidate);
        let second = resolver.resolve(&candidate);
        assert_eq!(first, second);
    }

    #[test]
    fn test_strategy_serializes_snake_case() {
        let json = serde_json::to_string(&MatchStrategy::UniqueEmail).unwrap();
        assert_eq!(json, "\"unique_email\"");
        assert_eq!(MatchStrategy::CompanyAndPhone.to_string(), "company_and_phone");
    }
}
