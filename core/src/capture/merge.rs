use std::collections::HashSet;

use crate::agent::state::{FieldSource, SessionField};

use super::CandidateField;

const JACCARD_OVERLAP: f64 = 0.5;
const CONTINUATION_RATIO: f64 = 0.5;
const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Result of merging one extraction pass into the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub fields: Vec<SessionField>,
    pub appended: usize,
    pub extended: usize,
    pub discarded: usize,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.appended > 0 || self.extended > 0
    }
}

/// Merge new candidates into existing session fields. Existing fields are
/// never removed; an incoming value for a known id fills a blank value, or
/// is dropped as a re-capture, appended as a continuation, or dropped
/// conservatively.
pub fn merge_fields(existing: &[SessionField], incoming: &[CandidateField]) -> MergeOutcome {
    let mut outcome = MergeOutcome {
        fields: existing.to_vec(),
        ..MergeOutcome::default()
    };

    for candidate in incoming {
        let Some(field) = outcome.fields.iter_mut().find(|field| field.id == candidate.id) else {
            outcome.fields.push(SessionField {
                id: candidate.id.clone(),
                label: candidate.label.clone(),
                value: candidate.value.clone(),
                source: FieldSource::Capture,
            });
            outcome.appended += 1;
            continue;
        };

        if field.value.trim().is_empty() {
            field.value = candidate.value.clone();
            outcome.extended += 1;
        } else if values_overlap(&field.value, &candidate.value) {
            outcome.discarded += 1;
        } else if is_continuation(&field.value, &candidate.value) {
            field.value = format!("{}{PARAGRAPH_SEPARATOR}{}", field.value, candidate.value);
            outcome.extended += 1;
        } else {
            outcome.discarded += 1;
        }
    }

    outcome
}

/// Case-sensitive: either value contains the other, or the whitespace
/// tokens have a Jaccard similarity of at least 0.5.
pub fn values_overlap(existing: &str, incoming: &str) -> bool {
    if existing.contains(incoming) || incoming.contains(existing) {
        return true;
    }
    token_jaccard(existing, incoming) >= JACCARD_OVERLAP
}

fn is_continuation(existing: &str, incoming: &str) -> bool {
    let existing_len = existing.chars().count() as f64;
    let incoming_len = incoming.chars().count() as f64;
    incoming_len >= CONTINUATION_RATIO * existing_len
}

fn token_jaccard(a: &str, b: &str) -> f64 {
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    let shared = left.intersection(&right).count() as f64;
    let total = left.union(&right).count() as f64;
    shared / total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, value: &str) -> CandidateField {
        CandidateField {
            id: id.into(),
            label: id.replace('_', " "),
            value: value.into(),
            field_type: None,
            confidence: 0.9,
        }
    }

    fn field(id: &str, value: &str) -> SessionField {
        SessionField {
            id: id.into(),
            label: id.into(),
            value: value.into(),
            source: FieldSource::Capture,
        }
    }

    #[test]
    fn blank_existing_value_is_filled() {
        let existing = vec![field("plan", "")];
        let outcome = merge_fields(&existing, &[candidate("plan", "Review in two weeks")]);
        assert_eq!(outcome.fields[0].value, "Review in two weeks");
        assert_eq!(outcome.extended, 1);
    }

    #[test]
    fn new_id_is_appended() {
        let outcome = merge_fields(&[], &[candidate("patient_name", "John Smith")]);
        assert_eq!(outcome.fields.len(), 1);
        assert_eq!(outcome.fields[0].id, "patient_name");
        assert_eq!(outcome.fields[0].value, "John Smith");
        assert_eq!(outcome.appended, 1);
    }

    #[test]
    fn contained_value_is_a_recapture() {
        let existing = vec![field("note", "Line one.")];
        let outcome = merge_fields(&existing, &[candidate("note", "Line one. Line two.")]);
        assert_eq!(outcome.fields, existing);
        assert_eq!(outcome.discarded, 1);
        assert!(!outcome.changed());
    }

    #[test]
    fn disjoint_long_value_is_a_continuation() {
        let a = "Patient reports intermittent chest pain radiating to the left arm for two weeks";
        let b = "Examination unremarkable apart from mild tachycardia noted during consultation today";
        let outcome = merge_fields(&[field("note", a)], &[candidate("note", b)]);
        assert_eq!(outcome.fields.len(), 1);
        assert_eq!(outcome.fields[0].value, format!("{a}\n\n{b}"));
        assert_eq!(outcome.fields[0].label, "note");
        assert_eq!(outcome.extended, 1);
    }

    #[test]
    fn overlap_compares_values_case_sensitively() {
        let existing = vec![field("assessment", "BP stable")];
        let outcome = merge_fields(&existing, &[candidate("assessment", "bp stable, review")]);
        assert_eq!(outcome.fields[0].value, "BP stable\n\nbp stable, review");
        assert_eq!(outcome.extended, 1);

        let outcome = merge_fields(&existing, &[candidate("assessment", "BP stable, review")]);
        assert_eq!(outcome.fields, existing);
        assert_eq!(outcome.discarded, 1);
    }

    #[test]
    fn short_disjoint_value_is_discarded() {
        let a = "Patient reports intermittent chest pain radiating to the left arm for two weeks";
        let outcome = merge_fields(&[field("note", a)], &[candidate("note", "Review Friday")]);
        assert_eq!(outcome.fields[0].value, a);
        assert_eq!(outcome.discarded, 1);
    }

    #[test]
    fn high_token_overlap_is_a_recapture() {
        let existing = vec![field("plan", "start metformin 500mg twice daily review in two weeks")];
        let outcome = merge_fields(
            &existing,
            &[candidate("plan", "start metformin 500mg twice daily, review in 2 weeks")],
        );
        assert_eq!(outcome.fields, existing);
    }

    #[test]
    fn merging_the_same_candidates_twice_is_idempotent() {
        let long_a = "Presenting complaint of persistent dry cough for three weeks without fever";
        let long_b = "Smoker of twenty pack years considering cessation support through the clinic";
        let incoming = vec![
            candidate("patient_name", "John Smith"),
            candidate("history", long_b),
            candidate("dob", "1960-02-01"),
        ];
        let start = vec![field("history", long_a)];

        let first = merge_fields(&start, &incoming);
        assert!(first.changed());
        let second = merge_fields(&first.fields, &incoming);
        assert_eq!(second.fields, first.fields);
        assert!(!second.changed());
    }

    #[test]
    fn merge_never_drops_existing_fields() {
        let existing = vec![field("a", "one"), field("b", "two")];
        let outcome = merge_fields(&existing, &[candidate("c", "three")]);
        let ids: Vec<&str> = outcome.fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_ids_within_one_pass_stay_unique() {
        let outcome = merge_fields(&[], &[candidate("dob", "1960-02-01"), candidate("dob", "1960-02-01")]);
        assert_eq!(outcome.fields.len(), 1);
        assert_eq!(outcome.discarded, 1);
    }
}
