//! Builds classification units from input rows

use super::types::{Sentence, Unit};
use crate::config::InputConfig;
use crate::error::{Error, Result};
use crate::table::InputTable;
use std::collections::{HashMap, HashSet};

/// Groups rows by the group column, keeping groups in first-seen order and
/// rows in input order within each group.
pub fn build_units(table: &InputTable, input: &InputConfig) -> Result<Vec<Unit>> {
    let group_idx = table.require_column(&input.group_column)?;
    let sequence_idx = table.require_column(&input.sequence_column)?;
    let text_idx = table.require_column(&input.text_column)?;
    let body_idx = input
        .body_column
        .as_deref()
        .and_then(|name| table.column(name));

    let mut units: Vec<Unit> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut seen_ids: Vec<HashSet<String>> = Vec::new();

    for record in table.records() {
        let group_key = record.get(group_idx).unwrap_or_default();
        let sequence_key = record.get(sequence_idx).unwrap_or_default();
        let text = record.get(text_idx).unwrap_or_default();

        let position = match positions.get(group_key) {
            Some(&position) => position,
            None => {
                let body = body_idx
                    .and_then(|idx| record.get(idx))
                    .map(|body| truncate_chars(body, input.body_max_chars))
                    .unwrap_or_default();

                units.push(Unit {
                    unit_id: group_key.to_string(),
                    sentences: Vec::new(),
                    body,
                });
                seen_ids.push(HashSet::new());
                positions.insert(group_key.to_string(), units.len() - 1);
                units.len() - 1
            }
        };

        let sentence_id = format!("{}{}{}", group_key, input.sentence_id_separator, sequence_key);
        if !seen_ids[position].insert(sentence_id.clone()) {
            return Err(Error::Validation(format!(
                "duplicate sentence id '{}' in group '{}'",
                sentence_id, group_key
            )));
        }

        units[position].sentences.push(Sentence {
            sentence_id,
            text: text.to_string(),
        });
    }

    Ok(units)
}

/// Keeps at most `max_chars` characters; 0 keeps everything.
fn truncate_chars(value: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return value.to_string();
    }
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn articles() -> InputTable {
        InputTable::from_rows(
            &["article", "n", "sentence", "body"],
            &[
                &["b", "1", "First of b.", "Body of article b"],
                &["a", "1", "First of a.", "Body of article a"],
                &["b", "2", "Second of b.", "ignored"],
                &["c", "1", "Only c.", "Body of c"],
            ],
        )
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let input = InputConfig::columns("article", "n", "sentence");
        let units = build_units(&articles(), &input).unwrap();

        let ids: Vec<&str> = units.iter().map(|u| u.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        let b_ids: Vec<&str> = units[0]
            .sentences
            .iter()
            .map(|s| s.sentence_id.as_str())
            .collect();
        assert_eq!(b_ids, vec!["b_1", "b_2"]);
        assert_eq!(units[0].sentences[1].text, "Second of b.");
    }

    #[test]
    fn test_body_absent_is_empty() {
        let mut input = InputConfig::columns("article", "n", "sentence");
        input.body_column = Some("missing".to_string());
        let units = build_units(&articles(), &input).unwrap();
        assert!(units.iter().all(|u| u.body.is_empty()));
    }

    #[test]
    fn test_body_taken_from_first_row_and_truncated() {
        let mut input = InputConfig::columns("article", "n", "sentence");
        input.body_column = Some("body".to_string());
        input.body_max_chars = 7;
        let units = build_units(&articles(), &input).unwrap();

        assert_eq!(units[0].body, "Body of");
        assert_eq!(units[2].body, "Body of");

        input.body_max_chars = 0;
        let units = build_units(&articles(), &input).unwrap();
        assert_eq!(units[0].body, "Body of article b");
    }

    #[test]
    fn test_truncation_counts_characters() {
        assert_eq!(truncate_chars("ééééé", 3), "ééé");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn test_duplicate_sentence_id_rejected() {
        let table = InputTable::from_rows(
            &["id", "sentence"],
            &[&["1", "one"], &["1", "again"]],
        );
        let input = InputConfig::columns("id", "id", "sentence");
        assert!(matches!(
            build_units(&table, &input),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_missing_required_column() {
        let input = InputConfig::columns("article", "n", "text");
        assert!(build_units(&articles(), &input).is_err());
    }
}
