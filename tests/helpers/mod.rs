//! Shared fixtures for the integration tests

#![allow(dead_code)]

use sentence_classifier::config::{
    BatchConfig, ClassifierConfig, FieldMapping, InputConfig, Instructions, ModelConfig,
    OutputConfig, PromptConfig,
};
use sentence_classifier::table::InputTable;
use std::path::{Path, PathBuf};

pub fn instructions() -> Instructions {
    Instructions {
        system_message: "You label sentences.".to_string(),
        task_instructions: "Return one JSON object per sentence.".to_string(),
    }
}

/// Config for an `article`/`seq`/`sentence` table mapping `id` and `label`.
pub fn config(chunk_size: usize, max_workers: usize) -> ClassifierConfig {
    ClassifierConfig {
        input: InputConfig::columns("article", "seq", "sentence"),
        prompt: PromptConfig {
            path: PathBuf::from("prompt.json"),
        },
        model: ModelConfig::default(),
        batch: BatchConfig {
            chunk_size,
            max_workers,
        },
        output: OutputConfig {
            root: PathBuf::from("out"),
        },
        mapping: vec![
            FieldMapping::new("id", "id"),
            FieldMapping::new("label", "label"),
        ],
    }
}

/// A table with `sentences` rows for each named article, in the given order.
pub fn articles(groups: &[(&str, usize)]) -> InputTable {
    let owned: Vec<[String; 3]> = groups
        .iter()
        .flat_map(|&(article, count)| {
            (1..=count).map(move |seq| {
                [
                    article.to_string(),
                    seq.to_string(),
                    format!("Sentence {seq} of article {article}."),
                ]
            })
        })
        .collect();
    let borrowed: Vec<Vec<&str>> = owned
        .iter()
        .map(|row| row.iter().map(String::as_str).collect())
        .collect();
    let rows: Vec<&[&str]> = borrowed.iter().map(Vec::as_slice).collect();
    InputTable::from_rows(&["article", "seq", "sentence"], &rows)
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

/// Writes a runnable config, prompt and input table into `dir` and returns
/// the config path. Requests go to `base_url`.
pub fn write_workspace(dir: &Path, base_url: &str) -> PathBuf {
    std::fs::write(
        dir.join("input.csv"),
        "\u{feff}article,seq,sentence\n1,1,Rivers dry up.\n1,2,Fish leave.\n2,1,Forests regrow.\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("prompt.json"),
        r#"{"SYSTEM_MESSAGE": "You label sentences.", "TASK_INSTRUCTIONS": "Label each sentence."}"#,
    )
    .unwrap();

    let config = format!(
        r#"
[input]
path = "input.csv"
group_column = "article"
sequence_column = "seq"
text_column = "sentence"

[prompt]
path = "prompt.json"

[model]
name = "test-model"
base_url = "{base_url}"
api_key_env = "SENTENCE_CLASSIFIER_TEST_KEY"
timeout_secs = 5

[batch]
chunk_size = 1
max_workers = 2

[output]
root = "out"

[[mapping]]
field = "id"
column = "id"

[[mapping]]
field = "label"
column = "label"
"#
    );
    let path = dir.join("classify.toml");
    std::fs::write(&path, config).unwrap();
    path
}
