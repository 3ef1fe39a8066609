use serde::Serialize;

use super::Tool;
use crate::models::{Category, Label, Utterance};

pub const CLASSIFY_TOOL: &str = "submit_classification";
pub const NORMALIZE_TOOL: &str = "submit_requirement";

/// System prompt for utterance classification
pub const CLASSIFIER_SYSTEM_PROMPT: &str = r#"あなたは会議の議事録を分類するアシスタントです。
各発言に次のいずれかのラベルを付けてください。

- decision: 方針や仕様がはっきり決まった発言
- proposal: 提案や要望
- question: 確認や質問
- chitchat: 雑談
- other: 上記のいずれでもない発言

topic は短い名詞句で付けてください（例: 認証、通知、画面、権限、運用、表示、文言、性能）。
当てはまるものがなければ「その他」としてください。
reason には判断の根拠を短く書いてください。

すべての発言について index をそのまま保ち、submit_classification ツールで回答してください。
回答は日本語で書いてください。"#;

/// System prompt for requirement normalization
pub const NORMALIZER_SYSTEM_PROMPT: &str = r#"あなたは要件定義書を書くテクニカルライターです。
会議中の口語の発言を、仕様書の文体による定義文と、Gherkin 形式に近い受け入れ条件に書き換えてください。

- 数値、主体、条件をはっきりさせること
- 発言にない事実を付け足さないこと
- 受け入れ条件が作れない場合は空の配列を返すこと

submit_requirement ツールで回答してください。"#;

#[derive(Serialize)]
struct IndexedUtterance<'a> {
    index: usize,
    speaker: &'a str,
    timestamp: &'a str,
    text: &'a str,
}

/// Build the user prompt listing every utterance with its index
pub fn build_classifier_prompt(utterances: &[Utterance]) -> String {
    let items: Vec<IndexedUtterance> = utterances
        .iter()
        .enumerate()
        .map(|(index, u)| IndexedUtterance {
            index,
            speaker: &u.speaker,
            timestamp: &u.timestamp,
            text: &u.text,
        })
        .collect();

    let mut prompt = String::new();
    prompt.push_str(&format!(
        "以下の {} 件の発言それぞれに label / topic / reason を付けてください。\n",
        items.len()
    ));
    prompt.push_str("index は入力の値をそのまま使ってください。\n\n");
    prompt.push_str("```json\n");
    prompt.push_str(&serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string()));
    prompt.push_str("\n```\n");
    prompt
}

/// Build the user prompt for one requirement
pub fn build_normalizer_prompt(category: Category, feature: &str, text: &str) -> String {
    format!("category: {}\nfeature: {}\nutterance: {}\n", category, feature, text)
}

pub fn classification_tool() -> Tool {
    let labels: Vec<&str> = Label::ALL.iter().map(|l| l.as_str()).collect();

    Tool {
        name: CLASSIFY_TOOL.to_string(),
        description: "Submit one classification per utterance, keyed by index".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "index": {"type": "integer"},
                            "label": {"type": "string", "enum": labels},
                            "topic": {"type": "string"},
                            "reason": {"type": "string"}
                        },
                        "required": ["index", "label", "topic", "reason"]
                    }
                }
            },
            "required": ["items"]
        }),
    }
}

pub fn normalization_tool() -> Tool {
    Tool {
        name: NORMALIZE_TOOL.to_string(),
        description: "Submit the formal requirement statement and its acceptance criteria"
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "statement": {"type": "string"},
                "acceptance_criteria": {
                    "type": "array",
                    "items": {"type": "string"}
                }
            },
            "required": ["statement", "acceptance_criteria"]
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_prompt_lists_indices() {
        let utterances = vec![
            Utterance::new("A", "2024-05-01T10:00:00", "通知はメールで送る"),
            Utterance::new("B", "2024-05-01T10:01:00", "了解です"),
        ];

        let prompt = build_classifier_prompt(&utterances);

        assert!(prompt.contains("2 件"));
        assert!(prompt.contains(r#""index": 1"#));
        assert!(prompt.contains("通知はメールで送る"));
    }

    #[test]
    fn test_classification_tool_enumerates_labels() {
        let tool = classification_tool();
        let item = &tool.input_schema["properties"]["items"]["items"];
        let labels = &item["properties"]["label"]["enum"];

        assert_eq!(labels.as_array().unwrap().len(), 5);
        assert_eq!(labels[0], "decision");
    }

    #[test]
    fn test_normalizer_prompt() {
        let prompt = build_normalizer_prompt(Category::Nonfunctional, "性能", "3秒以内に表示");
        assert_eq!(prompt, "category: nonfunctional\nfeature: 性能\nutterance: 3秒以内に表示\n");
    }
}
