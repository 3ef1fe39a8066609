use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::rules::ReconcileRules;

/// Fallback topic and feature when no keyword matches
pub const OTHER: &str = "その他";

/// A case-insensitive regex substitution applied to raw text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextReplacement {
    pub pattern: String,
    #[serde(rename = "replace", alias = "replacement")]
    pub replacement: String,
}

impl TextReplacement {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// A label that applies when any of its keywords occurs in the text.
///
/// Serialized as a `[label, [keywords...]]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, Vec<String>)", into = "(String, Vec<String>)")]
pub struct KeywordRule {
    pub label: String,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(label: &str, keywords: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|kw| text.contains(kw.as_str()))
    }
}

impl From<(String, Vec<String>)> for KeywordRule {
    fn from((label, keywords): (String, Vec<String>)) -> Self {
        Self { label, keywords }
    }
}

impl From<KeywordRule> for (String, Vec<String>) {
    fn from(rule: KeywordRule) -> Self {
        (rule.label, rule.keywords)
    }
}

/// Ordered table scan: the first matching rule wins
pub fn first_match<'a>(rules: &'a [KeywordRule], text: &str) -> Option<&'a str> {
    rules
        .iter()
        .find(|rule| rule.matches(text))
        .map(|rule| rule.label.as_str())
}

/// Process-wide, read-only configuration for a run.
///
/// `Profile::default()` is the built-in profile written on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Applied in order to raw text before anything else
    #[serde(default)]
    pub text_replacements: Vec<TextReplacement>,
    /// Conversational filler; an utterance containing any of these is dropped
    #[serde(default)]
    pub non_requirement_phrases: Vec<String>,
    /// Markers of provisional language
    #[serde(default)]
    pub tentative_words: Vec<String>,
    /// Feature grouping, in file order
    #[serde(default, with = "keyword_map")]
    pub feature_map: Vec<KeywordRule>,
    #[serde(default)]
    pub nonfunctional_features: Vec<String>,
    /// Topics used for decision conflict resolution, in priority order
    #[serde(default)]
    pub topic_keys: Vec<KeywordRule>,
    #[serde(default)]
    pub reconcile_rules: ReconcileRules,
}

impl Default for Profile {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self {
            text_replacements: vec![
                TextReplacement::new(r"\bdesc\b", "説明"),
                TextReplacement::new(r"\bques\b|\bquestion\b|\bq\b", "質問"),
                TextReplacement::new(r"\breq\b|\brequirement\b", "要件"),
                TextReplacement::new(r"\bdec\b|\bdecision\b", "決定"),
            ],
            non_requirement_phrases: strings(&[
                "それ賛成です",
                "賛成です",
                "ありがとうございます",
                "了解です",
                "お願いします",
                "問題ありません",
                "助かります",
                "なるほど",
                "了解しました",
                "承知しました",
            ]),
            tentative_words: strings(&["一旦", "暫定", "候補", "保留", "検討中", "仮"]),
            feature_map: vec![
                KeywordRule::new("ログイン", &["ログイン", "初期表示", "ボタン"]),
                KeywordRule::new("通知", &["通知", "トースト"]),
                KeywordRule::new("権限", &["管理者", "編集", "削除", "権限"]),
                KeywordRule::new("性能", &["3秒", "表示", "パフォーマンス", "応答時間"]),
                KeywordRule::new("文言", &["文言", "エラーメッセージ", "メッセージ"]),
                KeywordRule::new("保持", &["保持期間", "ログ", "90日", "保存期間"]),
                KeywordRule::new("チュートリアル", &["チュートリアル", "オンボーディング"]),
                KeywordRule::new("ボタン位置", &["ボタン", "右下", "中央下"]),
            ],
            nonfunctional_features: strings(&["性能", "保持"]),
            topic_keys: vec![
                KeywordRule::new("通知", &["通知", "トースト"]),
                KeywordRule::new("ログイン", &["ログイン", "初期表示", "サインイン"]),
                KeywordRule::new("権限", &["管理者", "編集", "削除", "権限"]),
                KeywordRule::new("性能", &["3秒", "パフォーマンス", "表示", "応答時間"]),
                KeywordRule::new("文言", &["エラーメッセージ", "文言", "メッセージ"]),
                KeywordRule::new("保持", &["保持期間", "ログ", "90日", "保存期間"]),
                KeywordRule::new(
                    "チュートリアル",
                    &["チュートリアル", "オンボーディング", "ガイド"],
                ),
                KeywordRule::new("ボタン位置", &["ボタン", "右下", "中央下", "中央下寄せ"]),
            ],
            reconcile_rules: ReconcileRules::default(),
        }
    }
}

impl Profile {
    /// Compile the replacement table once for a run
    pub fn corrector(&self) -> TextCorrector {
        TextCorrector::new(&self.text_replacements)
    }

    pub fn is_non_requirement(&self, text: &str) -> bool {
        self.non_requirement_phrases
            .iter()
            .any(|p| text.contains(p.as_str()))
    }

    pub fn is_tentative(&self, text: &str) -> bool {
        self.tentative_words.iter().any(|w| text.contains(w.as_str()))
    }

    /// Feature used for output grouping
    pub fn feature_of<'a>(&'a self, text: &str) -> &'a str {
        first_match(&self.feature_map, text).unwrap_or(OTHER)
    }

    /// Topic used for decision conflict resolution
    pub fn topic_of<'a>(&'a self, text: &str) -> &'a str {
        first_match(&self.topic_keys, text).unwrap_or(OTHER)
    }

    pub fn is_nonfunctional(&self, feature: &str) -> bool {
        self.nonfunctional_features.iter().any(|f| f == feature)
    }
}

/// Compiled `text_replacements`
#[derive(Debug, Clone)]
pub struct TextCorrector {
    rules: Vec<(Regex, String)>,
}

impl TextCorrector {
    /// Malformed patterns are skipped with a warning
    pub fn new(replacements: &[TextReplacement]) -> Self {
        let rules = replacements
            .iter()
            .filter_map(|r| {
                match RegexBuilder::new(&r.pattern).case_insensitive(true).build() {
                    Ok(regex) => Some((regex, r.replacement.clone())),
                    Err(e) => {
                        warn!("Skipping malformed replacement pattern {:?}: {}", r.pattern, e);
                        None
                    }
                }
            })
            .collect();
        Self { rules }
    }

    pub fn apply(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |acc, (regex, replacement)| {
                regex.replace_all(&acc, replacement.as_str()).into_owned()
            })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// `feature_map` is a JSON object whose key order is significant.
///
/// Deserialization streams the entries so file order survives; a list of
/// `[label, keywords]` pairs is accepted as well.
mod keyword_map {
    use std::fmt;

    use serde::de::{MapAccess, SeqAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use super::KeywordRule;

    pub fn serialize<S: Serializer>(
        rules: &[KeywordRule],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(rules.len()))?;
        for rule in rules {
            map.serialize_entry(&rule.label, &rule.keywords)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<KeywordRule>, D::Error> {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = Vec<KeywordRule>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of label to keywords, or a list of [label, keywords] pairs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut rules = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((label, keywords)) = map.next_entry::<String, Vec<String>>()? {
                    rules.push(KeywordRule { label, keywords });
                }
                Ok(rules)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut rules = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(rule) = seq.next_element::<KeywordRule>()? {
                    rules.push(rule);
                }
                Ok(rules)
            }
        }

        deserializer.deserialize_any(RulesVisitor)
    }
}
