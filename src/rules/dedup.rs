use std::collections::HashSet;

use crate::models::{Category, Requirement};

/// Statement form used for duplicate detection: no whitespace, no "。" or "、"
pub fn comparison_key(statement: &str) -> String {
    statement
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '。' && *c != '、')
        .collect()
}

/// Drop records whose (feature, category, normalized statement) was already
/// kept. First occurrence wins; order is otherwise preserved.
///
/// Returns the kept records and the number removed.
pub fn dedup(records: Vec<Requirement>) -> (Vec<Requirement>, usize) {
    let mut seen: HashSet<(String, Category, String)> = HashSet::new();
    let total = records.len();

    let kept: Vec<Requirement> = records
        .into_iter()
        .filter(|r| seen.insert((r.feature.clone(), r.category, comparison_key(&r.statement))))
        .collect();

    let removed = total - kept.len();
    (kept, removed)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::models::{Priority, Source, Status};

    fn record(feature: &str, statement: &str, speaker: &str) -> Requirement {
        Requirement {
            id: None,
            feature: feature.to_string(),
            category: Category::Functional,
            statement: statement.to_string(),
            acceptance_criteria: vec![],
            priority: Priority::Should,
            status: Status::UnderDiscussion,
            source: Source {
                speaker: speaker.to_string(),
                timestamp: String::new(),
            },
            rationale: String::new(),
            dependencies: vec![],
            supersedes: vec![],
            tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_comparison_key() {
        assert_eq!(comparison_key("通知は、 メールで送る。"), "通知はメールで送る");
        assert_eq!(comparison_key(" a\tb\nc "), "abc");
    }

    #[test]
    fn test_trailing_full_stop_collapses() {
        let records = vec![
            record("ログイン", "初期表示はダッシュボード", "A"),
            record("ログイン", "初期表示はダッシュボード。", "B"),
        ];

        let (kept, removed) = dedup(records);

        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source.speaker, "A");
    }

    #[test]
    fn test_different_feature_is_not_duplicate() {
        let records = vec![
            record("ログイン", "同じ文", "A"),
            record("通知", "同じ文", "B"),
            record("ログイン", "別の文", "C"),
            record("ログイン", "同じ 文。", "D"),
        ];

        let (kept, removed) = dedup(records);

        let speakers: Vec<_> = kept.iter().map(|r| r.source.speaker.as_str()).collect();
        assert_eq!(speakers, vec!["A", "B", "C"]);
        assert_eq!(removed, 1);
    }
}
