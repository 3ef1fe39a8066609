use serde::Serialize;
use tracing::{debug, info};

use crate::models::{Category, OTHER, Profile, Requirement, assign_ids};
use crate::rules::dedup;

/// Counts of what reconciliation removed or rewrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub tentative_dropped: usize,
    pub superseded: usize,
    pub completed: usize,
    pub excluded: usize,
    pub conflicts_dropped: usize,
    pub duplicates_removed: usize,
}

/// Final record sets, ready for rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciled {
    pub fr: Vec<Requirement>,
    pub nfr: Vec<Requirement>,
    /// Most recent first
    pub dec: Vec<Requirement>,
    /// Excluded FRs then excluded NFRs; these carry no id
    pub out_of_scope: Vec<Requirement>,
    pub stats: ReconcileStats,
}

/// Execute Stage 2: reconciliation
///
/// Pure and total over any record set:
/// 1. Drops tentative decisions
/// 2. Keeps only the latest decision per topic (topic "その他" is never collapsed)
/// 3. Completes elliptical decisions from the FR/NFR records they refer to
/// 4. Moves FR/NFR records excluded by their topic's decision to Out-of-Scope
/// 5. Drops FRs that contradict their topic's decision
/// 6. Deduplicates each category
/// 7. Orders decisions newest first and assigns ids
pub fn execute_stage2(records: Vec<Requirement>, profile: &Profile) -> Reconciled {
    let rules = &profile.reconcile_rules;
    let mut stats = ReconcileStats::default();

    let mut fr = Vec::new();
    let mut nfr = Vec::new();
    let mut decisions = Vec::new();
    for record in records {
        match record.category {
            Category::Functional => fr.push(record),
            Category::Nonfunctional => nfr.push(record),
            Category::Decision => decisions.push(record),
        }
    }

    info!(
        "Stage 2: reconciling {} FR, {} NFR, {} decisions",
        fr.len(),
        nfr.len(),
        decisions.len()
    );

    let before = decisions.len();
    decisions.retain(|d| {
        let tentative = profile.is_tentative(&d.statement);
        if tentative {
            debug!("Dropping tentative decision: {}", d.statement);
        }
        !tentative
    });
    stats.tentative_dropped = before - decisions.len();

    let collapsed = collapse_decisions(decisions, profile);
    stats.superseded = collapsed.superseded;
    let mut governing = collapsed.by_topic;
    let mut ungrouped = collapsed.ungrouped;

    let candidates: Vec<&Requirement> = fr.iter().chain(nfr.iter()).collect();
    for decision in governing
        .iter_mut()
        .map(|(_, d)| d)
        .chain(ungrouped.iter_mut())
    {
        if let Some(statement) = rules.complete_statement(&decision.statement, &candidates) {
            debug!("Completed decision {:?} -> {:?}", decision.statement, statement);
            decision.statement = statement;
            stats.completed += 1;
        }
    }

    let mut out_of_scope = Vec::new();
    let mut kept_fr = Vec::new();
    for record in fr {
        let topic = profile.topic_of(&record.statement);
        let Some(decision) = governing_decision(&governing, topic) else {
            kept_fr.push(record);
            continue;
        };

        if rules.is_exclusion(&decision.statement) {
            debug!("Out of scope ({}): {}", topic, record.statement);
            out_of_scope.push(record);
        } else if let Some(rule) =
            rules.find_conflict(topic, &decision.statement, &record.statement)
        {
            debug!(
                "Dropping FR contradicting {} decision: {}",
                rule.topic, record.statement
            );
            stats.conflicts_dropped += 1;
        } else {
            kept_fr.push(record);
        }
    }

    let mut kept_nfr = Vec::new();
    for record in nfr {
        let topic = profile.topic_of(&record.statement);
        match governing_decision(&governing, topic) {
            Some(decision) if rules.is_exclusion(&decision.statement) => {
                debug!("Out of scope ({}): {}", topic, record.statement);
                out_of_scope.push(record);
            }
            _ => kept_nfr.push(record),
        }
    }
    stats.excluded = out_of_scope.len();

    let dec: Vec<Requirement> = governing
        .into_iter()
        .map(|(_, d)| d)
        .chain(ungrouped)
        .collect();

    let (mut fr, fr_dupes) = dedup(kept_fr);
    let (mut nfr, nfr_dupes) = dedup(kept_nfr);
    let (mut dec, dec_dupes) = dedup(dec);
    stats.duplicates_removed = fr_dupes + nfr_dupes + dec_dupes;

    // Stable: equal timestamps keep their collapsed order
    dec.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));

    assign_ids(&mut fr);
    assign_ids(&mut nfr);
    assign_ids(&mut dec);
    for record in &mut out_of_scope {
        record.id = None;
    }

    info!(
        "Stage 2: FR {}, NFR {}, DEC {}, out of scope {} ({:?})",
        fr.len(),
        nfr.len(),
        dec.len(),
        out_of_scope.len(),
        stats
    );

    Reconciled {
        fr,
        nfr,
        dec,
        out_of_scope,
        stats,
    }
}

struct Collapsed {
    /// One decision per topic, topics in first-seen order
    by_topic: Vec<(String, Requirement)>,
    /// Decisions under "その他", each kept
    ungrouped: Vec<Requirement>,
    superseded: usize,
}

/// Keep the latest decision per topic. Ties keep the first seen; an
/// unparsable timestamp loses to any parsable one.
fn collapse_decisions(decisions: Vec<Requirement>, profile: &Profile) -> Collapsed {
    let mut by_topic: Vec<(String, Requirement)> = Vec::new();
    let mut ungrouped = Vec::new();
    let mut superseded = 0;

    for decision in decisions {
        let topic = profile.topic_of(&decision.statement);
        if topic == OTHER {
            ungrouped.push(decision);
            continue;
        }

        match by_topic.iter_mut().find(|(t, _)| t == topic) {
            Some((_, current)) => {
                superseded += 1;
                if decision.timestamp() > current.timestamp() {
                    debug!(
                        "{}: {:?} supersedes {:?}",
                        topic, decision.statement, current.statement
                    );
                    *current = decision;
                }
            }
            None => by_topic.push((topic.to_string(), decision)),
        }
    }

    Collapsed {
        by_topic,
        ungrouped,
        superseded,
    }
}

fn governing_decision<'a>(
    governing: &'a [(String, Requirement)],
    topic: &str,
) -> Option<&'a Requirement> {
    governing
        .iter()
        .find(|(t, _)| t == topic)
        .map(|(_, decision)| decision)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::models::{Priority, Source, Status};
    use crate::rules::CompletionRule;

    fn record(category: Category, feature: &str, statement: &str, ts: &str) -> Requirement {
        let decision = category == Category::Decision;
        Requirement {
            id: None,
            feature: feature.to_string(),
            category,
            statement: statement.to_string(),
            acceptance_criteria: vec![],
            priority: if decision { Priority::Must } else { Priority::Should },
            status: if decision { Status::Decided } else { Status::UnderDiscussion },
            source: Source {
                speaker: "A".to_string(),
                timestamp: ts.to_string(),
            },
            rationale: String::new(),
            dependencies: vec![],
            supersedes: vec![],
            tags: BTreeSet::new(),
        }
    }

    fn dec(statement: &str, ts: &str) -> Requirement {
        record(Category::Decision, "通知", statement, ts)
    }

    fn fr(feature: &str, statement: &str) -> Requirement {
        record(Category::Functional, feature, statement, "2024-05-01T09:00:00")
    }

    fn statements(records: &[Requirement]) -> Vec<&str> {
        records.iter().map(|r| r.statement.as_str()).collect()
    }

    #[test]
    fn test_latest_decision_per_topic_wins() {
        let records = vec![
            dec("通知はメールで送る", "2024-05-01T10:00:00"),
            dec("通知はトーストで出す", "2024-05-01T11:00:00"),
        ];

        let out = execute_stage2(records, &Profile::default());

        assert_eq!(statements(&out.dec), vec!["通知はトーストで出す"]);
        assert_eq!(out.dec[0].id.as_deref(), Some("DEC-001"));
        assert_eq!(out.stats.superseded, 1);
    }

    #[test]
    fn test_offset_timestamps_compare_as_instants() {
        let records = vec![
            dec("通知はメールで送る", "2024-05-01T10:00:00+09:00"),
            dec("通知はトーストで出す", "2024-05-01T11:00:00+0900"),
            dec("通知は音も鳴らす", "2024-05-01T01:30:00Z"),
        ];

        let out = execute_stage2(records, &Profile::default());

        assert_eq!(statements(&out.dec), vec!["通知は音も鳴らす"]);
        assert_eq!(out.stats.superseded, 2);
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let records = vec![
            dec("通知はメールで送る", "2024-05-01T10:00:00"),
            dec("通知はトーストで出す", "2024-05-01T10:00:00"),
        ];

        let out = execute_stage2(records, &Profile::default());

        assert_eq!(statements(&out.dec), vec!["通知はメールで送る"]);
    }

    #[test]
    fn test_unparsable_timestamp_is_oldest() {
        let records = vec![
            dec("通知はメールで送る", "2024-05-01T10:00:00"),
            dec("通知はトーストで出す", "昨日の夕方"),
            dec("会議は週次で行う", "いつか"),
            dec("議事録は共有フォルダに置く", "2024-04-01"),
        ];

        let out = execute_stage2(records, &Profile::default());

        assert_eq!(
            statements(&out.dec),
            vec!["通知はメールで送る", "議事録は共有フォルダに置く", "会議は週次で行う"]
        );
    }

    #[test]
    fn test_tentative_decision_is_dropped_even_if_latest() {
        let records = vec![
            dec("通知はメールで送る", "2024-05-01T10:00:00"),
            dec("一旦、通知は保留とする", "2024-05-01T12:00:00"),
        ];

        let out = execute_stage2(records, &Profile::default());

        assert_eq!(statements(&out.dec), vec!["通知はメールで送る"]);
        assert_eq!(out.stats.tentative_dropped, 1);
    }

    #[test]
    fn test_other_topic_decisions_are_not_collapsed() {
        let records = vec![
            dec("会議は週次で行う", "2024-05-01T10:00:00"),
            dec("議事録は共有フォルダに置く", "2024-05-01T11:00:00"),
        ];

        let out = execute_stage2(records, &Profile::default());

        assert_eq!(out.dec.len(), 2);
        assert_eq!(out.stats.superseded, 0);
    }

    #[test]
    fn test_exclusion_moves_fr_and_nfr_out_of_scope() {
        let records = vec![
            fr("チュートリアル", "オンボーディングのチュートリアルを出す"),
            record(
                Category::Nonfunctional,
                "チュートリアル",
                "チュートリアル動画は軽量にする",
                "2024-05-01T09:30:00",
            ),
            fr("通知", "通知をメールで送る"),
            dec("チュートリアルは今回の範囲から除外", "2024-05-01T10:00:00"),
        ];

        let out = execute_stage2(records, &Profile::default());

        assert_eq!(
            statements(&out.out_of_scope),
            vec![
                "オンボーディングのチュートリアルを出す",
                "チュートリアル動画は軽量にする"
            ]
        );
        assert!(out.out_of_scope.iter().all(|r| r.id.is_none()));
        assert_eq!(statements(&out.fr), vec!["通知をメールで送る"]);
        assert!(out.nfr.is_empty());
        assert_eq!(out.stats.excluded, 2);
    }

    #[test]
    fn test_button_position_conflict_drops_fr() {
        let records = vec![
            fr("ボタン位置", "送信ボタンを右下に配置する"),
            fr("ボタン位置", "ボタンの色は青にする"),
            dec("ボタンは中央下に決定", "2024-05-01T10:00:00"),
        ];

        let out = execute_stage2(records, &Profile::default());

        assert_eq!(statements(&out.fr), vec!["ボタンの色は青にする"]);
        assert!(out.out_of_scope.is_empty());
        assert_eq!(out.stats.conflicts_dropped, 1);
    }

    #[test]
    fn test_conflict_keeps_nfr() {
        let records = vec![
            record(
                Category::Nonfunctional,
                "ボタン位置",
                "送信ボタンを右下に配置する",
                "2024-05-01T09:30:00",
            ),
            dec("ボタンは中央下に決定", "2024-05-01T10:00:00"),
        ];

        let out = execute_stage2(records, &Profile::default());

        assert_eq!(statements(&out.nfr), vec!["送信ボタンを右下に配置する"]);
        assert!(out.out_of_scope.is_empty());
        assert_eq!(out.stats.conflicts_dropped, 0);
    }

    #[test]
    fn test_exclusion_wins_over_conflict() {
        let records = vec![
            fr("ボタン位置", "送信ボタンを右下に配置する"),
            dec("ボタンは中央下に決定し、右下案は除外", "2024-05-01T10:00:00"),
        ];

        let out = execute_stage2(records, &Profile::default());

        assert!(out.fr.is_empty());
        assert_eq!(statements(&out.out_of_scope), vec!["送信ボタンを右下に配置する"]);
        assert_eq!(out.stats.excluded, 1);
        assert_eq!(out.stats.conflicts_dropped, 0);
    }

    #[test]
    fn test_completed_decision_drives_exclusion() {
        let records = vec![
            fr("文言", "エラーメッセージは赤字にする"),
            fr("文言", "エラーメッセージの多言語対応は範囲から除外"),
            dec("文言はそれで", "2024-05-01T10:00:00"),
        ];

        let out = execute_stage2(records, &Profile::default());

        assert!(out.fr.is_empty());
        assert_eq!(
            statements(&out.out_of_scope),
            vec![
                "エラーメッセージは赤字にする",
                "エラーメッセージの多言語対応は範囲から除外"
            ]
        );
        assert_eq!(out.stats.completed, 1);
        assert_eq!(out.stats.excluded, 2);
    }

    #[test]
    fn test_completed_decision_drives_conflict() {
        let mut profile = Profile::default();
        profile.reconcile_rules.completions.push(CompletionRule {
            starts_with: vec!["ボタンはそれで".to_string()],
            contains: vec![],
            reference_keywords: vec!["中央下".to_string()],
            rewrite_prefix: "ボタン位置を確定: ".to_string(),
        });
        let records = vec![
            fr("ボタン位置", "ボタンは中央下に寄せる"),
            fr("ボタン位置", "送信ボタンを右下に置く"),
            dec("ボタンはそれで", "2024-05-01T10:00:00"),
        ];

        let out = execute_stage2(records, &profile);

        assert_eq!(
            statements(&out.dec),
            vec!["ボタン位置を確定: ボタンは中央下に寄せる"]
        );
        assert_eq!(statements(&out.fr), vec!["ボタンは中央下に寄せる"]);
        assert_eq!(out.stats.conflicts_dropped, 1);
    }

    #[test]
    fn test_elliptical_decision_is_completed() {
        let records = vec![
            fr("文言", "エラーメッセージは「入力内容を確認してください」"),
            fr("文言", "エラーメッセージは「もう一度お試しください」"),
            dec("文言はそれで", "2024-05-01T10:00:00"),
        ];

        let out = execute_stage2(records, &Profile::default());

        assert_eq!(
            statements(&out.dec),
            vec!["エラーメッセージ文言を確定: エラーメッセージは「もう一度お試しください」"]
        );
        assert_eq!(out.stats.completed, 1);
    }

    #[test]
    fn test_dedup_ignores_punctuation_and_whitespace() {
        let records = vec![
            fr("通知", "通知をメールで送る"),
            fr("通知", "通知を メールで送る。"),
        ];

        let out = execute_stage2(records, &Profile::default());

        assert_eq!(out.fr.len(), 1);
        assert_eq!(out.fr[0].id.as_deref(), Some("FR-001"));
        assert_eq!(out.stats.duplicates_removed, 1);
    }

    #[test]
    fn test_empty_input() {
        let out = execute_stage2(Vec::new(), &Profile::default());

        assert_eq!(out, Reconciled::default());
    }
}
