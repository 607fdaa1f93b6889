//! Coalescing queued intents into one transmission per record.

use std::collections::HashMap;

use crate::models::{ChangeAction, ChangeIntent, HabitId};

/// The single remote call a record needs after coalescing its intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    pub habit_id: HabitId,
    pub action: ChangeAction,
    /// Queue entries this change accounts for, oldest first.
    pub queue_ids: Vec<i64>,
    /// Highest retry count among the covered entries.
    pub retry_count: u32,
}

impl PlannedChange {
    /// Newest queue entry covered; later entries were enqueued after the drain.
    pub fn through_queue_id(&self) -> i64 {
        self.queue_ids.iter().copied().max().unwrap_or_default()
    }
}

/// Collapse intents so each record is transmitted at most once per pass.
///
/// Records keep the order of their first queued intent. A delete supersedes
/// everything queued before or after it; otherwise the newest create/update
/// wins, since both upload the current snapshot.
pub fn coalesce(intents: &[ChangeIntent]) -> Vec<PlannedChange> {
    let mut planned: Vec<PlannedChange> = Vec::new();
    let mut index: HashMap<&HabitId, usize> = HashMap::new();

    for intent in intents {
        if let Some(&slot) = index.get(&intent.habit_id) {
            let change = &mut planned[slot];
            if change.action != ChangeAction::Delete {
                change.action = intent.action;
            }
            change.queue_ids.push(intent.queue_id);
            change.retry_count = change.retry_count.max(intent.retry_count);
        } else {
            index.insert(&intent.habit_id, planned.len());
            planned.push(PlannedChange {
                habit_id: intent.habit_id.clone(),
                action: intent.action,
                queue_ids: vec![intent.queue_id],
                retry_count: intent.retry_count,
            });
        }
    }

    planned
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn intent(queue_id: i64, habit_id: &HabitId, action: ChangeAction) -> ChangeIntent {
        ChangeIntent {
            queue_id,
            habit_id: habit_id.clone(),
            action,
            enqueued_at: queue_id,
            retry_count: 0,
        }
    }

    #[test]
    fn one_change_per_record_in_first_seen_order() {
        let a = HabitId::new();
        let b = HabitId::new();
        let plan = coalesce(&[
            intent(1, &a, ChangeAction::Create),
            intent(2, &b, ChangeAction::Create),
            intent(3, &a, ChangeAction::Update),
        ]);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].habit_id, a);
        assert_eq!(plan[0].action, ChangeAction::Update);
        assert_eq!(plan[0].queue_ids, vec![1, 3]);
        assert_eq!(plan[0].through_queue_id(), 3);
        assert_eq!(plan[1].habit_id, b);
        assert_eq!(plan[1].action, ChangeAction::Create);
    }

    #[test]
    fn delete_dominates_later_updates() {
        let a = HabitId::new();
        let plan = coalesce(&[
            intent(1, &a, ChangeAction::Create),
            intent(2, &a, ChangeAction::Delete),
            intent(3, &a, ChangeAction::Update),
        ]);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].action, ChangeAction::Delete);
        assert_eq!(plan[0].queue_ids, vec![1, 2, 3]);
    }

    #[test]
    fn tracks_highest_retry_count() {
        let a = HabitId::new();
        let mut first = intent(1, &a, ChangeAction::Create);
        first.retry_count = 4;
        let plan = coalesce(&[first, intent(2, &a, ChangeAction::Update)]);
        assert_eq!(plan[0].retry_count, 4);
    }

    #[test]
    fn empty_queue_plans_nothing() {
        assert!(coalesce(&[]).is_empty());
    }
}
