use proptest::prelude::*;

use labnote_harness::TestNotebook;

#[derive(Debug, Clone)]
enum Action {
    Create,
    Duplicate(usize),
    Delete(usize),
    Undo,
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => Just(Action::Create),
        2 => any::<usize>().prop_map(Action::Duplicate),
        2 => any::<usize>().prop_map(Action::Delete),
        1 => Just(Action::Undo),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn new_records_always_number_above_survivors(actions in prop::collection::vec(action(), 1..24)) {
        let mut t = TestNotebook::sqlite().map_err(|e| TestCaseError::fail(e.to_string()))?;

        for action in actions {
            let highest = t.notebook.records().iter().map(|r| r.sequence_number).max().unwrap_or(0);
            let len = t.notebook.records().len();
            let created = match action {
                Action::Create => Some(t.notebook.create()),
                Action::Duplicate(i) if len > 0 => {
                    let id = t.notebook.records()[i % len].id;
                    Some(t.notebook.duplicate(id))
                }
                Action::Delete(i) if len > 0 => {
                    let id = t.notebook.records()[i % len].id;
                    t.notebook.delete(id).map_err(|e| TestCaseError::fail(e.to_string()))?;
                    prop_assert_eq!(t.notebook.records().len(), len - 1);
                    None
                }
                Action::Undo => t.notebook.undo_delete().transpose(),
                _ => None,
            };

            if let Some(result) = created {
                let record = result.map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(record.sequence_number, highest + 1);
                prop_assert_eq!(t.notebook.records().len(), len + 1);
            }

            let mut seqs: Vec<i64> = t.notebook.records().iter().map(|r| r.sequence_number).collect();
            seqs.sort_unstable();
            seqs.dedup();
            prop_assert_eq!(seqs.len(), t.notebook.records().len());
        }
    }
}
