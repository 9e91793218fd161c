use labnote_core::RecordPatch;
use labnote_harness::TestNotebook;

#[test]
fn sync_picks_up_another_sessions_create() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestNotebook::sqlite()?;
    t.notebook.create()?;
    let mut other = t.second_session()?;
    assert_eq!(other.records().len(), 1);

    let remote = other.create()?;
    assert_eq!(t.notebook.records().len(), 1);

    assert!(t.notebook.sync()?);
    assert_eq!(t.notebook.records().len(), 2);
    assert_eq!(t.notebook.records()[0].id, remote.id);
    assert!(!t.notebook.sync()?);
    Ok(())
}

#[test]
fn own_writes_do_not_count_as_external_changes() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestNotebook::sqlite()?;
    let record = t.notebook.create()?;
    t.notebook.update(record.id, RecordPatch::observations("mine"))?;
    assert!(!t.notebook.sync()?);
    Ok(())
}

#[test]
fn stale_session_gets_the_next_free_sequence() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestNotebook::sqlite()?;
    t.notebook.create()?;
    let mut other = t.second_session()?;
    let theirs = other.create()?;
    assert_eq!(theirs.sequence_number, 2);

    // this session still believes the highest number is 1
    let ours = t.notebook.create()?;
    assert_eq!(ours.sequence_number, 3);

    let mut seqs: Vec<i64> = t.notebook.records().iter().map(|r| r.sequence_number).collect();
    seqs.sort_unstable();
    assert_eq!(seqs, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn remote_delete_reaches_this_session() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestNotebook::sqlite()?;
    let kept = t.notebook.create()?;
    let doomed = t.notebook.create()?;
    let mut other = t.second_session()?;

    other.delete(doomed.id)?;
    assert!(t.notebook.sync()?);
    let ids: Vec<_> = t.notebook.records().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![kept.id]);

    // the deletion buffer belongs to the session that deleted
    assert_eq!(t.notebook.undo_depth(), 0);
    assert_eq!(other.undo_depth(), 1);
    Ok(())
}

#[test]
fn update_to_a_record_removed_elsewhere_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestNotebook::sqlite()?;
    let record = t.notebook.create()?;
    let mut other = t.second_session()?;
    other.delete(record.id)?;

    let err = t
        .notebook
        .update(record.id, RecordPatch::observations("too late"))
        .unwrap_err();
    assert!(err.to_string().contains("not found"));
    // the reload after the failure shows the record is gone
    assert!(t.notebook.records().is_empty());
    Ok(())
}
