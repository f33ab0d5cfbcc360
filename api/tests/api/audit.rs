use payloads::{
    AuditAction, DebitChanges, EntryChanges, requests,
    requests::DecisionAction,
};
use rust_decimal::dec;

use test_helpers::{debit_details, spawn_app};

#[tokio::test]
async fn auto_approved_credit_records_creation_and_approval()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;

    let entry = app.fund_mode(&master, master.cash.id, dec!(1000)).await?;
    let fetched = app.client.get_entry(&entry.entry_id).await?;

    let actions: Vec<AuditAction> =
        fetched.audit_log.iter().map(|l| l.action).collect();
    assert_eq!(actions, vec![AuditAction::Created, AuditAction::Approved]);
    for log in &fetched.audit_log {
        assert_eq!(log.performed_by.username, "alice");
        assert_eq!(log.entry_id, entry.entry_id);
    }

    Ok(())
}

#[tokio::test]
async fn debit_lifecycle_is_fully_recorded() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    app.fund_mode(&master, master.cash.id, dec!(1000)).await?;
    let entry = app
        .client
        .create_entry(&debit_details(&master, dec!(200), dec!(0)))
        .await?;

    app.time_source.advance(jiff::Span::new().hours(1));
    app.client
        .decide_entry(&requests::DecideEntry {
            entry_id: entry.entry_id,
            action: DecisionAction::Approve,
            rejection_reason: None,
        })
        .await?;
    app.time_source.advance(jiff::Span::new().hours(1));
    app.client
        .undo_decision(&requests::UndoDecision {
            entry_id: entry.entry_id,
        })
        .await?;
    app.time_source.advance(jiff::Span::new().hours(1));
    app.client
        .decide_entry(&requests::DecideEntry {
            entry_id: entry.entry_id,
            action: DecisionAction::Reject,
            rejection_reason: Some("no supporting document".into()),
        })
        .await?;

    let fetched = app.client.get_entry(&entry.entry_id).await?;
    let actions: Vec<AuditAction> =
        fetched.audit_log.iter().map(|l| l.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::Created,
            AuditAction::Approved,
            AuditAction::Updated,
            AuditAction::Rejected,
        ]
    );
    let times: Vec<_> =
        fetched.audit_log.iter().map(|l| l.performed_at).collect();
    assert!(times.windows(2).all(|w| w[0] < w[1]));

    let rejection = fetched.audit_log.last().unwrap();
    assert_eq!(
        rejection.reason.as_deref(),
        Some("no supporting document")
    );

    Ok(())
}

#[tokio::test]
async fn edit_request_log_carries_the_proposed_changes()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    app.fund_mode(&master, master.cash.id, dec!(1000)).await?;
    let entry = app
        .client
        .create_entry(&debit_details(&master, dec!(200), dec!(0)))
        .await?;
    app.client
        .decide_entry(&requests::DecideEntry {
            entry_id: entry.entry_id,
            action: DecisionAction::Approve,
            rejection_reason: None,
        })
        .await?;

    let changes = EntryChanges::Debit(DebitChanges {
        expense_amount: Some(dec!(120)),
        ..Default::default()
    });
    app.client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "overcharged".into(),
            changes: changes.clone(),
        })
        .await?;

    let fetched = app.client.get_entry(&entry.entry_id).await?;
    let requested = fetched
        .audit_log
        .iter()
        .find(|l| l.action == AuditAction::EditRequested)
        .unwrap();
    assert_eq!(
        requested.new_data,
        Some(serde_json::to_value(&changes)?)
    );
    assert_eq!(requested.reason.as_deref(), Some("overcharged"));
    // the pre-request entry state rides along for comparison
    assert!(requested.previous_data.is_some());

    Ok(())
}

#[tokio::test]
async fn deletion_log_carries_the_reason() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    let entry = app
        .client
        .create_entry(&debit_details(&master, dec!(200), dec!(0)))
        .await?;

    app.client
        .delete_entry(&requests::DeleteEntry {
            entry_id: entry.entry_id,
            reason: "entered in the wrong ledger".into(),
        })
        .await?;

    let fetched = app.client.get_entry(&entry.entry_id).await?;
    let deleted = fetched.audit_log.last().unwrap();
    assert_eq!(deleted.action, AuditAction::Deleted);
    assert_eq!(
        deleted.reason.as_deref(),
        Some("entered in the wrong ledger")
    );

    Ok(())
}

#[tokio::test]
async fn trail_identifies_each_actor() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    app.create_bob_employee().await?;
    let master = app.setup_master_data().await?;
    app.fund_mode(&master, master.cash.id, dec!(1000)).await?;

    app.login_bob().await?;
    let entry = app
        .client
        .create_entry(&debit_details(&master, dec!(200), dec!(0)))
        .await?;
    app.login_alice().await?;
    app.client
        .decide_entry(&requests::DecideEntry {
            entry_id: entry.entry_id,
            action: DecisionAction::Approve,
            rejection_reason: None,
        })
        .await?;

    let fetched = app.client.get_entry(&entry.entry_id).await?;
    assert_eq!(fetched.audit_log[0].performed_by.username, "bob");
    assert_eq!(fetched.audit_log[1].performed_by.username, "alice");
    assert_eq!(fetched.entry.created_by.username, "bob");
    assert_eq!(
        fetched.entry.approved_by.map(|u| u.username),
        Some("alice".to_string())
    );

    Ok(())
}
