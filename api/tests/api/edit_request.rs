use payloads::{
    CreditChanges, DebitChanges, EditRequestStatus, EntryChanges,
    TransferChanges, requests, requests::DecisionAction,
};
use reqwest::StatusCode;
use rust_decimal::dec;

use test_helpers::{
    MasterData, TestApp, assert_status_code, debit_details, spawn_app,
    transfer_details,
};

fn amount_edit(expense: rust_decimal::Decimal) -> EntryChanges {
    EntryChanges::Debit(DebitChanges {
        expense_amount: Some(expense),
        ..Default::default()
    })
}

/// Create a debit as bob and approve it as carol, leaving carol logged
/// in. Returns the approved entry.
async fn approved_debit(
    app: &TestApp,
    master: &MasterData,
) -> anyhow::Result<payloads::responses::Entry> {
    app.login_bob().await?;
    let entry = app
        .client
        .create_entry(&debit_details(master, dec!(200), dec!(50)))
        .await?;
    app.login_carol().await?;
    let approved = app
        .client
        .decide_entry(&requests::DecideEntry {
            entry_id: entry.entry_id,
            action: DecisionAction::Approve,
            rejection_reason: None,
        })
        .await?;
    Ok(approved)
}

#[tokio::test]
async fn approved_amount_edit_reapplies_the_balance() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    app.create_bob_employee().await?;
    app.create_carol_finance_head().await?;
    let master = app.setup_master_data().await?;
    app.fund_mode(&master, master.cash.id, dec!(1000)).await?;

    let entry = approved_debit(&app, &master).await?;
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(750));

    // bob asks to shrink the expense from 200 to 100
    app.login_bob().await?;
    let requested = app
        .client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "supplier issued a partial refund".into(),
            changes: amount_edit(dec!(100)),
        })
        .await?;
    assert_eq!(
        requested.edit_request_status,
        Some(EditRequestStatus::Pending)
    );
    assert_eq!(requested.edit_request_data, Some(amount_edit(dec!(100))));
    assert_eq!(requested.edit_count, 0);
    // nothing moves until the request is decided
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(750));

    app.login_carol().await?;
    let edited = app
        .client
        .approve_edit(&requests::ApproveEdit {
            entry_id: entry.entry_id,
            reason: "refund note attached".into(),
        })
        .await?;

    assert_eq!(edited.expense_amount, Some(dec!(100)));
    assert_eq!(edited.claimable_amount, Some(dec!(50)));
    assert_eq!(edited.payment_amount, Some(dec!(150)));
    assert_eq!(
        edited.edit_request_status,
        Some(EditRequestStatus::Approved)
    );
    assert_eq!(edited.edit_count, 1);
    // snapshot refreshed from the re-application
    assert_eq!(edited.opening_balance, Some(dec!(1000)));
    assert_eq!(edited.current_balance, Some(dec!(850)));
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(850));

    Ok(())
}

#[tokio::test]
async fn pending_entries_cannot_take_edit_requests() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    let entry = app
        .client
        .create_entry(&debit_details(&master, dec!(200), dec!(0)))
        .await?;

    let result = app
        .client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "typo".into(),
            changes: amount_edit(dec!(100)),
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn only_one_edit_request_at_a_time() -> anyhow::Result<()> {
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

    app.client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "wrong amount".into(),
            changes: amount_edit(dec!(150)),
        })
        .await?;

    let result = app
        .client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "also the date".into(),
            changes: amount_edit(dec!(120)),
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn description_edit_keeps_the_balance_snapshot() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    app.fund_mode(&master, master.cash.id, dec!(1000)).await?;
    let entry = app
        .client
        .create_entry(&transfer_details(&master, dec!(400)))
        .await?;

    app.client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "clarify what this deposit was".into(),
            changes: EntryChanges::SelfTransfer(TransferChanges {
                description: Some("cash deposit, June float".into()),
                ..Default::default()
            }),
        })
        .await?;
    let edited = app
        .client
        .approve_edit(&requests::ApproveEdit {
            entry_id: entry.entry_id,
            reason: "fine".into(),
        })
        .await?;

    assert_eq!(edited.description, "cash deposit, June float");
    assert_eq!(edited.opening_balance, entry.opening_balance);
    assert_eq!(edited.current_balance, entry.current_balance);
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(600));
    assert_eq!(app.mode_balance(master.bank.id).await?, dec!(400));

    Ok(())
}

#[tokio::test]
async fn rejected_edit_keeps_the_entry_and_allows_retry()
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

    app.client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "should be less".into(),
            changes: amount_edit(dec!(50)),
        })
        .await?;
    let rejected = app
        .client
        .reject_edit(&requests::RejectEdit {
            entry_id: entry.entry_id,
            reason: "invoice says 200".into(),
        })
        .await?;

    assert_eq!(
        rejected.edit_request_status,
        Some(EditRequestStatus::Rejected)
    );
    assert_eq!(
        rejected.edit_approval_reason.as_deref(),
        Some("invoice says 200")
    );
    assert_eq!(rejected.expense_amount, Some(dec!(200)));
    assert_eq!(rejected.edit_count, 0);
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(800));

    // a decided request no longer blocks a new one
    let again = app
        .client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "second attempt with the credit note".into(),
            changes: amount_edit(dec!(150)),
        })
        .await?;
    assert_eq!(
        again.edit_request_status,
        Some(EditRequestStatus::Pending)
    );

    Ok(())
}

#[tokio::test]
async fn edits_stop_after_the_limit() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    app.fund_mode(&master, master.cash.id, dec!(1000)).await?;
    let entry = app
        .client
        .create_entry(&debit_details(&master, dec!(100), dec!(0)))
        .await?;
    app.client
        .decide_entry(&requests::DecideEntry {
            entry_id: entry.entry_id,
            action: DecisionAction::Approve,
            rejection_reason: None,
        })
        .await?;

    for i in 1..=5 {
        app.client
            .request_edit(&requests::RequestEdit {
                entry_id: entry.entry_id,
                reason: format!("correction {i}"),
                changes: amount_edit(dec!(100) + rust_decimal::Decimal::from(i)),
            })
            .await?;
        let edited = app
            .client
            .approve_edit(&requests::ApproveEdit {
                entry_id: entry.entry_id,
                reason: format!("accepted correction {i}"),
            })
            .await?;
        assert_eq!(edited.edit_count, i);
    }

    let result = app
        .client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "one more".into(),
            changes: amount_edit(dec!(99)),
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn changes_must_match_the_entry_type() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    let entry = app.fund_mode(&master, master.cash.id, dec!(500)).await?;

    let result = app
        .client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "wrong amount".into(),
            changes: amount_edit(dec!(100)),
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn empty_change_sets_are_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    let entry = app.fund_mode(&master, master.cash.id, dec!(500)).await?;

    let result = app
        .client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "nothing really".into(),
            changes: EntryChanges::Credit(CreditChanges::default()),
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn employees_can_only_edit_their_own_entries() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    app.create_bob_employee().await?;
    let master = app.setup_master_data().await?;
    app.fund_mode(&master, master.cash.id, dec!(1000)).await?;
    // alice creates and approves her own debit
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

    app.login_bob().await?;
    let result = app
        .client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "not mine but still".into(),
            changes: amount_edit(dec!(100)),
        })
        .await;
    assert_status_code(result, StatusCode::UNAUTHORIZED);

    // approving is approver-only too
    let result = app
        .client
        .approve_edit(&requests::ApproveEdit {
            entry_id: entry.entry_id,
            reason: "go ahead".into(),
        })
        .await;
    assert_status_code(result, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn payment_type_change_edit_recomputes_the_balance()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    app.fund_mode(&master, master.cash.id, dec!(2000)).await?;
    let entry = app
        .client
        .create_entry(&debit_details(&master, dec!(1000), dec!(100)))
        .await?;
    app.client
        .decide_entry(&requests::DecideEntry {
            entry_id: entry.entry_id,
            action: DecisionAction::Approve,
            rejection_reason: None,
        })
        .await?;
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(900));

    // switching to a non-expense type drops the expense component
    app.client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "this was an advance, not an expense".into(),
            changes: EntryChanges::Debit(DebitChanges {
                payment_type_id: Some(master.non_expense_type.id),
                ..Default::default()
            }),
        })
        .await?;
    let edited = app
        .client
        .approve_edit(&requests::ApproveEdit {
            entry_id: entry.entry_id,
            reason: "reclassified".into(),
        })
        .await?;

    assert_eq!(edited.expense_amount, Some(rust_decimal::Decimal::ZERO));
    assert_eq!(edited.claimable_amount, Some(dec!(100)));
    assert_eq!(edited.payment_amount, Some(dec!(100)));
    // the old 1100 delta is unwound and the new 100 applied
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(1900));
    assert_eq!(edited.current_balance, Some(dec!(1900)));

    Ok(())
}

#[tokio::test]
async fn undo_is_blocked_while_an_edit_request_is_pending()
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
    app.client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "amount under review".into(),
            changes: amount_edit(dec!(100)),
        })
        .await?;

    let result = app
        .client
        .undo_decision(&requests::UndoDecision {
            entry_id: entry.entry_id,
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(800));

    // deciding the request unblocks the undo
    app.client
        .reject_edit(&requests::RejectEdit {
            entry_id: entry.entry_id,
            reason: "keep the original amount".into(),
        })
        .await?;
    app.client
        .undo_decision(&requests::UndoDecision {
            entry_id: entry.entry_id,
        })
        .await?;
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(1000));

    Ok(())
}

#[tokio::test]
async fn mode_change_edit_moves_the_balance_between_modes()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    app.fund_mode(&master, master.cash.id, dec!(1000)).await?;
    app.fund_mode(&master, master.bank.id, dec!(500)).await?;
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
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(800));

    app.client
        .request_edit(&requests::RequestEdit {
            entry_id: entry.entry_id,
            reason: "was actually paid from the bank".into(),
            changes: EntryChanges::Debit(DebitChanges {
                payment_mode_id: Some(master.bank.id),
                ..Default::default()
            }),
        })
        .await?;
    let edited = app
        .client
        .approve_edit(&requests::ApproveEdit {
            entry_id: entry.entry_id,
            reason: "bank statement confirms".into(),
        })
        .await?;

    assert_eq!(
        edited.payment_mode.map(|m| m.id),
        Some(master.bank.id)
    );
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(1000));
    assert_eq!(app.mode_balance(master.bank.id).await?, dec!(300));
    // snapshot now reflects the bank mode
    assert_eq!(edited.opening_balance, Some(dec!(500)));
    assert_eq!(edited.current_balance, Some(dec!(300)));

    Ok(())
}
