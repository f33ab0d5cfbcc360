use payloads::{EntryStatus, TransactionType, requests};
use reqwest::StatusCode;
use rust_decimal::{Decimal, dec};

use test_helpers::{
    assert_status_code, debit_details, spawn_app, test_date, transfer_details,
};

#[tokio::test]
async fn credit_entry_is_auto_approved() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;

    let entry = app.fund_mode(&master, master.cash.id, dec!(1000)).await?;

    assert_eq!(entry.status, EntryStatus::Approved);
    assert_eq!(entry.transaction_type, TransactionType::Credit);
    assert!(entry.serial_number >= 1);
    assert_eq!(entry.opening_balance, Some(Decimal::ZERO));
    assert_eq!(entry.current_balance, Some(dec!(1000)));
    assert!(entry.approved_at.is_some());
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(1000));

    Ok(())
}

#[tokio::test]
async fn debit_entry_starts_pending() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    app.fund_mode(&master, master.cash.id, dec!(1000)).await?;

    let entry = app
        .client
        .create_entry(&debit_details(&master, dec!(200), dec!(50)))
        .await?;

    assert_eq!(entry.status, EntryStatus::Pending);
    assert_eq!(entry.payment_amount, Some(dec!(250)));
    assert_eq!(entry.opening_balance, None);
    assert_eq!(entry.approved_by, None);
    // pending debits don't move money
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(1000));

    Ok(())
}

#[tokio::test]
async fn non_expense_debit_forces_expense_to_zero() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;

    let entry = app
        .client
        .create_entry(&requests::CreateEntry::Debit(requests::CreateDebit {
            transaction_date: test_date(),
            description: "advance settlement".into(),
            expense_amount: dec!(900),
            claimable_amount: dec!(150),
            party_id: master.party.id,
            head_id: master.head.id,
            payment_type_id: master.non_expense_type.id,
            payment_mode_id: master.cash.id,
        }))
        .await?;

    assert_eq!(entry.expense_amount, Some(Decimal::ZERO));
    assert_eq!(entry.claimable_amount, Some(dec!(150)));
    assert_eq!(entry.payment_amount, Some(dec!(150)));

    Ok(())
}

#[tokio::test]
async fn self_transfer_moves_money_immediately() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    app.fund_mode(&master, master.cash.id, dec!(1000)).await?;

    let entry = app
        .client
        .create_entry(&transfer_details(&master, dec!(400)))
        .await?;

    assert_eq!(entry.status, EntryStatus::Approved);
    // snapshot is of the source mode
    assert_eq!(entry.opening_balance, Some(dec!(1000)));
    assert_eq!(entry.current_balance, Some(dec!(600)));
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(600));
    assert_eq!(app.mode_balance(master.bank.id).await?, dec!(400));

    Ok(())
}

#[tokio::test]
async fn transfer_within_one_mode_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;

    let result = app
        .client
        .create_entry(&requests::CreateEntry::SelfTransfer(
            requests::CreateSelfTransfer {
                transaction_date: test_date(),
                description: "no-op move".into(),
                transfer_amount: dec!(100),
                from_payment_mode_id: master.cash.id,
                to_payment_mode_id: master.cash.id,
            },
        ))
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn nonpositive_credit_amount_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;

    let result = app
        .client
        .create_entry(&requests::CreateEntry::Credit(requests::CreateCredit {
            transaction_date: test_date(),
            description: "empty credit".into(),
            received_amount: Decimal::ZERO,
            party_id: master.party.id,
            head_id: master.head.id,
            payment_type_id: master.expense_type.id,
            payment_mode_id: master.cash.id,
        }))
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn unknown_party_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;

    let result = app
        .client
        .create_entry(&requests::CreateEntry::Credit(requests::CreateCredit {
            transaction_date: test_date(),
            description: "orphan credit".into(),
            received_amount: dec!(10),
            party_id: payloads::PartyId(uuid::Uuid::new_v4()),
            head_id: master.head.id,
            payment_type_id: master.expense_type.id,
            payment_mode_id: master.cash.id,
        }))
        .await;
    assert_status_code(result, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn list_entries_filters_and_paginates() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    app.fund_mode(&master, master.cash.id, dec!(1000)).await?;
    app.client
        .create_entry(&debit_details(&master, dec!(200), dec!(0)))
        .await?;
    app.client
        .create_entry(&transfer_details(&master, dec!(100)))
        .await?;

    let all = app.client.list_entries(&Default::default()).await?;
    assert_eq!(all.total_count, 3);
    // newest first
    assert_eq!(
        all.entries[0].transaction_type,
        TransactionType::SelfTransfer
    );

    let pending = app
        .client
        .list_entries(&requests::ListEntries {
            status: Some(EntryStatus::Pending),
            ..Default::default()
        })
        .await?;
    assert_eq!(pending.total_count, 1);
    assert_eq!(pending.entries[0].transaction_type, TransactionType::Debit);

    let searched = app
        .client
        .list_entries(&requests::ListEntries {
            search: Some("stationery".into()),
            ..Default::default()
        })
        .await?;
    assert_eq!(searched.total_count, 1);

    let page2 = app
        .client
        .list_entries(&requests::ListEntries {
            page: Some(2),
            per_page: Some(1),
            ..Default::default()
        })
        .await?;
    assert_eq!(page2.total_count, 3);
    assert_eq!(page2.entries.len(), 1);
    assert_eq!(page2.page, 2);

    Ok(())
}

#[tokio::test]
async fn deleted_entries_hidden_unless_requested() -> anyhow::Result<()> {
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
            reason: "duplicate entry".into(),
        })
        .await?;

    let visible = app.client.list_entries(&Default::default()).await?;
    assert_eq!(visible.total_count, 0);

    let with_deleted = app
        .client
        .list_entries(&requests::ListEntries {
            include_deleted: Some(true),
            ..Default::default()
        })
        .await?;
    assert_eq!(with_deleted.total_count, 1);
    assert!(with_deleted.entries[0].is_deleted);

    Ok(())
}

#[tokio::test]
async fn delete_reverses_approved_entry() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    let master = app.setup_master_data().await?;
    let entry = app.fund_mode(&master, master.cash.id, dec!(1000)).await?;
    assert_eq!(app.mode_balance(master.cash.id).await?, dec!(1000));

    let deleted = app
        .client
        .delete_entry(&requests::DeleteEntry {
            entry_id: entry.entry_id,
            reason: "entered against the wrong mode".into(),
        })
        .await?;

    assert!(deleted.is_deleted);
    assert!(deleted.deleted_at.is_some());
    assert_eq!(
        deleted.deleted_reason.as_deref(),
        Some("entered against the wrong mode")
    );
    assert_eq!(app.mode_balance(master.cash.id).await?, Decimal::ZERO);

    // a deleted entry can't be deleted again
    let result = app
        .client
        .delete_entry(&requests::DeleteEntry {
            entry_id: entry.entry_id,
            reason: "again".into(),
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn delete_requires_reason_and_approver() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;
    app.create_bob_employee().await?;
    let master = app.setup_master_data().await?;
    let entry = app
        .client
        .create_entry(&debit_details(&master, dec!(200), dec!(0)))
        .await?;

    let result = app
        .client
        .delete_entry(&requests::DeleteEntry {
            entry_id: entry.entry_id,
            reason: "   ".into(),
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    app.login_bob().await?;
    let result = app
        .client
        .delete_entry(&requests::DeleteEntry {
            entry_id: entry.entry_id,
            reason: "not allowed".into(),
        })
        .await;
    assert_status_code(result, StatusCode::UNAUTHORIZED);

    Ok(())
}
