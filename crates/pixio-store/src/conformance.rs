//! Behavioral checks shared by every `Store` implementation.

use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use pixio_core::{Account, LedgerEntry, OneTimeCode, Plan, Tool, UsageRecord, UsageStatus};

use crate::{DailyCap, Store, StoreError};

fn funded_account<S: Store + ?Sized>(store: &S, credits: i64) -> Account {
    let account = Account::new(
        "Test",
        &format!("{}@example.com", pixio_core::AccountId::generate()),
        None,
        credits,
    );
    store.create_account(&account).unwrap();
    account
}

fn purchase(account: &Account, payment_id: &str) -> LedgerEntry {
    LedgerEntry::settled(
        account.id,
        Plan::Basic,
        Plan::Basic.price_minor(),
        "INR",
        Plan::Basic.credits(),
        format!("order_{payment_id}"),
        payment_id,
        Utc::now(),
    )
}

pub(crate) fn run_all<S: Store>(store: &S) {
    account_lookup(store);
    duplicate_email_rejected(store);
    settlement_credits_once(store);
    negative_amounts_rejected(store);
    daily_cap_enforced(store);
    ledger_lists_newest_first(store);
    usage_debits_conditionally(store);
    failed_usage_charges_nothing(store);
    otp_replaced_and_verified(store);
}

fn account_lookup<S: Store>(store: &S) {
    let account = Account::new("Ada", "Ada.Lovelace@Example.com", None, 5);
    store.create_account(&account).unwrap();

    let by_id = store.get_account(&account.id).unwrap().unwrap();
    assert_eq!(by_id.credit_balance, 5);

    let by_email = store
        .get_account_by_email("ADA.LOVELACE@example.com")
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, account.id);

    assert!(store.get_account_by_email("nobody@example.com").unwrap().is_none());
    assert!(store
        .get_account(&pixio_core::AccountId::generate())
        .unwrap()
        .is_none());
}

fn duplicate_email_rejected<S: Store>(store: &S) {
    let first = Account::new("One", "dup@example.com", None, 0);
    store.create_account(&first).unwrap();

    let second = Account::new("Two", "DUP@example.com", None, 0);
    assert!(matches!(
        store.create_account(&second),
        Err(StoreError::EmailTaken)
    ));
    assert!(store.get_account(&second.id).unwrap().is_none());
}

fn settlement_credits_once<S: Store>(store: &S) {
    let account = funded_account(store, 5);
    let entry = purchase(&account, "pay_once");

    let balance = store.settle_purchase(&entry, None).unwrap();
    assert_eq!(balance, 105);
    assert!(store.has_settled_payment("pay_once").unwrap());

    let mut replay = purchase(&account, "pay_once");
    replay.credits = 500;
    assert!(matches!(
        store.settle_purchase(&replay, None),
        Err(StoreError::DuplicatePayment { payment_id }) if payment_id == "pay_once"
    ));

    let account = store.get_account(&account.id).unwrap().unwrap();
    assert_eq!(account.credit_balance, 105);
    assert_eq!(store.list_ledger_entries(&account.id).unwrap().len(), 1);

    let ghost = Account::new("Ghost", "ghost@example.com", None, 0);
    assert!(matches!(
        store.settle_purchase(&purchase(&ghost, "pay_ghost"), None),
        Err(StoreError::NotFound)
    ));
}

fn negative_amounts_rejected<S: Store>(store: &S) {
    let account = funded_account(store, 5);

    let mut refund = purchase(&account, "pay_negative");
    refund.credits = -10;
    assert!(matches!(
        store.settle_purchase(&refund, None),
        Err(StoreError::InvalidAmount { amount: -10 })
    ));
    assert!(!store.has_settled_payment("pay_negative").unwrap());

    let mut credit = UsageRecord::succeeded(account.id, Tool::Generate, 1, None);
    credit.credits_charged = -3;
    assert!(matches!(
        store.commit_usage(&credit),
        Err(StoreError::InvalidAmount { amount: -3 })
    ));

    let account = store.get_account(&account.id).unwrap().unwrap();
    assert_eq!(account.credit_balance, 5);
    assert!(store.list_ledger_entries(&account.id).unwrap().is_empty());
    assert!(store.list_usage(&account.id).unwrap().is_empty());
}

fn daily_cap_enforced<S: Store>(store: &S) {
    let account = funded_account(store, 0);
    let cap = DailyCap {
        limit: 1,
        since: Utc::now() - Duration::hours(1),
    };

    store
        .settle_purchase(&purchase(&account, "pay_cap_1"), Some(cap))
        .unwrap();
    assert_eq!(store.count_settled_since(&account.id, cap.since).unwrap(), 1);

    assert!(matches!(
        store.settle_purchase(&purchase(&account, "pay_cap_2"), Some(cap)),
        Err(StoreError::DailyCapReached { limit: 1 })
    ));
    assert!(!store.has_settled_payment("pay_cap_2").unwrap());

    // Entries before the window do not count.
    let tomorrow = Utc::now() + Duration::days(1);
    assert_eq!(store.count_settled_since(&account.id, tomorrow).unwrap(), 0);
}

fn ledger_lists_newest_first<S: Store>(store: &S) {
    let account = funded_account(store, 0);

    store
        .settle_purchase(&purchase(&account, "pay_order_1"), None)
        .unwrap();
    thread::sleep(StdDuration::from_millis(2));
    store
        .settle_purchase(&purchase(&account, "pay_order_2"), None)
        .unwrap();

    let entries = store.list_ledger_entries(&account.id).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].payment_id.as_deref(), Some("pay_order_2"));
    assert_eq!(entries[1].payment_id.as_deref(), Some("pay_order_1"));
}

fn usage_debits_conditionally<S: Store>(store: &S) {
    let account = funded_account(store, 1);

    let first = UsageRecord::succeeded(account.id, Tool::Generate, 1, Some("cat".into()));
    assert_eq!(store.commit_usage(&first).unwrap(), 0);

    let second = UsageRecord::succeeded(account.id, Tool::Generate, 1, None);
    assert!(matches!(
        store.commit_usage(&second),
        Err(StoreError::InsufficientCredits {
            balance: 0,
            required: 1
        })
    ));

    let records = store.list_usage(&account.id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, first.id);
}

fn failed_usage_charges_nothing<S: Store>(store: &S) {
    let account = funded_account(store, 3);

    store
        .record_usage(&UsageRecord::failed(account.id, Tool::Uncrop, None))
        .unwrap();

    let account_after = store.get_account(&account.id).unwrap().unwrap();
    assert_eq!(account_after.credit_balance, 3);

    let records = store.list_usage(&account.id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, UsageStatus::Failed);
    assert_eq!(records[0].credits_charged, 0);
}

fn otp_replaced_and_verified<S: Store>(store: &S) {
    let now = Utc::now();
    store
        .replace_otp(&OneTimeCode::issue("otp@example.com", "111111", now))
        .unwrap();
    store
        .replace_otp(&OneTimeCode::issue("OTP@example.com", "222222", now))
        .unwrap();

    let stored = store.get_otp("otp@example.com").unwrap().unwrap();
    assert_eq!(stored.code, "222222");

    assert!(!store.mark_otp_verified("otp@example.com", "111111").unwrap());
    assert!(store.mark_otp_verified("otp@example.com", "222222").unwrap());
    assert!(store.get_otp("otp@example.com").unwrap().unwrap().verified);

    assert!(store.get_otp("none@example.com").unwrap().is_none());
    assert!(!store.mark_otp_verified("none@example.com", "000000").unwrap());
}

pub(crate) fn concurrent_debits_never_overdraw<S: Store + 'static>(store: Arc<S>) {
    let account = funded_account(store.as_ref(), 5);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let record = UsageRecord::succeeded(account.id, Tool::Enhance, 1, None);
                store.commit_usage(&record).is_ok()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 5);
    let account = store.get_account(&account.id).unwrap().unwrap();
    assert_eq!(account.credit_balance, 0);
    assert_eq!(store.list_usage(&account.id).unwrap().len(), 5);
}

pub(crate) fn concurrent_duplicate_settlement_applies_once<S: Store + 'static>(store: Arc<S>) {
    let account = funded_account(store.as_ref(), 0);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let entry = purchase(&account, "pay_race");
            thread::spawn(move || store.settle_purchase(&entry, None).is_ok())
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    let account = store.get_account(&account.id).unwrap().unwrap();
    assert_eq!(account.credit_balance, Plan::Basic.credits());
}
