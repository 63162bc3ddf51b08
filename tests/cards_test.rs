mod common;

use cardledger::{CardFilter, CardStatus, LedgerError};
use chrono::Days;
use rust_decimal_macros::dec;

use common::{card, next_year, setup, today, unique_number, user};

#[tokio::test]
async fn test_create_card_masks_number() {
    let bank = setup().await;
    let alice = user(&bank, "alice").await;
    let number = "4111222233334444";

    let c = bank
        .create_card(alice.id, number, next_year(), dec!(1000))
        .await
        .unwrap();

    assert_eq!(c.owner_id, alice.id);
    assert_eq!(c.masked_number, "**** **** **** 4444");
    assert_eq!(c.balance, dec!(1000.00));
    assert_eq!(c.status, CardStatus::Active);
    assert_ne!(c.encrypted_number, number);
    assert!(!c.encrypted_number.contains(number));

    let json = serde_json::to_string(&c).unwrap();
    assert!(!json.contains(number));
    assert!(!json.contains(&c.encrypted_number));

    assert_eq!(bank.reveal_card_number(c.id).await.unwrap(), number);
}

#[tokio::test]
async fn test_lookup_by_number() {
    let bank = setup().await;
    let alice = user(&bank, "alice").await;
    let number = "5500000000000000004";

    let c = bank
        .create_card(alice.id, number, next_year(), dec!(0))
        .await
        .unwrap();
    assert_eq!(bank.get_card_by_number(number).await.unwrap(), c);

    assert!(bank
        .get_card_by_number("5500000000000000005")
        .await
        .unwrap_err()
        .is_not_found());
    assert!(bank.get_card_by_number("not a number").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_duplicate_number_is_rejected() {
    let bank = setup().await;
    let alice = user(&bank, "alice").await;
    let bob = user(&bank, "bob").await;
    let number = unique_number();

    bank.create_card(alice.id, &number, next_year(), dec!(0))
        .await
        .unwrap();
    let err = bank
        .create_card(bob.id, &number, next_year(), dec!(0))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateNumber));
}

#[tokio::test]
async fn test_create_card_validation() {
    let bank = setup().await;
    let alice = user(&bank, "alice").await;

    for number in ["411122223333444", "41112222333344445555", "4111-2222-3333-4444"] {
        let err = bank
            .create_card(alice.id, number, next_year(), dec!(0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCardNumber), "{number}");
    }

    for expiry in [today(), today().checked_sub_days(Days::new(1)).unwrap()] {
        let err = bank
            .create_card(alice.id, &unique_number(), expiry, dec!(0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidExpiry(_)));
    }

    for balance in [dec!(-1), dec!(0.001), dec!(1000000000000000000)] {
        let err = bank
            .create_card(alice.id, &unique_number(), next_year(), balance)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)), "{balance}");
    }

    let err = bank
        .create_card(999, &unique_number(), next_year(), dec!(0))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "User", .. }));
}

#[tokio::test]
async fn test_block_and_activate() {
    let bank = setup().await;
    let alice = user(&bank, "alice").await;
    let c = card(&bank, &alice, dec!(0)).await;

    assert!(matches!(
        bank.activate_card(c.id).await,
        Err(LedgerError::AlreadyActive(_))
    ));

    let blocked = bank.block_card(c.id).await.unwrap();
    assert_eq!(blocked.status, CardStatus::Blocked);
    assert!(blocked.updated_at >= c.updated_at);
    assert_eq!(blocked.created_at, c.created_at);

    assert!(matches!(
        bank.block_card(c.id).await,
        Err(LedgerError::AlreadyBlocked(_))
    ));

    let active = bank.activate_card(c.id).await.unwrap();
    assert_eq!(active.status, CardStatus::Active);
}

#[tokio::test]
async fn test_activate_respects_expiry() {
    let bank = setup().await;
    let alice = user(&bank, "alice").await;
    let expiry = today().checked_add_days(Days::new(1)).unwrap();
    let c = bank
        .create_card(alice.id, &unique_number(), expiry, dec!(0))
        .await
        .unwrap();
    bank.block_card(c.id).await.unwrap();

    let day_after = expiry.checked_add_days(Days::new(1)).unwrap();
    let err = bank.activate_card_on(c.id, day_after).await.unwrap_err();
    assert!(matches!(err, LedgerError::CardExpired(id) if id == c.id));
    assert_eq!(bank.get_card(c.id).await.unwrap().status, CardStatus::Blocked);

    let card = bank.activate_card_on(c.id, expiry).await.unwrap();
    assert_eq!(card.status, CardStatus::Active);
}

#[tokio::test]
async fn test_sum_balance_and_listing() {
    let bank = setup().await;
    let alice = user(&bank, "alice").await;
    let bob = user(&bank, "bob").await;
    let a1 = card(&bank, &alice, dec!(10.10)).await;
    let a2 = card(&bank, &alice, dec!(0.90)).await;
    let b1 = card(&bank, &bob, dec!(5)).await;

    assert_eq!(bank.sum_balance(alice.id).await.unwrap(), dec!(11.00));
    assert_eq!(bank.sum_balance(bob.id).await.unwrap(), dec!(5.00));
    let carol = user(&bank, "carol").await;
    assert_eq!(bank.sum_balance(carol.id).await.unwrap(), dec!(0));

    bank.block_card(a2.id).await.unwrap();

    let alices = bank
        .list_cards(&CardFilter {
            owner_id: Some(alice.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(
        alices.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![a1.id, a2.id]
    );

    let active = bank
        .list_cards(&CardFilter {
            status: Some(CardStatus::Active),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(
        active.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![a1.id, b1.id]
    );
}

#[tokio::test]
async fn test_users() {
    let bank = setup().await;
    let alice = user(&bank, "alice").await;

    assert_eq!(bank.get_user(alice.id).await.unwrap(), alice);
    assert!(matches!(
        bank.create_user("alice").await,
        Err(LedgerError::DuplicateUser(_))
    ));
    assert!(bank.get_user(999).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_apply_delta_credits_and_debits() {
    let bank = setup().await;
    let alice = user(&bank, "alice").await;
    let c = card(&bank, &alice, dec!(20.00)).await;
    let accounts = bank.accounts();

    let credited = accounts.apply_delta(c.id, dec!(5.25)).await.unwrap();
    assert_eq!(credited.balance, dec!(25.25));
    assert!(credited.updated_at >= c.updated_at);

    let debited = accounts.apply_delta(c.id, dec!(-25.25)).await.unwrap();
    assert_eq!(debited.balance, dec!(0.00));
    assert_eq!(bank.get_card(c.id).await.unwrap(), debited);
}

#[tokio::test]
async fn test_apply_delta_rejects_overdraft_and_bad_deltas() {
    let bank = setup().await;
    let alice = user(&bank, "alice").await;
    let c = card(&bank, &alice, dec!(20.00)).await;
    let accounts = bank.accounts();

    let err = accounts.apply_delta(c.id, dec!(-20.01)).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds));
    assert_eq!(bank.get_card(c.id).await.unwrap().balance, dec!(20.00));

    for delta in [dec!(0), dec!(0.001), dec!(-1000000000000000000)] {
        assert!(matches!(
            accounts.apply_delta(c.id, delta).await,
            Err(LedgerError::InvalidAmount(_))
        ));
    }
    assert!(accounts.apply_delta(999, dec!(1)).await.unwrap_err().is_not_found());
    assert_eq!(bank.get_card(c.id).await.unwrap().balance, dec!(20.00));
}
