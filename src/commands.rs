use anyhow::Result;
use serde::Serialize;

use cardledger::config::Command;
use cardledger::{
    Bank, BlockRequestFilter, CardFilter, EncryptionKey, TransactionFilter, TransferFilter,
};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn generate_key() {
    println!("{}", EncryptionKey::generate().to_hex());
}

/// Runs one administrative command against the ledger and prints the
/// result as JSON.
pub async fn run(bank: &Bank, command: Command) -> Result<()> {
    match command {
        Command::AddUser { username } => print_json(&bank.create_user(&username).await?),
        Command::CreateCard {
            owner,
            number,
            expiry,
            balance,
        } => print_json(&bank.create_card(owner, &number, expiry, balance).await?),
        Command::Deposit { card, amount } => print_json(&bank.deposit(card, amount).await?),
        Command::Withdraw { card, amount } => print_json(&bank.withdraw(card, amount).await?),
        Command::Transfer { from, to, amount } => {
            print_json(&bank.transfer(from, to, amount).await?)
        }
        Command::Block { card } => print_json(&bank.block_card(card).await?),
        Command::Activate { card } => print_json(&bank.activate_card(card).await?),
        Command::RequestBlock { card, user } => {
            print_json(&bank.submit_block_request(card, user).await?)
        }
        Command::ApproveBlock { request } => {
            print_json(&bank.approve_block_request(request).await?)
        }
        Command::RejectBlock { request } => print_json(&bank.reject_block_request(request).await?),
        Command::Card { id } => print_json(&bank.get_card(id).await?),
        Command::CardByNumber { number } => print_json(&bank.get_card_by_number(&number).await?),
        Command::Balance { user } => {
            let total = bank.sum_balance(user).await?;
            print_json(&serde_json::json!({ "user_id": user, "balance": total }))
        }
        Command::Cards { owner, status } => print_json(
            &bank
                .list_cards(&CardFilter {
                    owner_id: owner,
                    status,
                })
                .await?,
        ),
        Command::Transactions {
            user,
            card,
            transaction_type,
            from,
            to,
        } => print_json(
            &bank
                .transactions(&TransactionFilter {
                    user_id: user,
                    card_id: card,
                    transaction_type,
                    from,
                    to,
                })
                .await?,
        ),
        Command::Transfers {
            user,
            card,
            status,
            from,
            to,
            min_amount,
            max_amount,
        } => print_json(
            &bank
                .transfers(&TransferFilter {
                    user_id: user,
                    card_id: card,
                    status,
                    from,
                    to,
                    min_amount,
                    max_amount,
                })
                .await?,
        ),
        Command::BlockRequests { user, card, status } => print_json(
            &bank
                .block_requests(&BlockRequestFilter {
                    user_id: user,
                    card_id: card,
                    status,
                    ..Default::default()
                })
                .await?,
        ),
        Command::GenerateKey => {
            generate_key();
            Ok(())
        }
    }
}
