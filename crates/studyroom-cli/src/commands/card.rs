use clap::{Args, Subcommand};
use studyroom_core::srs::review_card;
use studyroom_core::storage::CardInput;

use super::CliResult;

#[derive(Subcommand)]
pub enum CardAction {
    /// Add a new flashcard
    Add {
        /// Front text (the prompt)
        front: String,
        /// Back text (the answer)
        #[arg(long)]
        back: Option<String>,
        /// Example sentence
        #[arg(long)]
        example: Option<String>,
        /// Language code, e.g. "en"
        #[arg(long)]
        language: Option<String>,
        /// Free-form tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Cards due today, oldest due first
    Due,
    /// Recently added cards, newest first
    List {
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

#[derive(Args)]
pub struct ReviewArgs {
    /// Card to grade
    pub card_id: i64,
    /// Recall quality, 0 (forgot) to 5 (perfect)
    pub grade: u8,
}

pub fn run(action: CardAction, user: &str) -> CliResult {
    let (_, mut ledger) = super::open_ledger()?;

    match action {
        CardAction::Add {
            front,
            back,
            example,
            language,
            tags,
        } => {
            let card = ledger.create_card(
                user,
                &CardInput {
                    front,
                    back,
                    example,
                    language,
                    tags,
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&card)?);
        }
        CardAction::Due => {
            let today = ledger.zone().today();
            let cards = ledger.due_cards(user, today)?;
            println!("{}", serde_json::to_string_pretty(&cards)?);
        }
        CardAction::List { limit } => {
            let cards = ledger.recent_cards(Some(user), limit)?;
            println!("{}", serde_json::to_string_pretty(&cards)?);
        }
    }
    Ok(())
}

pub fn run_review(args: ReviewArgs, user: &str) -> CliResult {
    let (_, mut ledger) = super::open_ledger()?;
    let outcome = review_card(&mut ledger, user, args.card_id, args.grade)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
