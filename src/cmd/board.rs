//! Board commands: `stockboard board`, `add`, `edit`, `move`, `delete`, `seed`.
//!
//! Each editing command runs one short session: load the shared document,
//! apply the edit locally, save, report the controller's notices.

use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use chrono::Utc;
use console::style;

use stockboard::board::auth::{AuthProvider, SignedOut, StaticAuth};
use stockboard::board::controller::{BoardController, Notice};
use stockboard::board::db::SqliteDocumentStore;
use stockboard::board::models::{BoardView, Card, Category, Column};
use stockboard::board::reducer::{IgnoredReason, InsertTarget, MoveRequest, Reduction};
use stockboard::board::seed::dummy_cards;
use stockboard::board::sync::SyncGateway;

use super::Context;

fn gateway(ctx: &Context) -> Result<SyncGateway> {
    let db_path = ctx.db_path();
    let store = SqliteDocumentStore::open(&db_path)
        .with_context(|| format!("Failed to open board database {}", db_path.display()))?;
    let auth: Arc<dyn AuthProvider> = match ctx.config.user_stamp() {
        Some(user) => Arc::new(StaticAuth::new(user)),
        None => Arc::new(SignedOut),
    };
    Ok(SyncGateway::new(Arc::new(store), auth).with_key(ctx.config.document_key()))
}

async fn open_session(ctx: &Context) -> Result<BoardController> {
    let mut controller = BoardController::new(gateway(ctx)?, ctx.config.controller_options());
    controller.load().await?;
    Ok(controller)
}

async fn save_and_report(controller: &mut BoardController) -> Result<()> {
    let result = controller.save().await;
    print_notices(controller);
    result?;
    Ok(())
}

fn print_notices(controller: &mut BoardController) {
    for notice in controller.take_notices() {
        match notice {
            Notice::Saved { .. } => println!("{}", style(notice).green()),
            Notice::RemoteReplaced { .. } | Notice::RemoteChangesPending => {
                println!("{}", style(notice).yellow())
            }
            _ => eprintln!("{}", style(notice).red()),
        }
    }
}

fn parse_column(value: &str) -> Result<Column> {
    value.parse::<Column>().map_err(anyhow::Error::msg)
}

fn parse_category(value: Option<&str>, fallback: Category) -> Result<Category> {
    match value {
        Some(v) => v.parse::<Category>().map_err(anyhow::Error::msg),
        None => Ok(fallback),
    }
}

fn format_price(price: f64) -> String {
    format!("${:.2}", price)
}

pub async fn cmd_board(
    ctx: &Context,
    category: Option<&str>,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut controller = open_session(ctx).await?;
    controller.set_category(parse_category(category, controller.category())?);
    if let Some(term) = search {
        controller.set_search(term);
    }
    let view = controller.board_view();
    controller.close();

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_board(&view);
    }
    Ok(())
}

fn print_board(view: &BoardView) {
    println!();
    match &view.search {
        Some(term) => println!(
            "{}",
            style(format!("Stock board (search \"{}\", all categories)", term))
                .bold()
                .cyan()
        ),
        None => println!(
            "{}",
            style(format!("Stock board: {}", view.category.label()))
                .bold()
                .cyan()
        ),
    }

    for column in &view.columns {
        println!();
        println!(
            "{} {}",
            style(&column.title).bold(),
            style(format!("({} {})", column.category_count, view.category.label())).dim()
        );
        if column.cards.is_empty() {
            println!("  {}", style("(empty)").dim());
        }
        for card in &column.cards {
            print_card(card);
        }
    }
    println!();
}

fn print_card(card: &Card) {
    println!(
        "  {}  {}  {}  {}",
        style(&card.id).dim(),
        card.title,
        style(format_price(card.price)).green(),
        style(format!(
            "[{}, by {}]",
            card.category.label(),
            card.last_modified_by.label()
        ))
        .dim()
    );
}

pub async fn cmd_add(
    ctx: &Context,
    title: &str,
    price: &str,
    column: &str,
    category: Option<&str>,
) -> Result<()> {
    let column = parse_column(column)?;
    let mut controller = open_session(ctx).await?;
    let category = parse_category(category, controller.category())?;

    let id = match controller.add_card(column, title, price, category) {
        Ok(id) => id,
        Err(e) => {
            print_notices(&mut controller);
            return Err(e.into());
        }
    };
    println!("Added {} to {} ({})", style(&id).bold(), column.title(), category.label());
    save_and_report(&mut controller).await
}

pub async fn cmd_edit(
    ctx: &Context,
    id: &str,
    title: Option<&str>,
    price: Option<&str>,
    category: Option<&str>,
) -> Result<()> {
    let mut controller = open_session(ctx).await?;
    let Some(card) = controller.registry().get(id).cloned() else {
        bail!("Card {} not found", id);
    };

    let title = title.unwrap_or(&card.title).to_string();
    let price = price
        .map(str::to_string)
        .unwrap_or_else(|| card.price.to_string());
    let category = parse_category(category, card.category)?;

    match controller.edit_card(id, &title, &price, category) {
        Ok(true) => {}
        Ok(false) => {
            println!("{}", style(format!("{} already matches; nothing to do", id)).dim());
            return Ok(());
        }
        Err(e) => {
            print_notices(&mut controller);
            return Err(e.into());
        }
    }
    println!("Updated {}", style(id).bold());
    save_and_report(&mut controller).await
}

pub async fn cmd_move(ctx: &Context, id: &str, to: &str, before: Option<&str>) -> Result<()> {
    let column = parse_column(to)?;
    let target = match before {
        Some(other) => InsertTarget::Before(other.to_string()),
        None => InsertTarget::End,
    };
    let mut controller = open_session(ctx).await?;

    let reduction = controller.move_card(MoveRequest {
        card_id: id.to_string(),
        column,
        target,
    })?;
    match reduction {
        Reduction::Applied { .. } => {
            println!("Moved {} to {}", style(id).bold(), column.title());
            save_and_report(&mut controller).await
        }
        Reduction::Unchanged => {
            println!("{}", style("Card dropped on itself; nothing to do").dim());
            Ok(())
        }
        Reduction::Ignored(IgnoredReason::CardMissing(card)) => bail!("Card {} not found", card),
        Reduction::Ignored(IgnoredReason::TargetMissing(target)) => {
            bail!("Target card {} not found", target)
        }
        Reduction::Ignored(IgnoredReason::TargetInOtherColumn { target, column: actual }) => bail!(
            "Target card {} is in {}, not {}",
            target,
            actual.title(),
            column.title()
        ),
    }
}

pub async fn cmd_delete(ctx: &Context, id: &str) -> Result<()> {
    let mut controller = open_session(ctx).await?;
    controller.delete_card(id)?;
    println!("Deleted {}", style(id).bold());
    save_and_report(&mut controller).await
}

/// Write `count` dummy cards. Without `append` the board is replaced.
pub async fn cmd_seed(ctx: &Context, count: usize, append: bool) -> Result<()> {
    let gateway = gateway(ctx)?;
    let dummies = dummy_cards(count, &mut rand::thread_rng(), Utc::now());

    let cards = if append {
        let mut existing = gateway.fetch_all().await?;
        // Reseeding overwrites earlier dummies with the same ids.
        existing.retain(|card| !dummies.iter().any(|d| d.id == card.id));
        existing.extend(dummies);
        existing
    } else {
        dummies
    };

    gateway.save_all(&cards).await?;
    println!(
        "{} {} dummy cards to {} ({} total)",
        style("Seeded").green(),
        count,
        gateway.key(),
        cards.len()
    );
    Ok(())
}
