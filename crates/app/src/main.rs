use std::error::Error;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use engine::{
    CreateExpenseCmd, CustomSplitCmd, Distribution, Engine, EqualSplitCmd, ExpenseCategory,
    MoneyCents, PaymentCmd, Share, UpdateExpenseCmd,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

mod settings;

#[derive(Parser, Debug)]
#[command(name = "splitledger")]
#[command(about = "Split shared budget expenses and inspect their history")]
struct Cli {
    /// Database connection string; overrides the settings file.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations.
    Migrate,
    User(User),
    Budget(Budget),
    Expense(Expense),
    Split(Split),
    /// Record a payment against an allocation.
    Pay(PayArgs),
    /// Show the allocations of an expense.
    Allocations(ExpenseRef),
    /// List the revision numbers of an expense.
    Revisions(ExpenseRef),
    /// Show an expense as of a revision.
    Revision(RevisionArgs),
    /// Page through the audit log of a budget.
    Audit(AuditArgs),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    display_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
}

#[derive(Args, Debug)]
struct Budget {
    #[command(subcommand)]
    command: BudgetCommand,
}

#[derive(Subcommand, Debug)]
enum BudgetCommand {
    Create(BudgetCreateArgs),
    Members(BudgetRef),
    AddMember(AddMemberArgs),
}

#[derive(Args, Debug)]
struct BudgetCreateArgs {
    #[arg(long = "as")]
    actor: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
struct BudgetRef {
    #[arg(long = "as")]
    actor: String,
    #[arg(long)]
    budget: Uuid,
}

#[derive(Args, Debug)]
struct AddMemberArgs {
    #[arg(long = "as")]
    actor: String,
    #[arg(long)]
    budget: Uuid,
    #[arg(long)]
    member: String,
    #[arg(long, default_value = "editor")]
    role: String,
}

#[derive(Args, Debug)]
struct Expense {
    #[command(subcommand)]
    command: ExpenseCommand,
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    Create(ExpenseCreateArgs),
    Update(ExpenseUpdateArgs),
    Delete(ExpenseRef),
    /// List the expenses of a budget, newest first.
    List(ExpenseListArgs),
}

#[derive(Args, Debug)]
struct ExpenseListArgs {
    #[arg(long = "as")]
    actor: String,
    #[arg(long)]
    budget: Uuid,
    #[arg(long, default_value_t = 50)]
    limit: u64,
    #[arg(long)]
    cursor: Option<String>,
}

#[derive(Args, Debug)]
struct ExpenseCreateArgs {
    #[arg(long = "as")]
    actor: String,
    #[arg(long)]
    title: String,
    /// Amount such as `12.50`.
    #[arg(long)]
    amount: MoneyCents,
    #[arg(long)]
    budget: Option<Uuid>,
    #[arg(long, value_parser = parse_category)]
    category: Option<ExpenseCategory>,
    /// Day of the expense (`YYYY-MM-DD`), today by default.
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
struct ExpenseUpdateArgs {
    #[arg(long = "as")]
    actor: String,
    #[arg(long)]
    expense: Uuid,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    amount: Option<MoneyCents>,
    #[arg(long, value_parser = parse_category)]
    category: Option<ExpenseCategory>,
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long)]
    description: Option<String>,
    /// Drop the allocations instead of rescaling them.
    #[arg(long)]
    discard_allocations: bool,
    #[arg(long)]
    expected_version: Option<i64>,
}

#[derive(Args, Debug)]
struct ExpenseRef {
    #[arg(long = "as")]
    actor: String,
    #[arg(long)]
    expense: Uuid,
}

#[derive(Args, Debug)]
struct Split {
    #[command(subcommand)]
    command: SplitCommand,
}

#[derive(Subcommand, Debug)]
enum SplitCommand {
    /// Split the unallocated part evenly.
    Equal(EqualArgs),
    /// Set shares as `user=percent`; `user=` removes the user's share.
    Custom(CustomArgs),
}

#[derive(Args, Debug)]
struct EqualArgs {
    #[arg(long = "as")]
    actor: String,
    #[arg(long)]
    expense: Uuid,
    #[arg(long, value_delimiter = ',')]
    participants: Vec<String>,
    #[arg(long)]
    expected_version: Option<i64>,
}

#[derive(Args, Debug)]
struct CustomArgs {
    #[arg(long = "as")]
    actor: String,
    #[arg(long)]
    expense: Uuid,
    #[arg(long = "share", value_parser = parse_share)]
    shares: Vec<(String, Share)>,
    #[arg(long)]
    expected_version: Option<i64>,
}

#[derive(Args, Debug)]
struct PayArgs {
    #[arg(long = "as")]
    actor: String,
    #[arg(long)]
    expense: Uuid,
    #[arg(long)]
    participant: Option<String>,
    #[arg(long)]
    amount: MoneyCents,
}

#[derive(Args, Debug)]
struct RevisionArgs {
    #[arg(long = "as")]
    actor: String,
    #[arg(long)]
    expense: Uuid,
    #[arg(long)]
    number: i64,
}

#[derive(Args, Debug)]
struct AuditArgs {
    #[arg(long = "as")]
    actor: String,
    #[arg(long)]
    budget: Uuid,
    #[arg(long, default_value_t = 50)]
    limit: u64,
    #[arg(long)]
    cursor: Option<String>,
}

fn parse_category(raw: &str) -> Result<ExpenseCategory, String> {
    ExpenseCategory::try_from(raw).map_err(|err| err.to_string())
}

fn parse_share(raw: &str) -> Result<(String, Share), String> {
    let (user, share) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected user=percent, got {raw}"))?;
    let user = user.trim();
    if user.is_empty() {
        return Err(format!("missing user in {raw}"));
    }
    let share = Share::parse(share).map_err(|err| err.to_string())?;
    Ok((user.to_string(), share))
}

fn print_distribution(distribution: &Distribution) {
    for allocation in &distribution.allocations {
        println!(
            "{}\t{}\t{}\tpaid {}{}",
            allocation.user_id,
            allocation.percentage,
            allocation.amount,
            allocation.paid,
            if allocation.paid_in_full { " (settled)" } else { "" }
        );
    }
    println!(
        "remaining {} ({:?}, version {})",
        distribution.remaining, distribution.state, distribution.version
    );
}

async fn connect_db(url: &str) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "splitledger={level},engine={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url());
    let db = connect_db(&url).await?;
    tracing::debug!(url = %url, "database ready");

    if matches!(cli.command, Command::Migrate) {
        println!("migrations applied");
        return Ok(());
    }

    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Migrate => {}
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            engine
                .create_user(
                    &args.username,
                    args.display_name.as_deref(),
                    args.email.as_deref(),
                )
                .await?;
            println!("created user: {}", args.username);
        }
        Command::Budget(Budget { command }) => match command {
            BudgetCommand::Create(args) => {
                let budget_id = engine
                    .new_budget(&args.name, args.description.as_deref(), &args.actor)
                    .await?;
                println!("created budget: {} ({budget_id})", args.name);
            }
            BudgetCommand::Members(args) => {
                for member in engine.list_budget_members(args.budget, &args.actor).await? {
                    println!("{}\t{}", member.user_id, member.level.as_str());
                }
            }
            BudgetCommand::AddMember(args) => {
                engine
                    .upsert_budget_member(args.budget, &args.member, &args.role, &args.actor)
                    .await?;
                println!("{} is now {} of {}", args.member, args.role, args.budget);
            }
        },
        Command::Expense(Expense { command }) => match command {
            ExpenseCommand::Create(args) => {
                let spent_on = args
                    .date
                    .unwrap_or_else(|| chrono::Local::now().date_naive());
                let mut cmd = CreateExpenseCmd::new(&args.actor, &args.title, args.amount, spent_on);
                if let Some(budget_id) = args.budget {
                    cmd = cmd.budget(budget_id);
                }
                if let Some(category) = args.category {
                    cmd = cmd.category(category);
                }
                if let Some(description) = args.description {
                    cmd = cmd.description(description);
                }
                let expense_id = engine.create_expense(cmd).await?;
                println!("created expense: {} ({expense_id})", args.title);
            }
            ExpenseCommand::Update(args) => {
                let mut cmd = UpdateExpenseCmd::new(args.expense, &args.actor);
                cmd.title = args.title;
                cmd.amount = args.amount;
                cmd.category = args.category;
                cmd.spent_on = args.date;
                cmd.description = args.description;
                cmd.expected_version = args.expected_version;
                if args.discard_allocations {
                    cmd = cmd.discard_allocations();
                }
                let expense = engine.update_expense(cmd).await?;
                println!(
                    "updated expense: {} {} (version {})",
                    expense.title, expense.amount, expense.version
                );
            }
            ExpenseCommand::Delete(args) => {
                engine.delete_expense(args.expense, &args.actor).await?;
                println!("deleted expense: {}", args.expense);
            }
            ExpenseCommand::List(args) => {
                let total = engine
                    .count_budget_expenses(args.budget, &args.actor)
                    .await?;
                let (expenses, next_cursor) = engine
                    .budget_expenses_page(
                        args.budget,
                        &args.actor,
                        args.limit,
                        args.cursor.as_deref(),
                    )
                    .await?;
                for expense in &expenses {
                    println!(
                        "{}\t{}\t{}\t{}\t{}",
                        expense.id,
                        expense.spent_on,
                        expense.amount,
                        expense.category.as_str(),
                        expense.title
                    );
                }
                println!("{} of {total} expenses", expenses.len());
                if let Some(cursor) = next_cursor {
                    println!("next: {cursor}");
                }
            }
        },
        Command::Split(Split { command }) => {
            let distribution = match command {
                SplitCommand::Equal(args) => {
                    let mut cmd = EqualSplitCmd::new(args.expense, &args.actor, args.participants);
                    cmd.expected_version = args.expected_version;
                    engine.distribute_equally(cmd).await?
                }
                SplitCommand::Custom(args) => {
                    let mut cmd = CustomSplitCmd::new(args.expense, &args.actor);
                    for (user, share) in args.shares {
                        cmd = cmd.entry(user, share);
                    }
                    cmd.expected_version = args.expected_version;
                    engine.distribute_custom(cmd).await?
                }
            };
            print_distribution(&distribution);
        }
        Command::Pay(args) => {
            let participant = args.participant.unwrap_or_else(|| args.actor.clone());
            let allocation = engine
                .record_payment(PaymentCmd::new(
                    args.expense,
                    &args.actor,
                    participant,
                    args.amount,
                ))
                .await?;
            println!(
                "{} paid {} of {}",
                allocation.user_id, allocation.paid, allocation.amount
            );
        }
        Command::Allocations(args) => {
            let distribution = engine.list_allocations(args.expense, &args.actor).await?;
            print_distribution(&distribution);
        }
        Command::Revisions(args) => {
            for revision in engine.expense_revisions(args.expense, &args.actor).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    revision.revision,
                    revision.kind.as_str(),
                    revision.actor,
                    revision.recorded_at.to_rfc3339()
                );
            }
        }
        Command::Revision(args) => {
            let expense = engine
                .expense_at_revision(args.expense, args.number, &args.actor)
                .await?;
            println!(
                "{}\t{}\t{}\t{}",
                expense.title,
                expense.amount,
                expense.category.as_str(),
                expense.spent_on
            );
        }
        Command::Audit(args) => {
            let page = engine
                .budget_audit_entries(args.budget, &args.actor, args.limit, args.cursor.as_deref())
                .await?;
            for entry in &page.entries {
                let expense = entry.expense_id.map(|id| id.to_string()).unwrap_or_default();
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    entry.id,
                    entry.created_at.to_rfc3339(),
                    entry.action.as_str(),
                    entry.actor,
                    expense
                );
            }
            if let Some(cursor) = page.next_cursor {
                println!("next: {cursor}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::Percentage;

    #[test]
    fn share_argument_parses_user_and_percentage() {
        assert_eq!(
            parse_share("alice=60").unwrap(),
            ("alice".to_string(), Share::Percent(Percentage::from_percent(60)))
        );
        assert_eq!(parse_share("bob=").unwrap(), ("bob".to_string(), Share::Remove));
        assert!(parse_share("=10").is_err());
        assert!(parse_share("carol").is_err());
    }

    #[test]
    fn cli_parses_equal_split() {
        let id = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "splitledger",
            "split",
            "equal",
            "--as",
            "alice",
            "--expense",
            &id.to_string(),
            "--participants",
            "alice,bob",
        ])
        .unwrap();
        let Command::Split(Split {
            command: SplitCommand::Equal(args),
        }) = cli.command
        else {
            panic!("unexpected command");
        };
        assert_eq!(args.participants, vec!["alice", "bob"]);
        assert_eq!(args.expense, id);
    }

    #[test]
    fn cli_parses_expense_list() {
        let id = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "splitledger",
            "expense",
            "list",
            "--as",
            "bob",
            "--budget",
            &id.to_string(),
            "--limit",
            "10",
        ])
        .unwrap();
        let Command::Expense(Expense {
            command: ExpenseCommand::List(args),
        }) = cli.command
        else {
            panic!("unexpected command");
        };
        assert_eq!(args.budget, id);
        assert_eq!(args.limit, 10);
        assert!(args.cursor.is_none());
    }
}
