use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    ActionType, CreateExpenseCmd, Engine, EngineError, EqualSplitCmd, Expense, ExpenseCategory,
    MoneyCents, RevisionKind, UpdateExpenseCmd,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    for username in ["alice", "bob", "mallory"] {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username) VALUES (?)",
            vec![username.into()],
        ))
        .await
        .unwrap();
    }
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn budget_with_expense(engine: &Engine) -> (Uuid, Uuid) {
    let budget_id = engine.new_budget("Trip", None, "alice").await.unwrap();
    engine
        .upsert_budget_member(budget_id, "bob", "editor", "alice")
        .await
        .unwrap();
    let expense_id = engine
        .create_expense(
            CreateExpenseCmd::new(
                "alice",
                "Hotel",
                MoneyCents::new(300_00),
                NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            )
            .category(ExpenseCategory::Travel)
            .budget(budget_id),
        )
        .await
        .unwrap();
    (budget_id, expense_id)
}

async fn allocation_rows(db: &DatabaseConnection, expense_id: Uuid) -> i64 {
    let row = db
        .query_one(Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT COUNT(*) AS n FROM allocations WHERE expense_id = ?",
            vec![expense_id.to_string().into()],
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

#[tokio::test]
async fn revisions_follow_the_expense_lifecycle() {
    let (engine, _db) = engine_with_db().await;
    let (_, expense_id) = budget_with_expense(&engine).await;

    engine
        .update_expense(
            UpdateExpenseCmd::new(expense_id, "bob")
                .title("Hotel and breakfast")
                .amount(MoneyCents::new(340_00)),
        )
        .await
        .unwrap();
    engine.delete_expense(expense_id, "alice").await.unwrap();

    assert_eq!(
        engine.list_revisions(expense_id, "alice").await.unwrap(),
        vec![1, 2, 3]
    );

    let revisions = engine.expense_revisions(expense_id, "bob").await.unwrap();
    let kinds: Vec<RevisionKind> = revisions.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            RevisionKind::Added,
            RevisionKind::Modified,
            RevisionKind::Deleted
        ]
    );
    assert_eq!(revisions[1].actor, "bob");

    let first = engine
        .expense_at_revision(expense_id, 1, "alice")
        .await
        .unwrap();
    assert_eq!(first.title, "Hotel");
    assert_eq!(first.amount, MoneyCents::new(300_00));
    assert_eq!(first.version, 0);

    let second = engine
        .expense_at_revision(expense_id, 2, "alice")
        .await
        .unwrap();
    assert_eq!(second.title, "Hotel and breakfast");
    assert_eq!(second.amount, MoneyCents::new(340_00));
    assert_eq!(second.updated_by.as_deref(), Some("bob"));
    assert_eq!(second.category, ExpenseCategory::Travel);

    let err = engine
        .expense_at_revision(expense_id, 7, "alice")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::KeyNotFound("revision 7 not exists".to_string())
    );
}

#[tokio::test]
async fn audit_entries_hold_the_state_before() {
    let (engine, _db) = engine_with_db().await;
    let (_, expense_id) = budget_with_expense(&engine).await;

    engine
        .update_expense(UpdateExpenseCmd::new(expense_id, "alice").title("Hostel"))
        .await
        .unwrap();

    let entries = engine
        .expense_audit_entries(expense_id, "bob")
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, ActionType::CreateExpense);
    assert!(entries[0].object_before.is_none());
    assert_eq!(entries[1].action, ActionType::UpdateExpense);
    assert_eq!(entries[1].actor, "alice");

    let before: Expense =
        serde_json::from_str(entries[1].object_before.as_deref().unwrap()).unwrap();
    assert_eq!(before.title, "Hotel");
    assert_eq!(before.id, expense_id);
}

#[tokio::test]
async fn budget_audit_is_paginated() {
    let (engine, _db) = engine_with_db().await;
    let (budget_id, expense_id) = budget_with_expense(&engine).await;
    engine
        .distribute_equally(EqualSplitCmd::new(expense_id, "alice", ["alice", "bob"]))
        .await
        .unwrap();

    let first = engine
        .budget_audit_entries(budget_id, "bob", 2, None)
        .await
        .unwrap();
    let actions: Vec<ActionType> = first.entries.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![ActionType::CreateBudget, ActionType::CreateExpense]
    );
    let cursor = first.next_cursor.expect("more entries expected");

    let second = engine
        .budget_audit_entries(budget_id, "bob", 2, Some(&cursor))
        .await
        .unwrap();
    assert_eq!(second.entries.len(), 1);
    assert_eq!(second.entries[0].action, ActionType::DistributeExpense);
    assert!(second.next_cursor.is_none());
    assert!(second.entries[0].id > first.entries[1].id);

    let err = engine
        .budget_audit_entries(budget_id, "bob", 2, Some("%%%"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCursor(_)));

    let err = engine
        .budget_audit_entries(budget_id, "bob", 0, Some(&cursor))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidCursor("limit must be greater than 0".to_string())
    );

    let err = engine
        .budget_audit_entries(budget_id, "mallory", 2, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn history_survives_deletion() {
    let (engine, db) = engine_with_db().await;
    let (_, expense_id) = budget_with_expense(&engine).await;
    engine
        .distribute_equally(EqualSplitCmd::new(expense_id, "alice", ["alice", "bob"]))
        .await
        .unwrap();
    assert_eq!(allocation_rows(&db, expense_id).await, 2);
    engine.delete_expense(expense_id, "bob").await.unwrap();
    assert_eq!(allocation_rows(&db, expense_id).await, 0);

    let err = engine.expense(expense_id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let entries = engine
        .expense_audit_entries(expense_id, "bob")
        .await
        .unwrap();
    let last = entries.last().unwrap();
    assert_eq!(last.action, ActionType::DeleteExpense);
    let before: Expense = serde_json::from_str(last.object_before.as_deref().unwrap()).unwrap();
    assert_eq!(before.version, 1);

    let err = engine
        .expense_revisions(expense_id, "mallory")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn deleting_a_budget_keeps_expense_history() {
    let (engine, db) = engine_with_db().await;
    let (budget_id, expense_id) = budget_with_expense(&engine).await;
    engine
        .distribute_equally(EqualSplitCmd::new(expense_id, "bob", ["alice", "bob"]))
        .await
        .unwrap();

    let err = engine.delete_budget(budget_id, "bob").await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    engine.delete_budget(budget_id, "alice").await.unwrap();
    assert_eq!(allocation_rows(&db, expense_id).await, 0);

    let err = engine.budget(budget_id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    // The creator keeps the history, other former members lose it.
    let revisions = engine.expense_revisions(expense_id, "alice").await.unwrap();
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[1].kind, RevisionKind::Deleted);
    assert_eq!(revisions[1].budget_id, Some(budget_id));

    let err = engine.list_revisions(expense_id, "bob").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn personal_expense_history() {
    let (engine, _db) = engine_with_db().await;
    let expense_id = engine
        .create_expense(CreateExpenseCmd::new(
            "bob",
            "Coffee",
            MoneyCents::new(3_50),
            NaiveDate::from_ymd_opt(2026, 7, 2).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(
        engine.list_revisions(expense_id, "bob").await.unwrap(),
        vec![1]
    );
    let err = engine.list_revisions(expense_id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}
