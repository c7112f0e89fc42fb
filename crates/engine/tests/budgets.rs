use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    AccessLevel, CreateExpenseCmd, Engine, EngineError, ExpenseCategory, MoneyCents,
    UpdateBudgetCmd,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    for username in ["alice", "bob", "carol"] {
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

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
}

#[tokio::test]
async fn budget_lifecycle() {
    let (engine, _db) = engine_with_db().await;
    let budget_id = engine
        .new_budget("  Household  ", Some("rent and bills"), "alice")
        .await
        .unwrap();

    let budget = engine.budget(budget_id, "alice").await.unwrap();
    assert_eq!(budget.name, "Household");
    assert_eq!(budget.owner_id, "alice");
    assert_eq!(budget.description.as_deref(), Some("rent and bills"));

    let err = engine.new_budget("   ", None, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidName(_)));
    assert_eq!(err.kind(), engine::ErrorKind::InvalidInput);

    let err = engine.new_budget("Ghost", None, "nobody").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    engine
        .upsert_budget_member(budget_id, "bob", "editor", "alice")
        .await
        .unwrap();
    let updated = engine
        .update_budget(
            UpdateBudgetCmd::new(budget_id, "bob")
                .name("Home")
                .description(""),
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Home");
    assert!(updated.description.is_none());

    let err = engine.budget(budget_id, "carol").await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn membership_rules() {
    let (engine, _db) = engine_with_db().await;
    let budget_id = engine.new_budget("Flat", None, "alice").await.unwrap();

    engine
        .upsert_budget_member(budget_id, "bob", "viewer", "alice")
        .await
        .unwrap();
    // Upserting again only changes the role.
    engine
        .upsert_budget_member(budget_id, "bob", "editor", "alice")
        .await
        .unwrap();
    engine
        .upsert_budget_member(budget_id, "carol", "viewer", "alice")
        .await
        .unwrap();

    let members = engine
        .list_budget_members(budget_id, "carol")
        .await
        .unwrap();
    let listed: Vec<(&str, AccessLevel)> = members
        .iter()
        .map(|p| (p.user_id.as_str(), p.level))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("alice", AccessLevel::Owner),
            ("bob", AccessLevel::Editor),
            ("carol", AccessLevel::Viewer),
        ]
    );

    let err = engine
        .upsert_budget_member(budget_id, "carol", "owner", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRole(_)));

    let err = engine
        .upsert_budget_member(budget_id, "carol", "admin", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRole(_)));

    let err = engine
        .upsert_budget_member(budget_id, "alice", "viewer", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRole(_)));

    let err = engine
        .upsert_budget_member(budget_id, "carol", "editor", "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = engine
        .upsert_budget_member(budget_id, "nobody", "viewer", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let err = engine
        .remove_budget_member(budget_id, "alice", "alice")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidRole("cannot remove budget owner".to_string())
    );

    engine
        .remove_budget_member(budget_id, "carol", "alice")
        .await
        .unwrap();
    let err = engine
        .list_budget_members(budget_id, "carol")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn list_budgets_by_name() {
    let (engine, _db) = engine_with_db().await;
    let zoo = engine.new_budget("Zoo trip", None, "alice").await.unwrap();
    let groceries = engine.new_budget("Groceries", None, "bob").await.unwrap();
    engine.new_budget("Private", None, "carol").await.unwrap();
    engine
        .upsert_budget_member(groceries, "alice", "viewer", "bob")
        .await
        .unwrap();

    let names: Vec<String> = engine
        .list_budgets("alice")
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(names, vec!["Groceries", "Zoo trip"]);

    let ids: Vec<_> = engine
        .list_budgets("bob")
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(ids, vec![groceries]);
    assert!(!ids.contains(&zoo));
}

#[tokio::test]
async fn totals_and_categories() {
    let (engine, _db) = engine_with_db().await;
    let budget_id = engine.new_budget("Flat", None, "alice").await.unwrap();
    engine
        .upsert_budget_member(budget_id, "bob", "viewer", "alice")
        .await
        .unwrap();

    for (title, cents, category, d) in [
        ("Rent", 800_00, ExpenseCategory::Housing, 1),
        ("Pizza", 24_50, ExpenseCategory::Food, 3),
        ("Market", 31_20, ExpenseCategory::Food, 2),
    ] {
        engine
            .create_expense(
                CreateExpenseCmd::new("alice", title, MoneyCents::new(cents), day(d))
                    .category(category)
                    .budget(budget_id),
            )
            .await
            .unwrap();
    }
    engine
        .create_expense(CreateExpenseCmd::new(
            "alice",
            "Gift",
            MoneyCents::new(15_00),
            day(4),
        ))
        .await
        .unwrap();

    assert_eq!(
        engine.budget_total(budget_id, "bob").await.unwrap(),
        MoneyCents::new(855_70)
    );

    let titles: Vec<String> = engine
        .list_budget_expenses(budget_id, "bob")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.title)
        .collect();
    assert_eq!(titles, vec!["Pizza", "Market", "Rent"]);

    let personal = engine.list_personal_expenses("alice").await.unwrap();
    assert_eq!(personal.len(), 1);
    assert_eq!(personal[0].title, "Gift");
    assert!(engine.list_personal_expenses("bob").await.unwrap().is_empty());

    let by_category = engine.expenses_by_category("alice").await.unwrap();
    assert_eq!(
        by_category,
        vec![
            (ExpenseCategory::Food, MoneyCents::new(55_70)),
            (ExpenseCategory::Housing, MoneyCents::new(800_00)),
            (ExpenseCategory::Other, MoneyCents::new(15_00)),
        ]
    );

    // Viewers cannot add expenses.
    let err = engine
        .create_expense(
            CreateExpenseCmd::new("bob", "Snacks", MoneyCents::new(2_00), day(5))
                .budget(budget_id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = engine
        .create_expense(CreateExpenseCmd::new(
            "alice",
            "Free lunch",
            MoneyCents::ZERO,
            day(5),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}

#[tokio::test]
async fn personal_expense_moves_into_budget() {
    let (engine, _db) = engine_with_db().await;
    let budget_id = engine.new_budget("Flat", None, "alice").await.unwrap();
    let other_id = engine.new_budget("Other", None, "alice").await.unwrap();
    let expense_id = engine
        .create_expense(CreateExpenseCmd::new(
            "alice",
            "Lamp",
            MoneyCents::new(40_00),
            day(9),
        ))
        .await
        .unwrap();

    let err = engine
        .assign_budget(expense_id, budget_id, "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let moved = engine
        .assign_budget(expense_id, budget_id, "alice")
        .await
        .unwrap();
    assert_eq!(moved.budget_id, Some(budget_id));
    assert_eq!(moved.version, 1);
    assert!(engine.list_personal_expenses("alice").await.unwrap().is_empty());

    let err = engine
        .assign_budget(expense_id, other_id, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}

#[tokio::test]
async fn users_are_unique() {
    let (engine, _db) = engine_with_db().await;
    engine
        .create_user("dave", Some("Dave"), Some("dave@example.org"))
        .await
        .unwrap();
    let err = engine.create_user("dave", None, None).await.unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let budget_id = engine.new_budget("Club", None, "dave").await.unwrap();
    assert_eq!(engine.budget(budget_id, "dave").await.unwrap().owner_id, "dave");
}

#[tokio::test]
async fn budget_expenses_are_paginated() {
    let (engine, _db) = engine_with_db().await;
    let budget_id = engine.new_budget("Flat", None, "alice").await.unwrap();
    engine
        .upsert_budget_member(budget_id, "bob", "viewer", "alice")
        .await
        .unwrap();
    for (title, d) in [("Rent", 1), ("Water", 2), ("Power", 2), ("Pizza", 3), ("Taxi", 4)] {
        engine
            .create_expense(
                CreateExpenseCmd::new("alice", title, MoneyCents::new(10_00), day(d))
                    .budget(budget_id),
            )
            .await
            .unwrap();
    }
    engine
        .create_expense(CreateExpenseCmd::new(
            "alice",
            "Gift",
            MoneyCents::new(15_00),
            day(1),
        ))
        .await
        .unwrap();

    assert_eq!(
        engine.count_budget_expenses(budget_id, "bob").await.unwrap(),
        5
    );

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let (page, next) = engine
            .budget_expenses_page(budget_id, "bob", 2, cursor.as_deref())
            .await
            .unwrap();
        assert!(page.len() <= 2);
        seen.extend(page);
        match next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    assert_eq!(seen.len(), 5);
    let days: Vec<NaiveDate> = seen.iter().map(|e| e.spent_on).collect();
    assert_eq!(days, vec![day(4), day(3), day(2), day(2), day(1)]);
    let mut ids: Vec<_> = seen.iter().map(|e| e.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);

    let err = engine
        .budget_expenses_page(budget_id, "bob", 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCursor(_)));
    let err = engine
        .budget_expenses_page(budget_id, "bob", 2, Some("not a cursor"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCursor(_)));
    let err = engine
        .count_budget_expenses(budget_id, "carol")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let recent = engine.recent_expenses("alice", 2).await.unwrap();
    let titles: Vec<&str> = recent.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Gift", "Taxi"]);
    assert!(engine.recent_expenses("bob", 5).await.unwrap().is_empty());
    let err = engine.recent_expenses("nobody", 5).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}
