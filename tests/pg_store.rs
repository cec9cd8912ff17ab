// PgStore 冒烟测试，需要可用的 Postgres：
// DATABASE_URL=postgres://... cargo test --test pg_store -- --ignored

use backend::error::StoreError;
use backend::membership::{ClassGroup, MembershipStore, PgStore};
use chrono::Utc;
use sqlx::PgPool;

async fn insert_user(pool: &PgPool, user_id: &str) {
    sqlx::query(
        "INSERT INTO users (user_id, nickname, password_hash, graduation_year) VALUES ($1, $2, 'x', 2020)",
    )
    .bind(user_id)
    .bind(format!("nick-{}", user_id))
    .execute(pool)
    .await
    .unwrap();
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn stale_group_write_is_a_conflict(pool: PgPool) {
    let store = PgStore::new(pool);
    let group = ClassGroup::new(2020, Utc::now());
    store.create_group(&group).await.unwrap();

    let mut first = store.find_group_by_year(2020).await.unwrap().unwrap();
    let mut second = first.clone();

    first.activate_member("u1", Utc::now());
    store.save_group(&mut first).await.unwrap();
    assert_eq!(first.version, 1);

    second.activate_member("u2", Utc::now());
    assert!(matches!(
        store.save_group(&mut second).await,
        Err(StoreError::Conflict)
    ));

    let stored = store.find_group_by_id(&group.group_id).await.unwrap().unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.member_count, 1);
    assert!(stored.is_active_member("u1"));
    assert!(!stored.is_active_member("u2"));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn saving_a_missing_group_is_not_found(pool: PgPool) {
    let store = PgStore::new(pool);
    let mut group = ClassGroup::new(2021, Utc::now());
    assert!(matches!(
        store.save_group(&mut group).await,
        Err(StoreError::NotFound)
    ));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn user_saves_are_version_checked(pool: PgPool) {
    insert_user(&pool, "alice").await;
    let store = PgStore::new(pool.clone());

    let mut first = store.find_user_by_id("alice").await.unwrap().unwrap();
    let mut second = first.clone();
    assert_eq!(first.version, 0);

    first.activate_entry("g1", Utc::now());
    store.save_user(&mut first).await.unwrap();
    assert_eq!(first.version, 1);

    second.activate_entry("g2", Utc::now());
    assert!(matches!(
        store.save_user(&mut second).await,
        Err(StoreError::Conflict)
    ));

    let stored = store.find_user_by_id("alice").await.unwrap().unwrap();
    assert!(stored.is_active_in("g1"));
    assert!(!stored.is_active_in("g2"));

    sqlx::query("DELETE FROM users WHERE user_id = 'alice'")
        .execute(&pool)
        .await
        .unwrap();
    let mut gone = stored;
    assert!(matches!(
        store.save_user(&mut gone).await,
        Err(StoreError::NotFound)
    ));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn second_group_for_a_year_already_exists(pool: PgPool) {
    let store = PgStore::new(pool);
    store
        .create_group(&ClassGroup::new(2019, Utc::now()))
        .await
        .unwrap();
    assert!(matches!(
        store.create_group(&ClassGroup::new(2019, Utc::now())).await,
        Err(StoreError::AlreadyExists)
    ));
    assert_eq!(store.list_groups().await.unwrap().len(), 1);
}
