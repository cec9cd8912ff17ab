// Postgres 存储
// 成员列表以 JSONB 形式内嵌在群组/用户行中，整行按版本号比较交换写入

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use super::model::{ClassGroup, ClassGroupEntry, Member, MemberRecord};
use super::store::MembershipStore;
use crate::error::StoreError;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ClassGroupRow {
    group_id: String,
    name: String,
    graduation_year: i32,
    members: Json<Vec<MemberRecord>>,
    member_count: i32,
    version: i64,
    created_at: DateTime<Utc>,
}

impl From<ClassGroupRow> for ClassGroup {
    fn from(row: ClassGroupRow) -> Self {
        Self {
            group_id: row.group_id,
            name: row.name,
            graduation_year: row.graduation_year,
            members: row.members.0,
            member_count: row.member_count,
            version: row.version,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct MemberRow {
    user_id: String,
    nickname: String,
    graduation_year: Option<i32>,
    class_groups: Json<Vec<ClassGroupEntry>>,
    version: i64,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Self {
            user_id: row.user_id,
            nickname: row.nickname,
            graduation_year: row.graduation_year,
            class_groups: row.class_groups.0,
            version: row.version,
        }
    }
}

// 按版本号更新未命中任何行：行仍存在说明版本已变化，否则行已被删除
fn missed_update(exists: bool) -> StoreError {
    if exists {
        StoreError::Conflict
    } else {
        StoreError::NotFound
    }
}

const GROUP_COLUMNS: &str =
    "group_id, name, graduation_year, members, member_count, version, created_at";
const USER_COLUMNS: &str = "user_id, nickname, graduation_year, class_groups, version";

#[async_trait]
impl MembershipStore for PgStore {
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<Member>, StoreError> {
        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {} FROM users WHERE user_id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Member::from))
    }

    async fn save_user(&self, user: &mut Member) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET class_groups = $1, version = version + 1
            WHERE user_id = $2 AND version = $3
            "#,
        )
        .bind(Json(&user.class_groups))
        .bind(&user.user_id)
        .bind(user.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = $1)")
                    .bind(&user.user_id)
                    .fetch_one(&self.pool)
                    .await?;
            return Err(missed_update(exists));
        }

        user.version += 1;
        Ok(())
    }

    async fn find_group_by_year(&self, year: i32) -> Result<Option<ClassGroup>, StoreError> {
        let row = sqlx::query_as::<_, ClassGroupRow>(&format!(
            "SELECT {} FROM class_groups WHERE graduation_year = $1",
            GROUP_COLUMNS
        ))
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ClassGroup::from))
    }

    async fn find_group_by_id(&self, group_id: &str) -> Result<Option<ClassGroup>, StoreError> {
        let row = sqlx::query_as::<_, ClassGroupRow>(&format!(
            "SELECT {} FROM class_groups WHERE group_id = $1",
            GROUP_COLUMNS
        ))
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ClassGroup::from))
    }

    async fn save_group(&self, group: &mut ClassGroup) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE class_groups
            SET members = $1, member_count = $2, version = version + 1
            WHERE group_id = $3 AND version = $4
            "#,
        )
        .bind(Json(&group.members))
        .bind(group.member_count)
        .bind(&group.group_id)
        .bind(group.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM class_groups WHERE group_id = $1)",
            )
            .bind(&group.group_id)
            .fetch_one(&self.pool)
            .await?;
            return Err(missed_update(exists));
        }

        group.version += 1;
        Ok(())
    }

    async fn create_group(&self, group: &ClassGroup) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO class_groups (
                group_id, name, graduation_year, members, member_count, version, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&group.group_id)
        .bind(&group.name)
        .bind(group.graduation_year)
        .bind(Json(&group.members))
        .bind(group.member_count)
        .bind(group.version)
        .bind(group.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<ClassGroup>, StoreError> {
        let rows = sqlx::query_as::<_, ClassGroupRow>(&format!(
            "SELECT {} FROM class_groups ORDER BY graduation_year",
            GROUP_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ClassGroup::from).collect())
    }

    async fn list_users(&self) -> Result<Vec<Member>, StoreError> {
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {} FROM users ORDER BY user_id",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Member::from).collect())
    }
}
