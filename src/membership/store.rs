//! 成员关系存储接口，Postgres 与内存实现都遵循同一套语义。

use async_trait::async_trait;

use super::model::{ClassGroup, Member};
use crate::error::StoreError;

/// 班级群与用户文档的读写接口。
///
/// `save_group` / `save_user` 按文档整体写入，并以 `version` 做比较交换：
/// 传入文档的版本号必须等于库中当前版本，否则返回 [`StoreError::Conflict`]，
/// 成功后库中版本号加一，传入的文档也同步更新版本号。
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<Member>, StoreError>;

    async fn save_user(&self, user: &mut Member) -> Result<(), StoreError>;

    async fn find_group_by_year(&self, year: i32) -> Result<Option<ClassGroup>, StoreError>;

    async fn find_group_by_id(&self, group_id: &str) -> Result<Option<ClassGroup>, StoreError>;

    async fn save_group(&self, group: &mut ClassGroup) -> Result<(), StoreError>;

    /// 创建班级群，同一年份已存在时返回 [`StoreError::AlreadyExists`]
    async fn create_group(&self, group: &ClassGroup) -> Result<(), StoreError>;

    async fn list_groups(&self) -> Result<Vec<ClassGroup>, StoreError>;

    async fn list_users(&self) -> Result<Vec<Member>, StoreError>;
}
