// 内存存储
// 保存语义与 PgStore 一致，供测试使用

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::model::{ClassGroup, Member};
use super::store::MembershipStore;
use crate::error::StoreError;

#[derive(Default)]
pub struct MemoryStore {
    groups: RwLock<HashMap<String, ClassGroup>>,
    users: RwLock<HashMap<String, Member>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入用户文档，替代注册流程
    pub async fn insert_user(&self, user: Member) {
        self.users.write().await.insert(user.user_id.clone(), user);
    }

    pub async fn remove_user(&self, user_id: &str) -> Option<Member> {
        self.users.write().await.remove(user_id)
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<Member>, StoreError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn save_user(&self, user: &mut Member) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(&user.user_id).ok_or(StoreError::NotFound)?;
        if stored.version != user.version {
            return Err(StoreError::Conflict);
        }
        user.version += 1;
        *stored = user.clone();
        Ok(())
    }

    async fn find_group_by_year(&self, year: i32) -> Result<Option<ClassGroup>, StoreError> {
        Ok(self
            .groups
            .read()
            .await
            .values()
            .find(|g| g.graduation_year == year)
            .cloned())
    }

    async fn find_group_by_id(&self, group_id: &str) -> Result<Option<ClassGroup>, StoreError> {
        Ok(self.groups.read().await.get(group_id).cloned())
    }

    async fn save_group(&self, group: &mut ClassGroup) -> Result<(), StoreError> {
        let mut groups = self.groups.write().await;
        let stored = groups.get_mut(&group.group_id).ok_or(StoreError::NotFound)?;
        if stored.version != group.version {
            return Err(StoreError::Conflict);
        }
        group.version += 1;
        *stored = group.clone();
        Ok(())
    }

    async fn create_group(&self, group: &ClassGroup) -> Result<(), StoreError> {
        let mut groups = self.groups.write().await;
        if groups.contains_key(&group.group_id)
            || groups
                .values()
                .any(|g| g.graduation_year == group.graduation_year)
        {
            return Err(StoreError::AlreadyExists);
        }
        groups.insert(group.group_id.clone(), group.clone());
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<ClassGroup>, StoreError> {
        let mut groups: Vec<_> = self.groups.read().await.values().cloned().collect();
        groups.sort_by_key(|g| g.graduation_year);
        Ok(groups)
    }

    async fn list_users(&self) -> Result<Vec<Member>, StoreError> {
        let mut users: Vec<_> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn stale_group_save_is_rejected() {
        let store = MemoryStore::new();
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
        assert_eq!(stored.member_count, 1);
        assert!(stored.is_active_member("u1"));
    }

    #[tokio::test]
    async fn one_group_per_year() {
        let store = MemoryStore::new();
        store
            .create_group(&ClassGroup::new(2020, Utc::now()))
            .await
            .unwrap();
        assert!(matches!(
            store.create_group(&ClassGroup::new(2020, Utc::now())).await,
            Err(StoreError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn saving_unknown_user_is_not_found() {
        let store = MemoryStore::new();
        let mut ghost = Member {
            user_id: "ghost".into(),
            nickname: "ghost".into(),
            graduation_year: None,
            class_groups: Vec::new(),
            version: 0,
        };
        assert!(matches!(
            store.save_user(&mut ghost).await,
            Err(StoreError::NotFound)
        ));
    }
}
