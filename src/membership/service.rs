//! 班级群成员关系的三个写操作：注册时自动分班、主动加入、主动退出。
//!
//! 每个操作都分两步写：先写群组文档，再写用户文档。两步之间没有跨文档事务，
//! 任何一步失败都会留下一侧已写、另一侧未写的状态，由 [`reconcile`] 负责修复。
//! 每一步内部是"读取-修改-按版本号保存"，版本冲突会被当作瞬时错误重试，
//! 重试时重新读取文档，因此并发的加入/退出不会丢失计数。
//!
//! [`reconcile`]: MembershipService::reconcile

use std::ops::RangeInclusive;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::model::{GroupSummary, UserInfo};
use super::retry::RetryPolicy;
use super::store::MembershipStore;
use crate::error::{MembershipError, StoreError};

pub const ALREADY_MEMBER: &str = "ALREADY_MEMBER";
pub const NOT_MEMBER: &str = "NOT_MEMBER";

/// 自动分班结果。分班失败不会中断注册，所以除用户记录丢失外都以结果返回
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentResult {
    pub success: bool,
    pub assigned_group: Option<GroupSummary>,
    pub error: Option<String>,
    pub message: String,
    pub already_assigned: bool,
}

impl AssignmentResult {
    fn assigned(group: GroupSummary) -> Self {
        Self {
            message: format!("Assigned to {}", group.name),
            success: true,
            assigned_group: Some(group),
            error: None,
            already_assigned: false,
        }
    }

    fn already_assigned(group: GroupSummary) -> Self {
        Self {
            message: format!("User already assigned to {}", group.name),
            success: true,
            assigned_group: Some(group),
            error: None,
            already_assigned: true,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            assigned_group: None,
            message: "Class group assignment failed".to_string(),
            error: Some(error),
            already_assigned: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Joined(GroupSummary),
    AlreadyMember,
}

impl JoinOutcome {
    pub fn code(&self) -> Option<&'static str> {
        match self {
            JoinOutcome::Joined(_) => None,
            JoinOutcome::AlreadyMember => Some(ALREADY_MEMBER),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeaveOutcome {
    Left { member_count: i32 },
    NotMember,
}

impl LeaveOutcome {
    pub fn code(&self) -> Option<&'static str> {
        match self {
            LeaveOutcome::Left { .. } => None,
            LeaveOutcome::NotMember => Some(NOT_MEMBER),
        }
    }
}

// 自动分班时群组一侧的写入结果
enum GroupWrite {
    Missing,
    Changed(GroupSummary),
    Unchanged(GroupSummary),
}

pub struct MembershipService<S> {
    pub(super) store: Arc<S>,
    pub(super) retry: RetryPolicy,
    pub(super) years: RangeInclusive<i32>,
}

impl<S: MembershipStore> MembershipService<S> {
    pub fn new(store: Arc<S>, retry: RetryPolicy, years: RangeInclusive<i32>) -> Self {
        Self {
            store,
            retry,
            years,
        }
    }

    /// 按毕业年份自动分班。
    ///
    /// 只有用户记录不存在时返回 `Err`，其余失败（年份越界、该年份没有班级群、
    /// 重试耗尽）都返回 `success == false` 的结果，调用方应继续注册流程。
    pub async fn assign(
        &self,
        user_id: &str,
        graduation_year: i32,
        info: &UserInfo,
    ) -> Result<AssignmentResult, MembershipError> {
        if !self.years.contains(&graduation_year) {
            tracing::warn!(
                user_id,
                graduation_year,
                "graduation year out of range, skipping class group assignment"
            );
            return Ok(AssignmentResult::failed(format!(
                "Graduation year {} is out of range ({}-{})",
                graduation_year,
                self.years.start(),
                self.years.end()
            )));
        }

        match self.ensure_user_exists(user_id).await {
            Ok(()) => {}
            Err(MembershipError::Store(e)) => {
                tracing::error!(user_id, error = %e, "user lookup failed during class group assignment");
                return Ok(AssignmentResult::failed(e.to_string()));
            }
            Err(fatal) => return Err(fatal),
        }

        let store = &*self.store;
        let write = self
            .retry
            .run("assign.group", move |attempt| {
                tracing::debug!(user_id, graduation_year, attempt, "class group assignment attempt");
                assign_group_side(store, user_id, graduation_year)
            })
            .await;

        let (summary, changed) = match write {
            Ok(GroupWrite::Missing) => {
                tracing::warn!(user_id, graduation_year, "no class group for graduation year");
                return Ok(AssignmentResult::failed(format!(
                    "No class group exists for graduation year {}",
                    graduation_year
                )));
            }
            Ok(GroupWrite::Changed(summary)) => (summary, true),
            Ok(GroupWrite::Unchanged(summary)) => (summary, false),
            Err(e) => {
                tracing::error!(user_id, graduation_year, error = %e, "class group assignment failed");
                return Ok(AssignmentResult::failed(e.to_string()));
            }
        };

        // 已是活跃成员时也同步一次用户侧，补上之前中断的写入
        match self.activate_user_side(user_id, &summary.group_id).await {
            Ok(_) => {}
            Err(MembershipError::Store(e)) => {
                tracing::error!(
                    user_id,
                    group_id = %summary.group_id,
                    error = %e,
                    "group updated but user record was not; left for reconciliation"
                );
                return Ok(AssignmentResult::failed(e.to_string()));
            }
            Err(fatal) => return Err(fatal),
        }

        if changed {
            tracing::info!(
                user_id,
                nickname = %info.nickname,
                group_id = %summary.group_id,
                graduation_year,
                member_count = summary.member_count,
                "user assigned to class group"
            );
            Ok(AssignmentResult::assigned(summary))
        } else {
            tracing::info!(
                user_id,
                group_id = %summary.group_id,
                "user already assigned to class group"
            );
            Ok(AssignmentResult::already_assigned(summary))
        }
    }

    /// 用户主动加入班级群
    pub async fn join(&self, user_id: &str, group_id: &str) -> Result<JoinOutcome, MembershipError> {
        self.ensure_user_exists(user_id).await?;

        let store = &*self.store;
        let joined = self
            .retry
            .run("join.group", move |attempt| {
                tracing::debug!(user_id, group_id, attempt, "join attempt");
                join_group_side(store, user_id, group_id)
            })
            .await?;

        let Some(summary) = joined else {
            tracing::info!(user_id, group_id, "join rejected: already a member");
            return Ok(JoinOutcome::AlreadyMember);
        };

        self.activate_user_side(user_id, group_id).await?;

        tracing::info!(
            user_id,
            group_id,
            member_count = summary.member_count,
            "user joined class group"
        );
        Ok(JoinOutcome::Joined(summary))
    }

    /// 用户主动退出班级群，成员记录保留并标记为不活跃
    pub async fn leave(&self, user_id: &str, group_id: &str) -> Result<LeaveOutcome, MembershipError> {
        self.ensure_user_exists(user_id).await?;

        let store = &*self.store;
        let member_count = self
            .retry
            .run("leave.group", move |attempt| {
                tracing::debug!(user_id, group_id, attempt, "leave attempt");
                leave_group_side(store, user_id, group_id)
            })
            .await?;

        let Some(member_count) = member_count else {
            tracing::info!(user_id, group_id, "leave rejected: not a member");
            return Ok(LeaveOutcome::NotMember);
        };

        self.deactivate_user_side(user_id, group_id).await?;

        tracing::info!(user_id, group_id, member_count, "user left class group");
        Ok(LeaveOutcome::Left { member_count })
    }

    async fn ensure_user_exists(&self, user_id: &str) -> Result<(), MembershipError> {
        let store = &*self.store;
        let found = self
            .retry
            .run("user.lookup", move |_| store.find_user_by_id(user_id))
            .await?;
        match found {
            Some(_) => Ok(()),
            None => {
                tracing::error!(user_id, "user record not found");
                Err(MembershipError::UserNotFound(user_id.to_string()))
            }
        }
    }

    /// 插入或重新激活用户侧的班级群引用，返回是否有写入
    async fn activate_user_side(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<bool, MembershipError> {
        let store = &*self.store;
        self.retry
            .run("user.activate", move |_| {
                update_user_side(store, user_id, group_id, true)
            })
            .await
    }

    async fn deactivate_user_side(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<bool, MembershipError> {
        let store = &*self.store;
        self.retry
            .run("user.deactivate", move |_| {
                update_user_side(store, user_id, group_id, false)
            })
            .await
    }
}

async fn assign_group_side<S: MembershipStore + ?Sized>(
    store: &S,
    user_id: &str,
    graduation_year: i32,
) -> Result<GroupWrite, StoreError> {
    let Some(mut group) = store.find_group_by_year(graduation_year).await? else {
        return Ok(GroupWrite::Missing);
    };
    if !group.activate_member(user_id, Utc::now()) {
        return Ok(GroupWrite::Unchanged(GroupSummary::from(&group)));
    }
    store.save_group(&mut group).await?;
    Ok(GroupWrite::Changed(GroupSummary::from(&group)))
}

// 已是活跃成员时返回 None
async fn join_group_side<S: MembershipStore + ?Sized>(
    store: &S,
    user_id: &str,
    group_id: &str,
) -> Result<Option<GroupSummary>, MembershipError> {
    let mut group = store
        .find_group_by_id(group_id)
        .await?
        .ok_or_else(|| MembershipError::GroupNotFound(group_id.to_string()))?;
    if !group.activate_member(user_id, Utc::now()) {
        return Ok(None);
    }
    store.save_group(&mut group).await?;
    Ok(Some(GroupSummary::from(&group)))
}

// 不是活跃成员时返回 None，否则返回退出后的成员数
async fn leave_group_side<S: MembershipStore + ?Sized>(
    store: &S,
    user_id: &str,
    group_id: &str,
) -> Result<Option<i32>, MembershipError> {
    let mut group = store
        .find_group_by_id(group_id)
        .await?
        .ok_or_else(|| MembershipError::GroupNotFound(group_id.to_string()))?;
    if !group.deactivate_member(user_id, Utc::now()) {
        return Ok(None);
    }
    store.save_group(&mut group).await?;
    Ok(Some(group.member_count))
}

async fn update_user_side<S: MembershipStore + ?Sized>(
    store: &S,
    user_id: &str,
    group_id: &str,
    active: bool,
) -> Result<bool, MembershipError> {
    let mut user = store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| MembershipError::UserNotFound(user_id.to_string()))?;
    let now = Utc::now();
    let changed = if active {
        user.activate_entry(group_id, now)
    } else {
        user.deactivate_entry(group_id, now)
    };
    if !changed {
        return Ok(false);
    }
    match store.save_user(&mut user).await {
        Ok(()) => Ok(true),
        // 保存时用户已被删除属于致命错误
        Err(StoreError::NotFound) => Err(MembershipError::UserNotFound(user_id.to_string())),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::memory::MemoryStore;
    use crate::membership::model::{ClassGroup, Member};
    use std::time::Duration;

    fn member(user_id: &str) -> Member {
        Member {
            user_id: user_id.to_string(),
            nickname: user_id.to_string(),
            graduation_year: Some(2020),
            class_groups: Vec::new(),
            version: 0,
        }
    }

    async fn service() -> (MembershipService<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        let group = ClassGroup::new(2020, Utc::now());
        store.create_group(&group).await.unwrap();
        store.insert_user(member("u1")).await;
        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        };
        (MembershipService::new(store, retry, 2007..=2025), group.group_id)
    }

    #[tokio::test]
    async fn assign_repairs_missing_user_side() {
        let (service, group_id) = service().await;

        // 模拟上一次分班只写了群组一侧
        let mut group = service.store.find_group_by_id(&group_id).await.unwrap().unwrap();
        group.activate_member("u1", Utc::now());
        service.store.save_group(&mut group).await.unwrap();

        let result = service.assign("u1", 2020, &UserInfo::default()).await.unwrap();
        assert!(result.success && result.already_assigned);

        let user = service.store.find_user_by_id("u1").await.unwrap().unwrap();
        assert!(user.is_active_in(&group_id));
        let group = service.store.find_group_by_id(&group_id).await.unwrap().unwrap();
        assert_eq!(group.member_count, 1);
    }

    #[tokio::test]
    async fn assign_for_unknown_user_is_fatal_and_writes_nothing() {
        let (service, group_id) = service().await;

        let err = service
            .assign("ghost", 2020, &UserInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::UserNotFound(_)));

        let group = service.store.find_group_by_id(&group_id).await.unwrap().unwrap();
        assert!(group.members.is_empty());
    }

    #[tokio::test]
    async fn join_unknown_group_is_fatal() {
        let (service, _) = service().await;
        let err = service.join("u1", "no-such-group").await.unwrap_err();
        assert!(matches!(err, MembershipError::GroupNotFound(_)));
        let err = service.leave("u1", "no-such-group").await.unwrap_err();
        assert!(matches!(err, MembershipError::GroupNotFound(_)));
    }

    #[tokio::test]
    async fn outcome_codes() {
        assert_eq!(JoinOutcome::AlreadyMember.code(), Some(ALREADY_MEMBER));
        assert_eq!(LeaveOutcome::NotMember.code(), Some(NOT_MEMBER));
        assert_eq!(LeaveOutcome::Left { member_count: 0 }.code(), None);
    }
}
