// 成员关系对账
// 群组文档总是先写，因此以群组一侧为准修复用户一侧，并按成员列表重算 member_count

use chrono::Utc;
use serde::Serialize;

use super::service::MembershipService;
use super::store::MembershipStore;
use crate::error::StoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub groups_scanned: usize,
    pub users_scanned: usize,
    /// member_count 与活跃成员数不一致而被重算的群组数
    pub counters_fixed: usize,
    pub user_entries_activated: usize,
    pub user_entries_deactivated: usize,
    /// 群组中活跃但用户记录已不存在的成员
    pub orphaned_members: usize,
    /// 对账期间文档被并发修改而跳过的写入，下一轮再处理
    pub skipped_conflicts: usize,
}

impl ReconcileReport {
    pub fn repairs(&self) -> usize {
        self.counters_fixed + self.user_entries_activated + self.user_entries_deactivated
    }
}

impl<S: MembershipStore> MembershipService<S> {
    pub async fn reconcile(&self) -> Result<ReconcileReport, StoreError> {
        let store = &*self.store;
        let mut report = ReconcileReport::default();

        for mut group in store.list_groups().await? {
            report.groups_scanned += 1;

            let active = group.active_count();
            if group.member_count != active {
                tracing::warn!(
                    group_id = %group.group_id,
                    member_count = group.member_count,
                    active,
                    "member_count drifted from member list"
                );
                group.member_count = active;
                match store.save_group(&mut group).await {
                    Ok(()) => report.counters_fixed += 1,
                    Err(StoreError::Conflict) => {
                        report.skipped_conflicts += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            let active_ids: Vec<String> = group
                .members
                .iter()
                .filter(|m| m.is_active)
                .map(|m| m.user_id.clone())
                .collect();

            for user_id in active_ids {
                let Some(mut user) = store.find_user_by_id(&user_id).await? else {
                    tracing::warn!(group_id = %group.group_id, %user_id, "active member has no user record");
                    report.orphaned_members += 1;
                    continue;
                };
                if user.is_active_in(&group.group_id) {
                    continue;
                }
                // 重新读取群组，避免与正在进行的退出操作冲突
                let still_active = store
                    .find_group_by_id(&group.group_id)
                    .await?
                    .is_some_and(|g| g.is_active_member(&user_id));
                if !still_active {
                    continue;
                }
                user.activate_entry(&group.group_id, Utc::now());
                match store.save_user(&mut user).await {
                    Ok(()) => report.user_entries_activated += 1,
                    Err(StoreError::Conflict | StoreError::NotFound) => {
                        report.skipped_conflicts += 1
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        for mut user in store.list_users().await? {
            report.users_scanned += 1;

            let active_groups: Vec<String> = user
                .class_groups
                .iter()
                .filter(|e| e.is_active)
                .map(|e| e.group_id.clone())
                .collect();

            let mut changed = 0;
            for group_id in active_groups {
                // 用户侧后写，重新读取群组可以看到已经完成的加入
                let confirmed = store
                    .find_group_by_id(&group_id)
                    .await?
                    .is_some_and(|g| g.is_active_member(&user.user_id));
                if !confirmed && user.deactivate_entry(&group_id, Utc::now()) {
                    tracing::warn!(user_id = %user.user_id, %group_id, "user entry has no active group record");
                    changed += 1;
                }
            }

            if changed > 0 {
                match store.save_user(&mut user).await {
                    Ok(()) => report.user_entries_deactivated += changed,
                    Err(StoreError::Conflict | StoreError::NotFound) => {
                        report.skipped_conflicts += 1
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        tracing::info!(
            groups = report.groups_scanned,
            users = report.users_scanned,
            repairs = report.repairs(),
            orphans = report.orphaned_members,
            skipped = report.skipped_conflicts,
            "class group reconciliation finished"
        );
        Ok(report)
    }
}
