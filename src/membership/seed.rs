use chrono::Utc;

use super::model::ClassGroup;
use super::service::MembershipService;
use super::store::MembershipStore;
use crate::error::StoreError;

impl<S: MembershipStore> MembershipService<S> {
    /// 为有效年份范围内缺失的年份创建班级群，返回新建数量
    pub async fn seed_class_groups(&self) -> Result<usize, StoreError> {
        let mut created = 0;
        for year in self.years.clone() {
            if self.store.find_group_by_year(year).await?.is_some() {
                continue;
            }
            let group = ClassGroup::new(year, Utc::now());
            match self.store.create_group(&group).await {
                Ok(()) => {
                    tracing::info!(group_id = %group.group_id, year, "created class group");
                    created += 1;
                }
                // 其他实例同时创建了同一年份
                Err(StoreError::AlreadyExists) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }
}
