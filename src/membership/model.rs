// 班级群与成员关系的文档模型
// 群组一侧保存成员列表和冗余的 member_count，用户一侧保存对应的班级群引用

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 群内角色（群管理员身份与全站管理员无关）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    #[default]
    Member,
    Moderator,
    Admin,
}

/// 群组成员记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub role: MemberRole,
}

impl MemberRecord {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            joined_at: now,
            left_at: None,
            is_active: true,
            role: MemberRole::Member,
        }
    }
}

/// 班级群，每个毕业年份一个
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassGroup {
    pub group_id: String,
    pub name: String,
    pub graduation_year: i32,
    pub members: Vec<MemberRecord>,
    /// 活跃成员数，必须等于 members 中 is_active 的条数
    pub member_count: i32,
    /// 乐观锁版本号，每次保存成功后加一
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// 用户一侧的班级群引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassGroupEntry {
    pub group_id: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_admin: bool,
    pub is_moderator: bool,
}

/// 成员关系相关的用户文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: String,
    pub nickname: String,
    pub graduation_year: Option<i32>,
    pub class_groups: Vec<ClassGroupEntry>,
    pub version: i64,
}

/// 注册时附带的用户信息，只用于日志
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserInfo {
    pub nickname: String,
    pub email: Option<String>,
}

/// 对外返回的群组摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub group_id: String,
    pub name: String,
    pub graduation_year: i32,
    pub member_count: i32,
}

impl From<&ClassGroup> for GroupSummary {
    fn from(group: &ClassGroup) -> Self {
        Self {
            group_id: group.group_id.clone(),
            name: group.name.clone(),
            graduation_year: group.graduation_year,
            member_count: group.member_count,
        }
    }
}

impl ClassGroup {
    pub fn new(graduation_year: i32, now: DateTime<Utc>) -> Self {
        Self {
            group_id: uuid::Uuid::new_v4().to_string(),
            name: format!("Class of {}", graduation_year),
            graduation_year,
            members: Vec::new(),
            member_count: 0,
            version: 0,
            created_at: now,
        }
    }

    pub fn is_active_member(&self, user_id: &str) -> bool {
        self.members
            .iter()
            .any(|m| m.user_id == user_id && m.is_active)
    }

    pub fn active_count(&self) -> i32 {
        self.members.iter().filter(|m| m.is_active).count() as i32
    }

    /// 加入或重新激活成员。已是活跃成员时返回 false，不做任何修改
    pub fn activate_member(&mut self, user_id: &str, now: DateTime<Utc>) -> bool {
        match self.members.iter().position(|m| m.user_id == user_id) {
            Some(i) if self.members[i].is_active => return false,
            Some(i) => {
                let record = &mut self.members[i];
                record.is_active = true;
                record.joined_at = now;
                record.left_at = None;
            }
            None => self.members.push(MemberRecord::new(user_id, now)),
        }
        self.member_count += 1;
        true
    }

    /// 将活跃成员标记为已退出，记录保留。不是活跃成员时返回 false
    pub fn deactivate_member(&mut self, user_id: &str, now: DateTime<Utc>) -> bool {
        let Some(record) = self
            .members
            .iter_mut()
            .find(|m| m.user_id == user_id && m.is_active)
        else {
            return false;
        };
        record.is_active = false;
        record.left_at = Some(now);
        self.member_count = (self.member_count - 1).max(0);
        true
    }
}

impl Member {
    pub fn find_entry(&self, group_id: &str) -> Option<&ClassGroupEntry> {
        self.class_groups.iter().find(|e| e.group_id == group_id)
    }

    pub fn is_active_in(&self, group_id: &str) -> bool {
        self.find_entry(group_id).is_some_and(|e| e.is_active)
    }

    /// 插入或重新激活群组引用，已激活时返回 false
    pub fn activate_entry(&mut self, group_id: &str, now: DateTime<Utc>) -> bool {
        match self.class_groups.iter().position(|e| e.group_id == group_id) {
            Some(i) if self.class_groups[i].is_active => false,
            Some(i) => {
                let entry = &mut self.class_groups[i];
                entry.is_active = true;
                entry.joined_at = now;
                entry.left_at = None;
                true
            }
            None => {
                self.class_groups.push(ClassGroupEntry {
                    group_id: group_id.to_string(),
                    joined_at: now,
                    left_at: None,
                    is_active: true,
                    is_admin: false,
                    is_moderator: false,
                });
                true
            }
        }
    }

    /// 将群组引用标记为不活跃，没有活跃引用时返回 false
    pub fn deactivate_entry(&mut self, group_id: &str, now: DateTime<Utc>) -> bool {
        match self
            .class_groups
            .iter_mut()
            .find(|e| e.group_id == group_id && e.is_active)
        {
            Some(entry) => {
                entry.is_active = false;
                entry.left_at = Some(now);
                true
            }
            None => false,
        }
    }
}
