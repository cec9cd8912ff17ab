// 班级群成员关系模块
// 包含文档模型、存储接口及实现、重试策略，以及分班/加入/退出/对账操作

pub mod memory;
pub mod model;
pub mod postgres;
mod reconcile;
pub mod retry;
mod seed;
mod service;
pub mod store;

pub use memory::MemoryStore;
pub use model::{ClassGroup, ClassGroupEntry, GroupSummary, Member, MemberRecord, MemberRole, UserInfo};
pub use postgres::PgStore;
pub use reconcile::ReconcileReport;
pub use retry::RetryPolicy;
pub use service::{
    ALREADY_MEMBER, AssignmentResult, JoinOutcome, LeaveOutcome, MembershipService, NOT_MEMBER,
};
pub use store::MembershipStore;
