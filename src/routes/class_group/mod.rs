mod handler;
mod model;

pub use handler::{join_group, leave_group};
pub use model::{MembershipRequest, MembershipResponse};
