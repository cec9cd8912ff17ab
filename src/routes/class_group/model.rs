use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::membership::{GroupSummary, JoinOutcome, LeaveOutcome};

#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub group_id: String,
}

/// 加入/退出接口的响应体
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MembershipResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_group: Option<GroupSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<i32>,
}

impl MembershipResponse {
    fn rejected(error: &str, code: Option<&'static str>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.to_string()),
            code,
            class_group: None,
            member_count: None,
        }
    }

    pub fn from_join(outcome: JoinOutcome) -> (StatusCode, Self) {
        let code = outcome.code();
        match outcome {
            JoinOutcome::Joined(group) => (
                StatusCode::OK,
                MembershipResponse {
                    success: true,
                    message: Some(format!("Successfully joined {}", group.name)),
                    error: None,
                    code: None,
                    member_count: Some(group.member_count),
                    class_group: Some(group),
                },
            ),
            JoinOutcome::AlreadyMember => (
                StatusCode::BAD_REQUEST,
                MembershipResponse::rejected("You are already a member of this class group", code),
            ),
        }
    }

    pub fn from_leave(outcome: LeaveOutcome) -> (StatusCode, Self) {
        let code = outcome.code();
        match outcome {
            LeaveOutcome::Left { member_count } => (
                StatusCode::OK,
                MembershipResponse {
                    success: true,
                    message: Some("Successfully left the class group".to_string()),
                    error: None,
                    code: None,
                    class_group: None,
                    member_count: Some(member_count),
                },
            ),
            LeaveOutcome::NotMember => (
                StatusCode::NOT_FOUND,
                MembershipResponse::rejected("You are not a member of this class group", code),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::{ALREADY_MEMBER, NOT_MEMBER};

    #[test]
    fn already_member_is_a_bad_request() {
        let (status, body) = MembershipResponse::from_join(JoinOutcome::AlreadyMember);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);
        assert_eq!(body.code, Some(ALREADY_MEMBER));
    }

    #[test]
    fn not_member_is_not_found() {
        let (status, body) = MembershipResponse::from_leave(LeaveOutcome::NotMember);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, Some(NOT_MEMBER));
    }

    #[test]
    fn joined_response_carries_group_summary() {
        let group = GroupSummary {
            group_id: "g1".into(),
            name: "Class of 2020".into(),
            graduation_year: 2020,
            member_count: 4,
        };
        let (status, body) = MembershipResponse::from_join(JoinOutcome::Joined(group));
        assert_eq!(status, StatusCode::OK);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["classGroup"]["groupId"], "g1");
        assert_eq!(json["classGroup"]["graduationYear"], 2020);
        assert_eq!(json["classGroup"]["memberCount"], 4);
        assert_eq!(json["memberCount"], 4);
        assert!(json.get("class_group").is_none());
        assert!(json.get("code").is_none());
    }

    #[test]
    fn left_response_uses_camel_case_keys() {
        let (status, body) = MembershipResponse::from_leave(LeaveOutcome::Left { member_count: 0 });
        assert_eq!(status, StatusCode::OK);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["memberCount"], 0);
        assert!(json.get("member_count").is_none());
        assert!(json.get("classGroup").is_none());
    }

    #[test]
    fn rejected_response_carries_error_and_code() {
        let (_, body) = MembershipResponse::from_join(JoinOutcome::AlreadyMember);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], ALREADY_MEMBER);
        assert!(json["error"].is_string());
        assert!(json.get("message").is_none());
    }
}
