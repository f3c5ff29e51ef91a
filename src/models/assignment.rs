//! 作业与学生凭据
//!
//! 目录存储中的原始行（`AssignmentRow` / `CredentialRow`）只在加载层出现，
//! 进入评分流程之前统一转换为带类型的 `Assignment` / `StudentRecord`。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 一份可评分的作业
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// 作业标识（同时作为归档分区键）
    pub name: String,
    /// 评分服务地址，凭据作为查询参数追加
    pub grader_url: String,
    /// 学生列表，可以为空
    pub students: Vec<StudentRecord>,
}

impl Assignment {
    pub fn new(name: impl Into<String>, grader_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grader_url: grader_url.into(),
            students: Vec::new(),
        }
    }

    pub fn with_student(mut self, email: impl Into<String>, credentials: impl Into<String>) -> Self {
        self.students.push(StudentRecord::new(email, credentials));
        self
    }
}

/// 学生及其评分凭据
///
/// `credentials` 是不透明令牌，原样转发给评分服务，不做任何解析。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub email: String,
    pub credentials: String,
}

impl StudentRecord {
    pub fn new(email: impl Into<String>, credentials: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            credentials: credentials.into(),
        }
    }
}

// 凭据不进日志
impl fmt::Debug for StudentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudentRecord")
            .field("email", &self.email)
            .field("credentials", &"<redacted>")
            .finish()
    }
}

/// 一次评分的身份：(作业, 学生)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StudentKey {
    pub assignment: String,
    pub email: String,
}

impl StudentKey {
    pub fn new(assignment: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            assignment: assignment.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for StudentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.assignment, self.email)
    }
}

/// 作业表中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRow {
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    #[serde(rename = "GraderUrl")]
    pub grader_url: String,
}

/// 凭据表中的一行（按作业分区，按学生邮箱作为行键）
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRow {
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    #[serde(rename = "RowKey")]
    pub row_key: String,
    #[serde(rename = "Credentials")]
    pub credentials: String,
}

impl fmt::Debug for CredentialRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRow")
            .field("partition_key", &self.partition_key)
            .field("row_key", &self.row_key)
            .finish_non_exhaustive()
    }
}

/// 分页查询的一页结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 为 `None` 时表示已经是最后一页
    pub continuation: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            continuation: None,
        }
    }
}
