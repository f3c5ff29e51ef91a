mod common;

use async_trait::async_trait;
use common::{assignment_row, credential_row, UnreachableCatalog};
use schedule_grader::error::CatalogError;
use schedule_grader::infrastructure::{CatalogStore, InMemoryCatalogStore, TomlCatalogStore};
use schedule_grader::models::{AssignmentRow, CredentialRow, Page};
use schedule_grader::services::CatalogLoader;
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 作业表分成 3 页返回，令牌是不透明字符串
struct ThreePageCatalog {
    assignment_calls: AtomicUsize,
}

#[async_trait]
impl CatalogStore for ThreePageCatalog {
    async fn list_assignments(
        &self,
        continuation: Option<String>,
    ) -> Result<Page<AssignmentRow>, CatalogError> {
        self.assignment_calls.fetch_add(1, Ordering::SeqCst);
        let page = match continuation.as_deref() {
            None => Page {
                items: vec![assignment_row("hw1", "http://g/1"), assignment_row("hw2", "http://g/2")],
                continuation: Some("page-two".to_string()),
            },
            Some("page-two") => Page {
                items: vec![assignment_row("hw3", "http://g/3")],
                continuation: Some("page-three".to_string()),
            },
            Some("page-three") => Page::last(vec![
                assignment_row("hw4", "http://g/4"),
                assignment_row("hw5", "http://g/5"),
            ]),
            Some(other) => {
                return Err(CatalogError::InvalidContinuation {
                    table: "assignments".to_string(),
                    token: other.to_string(),
                })
            }
        };
        Ok(page)
    }

    async fn list_credentials(
        &self,
        assignment: &str,
        continuation: Option<String>,
    ) -> Result<Page<CredentialRow>, CatalogError> {
        // hw1 的凭据也分页
        let page = match (assignment, continuation.as_deref()) {
            ("hw1", None) => Page {
                items: vec![credential_row("hw1", "a@x.com", "t-a")],
                continuation: Some("creds-2".to_string()),
            },
            ("hw1", Some("creds-2")) => Page {
                items: vec![credential_row("hw1", "b@x.com", "t-b")],
                continuation: Some("creds-3".to_string()),
            },
            ("hw1", Some("creds-3")) => Page::last(vec![credential_row("hw1", "c@x.com", "t-c")]),
            (_, None) => Page::last(Vec::new()),
            (_, Some(other)) => {
                return Err(CatalogError::InvalidContinuation {
                    table: "credentials".to_string(),
                    token: other.to_string(),
                })
            }
        };
        Ok(page)
    }
}

#[tokio::test]
async fn loader_drains_every_page_exactly_once() {
    let store = Arc::new(ThreePageCatalog {
        assignment_calls: AtomicUsize::new(0),
    });
    let loader = CatalogLoader::new(store.clone());

    let assignments = loader.load_catalog().await.unwrap();

    let names: Vec<&str> = assignments.iter().map(|a| a.name.as_str()).collect();
    let unique: BTreeSet<&str> = names.iter().copied().collect();
    assert_eq!(names.len(), 5, "no duplicates");
    assert_eq!(
        unique,
        ["hw1", "hw2", "hw3", "hw4", "hw5"].into_iter().collect::<BTreeSet<_>>()
    );
    assert_eq!(store.assignment_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn loader_drains_credential_pages_per_assignment() {
    let store = Arc::new(ThreePageCatalog {
        assignment_calls: AtomicUsize::new(0),
    });
    let assignments = CatalogLoader::new(store).load_catalog().await.unwrap();

    let hw1 = assignments.iter().find(|a| a.name == "hw1").unwrap();
    let emails: BTreeSet<&str> = hw1.students.iter().map(|s| s.email.as_str()).collect();
    assert_eq!(emails, ["a@x.com", "b@x.com", "c@x.com"].into_iter().collect::<BTreeSet<_>>());

    // 其它作业没有学生，仍然保留
    let hw2 = assignments.iter().find(|a| a.name == "hw2").unwrap();
    assert!(hw2.students.is_empty());
    assert_eq!(hw2.grader_url, "http://g/2");
}

#[tokio::test]
async fn small_pages_do_not_drop_students() {
    let credentials: Vec<CredentialRow> = (0..7)
        .map(|i| credential_row("cs101", &format!("s{}@x.com", i), &format!("tok{}", i)))
        .collect();
    let store = InMemoryCatalogStore::new(vec![assignment_row("cs101", "http://g/")], credentials)
        .with_page_size(3);

    let assignments = CatalogLoader::new(Arc::new(store)).load_catalog().await.unwrap();

    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].students.len(), 7);
}

#[tokio::test]
async fn empty_credentials_are_dropped_but_the_assignment_stays() {
    let store = InMemoryCatalogStore::new(
        vec![assignment_row("hw1", "http://g/")],
        vec![
            credential_row("hw1", "ok@x.com", "tok"),
            credential_row("hw1", "blank@x.com", ""),
        ],
    );

    let assignments = CatalogLoader::new(Arc::new(store)).load_catalog().await.unwrap();

    assert_eq!(assignments[0].students.len(), 1);
    assert_eq!(assignments[0].students[0].email, "ok@x.com");
}

#[tokio::test]
async fn unreachable_store_is_reported() {
    let err = CatalogLoader::new(Arc::new(UnreachableCatalog))
        .load_catalog()
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Unavailable { .. }));
}

#[tokio::test]
async fn toml_store_is_reread_on_every_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[[assignments]]
PartitionKey = "hw1"
GraderUrl = "http://g/"

[[credentials]]
PartitionKey = "hw1"
RowKey = "s1"
Credentials = "tok1"
"#
    )
    .unwrap();
    file.flush().unwrap();

    let loader = CatalogLoader::new(Arc::new(TomlCatalogStore::new(file.path())));
    let first = loader.load_catalog().await.unwrap();
    assert_eq!(first[0].students.len(), 1);

    write!(
        file,
        r#"
[[credentials]]
PartitionKey = "hw1"
RowKey = "s2"
Credentials = "tok2"
"#
    )
    .unwrap();
    file.flush().unwrap();

    let second = loader.load_catalog().await.unwrap();
    assert_eq!(second[0].students.len(), 2);
}

const TWO_ASSIGNMENTS: &str = r#"
[[assignments]]
PartitionKey = "hw1"
GraderUrl = "http://g/1"

[[assignments]]
PartitionKey = "hw2"
GraderUrl = "http://g/2"
"#;

#[tokio::test]
async fn toml_store_parses_once_per_file_version() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), TWO_ASSIGNMENTS).unwrap();
    let store = TomlCatalogStore::new(file.path()).with_page_size(1);

    let first = store.list_assignments(None).await.unwrap();
    let second = store.list_assignments(first.continuation.clone()).await.unwrap();

    assert_eq!(first.items[0].partition_key, "hw1");
    assert_eq!(second.items[0].partition_key, "hw2");
    assert!(second.continuation.is_none());
    assert_eq!(store.generation(), Some(1));
}

#[tokio::test]
async fn toml_store_rejects_tokens_from_an_older_file_version() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), TWO_ASSIGNMENTS).unwrap();
    let store = TomlCatalogStore::new(file.path()).with_page_size(1);

    let first = store.list_assignments(None).await.unwrap();
    let stale = first.continuation.unwrap();

    // 分页途中文件被替换，旧偏移不能套用到新内容上
    std::fs::write(
        file.path(),
        format!(
            "{}\n[[assignments]]\nPartitionKey = \"hw0\"\nGraderUrl = \"http://g/0\"\n",
            TWO_ASSIGNMENTS
        ),
    )
    .unwrap();

    let err = store.list_assignments(Some(stale)).await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidContinuation { .. }));
    assert_eq!(store.generation(), Some(2));
}

#[tokio::test]
async fn duplicate_assignment_rows_keep_the_first() {
    let store = InMemoryCatalogStore::new(
        vec![
            assignment_row("hw1", "http://g/first"),
            assignment_row("hw2", "http://g/2"),
            assignment_row("hw1", "http://g/second"),
        ],
        vec![
            credential_row("hw1", "a@x.com", "t-a"),
            credential_row("hw1", "b@x.com", "t-b"),
        ],
    )
    .with_page_size(1);

    let catalog = CatalogLoader::new(Arc::new(store)).load_catalog().await.unwrap();

    assert_eq!(catalog.len(), 2);
    let hw1: Vec<_> = catalog.iter().filter(|a| a.name == "hw1").collect();
    assert_eq!(hw1.len(), 1);
    assert_eq!(hw1[0].grader_url, "http://g/first");
    assert_eq!(hw1[0].students.len(), 2);
}
