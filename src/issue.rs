use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::batch::{BatchReport, BatchTable, RowFailure};
use crate::config::Config;
use crate::dates::normalize_date;
use crate::db::{CertificateRecord, CertificateStore, NewCertificate};
use crate::error::{IssueError, Result};
use crate::pdf::CertificateRenderer;
use crate::storage::document_path;

/// Raw form input for a single certificate.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct IssueRequest {
    pub name: String,
    pub event: String,
    pub issue_date: String,
    #[serde(default)]
    pub number: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Issued {
    pub record: CertificateRecord,
    pub path: PathBuf,
}

pub fn missing_fields(name: &str, event: &str, issue_date: &str) -> Vec<&'static str> {
    [("name", name), ("event", event), ("issue date", issue_date)]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
}

fn supplied_number(number: Option<&str>) -> Option<String> {
    number
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Validates input, stores the record and renders its document.
pub struct Issuer<R> {
    store: CertificateStore,
    renderer: R,
    output_dir: PathBuf,
    // One issuance at a time; the render runs while the write lock is held.
    issuing: Mutex<()>,
}

impl<R: CertificateRenderer> Issuer<R> {
    pub fn new(store: CertificateStore, renderer: R, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            renderer,
            output_dir: output_dir.into(),
            issuing: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config, renderer: R) -> Self {
        Self::new(
            CertificateStore::new(&config.database_path),
            renderer,
            &config.output_directory,
        )
    }

    pub fn store(&self) -> &CertificateStore {
        &self.store
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn issue(&self, request: &IssueRequest) -> Result<Issued> {
        let missing = missing_fields(&request.name, &request.event, &request.issue_date);
        if !missing.is_empty() {
            return Err(IssueError::Validation(missing));
        }

        let issue_date = normalize_date(&request.issue_date)?;
        let new = NewCertificate {
            name: request.name.trim().to_string(),
            event: request.event.trim().to_string(),
            issue_date,
            number: supplied_number(request.number.as_deref()),
        };

        self.persist_and_render(&new).await
    }

    /// Issues every complete row in order. Incomplete rows are skipped and
    /// counted; a row that fails is recorded and the batch moves on.
    pub async fn issue_batch(&self, table: &BatchTable) -> Result<BatchReport> {
        let columns = table.columns()?;
        let mut report = BatchReport::default();

        for (index, cells) in table.rows.iter().enumerate() {
            let row = columns.read(cells);
            if !row.is_complete() {
                debug!("Skipping incomplete batch row {}", index + 1);
                report.skipped += 1;
                continue;
            }

            let outcome = match normalize_date(&row.issue_date) {
                Ok(issue_date) => {
                    let new = NewCertificate {
                        name: row.name,
                        event: row.event,
                        issue_date,
                        number: supplied_number(row.number.as_deref()),
                    };
                    self.persist_and_render(&new).await
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(issued) => {
                    report.generated += 1;
                    report.outputs.push(issued.path);
                }
                Err(e) => {
                    warn!("Batch row {} failed: {}", index + 1, e);
                    report.failed.push(RowFailure {
                        row: index + 1,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Batch finished: {} generated, {} skipped, {} failed",
            report.generated,
            report.skipped,
            report.failed.len()
        );
        Ok(report)
    }

    /// The row is only committed once its document has been written.
    async fn persist_and_render(&self, new: &NewCertificate) -> Result<Issued> {
        let _turn = self.issuing.lock().await;
        let (record, path) = self
            .store
            .insert_then(new, |record| {
                let path = document_path(&self.output_dir, &record.number, &record.name);
                self.renderer.render(record, &path)?;
                Ok::<_, IssueError>(path)
            })
            .await?;

        info!("Issued {} for {} -> {}", record.number, record.name, path.display());
        Ok(Issued { record, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use crate::pdf::write_replacing;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Writes the record's fields as text instead of a PDF.
    struct TextRenderer;

    impl CertificateRenderer for TextRenderer {
        fn render(&self, record: &CertificateRecord, path: &Path) -> std::result::Result<(), RenderError> {
            let body = format!(
                "{}|{}|{}|{}",
                record.number, record.name, record.event, record.issue_date
            );
            write_replacing(path, body.as_bytes())?;
            Ok(())
        }
    }

    struct BrokenRenderer;

    impl CertificateRenderer for BrokenRenderer {
        fn render(&self, _: &CertificateRecord, _: &Path) -> std::result::Result<(), RenderError> {
            Err(RenderError::Fonts("no fonts".to_string()))
        }
    }

    #[derive(Default)]
    struct SlowRenderer {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CertificateRenderer for SlowRenderer {
        fn render(&self, record: &CertificateRecord, path: &Path) -> std::result::Result<(), RenderError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(200));
            self.active.fetch_sub(1, Ordering::SeqCst);
            write_replacing(path, record.number.as_bytes())?;
            Ok(())
        }
    }

    async fn issuer_with<R: CertificateRenderer>(renderer: R) -> (tempfile::TempDir, Issuer<R>) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_paths(dir.path().join("certs.db"), dir.path().join("out"));
        crate::storage::ensure_dirs(&config.output_directory).unwrap();
        let issuer = Issuer::from_config(&config, renderer);
        issuer.store().initialize().await.unwrap();
        (dir, issuer)
    }

    fn request(name: &str, event: &str, date: &str, number: Option<&str>) -> IssueRequest {
        IssueRequest {
            name: name.to_string(),
            event: event.to_string(),
            issue_date: date.to_string(),
            number: number.map(str::to_string),
        }
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn table(rows: &[[&str; 3]]) -> BatchTable {
        BatchTable::new(
            vec!["Name".into(), "EVENT".into(), "issuedate".into()],
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[tokio::test]
    async fn supplied_number_is_stored_and_rendered() {
        let (_dir, issuer) = issuer_with(TextRenderer).await;
        let issued = issuer
            .issue(&request("Ana Souza", "Rust Workshop", "2024-03-05", Some("EVT-7")))
            .await
            .unwrap();

        let stored = issuer.store().get(issued.record.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Ana Souza");
        assert_eq!(stored.event, "Rust Workshop");
        assert_eq!(stored.issue_date, "2024-03-05");
        assert_eq!(stored.number, "EVT-7");

        assert_eq!(issued.path, issuer.output_dir().join("EVT-7_Ana_Souza.pdf"));
        assert_eq!(files_in(issuer.output_dir()), vec!["EVT-7_Ana_Souza.pdf"]);
    }

    #[tokio::test]
    async fn missing_fields_fail_before_anything_is_written() {
        let (_dir, issuer) = issuer_with(TextRenderer).await;
        let err = issuer
            .issue(&request(" ", "Rust", "", None))
            .await
            .unwrap_err();

        match err {
            IssueError::Validation(fields) => assert_eq!(fields, vec!["name", "issue date"]),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(issuer.store().count().await.unwrap(), 0);
        assert!(files_in(issuer.output_dir()).is_empty());
    }

    #[tokio::test]
    async fn bad_date_is_a_format_error() {
        let (_dir, issuer) = issuer_with(TextRenderer).await;
        let err = issuer
            .issue(&request("Ana", "Rust", "2024/03/05", None))
            .await
            .unwrap_err();

        assert!(matches!(err, IssueError::Format(_)));
        assert_eq!(issuer.store().count().await.unwrap(), 0);
        assert!(files_in(issuer.output_dir()).is_empty());
    }

    #[tokio::test]
    async fn day_first_dates_are_stored_canonically() {
        let (_dir, issuer) = issuer_with(TextRenderer).await;
        let issued = issuer
            .issue(&request("Ana", "Rust", "05/03/2024", None))
            .await
            .unwrap();
        assert_eq!(issued.record.issue_date, "2024-03-05");
    }

    #[tokio::test]
    async fn numbers_are_generated_in_sequence() {
        let (_dir, issuer) = issuer_with(TextRenderer).await;
        let first = issuer
            .issue(&request("Ana", "Rust", "2024-03-05", None))
            .await
            .unwrap();
        let second = issuer
            .issue(&request("Bruno", "Rust", "2024-03-05", Some("  ")))
            .await
            .unwrap();

        assert_eq!(first.record.number, "CERT-0001");
        assert_eq!(second.record.number, "CERT-0002");
        assert_eq!(
            files_in(issuer.output_dir()),
            vec!["CERT-0001_Ana.pdf", "CERT-0002_Bruno.pdf"]
        );
    }

    #[tokio::test]
    async fn reissuing_the_same_file_name_overwrites() {
        let (_dir, issuer) = issuer_with(TextRenderer).await;
        issuer
            .issue(&request("Ana", "First", "2024-03-05", Some("X-1")))
            .await
            .unwrap();
        let second = issuer
            .issue(&request("Ana", "Second", "2024-03-06", Some("X-1")))
            .await
            .unwrap();

        assert_eq!(files_in(issuer.output_dir()), vec!["X-1_Ana.pdf"]);
        let content = std::fs::read_to_string(&second.path).unwrap();
        assert_eq!(content, "X-1|Ana|Second|2024-03-06");
        assert_eq!(issuer.store().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn render_failure_leaves_no_record() {
        let (_dir, issuer) = issuer_with(BrokenRenderer).await;
        let err = issuer
            .issue(&request("Ana", "Rust", "2024-03-05", None))
            .await
            .unwrap_err();

        assert!(matches!(err, IssueError::Render(_)));
        assert_eq!(issuer.store().count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_issuance_queues_instead_of_failing() {
        let (_dir, issuer) = issuer_with(SlowRenderer::default()).await;
        let issuer = Arc::new(issuer);

        let handles: Vec<_> = ["Ana", "Bruno", "Carla"]
            .into_iter()
            .map(|name| {
                let issuer = Arc::clone(&issuer);
                tokio::spawn(async move {
                    issuer.issue(&request(name, "Rust", "2024-03-05", None)).await
                })
            })
            .collect();

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap().record.number);
        }
        numbers.sort();
        assert_eq!(numbers, vec!["CERT-0001", "CERT-0002", "CERT-0003"]);
        assert_eq!(issuer.renderer.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn batch_skips_incomplete_rows() {
        let (_dir, issuer) = issuer_with(TextRenderer).await;
        let report = issuer
            .issue_batch(&table(&[
                ["Ana", "Rust", "2024-03-05"],
                ["", "Rust", "2024-03-05"],
                ["Carla", "Rust", "06/03/2024"],
            ]))
            .await
            .unwrap();

        assert_eq!(report.generated, 2);
        assert_eq!(report.skipped, 1);
        assert!(report.failed.is_empty());
        assert_eq!(issuer.store().count().await.unwrap(), 2);
        assert_eq!(
            files_in(issuer.output_dir()),
            vec!["CERT-0001_Ana.pdf", "CERT-0002_Carla.pdf"]
        );
    }

    #[tokio::test]
    async fn batch_row_failure_does_not_stop_the_batch() {
        let (_dir, issuer) = issuer_with(TextRenderer).await;
        let report = issuer
            .issue_batch(&table(&[
                ["Ana", "Rust", "March 5"],
                ["Bruno", "Rust", "2024-03-05"],
            ]))
            .await
            .unwrap();

        assert_eq!(report.generated, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].row, 1);
        assert_eq!(report.outputs, vec![issuer.output_dir().join("CERT-0001_Bruno.pdf")]);
    }

    #[tokio::test]
    async fn batch_without_required_columns_processes_nothing() {
        let (_dir, issuer) = issuer_with(TextRenderer).await;
        let table = BatchTable::new(
            vec!["name".into(), "date".into()],
            vec![vec!["Ana".into(), "2024-03-05".into()]],
        );

        let err = issuer.issue_batch(&table).await.unwrap_err();
        assert!(matches!(err, IssueError::Schema(_)));
        assert_eq!(issuer.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn batch_uses_number_column_when_present() {
        let (_dir, issuer) = issuer_with(TextRenderer).await;
        let table = BatchTable::new(
            vec!["name".into(), "event".into(), "issueDate".into(), "Number".into()],
            vec![
                vec!["Ana".into(), "Rust".into(), "2024-03-05".into(), "R-9".into()],
                vec!["Bruno".into(), "Rust".into(), "2024-03-05".into(), "".into()],
            ],
        );

        issuer.issue_batch(&table).await.unwrap();
        assert_eq!(
            files_in(issuer.output_dir()),
            vec!["CERT-0002_Bruno.pdf", "R-9_Ana.pdf"]
        );
    }
}
