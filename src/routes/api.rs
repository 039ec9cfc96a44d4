use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::io::Write;
use std::path::Component;
use std::sync::Arc;

use crate::state::AppState;
use crate::storage::list_documents;

pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> impl IntoResponse {
    if !is_plain_file_name(&filename) {
        return axum::response::Redirect::to("/").into_response();
    }

    let path = state.config.output_directory.join(&filename);
    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(_) => return axum::response::Redirect::to("/").into_response(),
    };

    let mime = mime_guess::from_path(&filename)
        .first_raw()
        .unwrap_or("application/octet-stream");
    (
        [
            (axum::http::header::CONTENT_TYPE, mime.to_string()),
            (
                axum::http::header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        content,
    )
        .into_response()
}

/// A single normal path component, so the lookup stays inside the output directory.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = std::path::Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

pub async fn download_all(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let docs = match list_documents(&state.config.output_directory) {
        Ok(docs) => docs,
        Err(e) => {
            tracing::error!("Failed to list documents: {}", e);
            return axum::response::Redirect::to("/").into_response();
        }
    };

    let zip_data = match zip_documents(&docs) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!("Failed to build archive: {}", e);
            return axum::response::Redirect::to("/").into_response();
        }
    };

    (
        [
            (axum::http::header::CONTENT_TYPE, "application/zip".to_string()),
            (
                axum::http::header::CONTENT_DISPOSITION,
                "attachment; filename=\"certificates.zip\"".to_string(),
            ),
        ],
        zip_data,
    )
        .into_response()
}

fn zip_documents(docs: &[std::path::PathBuf]) -> zip::result::ZipResult<Vec<u8>> {
    let mut zip_data = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut zip_data));
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o644);

        for doc in docs {
            let Some(name) = doc.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let content = std::fs::read(doc)?;
            zip.start_file(name, options)?;
            zip.write_all(&content)?;
        }

        zip.finish()?;
    }
    Ok(zip_data)
}

pub async fn next_number(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if !state.is_ready() {
        return axum::Json(serde_json::json!({
            "status": "loading",
            "message": "Still starting up."
        }))
        .into_response();
    }

    match state.issuer.store().next_number().await {
        Ok(number) => axum::Json(serde_json::json!({
            "status": "ok",
            "number": number
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to preview next number: {}", e);
            axum::Json(serde_json::json!({
                "status": "error",
                "message": "Database error."
            }))
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_with_dots_are_downloadable() {
        let name = crate::storage::document_file_name("A/1", "../x");
        assert!(is_plain_file_name(&name));
        assert!(is_plain_file_name("CERT-0001_Ana.pdf"));
    }

    #[test]
    fn traversal_and_nested_names_are_rejected() {
        for name in ["", "..", ".", "../secret.pdf", "sub/doc.pdf", "/etc/passwd", "a\\b.pdf"] {
            assert!(!is_plain_file_name(name), "{name:?} should be rejected");
        }
    }

    #[test]
    fn archive_contains_every_document() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("CERT-0001_Ana.pdf");
        let b = dir.path().join("CERT-0002_Bruno.pdf");
        std::fs::write(&a, b"%PDF-a").unwrap();
        std::fs::write(&b, b"%PDF-b").unwrap();

        let data = zip_documents(&[a, b]).unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(names, vec!["CERT-0001_Ana.pdf", "CERT-0002_Bruno.pdf"]);
    }
}
