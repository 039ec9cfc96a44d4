use axum::{
    extract::{Multipart, State},
    response::{Html, IntoResponse, Redirect},
    Form,
};
use std::sync::Arc;
use tera::Context;

use crate::batch::decode_upload;
use crate::dates::{display_date, today};
use crate::issue::IssueRequest;
use crate::state::AppState;

const RECENT_LIMIT: i64 = 10;

pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if !state.is_ready() {
        return render_template("loading.html", Context::new()).into_response();
    }

    let store = state.issuer.store();
    let next_number = match store.next_number().await {
        Ok(n) => n,
        Err(e) => {
            tracing::error!("Failed to preview next number: {}", e);
            String::new()
        }
    };
    let recent = match store.recent(RECENT_LIMIT).await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("Failed to list certificates: {}", e);
            Vec::new()
        }
    };
    let recent: Vec<serde_json::Value> = recent
        .into_iter()
        .map(|r| {
            serde_json::json!({
                "number": r.number,
                "name": r.name,
                "event": r.event,
                "issue_date": display_date(&r.issue_date),
                "filename": crate::storage::document_file_name(&r.number, &r.name),
            })
        })
        .collect();

    let mut ctx = Context::new();
    ctx.insert("today", &today().format("%Y-%m-%d").to_string());
    ctx.insert("next_number", &next_number);
    ctx.insert("recent", &recent);
    render_template("index.html", ctx).into_response()
}

pub async fn issue_handler(
    State(state): State<Arc<AppState>>,
    Form(request): Form<IssueRequest>,
) -> impl IntoResponse {
    if !state.is_ready() {
        return Redirect::to("/").into_response();
    }

    let mut ctx = Context::new();
    ctx.insert("failures", &Vec::<String>::new());
    match state.issuer.issue(&request).await {
        Ok(issued) => {
            let filename = issued
                .path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            ctx.insert("success", &true);
            ctx.insert(
                "message",
                &format!("Certificate {} generated.", issued.record.number),
            );
            ctx.insert("files", &vec![filename]);
        }
        Err(e) => {
            tracing::warn!("Issuance rejected: {}", e);
            ctx.insert("success", &false);
            ctx.insert("message", &e.to_string());
            ctx.insert("files", &Vec::<String>::new());
        }
    }

    render_template("result.html", ctx).into_response()
}

pub async fn batch_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if !state.is_ready() {
        return Redirect::to("/").into_response();
    }

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("records") {
            continue;
        }
        let filename = field.file_name().unwrap_or("records.csv").to_string();
        if let Ok(data) = field.bytes().await {
            upload = Some((filename, data.to_vec()));
        }
    }

    let (filename, data) = match upload {
        Some(u) if !u.1.is_empty() => u,
        _ => return Redirect::to("/").into_response(),
    };

    let mut ctx = Context::new();
    ctx.insert("failures", &Vec::<String>::new());
    let outcome = match decode_upload(&filename, &data) {
        Ok(table) => state
            .issuer
            .issue_batch(&table)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match outcome {
        Ok(report) => {
            let files: Vec<String> = report
                .outputs
                .iter()
                .filter_map(|p| p.file_name())
                .map(|f| f.to_string_lossy().into_owned())
                .collect();
            let failures: Vec<String> = report
                .failed
                .iter()
                .map(|f| format!("Row {}: {}", f.row, f.message))
                .collect();
            ctx.insert("success", &report.failed.is_empty());
            ctx.insert(
                "message",
                &format!(
                    "{} certificates generated, {} incomplete rows skipped.",
                    report.generated, report.skipped
                ),
            );
            ctx.insert("files", &files);
            ctx.insert("failures", &failures);
        }
        Err(message) => {
            tracing::warn!("Batch {} rejected: {}", filename, message);
            ctx.insert("success", &false);
            ctx.insert("message", &message);
            ctx.insert("files", &Vec::<String>::new());
        }
    }

    render_template("result.html", ctx).into_response()
}

fn render_template(name: &str, ctx: Context) -> Html<String> {
    let tera = crate::templates::get_tera();
    let rendered = tera.render(name, &ctx).unwrap_or_else(|e| {
        tracing::error!("Template {} failed: {}", name, e);
        format!("Template error: {}", name)
    });
    Html(rendered)
}
