use std::path::{Path, PathBuf};

/// `{number}_{name}.pdf`, spaces in the name turned into underscores.
///
/// Path separators are replaced as well so a name can never point outside
/// the output directory.
pub fn document_file_name(number: &str, name: &str) -> String {
    let safe = |s: &str| s.replace([' ', '/', '\\'], "_");
    format!("{}_{}.pdf", safe(number), safe(name))
}

pub fn document_path(output_dir: &Path, number: &str, name: &str) -> PathBuf {
    output_dir.join(document_file_name(number, name))
}

pub fn ensure_dirs(output_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(output_dir)
}

/// Every `.pdf` directly inside `output_dir`, sorted by file name.
pub fn list_documents(output_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut docs: Vec<PathBuf> = std::fs::read_dir(output_dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "pdf"))
        .collect();
    docs.sort();
    Ok(docs)
}
