use std::path::Path;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Makes a relative path absolute against the working directory.
pub fn resolve_path(path: &str) -> String {
    let p = Path::new(path);
    if p.is_absolute() {
        return path.to_string();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(p).display().to_string(),
        Err(_) => path.to_string(),
    }
}

/// Guesses the provider of a file from its extension.
pub fn provider_for_path(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("xlsx") | Some("xlsm") | Some("xls") => "xlsx",
        _ => "csv",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names() {
        assert_eq!(simplify_file_name("/tmp/a/b.csv"), "b.csv");
        assert_eq!(provider_for_path("abs/2016.XLSX"), "xlsx");
        assert_eq!(provider_for_path("abs/2016.csv"), "csv");
        assert!(Path::new(&resolve_path("x.csv")).is_absolute());
        assert_eq!(resolve_path("/x.csv"), "/x.csv");
    }
}
