//! JSON summaries on stdout or in a file.

use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Pretty JSON for a command summary.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Cannot encode summary: {}", e))
}

/// Write `json` to `path`, or to stdout followed by a newline.
pub fn write_output(json: &str, path: Option<&Path>) -> Result<(), String> {
    if let Some(path) = path {
        return std::fs::write(path, json)
            .map_err(|e| format!("Cannot write summary to '{}': {}", path.display(), e));
    }
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json).map_err(|e| format!("Cannot write to stdout: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Summary {
        subject: &'static str,
        epochs: usize,
        p_value: f64,
    }

    #[test]
    fn test_non_finite_values_become_null() {
        let json = to_json(&Summary {
            subject: "001",
            epochs: 3,
            p_value: f64::NAN,
        })
        .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["epochs"], 3);
        assert!(parsed["p_value"].is_null());
    }

    #[test]
    fn test_write_to_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("summary.json");
        write_output("{\"dof\": 1}", Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"dof\": 1}");
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("summary.json");
        let err = write_output("{}", Some(&path)).unwrap_err();
        assert!(err.contains("summary.json"));
    }
}
