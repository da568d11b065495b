//! Property file loading from disk.

use std::fs;
use std::path::Path;

use toml::Value;

use crate::config::error::ConfigError;
use crate::config::properties::PropertySource;

/// Load a TOML file and flatten it into dotted property keys.
///
/// Tables nest with `.`; arrays use their index as a key segment, so
/// `[[servers]] host = "a"` becomes `servers.0.host`.
pub fn load_properties(path: &Path) -> Result<PropertySource, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table: toml::Table = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut properties = PropertySource::new();
    for (key, value) in &table {
        flatten(key, value, &mut properties);
    }
    tracing::debug!(path = %path.display(), keys = properties.len(), "Loaded property file");
    Ok(properties)
}

fn flatten(key: &str, value: &Value, out: &mut PropertySource) {
    match value {
        Value::Table(table) => {
            for (child, value) in table {
                flatten(&format!("{key}.{child}"), value, out);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten(&format!("{key}.{index}"), value, out);
            }
        }
        Value::String(s) => out.set(key, s.as_str()),
        Value::Integer(i) => out.set(key, i.to_string()),
        Value::Float(f) => out.set(key, f.to_string()),
        Value::Boolean(b) => out.set(key, b.to_string()),
        Value::Datetime(dt) => out.set(key, dt.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flattens_tables_and_arrays() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[city]
name = "Lyon"
population = 522000

[server]
port = 9090

[[city.districts]]
name = "Croix-Rousse"
"#
        )
        .unwrap();

        let properties = load_properties(file.path()).unwrap();
        assert_eq!(properties.get("city.name"), Some("Lyon"));
        assert_eq!(properties.get("city.population"), Some("522000"));
        assert_eq!(properties.get("server.port"), Some("9090"));
        assert_eq!(properties.get("city.districts.0.name"), Some("Croix-Rousse"));
    }

    #[test]
    fn test_missing_file() {
        let result = load_properties(Path::new("/nonexistent/application.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "city = [unterminated").unwrap();
        assert!(matches!(
            load_properties(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
