use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{Context, Result};

/// Civic tag used when a detected class has no taxonomy entry.
pub const UNCATEGORIZED_TAG: &str = "uncategorized_issue";

/// Load detector class names from a file with one name per line, zero-indexed.
pub fn load_class_mapping(file_path: &str) -> Result<HashMap<usize, String>> {
    let file = File::open(file_path).with_context(|| format!("opening labels {file_path}"))?;
    let reader = BufReader::new(file);

    let mapping: HashMap<usize, String> = reader
        .lines()
        .enumerate()
        .filter_map(|(id, line)| line.ok().map(|name| (id, name.trim().to_string())))
        .collect();

    Ok(mapping)
}

/// Static mapping from detector class names to civic-issue tags, loaded once at
/// startup and immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct CivicTaxonomy {
    map: HashMap<String, String>,
}

impl CivicTaxonomy {
    /// Load the taxonomy from a JSON object file, e.g. `{"car": "illegal_parking"}`.
    pub fn load(file_path: &str) -> Result<Self> {
        let file =
            File::open(file_path).with_context(|| format!("opening taxonomy {file_path}"))?;
        let map = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing taxonomy {file_path}"))?;
        Ok(Self { map })
    }

    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn tag_for(&self, class_name: &str) -> &str {
        self.map
            .get(class_name)
            .map(String::as_str)
            .unwrap_or(UNCATEGORIZED_TAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn labels_are_zero_indexed_and_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "person").unwrap();
        writeln!(file, "bicycle ").unwrap();
        writeln!(file, "car").unwrap();

        let mapping = load_class_mapping(file.path().to_str().unwrap()).unwrap();
        assert_eq!(mapping.get(&0).unwrap(), "person");
        assert_eq!(mapping.get(&1).unwrap(), "bicycle");
        assert_eq!(mapping.get(&2).unwrap(), "car");
    }

    #[test]
    fn taxonomy_loads_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"car": "illegal_parking", "bottle": "litter"}}"#).unwrap();

        let taxonomy = CivicTaxonomy::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(taxonomy.tag_for("car"), "illegal_parking");
        assert_eq!(taxonomy.tag_for("bottle"), "litter");
    }

    #[test]
    fn unknown_class_falls_back_to_uncategorized() {
        let taxonomy = CivicTaxonomy::from_map(HashMap::from([(
            "car".to_string(),
            "illegal_parking".to_string(),
        )]));
        assert_eq!(taxonomy.tag_for("person"), UNCATEGORIZED_TAG);
    }
}
