
use anyhow::Context;
use std::io::{BufReader, BufWriter, Read, Write};
use std::fs::File;
use std::path::Path;

/// Returns true if the path ends in ".gz"
fn is_gzipped(filename: &Path) -> bool {
    filename.extension().unwrap_or_default() == "gz"
}

/// Loads a JSON file (params files, report documents, saved settings) into some type.
/// Files ending in ".gz" are decompressed on the fly.
/// # Arguments
/// * `filename` - the file path to open and parse
/// # Errors
/// * if the file does not open properly
/// * if the deserialization throws errors
pub fn load_json<T: serde::de::DeserializeOwned>(filename: &Path) -> anyhow::Result<T> {
    let file = File::open(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;
    let fp: Box<dyn Read> = if is_gzipped(filename) {
        Box::new(flate2::read::MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let result: T = serde_json::from_reader(BufReader::new(fp))
        .with_context(|| format!("Error while deserializing {filename:?}:"))?;
    Ok(result)
}

/// Saves a serializable struct to pretty-printed JSON, gzipped if the path ends in ".gz".
/// # Arguments
/// * `data` - the data in memory
/// * `out_filename` - user provided path to write to
/// # Errors
/// * if opening or writing to the file throw errors
/// * if JSON serialization throws errors
pub fn save_json<T: serde::Serialize>(data: &T, out_filename: &Path) -> anyhow::Result<()> {
    let file = File::create(out_filename)
        .with_context(|| format!("Error while creating {out_filename:?}:"))?;
    let file: Box<dyn Write> = if is_gzipped(out_filename) {
        Box::new(flate2::write::GzEncoder::new(file, flate2::Compression::best()))
    } else {
        Box::new(file)
    };
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .with_context(|| format!("Error while serializing {out_filename:?}:"))?;
    writer.flush()
        .with_context(|| format!("Error while flushing output to {out_filename:?}:"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::parameters::Parameters;

    fn parameters() -> Parameters {
        Parameters {
            samples: vec![vec!["a".to_string(), "b".to_string()]],
            clusters: vec![vec!["s0".to_string()], vec!["s1".to_string(), "s2".to_string()]],
            garbage: vec!["s3".to_string()]
        }
    }

    #[test]
    fn test_params_json() {
        let dir = tempfile::tempdir().unwrap();
        for filename in ["test.params.json", "test.params.json.gz"] {
            let path = dir.path().join(filename);
            save_json(&parameters(), &path).unwrap();
            let loaded: Parameters = load_json(&path).unwrap();
            assert_eq!(loaded, parameters());
        }
    }

    #[test]
    fn test_missing_garbage_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.params.json");
        std::fs::write(&path, r#"{"samples": [["a"]], "clusters": [["s0"]]}"#).unwrap();
        let loaded: Parameters = load_json(&path).unwrap();
        assert!(loaded.garbage.is_empty());
        assert_eq!(loaded.clusters, vec![vec!["s0".to_string()]]);
    }

    #[test]
    fn test_missing_file() {
        let result: anyhow::Result<Parameters> = load_json(Path::new("/nonexistent/params.json"));
        assert!(result.is_err());
    }
}
