use anyhow::Context;
use gracecore::mascon::MasconSeries;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> anyhow::Result<T> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref).with_context(|| format!("opening {}", path_ref.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("decoding JSON from {}", path_ref.display()))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T, mode: u32) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .with_context(|| format!("encoding JSON to {}", path.display()))?;
    writer.flush()?;
    set_mode(path, mode)
}

/// Paths listed one per line; relative entries are taken from the index's directory.
pub fn read_mascon_index(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading mascon index {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let files: Vec<PathBuf> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let entry = PathBuf::from(line);
            if entry.is_absolute() {
                entry
            } else {
                base.join(entry)
            }
        })
        .collect();
    if files.is_empty() {
        anyhow::bail!("mascon index {} lists no files", path.display());
    }
    Ok(files)
}

/// Writes the month, time, cm w.e. and Gt columns of mascon `k`.
pub fn write_series_table(path: &Path, series: &MasconSeries, k: usize, mode: u32) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for t in 0..series.time.len() {
        writeln!(
            writer,
            "{:03} {:12.4} {:16.10} {:16.10}",
            series.month[t], series.time[t], series.cmwe[[k, t]], series.gt[[k, t]]
        )?;
    }
    writer.flush()?;
    set_mode(path, mode)
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("setting mode {:o} on {}", mode, path.display()))
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gracecore::Harmonics;
    use ndarray::Array2;

    #[test]
    fn json_round_trip_of_harmonics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.json");
        let mut field = Harmonics::zeros(3, 3, 1);
        field.clm[[2, 0, 0]] = -4.84e-4;
        write_json(&path, &field, 0o644).unwrap();
        let read: Harmonics = read_json(&path).unwrap();
        assert_eq!(read, field);
    }

    #[test]
    fn index_resolves_relative_entries() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.txt");
        fs::write(&index, "greenland_L60.json\n\n/abs/antarctica.json\n").unwrap();
        let files = read_mascon_index(&index).unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("greenland_L60.json"),
                PathBuf::from("/abs/antarctica.json")
            ]
        );
    }

    #[test]
    fn empty_index_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.txt");
        fs::write(&index, "\n").unwrap();
        assert!(read_mascon_index(&index).is_err());
    }

    #[test]
    fn series_table_has_one_row_per_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.txt");
        let series = MasconSeries {
            names: vec!["A".into()],
            areas: vec![1e15],
            time: vec![2002.29, 2002.37],
            month: vec![4, 5],
            cmwe: Array2::from_shape_vec((1, 2), vec![1.5, -0.5]).unwrap(),
            gt: Array2::from_shape_vec((1, 2), vec![1.5, -0.5]).unwrap(),
        };
        write_series_table(&path, &series, 0, 0o640).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("004"));
        assert!(rows[1].contains("-0.5000000000"));
    }

    #[cfg(unix)]
    #[test]
    fn mode_applied_to_outputs() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&path, &vec![1.0, 2.0], 0o640).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}
