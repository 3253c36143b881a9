use anyhow::{anyhow, bail, Context};
use gracecore::mascon::FitMethod;
use gracecore::model::{GridInterval, GridSpec, Unit};
use gracecore::processing::DestripeConfig;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Key/value parameters of a single job.
///
/// Column files hold `NAME VALUE [comments]` per line; `.yml`/`.yaml` files
/// hold a flat YAML mapping. Values spelled `None` are treated as absent.
#[derive(Clone, Debug)]
pub struct ParameterFile {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl ParameterFile {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading parameter file {}", path_ref.display()))?;
        let is_yaml = matches!(
            path_ref.extension().and_then(|ext| ext.to_str()),
            Some("yml") | Some("yaml")
        );
        let values = if is_yaml {
            Self::parse_yaml(&contents)
        } else {
            Self::parse_columns(&contents)
        }
        .with_context(|| format!("parsing parameter file {}", path_ref.display()))?;
        Ok(Self {
            path: path_ref.to_path_buf(),
            values,
        })
    }

    fn parse_columns(contents: &str) -> anyhow::Result<BTreeMap<String, String>> {
        let mut values = BTreeMap::new();
        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
                bail!("line {} has no value: {:?}", number + 1, line);
            };
            values.insert(name.to_string(), value.to_string());
        }
        Ok(values)
    }

    fn parse_yaml(contents: &str) -> anyhow::Result<BTreeMap<String, String>> {
        let mapping: BTreeMap<String, Value> = serde_yaml::from_str(contents)?;
        mapping
            .into_iter()
            .map(|(name, value)| -> anyhow::Result<(String, String)> {
                let text = match value {
                    Value::Null => "None".to_string(),
                    Value::Bool(flag) => flag.to_string(),
                    Value::Number(number) => number.to_string(),
                    Value::String(text) => text,
                    Value::Sequence(items) => items
                        .iter()
                        .map(|item| match item {
                            Value::String(text) => Ok(text.clone()),
                            Value::Number(number) => Ok(number.to_string()),
                            other => Err(anyhow!("unsupported list item {:?} for {}", other, name)),
                        })
                        .collect::<anyhow::Result<Vec<String>>>()?
                        .join(","),
                    other => bail!("unsupported value {:?} for {}", other, name),
                };
                Ok((name, text))
            })
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|value| value.as_str())
            .filter(|value| *value != "None")
    }

    pub fn require<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self
            .get(key)
            .ok_or_else(|| anyhow!("missing required parameter {}", key))?;
        raw.parse::<T>()
            .map_err(|err| anyhow!("parameter {} = {:?}: {}", key, raw, err))
    }

    pub fn optional<T>(&self, key: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(_) => self.require(key).map(Some),
            None => Ok(None),
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some("Y" | "y" | "true" | "True"))
    }

    pub fn list<T>(&self, key: &str) -> anyhow::Result<Vec<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        let Some(raw) = self.get(key) else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| {
                item.parse::<T>()
                    .map_err(|err| anyhow!("parameter {} item {:?}: {}", key, item, err))
            })
            .collect()
    }

    /// Resolves a path value relative to the parameter file's directory.
    pub fn resolve(&self, value: &str) -> PathBuf {
        let candidate = PathBuf::from(value);
        if candidate.is_absolute() {
            return candidate;
        }
        match self.path.parent() {
            Some(parent) => parent.join(candidate),
            None => candidate,
        }
    }

    pub fn require_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        let raw = self
            .get(key)
            .ok_or_else(|| anyhow!("missing required parameter {}", key))?;
        Ok(self.resolve(raw))
    }

    pub fn optional_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(|raw| self.resolve(raw))
    }

    pub fn path_list(&self, key: &str) -> anyhow::Result<Vec<PathBuf>> {
        Ok(self
            .list::<String>(key)?
            .iter()
            .map(|raw| self.resolve(raw))
            .collect())
    }
}

/// Truncation and smoothing shared by every analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct Truncation {
    pub lmax: usize,
    pub mmax: usize,
    pub radius_km: f64,
}

impl Truncation {
    fn from_file(file: &ParameterFile) -> anyhow::Result<Self> {
        let lmax: usize = file.require("LMAX")?;
        let mmax = file.optional::<usize>("MMAX")?.unwrap_or(lmax).min(lmax);
        let radius_km = file.optional::<f64>("RAD")?.unwrap_or(0.0);
        if radius_km < 0.0 {
            bail!("parameter RAD must be non-negative, got {}", radius_km);
        }
        Ok(Self {
            lmax,
            mmax,
            radius_km,
        })
    }

    /// `M<mmax>` when the order is truncated below the degree.
    pub fn order_tag(&self) -> String {
        if self.mmax != self.lmax {
            format!("M{}", self.mmax)
        } else {
            String::new()
        }
    }

    /// `_r<radius>km` when smoothing is applied.
    pub fn smoothing_tag(&self) -> String {
        if self.radius_km > 0.0 {
            format!("_r{:.0}km", self.radius_km)
        } else {
            String::new()
        }
    }
}

/// Data selection and corrections applied before a mascon fit or gridding.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrectionParameters {
    pub data_file: PathBuf,
    pub start: Option<u32>,
    pub end: Option<u32>,
    pub missing: Vec<u32>,
    pub gia_file: Option<PathBuf>,
    pub gia_epoch: f64,
    pub remove_files: Vec<PathBuf>,
    pub redistribute_removed: bool,
    pub replace_files: Vec<PathBuf>,
    pub pole_tide_file: Option<PathBuf>,
    pub landmask: Option<PathBuf>,
    pub destripe: Option<DestripeConfig>,
}

impl CorrectionParameters {
    fn from_file(file: &ParameterFile) -> anyhow::Result<Self> {
        let redistribute_removed = file.flag("REDISTRIBUTE_REMOVED");
        let landmask = file.optional_path("LANDMASK");
        if redistribute_removed && landmask.is_none() {
            bail!("REDISTRIBUTE_REMOVED requires LANDMASK");
        }
        Ok(Self {
            data_file: file.require_path("DATA_FILE")?,
            start: file.optional("START")?,
            end: file.optional("END")?,
            missing: file.list("MISSING")?,
            gia_file: file.optional_path("GIA_FILE"),
            gia_epoch: file
                .optional("GIA_EPOCH")?
                .unwrap_or(gracecore::processing::GIA_REFERENCE_EPOCH),
            remove_files: file.path_list("REMOVE_FILE")?,
            redistribute_removed,
            replace_files: file.path_list("REPLACE_FILE")?,
            pole_tide_file: file.optional_path("POLE_TIDE_FILE"),
            landmask,
            destripe: file.flag("DESTRIPE").then(DestripeConfig::default),
        })
    }

    /// `_FL` when the decorrelation filter is applied.
    pub fn filter_tag(&self) -> &'static str {
        if self.destripe.is_some() {
            "_FL"
        } else {
            ""
        }
    }
}

/// Mascon set and fit configuration shared by kernels and time series.
#[derive(Clone, Debug, PartialEq)]
pub struct MasconSetup {
    pub mascon_index: PathBuf,
    pub lmin: usize,
    pub fit_method: FitMethod,
    pub ocean: Option<PathBuf>,
    pub rcond: f64,
    pub damping: f64,
}

impl MasconSetup {
    fn from_file(file: &ParameterFile) -> anyhow::Result<Self> {
        let ocean = if file.flag("MASCON_OCEAN") {
            Some(
                file.require_path("LANDMASK")
                    .context("MASCON_OCEAN requires a land-sea mask")?,
            )
        } else {
            None
        };
        let fit_code: u8 = file.optional("FIT_METHOD")?.unwrap_or(1);
        Ok(Self {
            mascon_index: file.require_path("MASCON_INDEX")?,
            lmin: file.optional("LMIN")?.unwrap_or(1),
            fit_method: FitMethod::from_code(fit_code)?,
            ocean,
            rcond: file.optional("RCOND")?.unwrap_or(-1.0),
            damping: file.optional("DAMPING")?.unwrap_or(0.0),
        })
    }

    pub fn ocean_tag(&self) -> &'static str {
        if self.ocean.is_some() {
            "_OCN"
        } else {
            ""
        }
    }
}

fn grid_spec(file: &ParameterFile) -> anyhow::Result<GridSpec> {
    let spacing: Vec<f64> = file.list("DDEG")?;
    let (dlon, dlat) = match spacing.as_slice() {
        [both] => (*both, *both),
        [dlon, dlat] => (*dlon, *dlat),
        _ => bail!("parameter DDEG needs one or two values"),
    };
    let interval = GridInterval::from_code(file.optional("INTERVAL")?.unwrap_or(2))?;
    Ok(GridSpec::new(dlon, dlat, interval)?)
}

fn output_directory(file: &ParameterFile) -> anyhow::Result<PathBuf> {
    file.require_path("DIRECTORY")
}

#[derive(Clone, Debug, PartialEq)]
pub struct KernelParameters {
    pub directory: PathBuf,
    pub truncation: Truncation,
    pub mascons: MasconSetup,
    pub grid: GridSpec,
}

impl KernelParameters {
    pub fn from_file(file: &ParameterFile) -> anyhow::Result<Self> {
        Ok(Self {
            directory: output_directory(file)?,
            truncation: Truncation::from_file(file)?,
            mascons: MasconSetup::from_file(file)?,
            grid: grid_spec(file)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MasconParameters {
    pub directory: PathBuf,
    pub truncation: Truncation,
    pub mascons: MasconSetup,
    pub corrections: CorrectionParameters,
}

impl MasconParameters {
    pub fn from_file(file: &ParameterFile) -> anyhow::Result<Self> {
        Ok(Self {
            directory: output_directory(file)?,
            truncation: Truncation::from_file(file)?,
            mascons: MasconSetup::from_file(file)?,
            corrections: CorrectionParameters::from_file(file)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GridParameters {
    pub directory: PathBuf,
    pub prefix: String,
    pub unit: Unit,
    pub truncation: Truncation,
    pub corrections: CorrectionParameters,
    pub grid: GridSpec,
}

impl GridParameters {
    pub fn from_file(file: &ParameterFile) -> anyhow::Result<Self> {
        Ok(Self {
            directory: output_directory(file)?,
            prefix: file.get("PREFIX").unwrap_or("GRACE").to_string(),
            unit: file.optional("UNITS")?.unwrap_or(Unit::Cmwe),
            truncation: Truncation::from_file(file)?,
            corrections: CorrectionParameters::from_file(file)?,
            grid: grid_spec(file)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn column_file(contents: &str) -> ParameterFile {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(contents.as_bytes()).unwrap();
        let path = temp.into_temp_path();
        ParameterFile::load(&path).unwrap()
    }

    #[test]
    fn column_format_skips_comments_and_none() {
        let file = column_file(
            "# kernel run\nLMAX 60 maximum degree\n\nMMAX None\nMASCON_OCEAN Y\nMISSING 3,7, 12\n",
        );
        assert_eq!(file.require::<usize>("LMAX").unwrap(), 60);
        assert_eq!(file.get("MMAX"), None);
        assert!(file.flag("MASCON_OCEAN"));
        assert!(!file.flag("DESTRIPE"));
        assert_eq!(file.list::<u32>("MISSING").unwrap(), vec![3, 7, 12]);
        assert!(file.list::<u32>("ABSENT").unwrap().is_empty());
    }

    #[test]
    fn missing_or_malformed_keys_are_named() {
        let file = column_file("LMAX sixty\n");
        let err = file.require::<usize>("LMAX").unwrap_err().to_string();
        assert!(err.contains("LMAX"));
        let err = file.require::<usize>("LMIN").unwrap_err().to_string();
        assert!(err.contains("missing required parameter LMIN"));
    }

    #[test]
    fn column_line_without_value_rejected() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"LMAX\n").unwrap();
        let path = temp.into_temp_path();
        assert!(ParameterFile::load(&path).is_err());
    }

    #[test]
    fn yaml_mapping_loaded() {
        let mut temp = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        temp.write_all(
            b"LMAX: 60\nRAD: 300.5\nDESTRIPE: true\nMISSING: [1, 2]\nGIA_FILE: null\nUNITS: mmGH\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let file = ParameterFile::load(&path).unwrap();
        assert_eq!(file.require::<usize>("LMAX").unwrap(), 60);
        assert_eq!(file.require::<f64>("RAD").unwrap(), 300.5);
        assert!(file.flag("DESTRIPE"));
        assert_eq!(file.list::<u32>("MISSING").unwrap(), vec![1, 2]);
        assert_eq!(file.get("GIA_FILE"), None);
        assert_eq!(file.require::<Unit>("UNITS").unwrap(), Unit::MmGeoid);
    }

    #[test]
    fn relative_paths_follow_parameter_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.txt");
        fs::write(&path, "DIRECTORY out\nDATA_FILE /abs/data.json\n").unwrap();
        let file = ParameterFile::load(&path).unwrap();
        assert_eq!(file.require_path("DIRECTORY").unwrap(), dir.path().join("out"));
        assert_eq!(
            file.require_path("DATA_FILE").unwrap(),
            PathBuf::from("/abs/data.json")
        );
    }

    #[test]
    fn kernel_parameters_with_defaults() {
        let file = column_file(
            "DIRECTORY /tmp/out\nMASCON_INDEX /tmp/index.txt\nLMAX 60\nMMAX 30\nRAD 250\nDDEG 0.5\nINTERVAL 2\nFIT_METHOD 1\n",
        );
        let params = KernelParameters::from_file(&file).unwrap();
        assert_eq!(params.truncation.order_tag(), "M30");
        assert_eq!(params.truncation.smoothing_tag(), "_r250km");
        assert_eq!(params.mascons.lmin, 1);
        assert_eq!(params.mascons.ocean_tag(), "");
        assert_eq!(params.mascons.fit_method, FitMethod::Mass);
        assert_eq!(params.grid.dlon, 0.5);
        assert_eq!(params.grid.interval, GridInterval::Centered);
    }

    #[test]
    fn mascon_ocean_requires_landmask() {
        let file = column_file(
            "DIRECTORY /tmp/out\nMASCON_INDEX /tmp/index.txt\nLMAX 60\nDDEG 1\nMASCON_OCEAN Y\n",
        );
        assert!(KernelParameters::from_file(&file).is_err());
    }

    #[test]
    fn grid_parameters_parse_corrections() {
        let file = column_file(
            "DIRECTORY /tmp/out\nDATA_FILE /tmp/gsm.json\nLMAX 60\nDDEG 1,2\nINTERVAL 1\nUNITS mmwe\nPREFIX CSR\nSTART 4\nEND 100\nDESTRIPE y\nREMOVE_FILE /tmp/a.json,/tmp/b.json\n",
        );
        let params = GridParameters::from_file(&file).unwrap();
        assert_eq!(params.unit, Unit::Mmwe);
        assert_eq!(params.prefix, "CSR");
        assert_eq!((params.grid.dlon, params.grid.dlat), (1.0, 2.0));
        assert_eq!(params.corrections.start, Some(4));
        assert_eq!(params.corrections.filter_tag(), "_FL");
        assert_eq!(params.corrections.remove_files.len(), 2);
        assert_eq!(params.corrections.gia_epoch, 2003.3);
    }
}
