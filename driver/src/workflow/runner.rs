use crate::workflow::config::{
    CorrectionParameters, GridParameters, KernelParameters, MasconParameters, MasconSetup,
    ParameterFile, Truncation,
};
use crate::workflow::io::{read_json, read_mascon_index, write_json, write_series_table};
use anyhow::Context;
use gracecore::mascon::{
    fit_time_series, mascon_name, sensitivity_kernels, HarmonicLayout, MasconDesign,
};
use gracecore::math::{gauss_weights, LegendreTable};
use gracecore::model::{
    CoefficientSeries, LoveNumberDataset, LoveNumbers, PolarMotion, ReferenceFrame, SpatialGrid,
};
use gracecore::processing::{
    ocean_harmonics, to_spatial_series, DestripeStage, GiaStage, Pipeline, PoleTideStage,
    RemoveStage, ReplaceStage,
};
use gracecore::Harmonics;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Analysis {
    /// Spatial sensitivity kernels of a mascon set
    Kernel,
    /// Least-squares mascon time series
    Mascons,
    /// Monthly spatial grids
    Grids,
}

impl Analysis {
    pub fn log_prefix(&self) -> &'static str {
        match self {
            Analysis::Kernel => "calc_skernel",
            Analysis::Mascons => "calc_mascons",
            Analysis::Grids => "calc_grids",
        }
    }
}

/// Options shared by every job of a run.
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub love: LoveNumberDataset,
    pub reference: ReferenceFrame,
    pub mode: u32,
    pub data_dir: PathBuf,
    pub love_file: Option<PathBuf>,
}

#[derive(Clone)]
pub struct Runner {
    settings: RunSettings,
}

impl Runner {
    pub fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    pub fn execute(&self, analysis: Analysis, file: &ParameterFile) -> anyhow::Result<Vec<PathBuf>> {
        info!("{:?} job from {}", analysis, file.path().display());
        match analysis {
            Analysis::Kernel => {
                let params = KernelParameters::from_file(file)?;
                self.run_kernel(&params)
            }
            Analysis::Mascons => {
                let params = MasconParameters::from_file(file)?;
                self.run_mascons(&params)
            }
            Analysis::Grids => {
                let params = GridParameters::from_file(file)?;
                self.run_grids(&params)
            }
        }
    }

    fn love_numbers(&self, lmax: usize) -> anyhow::Result<LoveNumbers> {
        let path = self
            .settings
            .love_file
            .clone()
            .unwrap_or_else(|| self.settings.data_dir.join(self.settings.love.file_name()));
        LoveNumbers::read(&path, lmax, self.settings.love, self.settings.reference)
            .with_context(|| format!("reading load Love numbers {}", path.display()))
    }

    fn ocean(&self, landmask: &Path, truncation: &Truncation, love: &LoveNumbers) -> anyhow::Result<Harmonics> {
        let mask: SpatialGrid = read_json(landmask)?;
        mask.validate()?;
        ocean_harmonics(&mask, truncation.lmax, truncation.mmax, love)
            .with_context(|| format!("ocean function from {}", landmask.display()))
    }

    fn design(
        &self,
        setup: &MasconSetup,
        truncation: &Truncation,
        love: &LoveNumbers,
        weights: &[f64],
    ) -> anyhow::Result<MasconDesign> {
        let files = read_mascon_index(&setup.mascon_index)?;
        let mut mascons = Vec::with_capacity(files.len());
        let mut names = Vec::with_capacity(files.len());
        for path in &files {
            let field: Harmonics = read_json(path)?;
            field
                .validate()
                .with_context(|| format!("mascon {}", path.display()))?;
            mascons.push(field.truncate(truncation.lmax, truncation.mmax)?);
            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default();
            names.push(mascon_name(&stem, truncation.lmax));
        }
        debug!("read {} mascons from {}", mascons.len(), setup.mascon_index.display());

        let layout = HarmonicLayout::new(setup.lmin, truncation.lmax, truncation.mmax)?;
        let design = match &setup.ocean {
            Some(landmask) => {
                let ocean = self.ocean(landmask, truncation, love)?;
                MasconDesign::with_ocean(&mascons, names, layout, love, weights, setup.fit_method, &ocean)?
            }
            None => MasconDesign::new(&mascons, names, layout, love, weights, setup.fit_method)?,
        };
        Ok(design)
    }

    /// Reads, selects, truncates and corrects the data harmonics.
    fn corrected_data(
        &self,
        corrections: &CorrectionParameters,
        truncation: &Truncation,
        love: &LoveNumbers,
    ) -> anyhow::Result<Harmonics> {
        let data: Harmonics = read_json(&corrections.data_file)?;
        data.validate()
            .with_context(|| format!("data {}", corrections.data_file.display()))?;
        let start = corrections.start.unwrap_or(0);
        let end = corrections.end.unwrap_or(u32::MAX);
        let mut data = data
            .select_months(start, end, &corrections.missing)?
            .truncate(truncation.lmax, truncation.mmax)?;
        if data.epochs() == 0 {
            anyhow::bail!("no months between {} and {} in {}", start, end, corrections.data_file.display());
        }

        let mut pipeline = Pipeline::new();
        if let Some(path) = &corrections.gia_file {
            let rate: Harmonics = read_json(path)?;
            pipeline.push(Box::new(GiaStage::new(rate, corrections.gia_epoch)?));
        }
        if !corrections.remove_files.is_empty() {
            let fields = corrections
                .remove_files
                .iter()
                .map(read_json::<Harmonics, _>)
                .collect::<anyhow::Result<Vec<_>>>()?;
            let mut stage = RemoveStage::new(fields)?;
            if corrections.redistribute_removed {
                if let Some(landmask) = &corrections.landmask {
                    stage = stage.redistribute_over(self.ocean(landmask, truncation, love)?)?;
                }
            }
            pipeline.push(Box::new(stage));
        }
        if !corrections.replace_files.is_empty() {
            let series = corrections
                .replace_files
                .iter()
                .map(read_json::<CoefficientSeries, _>)
                .collect::<anyhow::Result<Vec<_>>>()?;
            pipeline.push(Box::new(ReplaceStage::new(series)?));
        }
        if let Some(path) = &corrections.pole_tide_file {
            let motion: PolarMotion = read_json(path)?;
            pipeline.push(Box::new(PoleTideStage::new(motion)?));
        }
        if let Some(config) = corrections.destripe {
            pipeline.push(Box::new(DestripeStage::new(config)?));
        }
        pipeline
            .run(&mut data)
            .context("applying corrections")?;
        info!(
            "corrected {} months with [{}]",
            data.epochs(),
            pipeline.stage_names().join(", ")
        );
        Ok(data)
    }

    fn run_kernel(&self, params: &KernelParameters) -> anyhow::Result<Vec<PathBuf>> {
        let truncation = &params.truncation;
        let love = self.love_numbers(truncation.lmax)?;
        let weights = gauss_weights(truncation.radius_km, truncation.lmax);
        let design = self.design(&params.mascons, truncation, &love, &weights)?;
        let kernels = sensitivity_kernels(&design, params.mascons.rcond, params.mascons.damping)?;

        fs::create_dir_all(&params.directory)
            .with_context(|| format!("creating {}", params.directory.display()))?;
        let table = LegendreTable::from_latitudes(truncation.lmax, &params.grid.latitudes());
        let suffix = format!(
            "{}_L{}{}{}",
            params.mascons.ocean_tag(),
            truncation.lmax,
            truncation.order_tag(),
            truncation.smoothing_tag()
        );
        let mut outputs = Vec::with_capacity(2 * kernels.len());
        for kernel in &kernels {
            let harmonics_path = params
                .directory
                .join(format!("{}_SKERNEL_CLM{}.json", kernel.name, suffix));
            write_json(&harmonics_path, kernel, self.settings.mode)?;
            let grid = kernel.to_grid(&params.grid, Some(&table))?;
            let grid_path = params
                .directory
                .join(format!("{}_SKERNEL{}.json", kernel.name, suffix));
            write_json(&grid_path, &grid, self.settings.mode)?;
            outputs.push(harmonics_path);
            outputs.push(grid_path);
        }
        info!("wrote {} sensitivity kernels", kernels.len());
        Ok(outputs)
    }

    fn run_mascons(&self, params: &MasconParameters) -> anyhow::Result<Vec<PathBuf>> {
        let truncation = &params.truncation;
        let love = self.love_numbers(truncation.lmax)?;
        let weights = gauss_weights(truncation.radius_km, truncation.lmax);
        let data = self.corrected_data(&params.corrections, truncation, &love)?;
        let design = self.design(&params.mascons, truncation, &love, &weights)?;
        let series = fit_time_series(&design, &data, params.mascons.rcond, params.mascons.damping)?;

        fs::create_dir_all(&params.directory)
            .with_context(|| format!("creating {}", params.directory.display()))?;
        let suffix = format!(
            "{}_L{}{}{}{}",
            params.mascons.ocean_tag(),
            truncation.lmax,
            truncation.order_tag(),
            truncation.smoothing_tag(),
            params.corrections.filter_tag()
        );
        let mut outputs = Vec::with_capacity(series.names.len());
        for (k, name) in series.names.iter().enumerate() {
            let path = params.directory.join(format!("{}{}.txt", name, suffix));
            write_series_table(&path, &series, k, self.settings.mode)?;
            outputs.push(path);
        }
        Ok(outputs)
    }

    fn run_grids(&self, params: &GridParameters) -> anyhow::Result<Vec<PathBuf>> {
        let truncation = &params.truncation;
        let love = self.love_numbers(truncation.lmax)?;
        let weights = gauss_weights(truncation.radius_km, truncation.lmax);
        let data = self.corrected_data(&params.corrections, truncation, &love)?;
        let grids = to_spatial_series(&data, params.unit, &weights, &params.grid, &love)?;

        fs::create_dir_all(&params.directory)
            .with_context(|| format!("creating {}", params.directory.display()))?;
        let mut outputs = Vec::with_capacity(grids.len());
        for grid in &grids {
            let month = grid.month.unwrap_or_default();
            let path = params.directory.join(format!(
                "{}_{}_L{}{}{}{}_{:03}.json",
                params.prefix,
                params.unit.label(),
                truncation.lmax,
                truncation.order_tag(),
                truncation.smoothing_tag(),
                params.corrections.filter_tag(),
                month
            ));
            write_json(&path, grid, self.settings.mode)?;
            outputs.push(path);
        }
        info!("wrote {} {} grids", grids.len(), params.unit.label());
        Ok(outputs)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use gracecore::mascon::SensitivityKernel;
    use gracecore::model::{CoefficientKind, GridInterval, GridSpec, Unit};
    use gracecore::processing::corrections::pole_tide;
    use gracecore::processing::{redistribute_over_ocean, GIA_REFERENCE_EPOCH};
    use ndarray::{s, Axis};
    use std::fmt::Write as _;

    const LMAX: usize = 6;

    pub(crate) fn love_table() -> String {
        let mut table = String::from("Han and Wahr (1995)\n l hl kl ll\n");
        let rows = [
            (0, 0.0, 0.0, 0.0),
            (1, -0.269, 0.0, 0.134),
            (2, -0.99, -0.303, 0.023),
            (3, -1.05, -0.194, 0.072),
            (4, -1.053, -0.132, 0.056),
            (5, -1.088, -0.104, 0.042),
            (6, -1.147, -0.089, 0.033),
        ];
        for (l, h, k, ll) in rows {
            let _ = writeln!(table, "{} {} {} {}", l, h, k, ll);
        }
        table
    }

    fn mascon(seed: f64) -> Harmonics {
        let mut field = Harmonics::zeros(LMAX, LMAX, 1);
        for l in 0..=LMAX {
            for m in 0..=l {
                field.clm[[l, m, 0]] = 1e-10 * (seed * (l + 2 * m + 1) as f64).cos();
                if m > 0 {
                    field.slm[[l, m, 0]] = 1e-10 * (seed * (3 * l + m) as f64).sin();
                }
            }
        }
        field
    }

    /// Scratch directory with Love numbers, two mascons and their index.
    pub(crate) struct Fixture {
        pub dir: tempfile::TempDir,
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("love_numbers"), love_table()).unwrap();
            write_json(&dir.path().join("north_L6.json"), &mascon(0.7), 0o644).unwrap();
            write_json(&dir.path().join("south_L6.json"), &mascon(1.9), 0o644).unwrap();
            fs::write(dir.path().join("index.txt"), "north_L6.json\nsouth_L6.json\n").unwrap();
            Self { dir }
        }

        pub(crate) fn runner(&self) -> Runner {
            Runner::new(RunSettings {
                love: LoveNumberDataset::HanWahr1995,
                reference: ReferenceFrame::CF,
                mode: 0o644,
                data_dir: self.dir.path().to_path_buf(),
                love_file: None,
            })
        }

        pub(crate) fn parameter_file(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, contents).unwrap();
            path
        }

        /// Monthly data built from the two mascons with known amplitudes.
        pub(crate) fn write_data(&self, amplitudes: &[(u32, f64, f64)]) {
            let data = combine(&mascon(0.7), &mascon(1.9), amplitudes);
            self.write("data.json", &data);
        }

        pub(crate) fn write<T: serde::Serialize>(&self, name: &str, value: &T) {
            write_json(&self.dir.path().join(name), value, 0o644).unwrap();
        }
    }

    /// `a * north + b * south` for each `(month, a, b)`.
    fn combine(north: &Harmonics, south: &Harmonics, amplitudes: &[(u32, f64, f64)]) -> Harmonics {
        let mut data = Harmonics::zeros(north.lmax, north.mmax, amplitudes.len());
        for (t, &(month, a, b)) in amplitudes.iter().enumerate() {
            data.month[t] = month;
            data.time[t] = 2002.0 + (month as f64 - 0.5) / 12.0;
            let mut clm = data.clm.index_axis_mut(Axis(2), t);
            clm.assign(&(&north.clm_epoch(0) * a + &south.clm_epoch(0) * b));
            let mut slm = data.slm.index_axis_mut(Axis(2), t);
            slm.assign(&(&north.slm_epoch(0) * a + &south.slm_epoch(0) * b));
        }
        data
    }

    fn table_rows(path: &Path) -> Vec<Vec<f64>> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| line.split_whitespace().map(|v| v.parse().unwrap()).collect())
            .collect()
    }

    #[test]
    fn kernel_job_writes_harmonics_and_grids() {
        let fixture = Fixture::new();
        let path = fixture.parameter_file(
            "kernel.txt",
            "DIRECTORY out\nMASCON_INDEX index.txt\nLMIN 1\nLMAX 6\nMMAX 4\nDDEG 30\nINTERVAL 2\nFIT_METHOD 1\n",
        );
        let file = ParameterFile::load(&path).unwrap();
        let outputs = fixture.runner().execute(Analysis::Kernel, &file).unwrap();
        let out = fixture.dir.path().join("out");
        assert_eq!(
            outputs,
            vec![
                out.join("NORTH_SKERNEL_CLM_L6M4.json"),
                out.join("NORTH_SKERNEL_L6M4.json"),
                out.join("SOUTH_SKERNEL_CLM_L6M4.json"),
                out.join("SOUTH_SKERNEL_L6M4.json"),
            ]
        );
        let kernel: SensitivityKernel = read_json(&outputs[0]).unwrap();
        assert_eq!(kernel.name, "NORTH");
        assert_eq!(kernel.harmonics.mmax, 4);
        let grid: SpatialGrid = read_json(&outputs[1]).unwrap();
        assert_eq!(grid.data.dim(), (6, 12));
    }

    #[test]
    fn mascon_job_recovers_amplitudes() {
        let fixture = Fixture::new();
        fixture.write_data(&[(4, 2.0, -1.0), (5, 0.5, 3.0), (6, 1.0, 1.0)]);
        let path = fixture.parameter_file(
            "mascons.txt",
            "DIRECTORY out\nMASCON_INDEX index.txt\nDATA_FILE data.json\nLMAX 6\nSTART 4\nEND 5\nFIT_METHOD 2\n",
        );
        let file = ParameterFile::load(&path).unwrap();
        let outputs = fixture.runner().execute(Analysis::Mascons, &file).unwrap();
        assert_eq!(outputs[0], fixture.dir.path().join("out").join("NORTH_L6.txt"));
        let rows = table_rows(&outputs[1]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], 4.0);
        assert_abs_diff_eq!(rows[0][2], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(rows[1][2], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn ocean_mascon_job_applies_every_correction() {
        let fixture = Fixture::new();
        let love = fixture.runner().love_numbers(LMAX).unwrap();

        let spec = GridSpec::new(10.0, 10.0, GridInterval::Centered).unwrap();
        let mut mask = spec.empty_grid();
        for (i, &lat) in spec.latitudes().iter().enumerate() {
            if lat < 20.0 {
                mask.data.row_mut(i).fill(1.0);
            }
        }
        fixture.write("landmask.json", &mask);
        let ocean = ocean_harmonics(&mask, LMAX, LMAX, &love).unwrap();
        let balance = |mut field: Harmonics| {
            redistribute_over_ocean(&mut field, &ocean).unwrap();
            field
        };

        let amplitudes = [(10, 1.5, -0.5), (11, -2.0, 0.25)];
        let mut data = combine(&balance(mascon(0.7)), &balance(mascon(1.9)), &amplitudes);

        let mut gia = Harmonics::zeros(LMAX, LMAX, 1);
        gia.clm[[2, 0, 0]] = 3e-11;
        gia.slm[[3, 2, 0]] = -1e-11;
        let mut removed = Harmonics::zeros(LMAX, LMAX, 1);
        removed.clm[[0, 0, 0]] = 5e-11;
        removed.clm[[4, 1, 0]] = 2e-11;
        let motion = PolarMotion {
            month: vec![10, 11],
            xp: vec![0.12, 0.08],
            yp: vec![0.31, 0.36],
        };
        fixture.write("gia.json", &gia);
        fixture.write("removed.json", &removed);
        fixture.write("pole.json", &motion);

        let removed = balance(removed);
        for t in 0..data.epochs() {
            let elapsed = data.time[t] - GIA_REFERENCE_EPOCH;
            let (c21, s21) = pole_tide(data.time[t], motion.xp[t], motion.yp[t]);
            let mut clm = data.clm.index_axis_mut(Axis(2), t);
            clm.scaled_add(elapsed, &gia.clm_epoch(0));
            clm += &removed.clm_epoch(0);
            clm[[2, 1]] += c21;
            let mut slm = data.slm.index_axis_mut(Axis(2), t);
            slm.scaled_add(elapsed, &gia.slm_epoch(0));
            slm += &removed.slm_epoch(0);
            slm[[2, 1]] += s21;
        }
        fixture.write("data.json", &data);

        let path = fixture.parameter_file(
            "ocean.txt",
            "DIRECTORY out\nMASCON_INDEX index.txt\nDATA_FILE data.json\nLMAX 6\nFIT_METHOD 1\n\
             MASCON_OCEAN Y\nLANDMASK landmask.json\nGIA_FILE gia.json\nREMOVE_FILE removed.json\n\
             REDISTRIBUTE_REMOVED Y\nPOLE_TIDE_FILE pole.json\nDESTRIPE Y\n",
        );
        let file = ParameterFile::load(&path).unwrap();
        let outputs = fixture.runner().execute(Analysis::Mascons, &file).unwrap();
        let out = fixture.dir.path().join("out");
        assert_eq!(
            outputs,
            vec![out.join("NORTH_OCN_L6_FL.txt"), out.join("SOUTH_OCN_L6_FL.txt")]
        );
        let north = table_rows(&outputs[0]);
        let south = table_rows(&outputs[1]);
        for (t, &(month, a, b)) in amplitudes.iter().enumerate() {
            assert_eq!(north[t][0], month as f64);
            assert_abs_diff_eq!(north[t][2], a, epsilon = 1e-6);
            assert_abs_diff_eq!(south[t][2], b, epsilon = 1e-6);
        }
    }

    #[test]
    fn grid_job_applies_replacements() {
        let fixture = Fixture::new();
        fixture.write_data(&[(7, 1.0, 0.0), (8, 0.0, 1.0)]);
        let c20 = CoefficientSeries {
            degree: 2,
            order: 0,
            kind: CoefficientKind::Cosine,
            month: vec![7, 8],
            values: vec![0.0, 0.0],
        };
        write_json(&fixture.dir.path().join("c20.json"), &c20, 0o644).unwrap();
        let path = fixture.parameter_file(
            "grids.yml",
            "DIRECTORY: grids\nDATA_FILE: data.json\nLMAX: 6\nRAD: 500\nDDEG: 45\nINTERVAL: 2\nUNITS: cmwe\nPREFIX: TEST\nREPLACE_FILE: c20.json\n",
        );
        let file = ParameterFile::load(&path).unwrap();
        let outputs = fixture.runner().execute(Analysis::Grids, &file).unwrap();
        let out = fixture.dir.path().join("grids");
        assert_eq!(
            outputs,
            vec![
                out.join("TEST_cmwe_L6_r500km_007.json"),
                out.join("TEST_cmwe_L6_r500km_008.json"),
            ]
        );
        let spec = GridSpec::new(45.0, 45.0, GridInterval::Centered).unwrap();
        let grid: SpatialGrid = read_json(&outputs[1]).unwrap();
        assert_eq!(grid.month, Some(8));
        assert_eq!(grid.data.dim(), (4, 8));
        assert_eq!(grid.lat, spec.latitudes());

        let love = fixture.runner().love_numbers(LMAX).unwrap();
        let weights = gauss_weights(500.0, LMAX);
        let mut expected = combine(&mascon(0.7), &mascon(1.9), &[(7, 1.0, 0.0), (8, 0.0, 1.0)]);
        let original = to_spatial_series(&expected, Unit::Cmwe, &weights, &spec, &love).unwrap();
        expected.clm.slice_mut(s![2, 0, ..]).fill(0.0);
        let replaced = to_spatial_series(&expected, Unit::Cmwe, &weights, &spec, &love).unwrap();
        for (t, path) in outputs.iter().enumerate() {
            let grid: SpatialGrid = read_json(path).unwrap();
            for (&value, &wanted) in grid.data.iter().zip(replaced[t].data.iter()) {
                assert_abs_diff_eq!(value, wanted, epsilon = 1e-9);
            }
            let shift = grid
                .data
                .iter()
                .zip(original[t].data.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            assert!(shift > 1e-3, "C20 left unchanged in epoch {}", t);
        }
    }

    #[test]
    fn missing_love_numbers_reported() {
        let fixture = Fixture::new();
        fs::remove_file(fixture.dir.path().join("love_numbers")).unwrap();
        let path = fixture.parameter_file(
            "kernel.txt",
            "DIRECTORY out\nMASCON_INDEX index.txt\nLMAX 6\nDDEG 30\n",
        );
        let file = ParameterFile::load(&path).unwrap();
        let err = fixture.runner().execute(Analysis::Kernel, &file).unwrap_err();
        assert!(format!("{:#}", err).contains("load Love numbers"));
    }
}
