use anyhow::Context;
use clap::Parser;
use gracecore::model::{LoveNumberDataset, ReferenceFrame};
use std::path::PathBuf;
use workflow::batch::Batch;
use workflow::runner::{Analysis, RunSettings, Runner};

mod workflow;

#[derive(Parser)]
#[command(author, version, about = "GRACE sensitivity kernel, mascon and grid driver")]
struct Args {
    /// Which analysis to run over the parameter files
    #[arg(value_enum)]
    analysis: Analysis,
    /// Parameter files, one job each
    #[arg(required = true)]
    parameters: Vec<PathBuf>,
    /// Worker threads; 0 runs the jobs serially
    #[arg(short = 'P', long = "np", default_value_t = 0)]
    processes: usize,
    /// Love number set: 0 Han and Wahr, 1 Gegout, 2 Wang
    #[arg(short = 'n', long, default_value_t = 0)]
    love: u8,
    /// Reference frame for degree-1 Love numbers (CF, CM or CE)
    #[arg(short = 'r', long, default_value = "CF")]
    reference: String,
    /// Write a run log next to the outputs of each job
    #[arg(short = 'l', long, default_value_t = false)]
    log: bool,
    /// Permissions for output files, in octal
    #[arg(short = 'M', long, default_value = "775", value_parser = parse_mode)]
    mode: u32,
    #[arg(long, env = "GRACE_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
    /// Explicit Love number table, overriding the dataset lookup under the data directory
    #[arg(long)]
    love_file: Option<PathBuf>,
}

fn parse_mode(raw: &str) -> Result<u32, String> {
    u32::from_str_radix(raw.trim_start_matches("0o"), 8)
        .map_err(|err| format!("invalid octal mode {}: {}", raw, err))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let settings = RunSettings {
        love: LoveNumberDataset::from_index(args.love)?,
        reference: args
            .reference
            .parse::<ReferenceFrame>()
            .context("parsing reference frame")?,
        mode: args.mode,
        data_dir: args.data_dir,
        love_file: args.love_file,
    };

    let batch = Batch::new(Runner::new(settings), args.analysis, args.processes, args.log);
    batch.run(&args.parameters)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsed_as_octal() {
        assert_eq!(parse_mode("775").unwrap(), 0o775);
        assert_eq!(parse_mode("0o640").unwrap(), 0o640);
        assert!(parse_mode("9").is_err());
    }

    #[test]
    fn arguments_parse() {
        let args = Args::try_parse_from([
            "grace-driver",
            "mascons",
            "a.yml",
            "b.txt",
            "-P",
            "4",
            "-r",
            "CM",
            "-l",
        ])
        .unwrap();
        assert_eq!(args.analysis, Analysis::Mascons);
        assert_eq!(args.parameters.len(), 2);
        assert_eq!(args.processes, 4);
        assert!(args.log);
        assert_eq!(args.mode, 0o775);
    }
}
