#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and sequence-file parsing for the MID trial engine.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The sequence CSV loader enforces headers and the closed accuracy/cue sets.
use mid_traits::CueKind;
use serde::Deserialize;

/// One row of a run's sequence file: one planned trial.
///
/// Expected headers:
/// cue_type,target_accuracy,n_iti
///
/// Example:
/// cue_type,target_accuracy,n_iti
/// gain,80,2
/// loss,50,3
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SequenceRow {
    pub cue_type: CueTypeToml,
    pub target_accuracy: u8,
    pub n_iti: u32,
}

/// String-keyed mirror of `mid_traits::CueKind` for TOML/CSV deserialization.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CueTypeToml {
    Gain,
    Loss,
    Neutral,
}

impl From<CueTypeToml> for CueKind {
    fn from(c: CueTypeToml) -> Self {
        match c {
            CueTypeToml::Gain => CueKind::Gain,
            CueTypeToml::Loss => CueKind::Loss,
            CueTypeToml::Neutral => CueKind::Neutral,
        }
    }
}

/// Phase durations, target-duration bounds, and scanner timing constants.
///
/// Defaults match the values pinned by the original task implementation.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct StudyParamsCfg {
    pub tr_s: f64,
    pub cue_dur_s: f64,
    pub fixation_dur_s: f64,
    pub response_dur_s: f64,
    pub outcome_dur_s: f64,
    pub iti_tr_dur_s: f64,
    pub min_target_dur_s: f64,
    pub max_target_dur_s: f64,
    pub initial_target_dur_s: f64,
    pub initial_staircase_sd_s: f64,
    pub initial_fix_dur_s: f64,
    pub closing_fix_dur_s: f64,
    pub jitter_max_s: f64,
    pub scanner_pulse_rate: u32,
}

impl Default for StudyParamsCfg {
    fn default() -> Self {
        Self {
            tr_s: 2.0,
            cue_dur_s: 2.0,
            fixation_dur_s: 2.0,
            response_dur_s: 2.0,
            outcome_dur_s: 2.0,
            iti_tr_dur_s: 2.0,
            min_target_dur_s: 0.130,
            max_target_dur_s: 0.500,
            initial_target_dur_s: 0.265,
            initial_staircase_sd_s: 0.067,
            initial_fix_dur_s: 12.0,
            closing_fix_dur_s: 8.0,
            jitter_max_s: 0.05,
            scanner_pulse_rate: 46,
        }
    }
}

/// Priors for one accuracy level's adaptive staircase.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct StaircaseLevelCfg {
    /// Starting threshold estimate, seconds above `min_target_dur_s`.
    pub starting_intensity_s: f64,
    pub starting_sd_s: f64,
    pub target_p: f64,
    pub guess_rate: f64,
}

impl StaircaseLevelCfg {
    fn for_target_p(target_p: f64) -> Self {
        Self {
            starting_intensity_s: 0.135,
            starting_sd_s: 0.067,
            target_p,
            guess_rate: 0.01,
        }
    }
}

impl Default for StaircaseLevelCfg {
    fn default() -> Self {
        Self::for_target_p(0.50)
    }
}

/// Priors for the three accuracy-level staircases (80 / 50 / 20 percent).
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct StaircaseCfg {
    pub high: StaircaseLevelCfg,
    pub medium: StaircaseLevelCfg,
    pub low: StaircaseLevelCfg,
}

impl Default for StaircaseCfg {
    fn default() -> Self {
        Self {
            high: StaircaseLevelCfg::for_target_p(0.80),
            medium: StaircaseLevelCfg::for_target_p(0.50),
            low: StaircaseLevelCfg::for_target_p(0.20),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Which `ScannerBackend` the runner constructs.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Emulated,
    Hardware,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct RunnerCfg {
    /// Scanner backend to construct: "emulated" or "hardware".
    pub backend: Backend,
    /// GPIO line wired to the scanner TTL sync output (hardware backend only).
    pub gpio_line: u8,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            backend: Backend::Emulated,
            gpio_line: 17,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub study_params: StudyParamsCfg,
    #[serde(default)]
    pub staircase: StaircaseCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub runner: RunnerCfg,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            study_params: StudyParamsCfg::default(),
            staircase: StaircaseCfg::default(),
            logging: Logging::default(),
            runner: RunnerCfg::default(),
        }
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        let sp = &self.study_params;
        if sp.tr_s <= 0.0 {
            eyre::bail!("study_params.tr_s must be > 0");
        }
        for (name, v) in [
            ("cue_dur_s", sp.cue_dur_s),
            ("fixation_dur_s", sp.fixation_dur_s),
            ("response_dur_s", sp.response_dur_s),
            ("outcome_dur_s", sp.outcome_dur_s),
            ("iti_tr_dur_s", sp.iti_tr_dur_s),
            ("initial_fix_dur_s", sp.initial_fix_dur_s),
            ("closing_fix_dur_s", sp.closing_fix_dur_s),
        ] {
            if v <= 0.0 {
                eyre::bail!("study_params.{name} must be > 0");
            }
        }
        if sp.jitter_max_s < 0.0 {
            eyre::bail!("study_params.jitter_max_s must be >= 0");
        }
        if sp.scanner_pulse_rate == 0 {
            eyre::bail!("study_params.scanner_pulse_rate must be > 0");
        }
        if sp.min_target_dur_s <= 0.0 || sp.max_target_dur_s <= sp.min_target_dur_s {
            eyre::bail!(
                "study_params.min_target_dur_s must be > 0 and < max_target_dur_s"
            );
        }
        if sp.initial_target_dur_s < sp.min_target_dur_s || sp.initial_target_dur_s > sp.max_target_dur_s
        {
            eyre::bail!(
                "study_params.initial_target_dur_s must fall within [min_target_dur_s, max_target_dur_s]"
            );
        }
        if sp.initial_staircase_sd_s <= 0.0 {
            eyre::bail!("study_params.initial_staircase_sd_s must be > 0");
        }

        for (name, lvl) in [
            ("high", self.staircase.high),
            ("medium", self.staircase.medium),
            ("low", self.staircase.low),
        ] {
            let span = sp.max_target_dur_s - sp.min_target_dur_s;
            if lvl.starting_intensity_s < 0.0 || lvl.starting_intensity_s > span {
                eyre::bail!("staircase.{name}.starting_intensity_s out of bounds [0, {span}]");
            }
            if lvl.starting_sd_s <= 0.0 {
                eyre::bail!("staircase.{name}.starting_sd_s must be > 0");
            }
            if !(0.0..=1.0).contains(&lvl.target_p) {
                eyre::bail!("staircase.{name}.target_p must be in [0.0, 1.0]");
            }
            if !(0.0..1.0).contains(&lvl.guess_rate) {
                eyre::bail!("staircase.{name}.guess_rate must be in [0.0, 1.0)");
            }
        }

        if self.runner.backend == Backend::Hardware && self.runner.gpio_line == 0 {
            eyre::bail!("runner.gpio_line must be set to a valid BCM pin for the hardware backend");
        }

        Ok(())
    }
}

pub fn load_sequence_csv(path: &std::path::Path) -> eyre::Result<Vec<SequenceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open sequence CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["cue_type", "target_accuracy", "n_iti"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "sequence CSV must have headers 'cue_type,target_accuracy,n_iti', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<SequenceRow>().enumerate() {
        match rec {
            Ok(row) => {
                if !matches!(row.target_accuracy, 80 | 50 | 20) {
                    eyre::bail!(
                        "invalid CSV row {}: target_accuracy must be one of 80, 50, 20, got {}",
                        idx + 2,
                        row.target_accuracy
                    );
                }
                rows.push(row);
            }
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    if rows.is_empty() {
        eyre::bail!("sequence CSV {:?} contains no trial rows", path);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let cfg = Config::default();
        cfg.validate().expect("default config must validate");
    }

    #[test]
    fn rejects_zero_pulse_rate() {
        let mut cfg = Config::default();
        cfg.study_params.scanner_pulse_rate = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_target_bounds() {
        let mut cfg = Config::default();
        cfg.study_params.max_target_dur_s = cfg.study_params.min_target_dur_s;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_toml_parses_overrides() {
        let toml_str = r#"
            [study_params]
            tr_s = 2.5
        "#;
        let cfg = load_toml(toml_str).expect("valid toml");
        assert!((cfg.study_params.tr_s - 2.5).abs() < f64::EPSILON);
        assert!((cfg.study_params.min_target_dur_s - 0.130).abs() < f64::EPSILON);
    }

    #[test]
    fn load_sequence_csv_rejects_bad_headers(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut f = tempfile::NamedTempFile::new()?;
        use std::io::Write;
        writeln!(f, "cue,accuracy,iti")?;
        writeln!(f, "gain,80,2")?;
        let result = load_sequence_csv(f.path());
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn load_sequence_csv_rejects_bad_accuracy(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut f = tempfile::NamedTempFile::new()?;
        use std::io::Write;
        writeln!(f, "cue_type,target_accuracy,n_iti")?;
        writeln!(f, "gain,99,2")?;
        let result = load_sequence_csv(f.path());
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn load_sequence_csv_parses_valid_rows() -> Result<(), Box<dyn std::error::Error>> {
        let mut f = tempfile::NamedTempFile::new()?;
        use std::io::Write;
        writeln!(f, "cue_type,target_accuracy,n_iti")?;
        writeln!(f, "gain,80,2")?;
        writeln!(f, "loss,50,3")?;
        writeln!(f, "neutral,20,1")?;
        let rows = load_sequence_csv(f.path())?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].target_accuracy, 80);
        assert_eq!(CueKind::from(rows[1].cue_type), CueKind::Loss);
        Ok(())
    }
}
