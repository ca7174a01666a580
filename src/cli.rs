use crate::config::RuntimeConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

const SUPPORTED_FLAGS: &str = "--level, --config, --frames, --dt, --editor, --watch, --radius, --seed, --log";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunnerArgs {
    level: Option<PathBuf>,
    config: Option<PathBuf>,
    frames: Option<u32>,
    dt: Option<f32>,
    editor: Option<bool>,
    watch: Option<bool>,
    radius: Option<f32>,
    seed: Option<u64>,
    log_filter: Option<String>,
}

impl RunnerArgs {
    pub const DEFAULT_FRAMES: u32 = 600;
    pub const DEFAULT_DT: f32 = 1.0 / 60.0;

    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = RunnerArgs::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Flags take the form --name value.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "level" => parsed.level = Some(PathBuf::from(value)),
                "config" => parsed.config = Some(PathBuf::from(value)),
                "frames" => {
                    parsed.frames =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid frame count '{value}'"))?);
                }
                "dt" => {
                    let dt = value.parse::<f32>().with_context(|| format!("Invalid dt '{value}'"))?;
                    if !(dt.is_finite() && dt > 0.0) {
                        bail!("Invalid dt '{value}'. Use a positive number of seconds.");
                    }
                    parsed.dt = Some(dt);
                }
                "editor" => parsed.editor = Some(parse_bool_flag("editor", &value)?),
                "watch" => parsed.watch = Some(parse_bool_flag("watch", &value)?),
                "radius" => {
                    parsed.radius =
                        Some(value.parse::<f32>().with_context(|| format!("Invalid radius '{value}'"))?);
                }
                "seed" => {
                    parsed.seed = Some(value.parse::<u64>().with_context(|| format!("Invalid seed '{value}'"))?);
                }
                "log" => parsed.log_filter = Some(value),
                _ => bail!("Unknown flag '{flag}'. Supported flags: {SUPPORTED_FLAGS}."),
            }
        }
        Ok(parsed)
    }

    pub fn level(&self) -> Option<&PathBuf> {
        self.level.as_ref()
    }

    pub fn config(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    pub fn frames(&self) -> u32 {
        self.frames.unwrap_or(Self::DEFAULT_FRAMES)
    }

    pub fn dt(&self) -> f32 {
        self.dt.unwrap_or(Self::DEFAULT_DT)
    }

    pub fn editor(&self) -> bool {
        self.editor.unwrap_or(false)
    }

    pub fn watch(&self) -> bool {
        self.watch.unwrap_or(false)
    }

    pub fn config_overrides(&self) -> RuntimeConfigOverrides {
        RuntimeConfigOverrides {
            interaction_radius: self.radius,
            rng_seed: self.seed,
            log_filter: self.log_filter.clone(),
        }
    }
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}
