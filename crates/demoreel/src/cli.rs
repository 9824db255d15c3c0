use std::path::PathBuf;

use clap::Parser;
use renderer::ReloadPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "demoreel",
    author,
    version,
    about = "Rocket-synced multi-pass GLSL demo player"
)]
pub struct Cli {
    /// Demo configuration file.
    #[arg(long, value_name = "FILE", default_value = "demo.toml")]
    pub config: PathBuf,

    /// Root directory for shaders and track data (defaults to the config
    /// file's directory).
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Override the internal render resolution (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Stay in a resizable window instead of going fullscreen.
    #[arg(long)]
    pub windowed: bool,

    /// Behaviour when a shader reload fails: `keep` shows a diagnostic fill
    /// and waits for the next reload, `exit` terminates the process.
    #[arg(long, value_name = "MODE", value_parser = parse_reload_policy)]
    pub on_reload_error: Option<ReloadPolicy>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height".to_string())?;
    if width == 0 || height == 0 {
        return Err("dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

fn parse_reload_policy(value: &str) -> Result<ReloadPolicy, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "keep" | "degrade" => Ok(ReloadPolicy::Degrade),
        "exit" | "abort" => Ok(ReloadPolicy::Abort),
        other => Err(format!(
            "unknown reload-error mode '{other}'; expected keep or exit"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size_pairs() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_size("640X360").unwrap(), (640, 360));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
    }

    #[test]
    fn parses_reload_policy() {
        assert_eq!(
            parse_reload_policy("keep").unwrap(),
            ReloadPolicy::Degrade
        );
        assert_eq!(parse_reload_policy("EXIT").unwrap(), ReloadPolicy::Abort);
        assert!(parse_reload_policy("whatever").is_err());
    }
}
