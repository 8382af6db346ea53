//! External media pipeline commands
//!
//! Pipelines are built as argument vectors and piped stage to stage by the
//! supervisor. Nothing is passed through a shell, so URLs and names are
//! never interpreted.
//!
//! ```text
//! publish:   ffmpeg -i <url> ... -  |  moq-pub --name <name> <relay>
//! subscribe: moq-sub --name <name> <relay>  |  ffmpeg -i - -t <secs> <out>/<name>.mp4
//! ```

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::protocol::constants::DEFAULT_RELAY_URL;

const MOVFLAGS: &str = "cmaf+separate_moof+delay_moov+skip_trailer+frag_every_frame";

/// One process in a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl Stage {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: AsRef<OsStr>,
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        Self {
            program: program.as_ref().to_os_string(),
            args: args.into_iter().map(|a| a.as_ref().to_os_string()).collect(),
        }
    }
}

/// A sequence of stages, each stage's stdout feeding the next one's stdin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineCommand {
    stages: Vec<Stage>,
}

impl PipelineCommand {
    /// Single-stage pipeline
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: AsRef<OsStr>,
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        Self {
            stages: vec![Stage::new(program, args)],
        }
    }

    /// Append a stage reading the previous stage's output
    pub fn pipe<P, I, A>(mut self, program: P, args: I) -> Self
    where
        P: AsRef<OsStr>,
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        self.stages.push(Stage::new(program, args));
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Display for PipelineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", stage.program.to_string_lossy())?;
            for arg in &stage.args {
                write!(f, " {}", arg.to_string_lossy())?;
            }
        }
        Ok(())
    }
}

/// Locations of the external media tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTools {
    /// `ffmpeg` program
    pub ffmpeg: PathBuf,

    /// Relay publish client
    pub moq_pub: PathBuf,

    /// Relay subscribe client
    pub moq_sub: PathBuf,

    /// Relay broker launcher
    pub relay: PathBuf,

    /// Relay URL the clients connect to
    pub relay_url: String,
}

impl Default for MediaTools {
    fn default() -> Self {
        let moqrs_dir = dirs::home_dir().unwrap_or_default().join("moq-rs");
        Self::from_moqrs_dir(moqrs_dir)
    }
}

impl MediaTools {
    /// Tools from a moq-rs checkout with release binaries built
    pub fn from_moqrs_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let release = dir.join("target").join("release");

        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            moq_pub: release.join("moq-pub"),
            moq_sub: release.join("moq-sub"),
            relay: dir.join("dev").join("relay"),
            relay_url: DEFAULT_RELAY_URL.to_string(),
        }
    }

    /// Set the `ffmpeg` program
    pub fn ffmpeg(mut self, program: impl Into<PathBuf>) -> Self {
        self.ffmpeg = program.into();
        self
    }

    /// Set the relay URL
    pub fn relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = url.into();
        self
    }

    /// Loop the media source into the relay under `name`
    pub fn publish(&self, media_url: &str, name: &str) -> PipelineCommand {
        PipelineCommand::new(
            &self.ffmpeg,
            [
                "-hide_banner",
                "-v",
                "quiet",
                "-stream_loop",
                "-1",
                "-re",
                "-i",
                media_url,
                "-f",
                "mp4",
                "-c",
                "copy",
                "-an",
                "-movflags",
                MOVFLAGS,
                "-",
            ],
        )
        .pipe(&self.moq_pub, ["--name", name, self.relay_url.as_str()])
    }

    /// Record `name` from the relay into `<output_dir>/<name>.mp4`
    pub fn subscribe(&self, name: &str, output_dir: &Path, duration: Duration) -> PipelineCommand {
        let output = recording_path(output_dir, name);
        let secs = duration.as_secs().max(1).to_string();

        PipelineCommand::new(&self.moq_sub, ["--name", name, self.relay_url.as_str()]).pipe(
            &self.ffmpeg,
            [
                OsStr::new("-i"),
                OsStr::new("-"),
                OsStr::new("-t"),
                OsStr::new(&secs),
                output.as_os_str(),
            ],
        )
    }

    /// Start the relay broker
    pub fn relay(&self) -> PipelineCommand {
        PipelineCommand::new(&self.relay, std::iter::empty::<&str>())
    }
}

/// Recording file for a publisher
pub fn recording_path(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(format!("{name}.mp4"))
}
