use avsync_core::{ConfigError, Participant, Questionnaire};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Audio/visual synchrony experiment")]
pub struct Args {
    /// Path to config TOML
    #[arg(long, default_value = "avsync.toml")]
    pub config: PathBuf,

    /// Directory for submissions and the session result file
    #[arg(long, default_value = "avsync-data")]
    pub output: PathBuf,

    /// Participant age in years
    #[arg(long)]
    pub age: u32,

    /// Participant gender
    #[arg(long)]
    pub gender: String,

    /// The 18 questionnaire answers, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub answers: Vec<i32>,

    /// Font for on-screen text (TTF/OTF); text is omitted without one
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Run without an audio device
    #[arg(long, default_value_t = false)]
    pub no_audio: bool,

    /// Do not persist anything; the participant gets an offline id
    #[arg(long, default_value_t = false)]
    pub offline: bool,
}

impl Args {
    pub fn participant(&self) -> Participant {
        Participant {
            age: self.age,
            gender: self.gender.clone(),
        }
    }

    pub fn questionnaire(&self) -> Result<Questionnaire, ConfigError> {
        Questionnaire::new(self.answers.clone())
    }
}
