use panel_bom::BomError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PowerError {
    #[error("unknown power scenario: {0}")]
    UnknownScenario(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse panel.toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Bom(#[from] BomError),
}
