use std::path::PathBuf;

use learnovate_i18n::CatalogError;
use learnovate_llm::ChatError;
use snafu::Snafu;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("failed to load config from {path:?} on `{stage}`: {source}"))]
    ExtractConfig {
        stage: &'static str,
        path: PathBuf,
        source: Box<figment::Error>,
    },
    #[snafu(display("failed to load translations on `{stage}`: {source}"))]
    LoadTranslations {
        stage: &'static str,
        source: CatalogError,
    },
    #[snafu(display("failed to set up the chat client on `{stage}`: {source}"))]
    ChatClient {
        stage: &'static str,
        source: ChatError,
    },
    #[snafu(display("terminal i/o failed on `{stage}`: {source}"))]
    Terminal {
        stage: &'static str,
        source: std::io::Error,
    },
}
