#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("io error\n{0}")]
    Io(#[from] std::io::Error),
    #[error("formatting error\n{0}")]
    Fmt(#[from] std::fmt::Error),
    #[error("bad tunables: {0}")]
    Tunables(String),
    #[error("bad mask: {0}")]
    Mask(String),
}
