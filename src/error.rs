use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum InputError {
    #[display("empty ticker symbol")]
    Empty,
    #[display("invalid ticker symbol \"{input}\"")]
    InvalidSymbol { input: String },
    #[display("no ticker symbols were entered")]
    NoTickers,
}

#[derive(Debug, Display, Error)]
pub enum SourceError {
    #[display("failed to build {source_name} client")]
    Client { source_name: String },
    #[display("request to {source_name} failed")]
    Request { source_name: String },
    #[display("symbol {symbol} not found")]
    NotFound { symbol: String },
    #[display("rate limit exceeded for {source_name}")]
    RateLimited { source_name: String },
    #[display("malformed response from {source_name}")]
    MalformedResponse { source_name: String },
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
    #[display("{indicator} produced a non-finite value")]
    NonFinite { indicator: String },
}

#[derive(Debug, Display, Error)]
pub enum ProcessError {
    #[display("{ticker}: data unavailable")]
    DataUnavailable { ticker: String },
    #[display("{ticker}: unexpected data shape ({reason})")]
    DataShape { ticker: String, reason: String },
    #[display("{ticker}: indicator computation failed")]
    Computation { ticker: String },
}
