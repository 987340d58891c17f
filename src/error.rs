use thiserror::Error;

/// 時間集計や名前解決で発生するエラー。
#[derive(Debug, Error)]
pub enum TrackerError {
    /// 期間の指定が不正。未知のperiod、またはcustomで開始・終了が欠けている。
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// 名前からtaskやlistが見つからない。
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// 引数の組み合わせが不正。
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// ClickUp APIがエラーを返した、またはレスポンスが解釈できない。
    #[error("Upstream error{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Upstream {
        status: Option<u16>,
        message: String,
    },
}

impl TrackerError {
    /// ステータスコードを持たない`Upstream`エラーを返す。
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            message: message.into(),
        }
    }

    /// JSON出力で利用するエラー種別。
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPeriod(_) => "invalid_period",
            Self::NotFound { .. } => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Upstream { .. } => "upstream_error",
        }
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream {
            status: err.status().map(|status| status.as_u16()),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
