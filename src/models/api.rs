use serde::{ Serialize, Deserialize };
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartType {
    #[serde(rename = "western_birth_chart")]
    Western,
    #[serde(rename = "vedic_birth_chart")]
    Vedic,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Western => "western_birth_chart",
            ChartType::Vedic => "vedic_birth_chart",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseChartTypeError {
    message: String,
}

impl fmt::Display for ParseChartTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseChartTypeError {}

impl FromStr for ChartType {
    type Err = ParseChartTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vedic" | "vedic_birth_chart" => Ok(ChartType::Vedic),
            "western" | "western_birth_chart" => Ok(ChartType::Western),
            _ =>
                Err(ParseChartTypeError {
                    message: format!("Invalid chart type: '{}'", s),
                }),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CreateChatRequest {
    pub user_id: String,
    pub birth_date: String,
    pub birth_time: String,
    pub latitude: f64,
    pub longitude: f64,
    pub message: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ContinueChatRequest {
    pub message: String,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub context_window: u32,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub chat_id: i64,
    #[serde(default)]
    pub message: String,
}
