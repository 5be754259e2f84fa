use serde::{Deserialize, Serialize};

/// Configuration from `todo/config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub order: OrderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default = "default_board_name")]
    pub name: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        BoardConfig {
            name: default_board_name(),
        }
    }
}

/// How chains are rebuilt from their links
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainStrategy {
    /// Walk from the head along the successor links
    #[default]
    Traverse,
    /// Repeatedly splice elements next to their successor until stable
    Relocate,
}

impl std::fmt::Display for ChainStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainStrategy::Traverse => write!(f, "traverse"),
            ChainStrategy::Relocate => write!(f, "relocate"),
        }
    }
}

impl std::str::FromStr for ChainStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "traverse" => Ok(ChainStrategy::Traverse),
            "relocate" => Ok(ChainStrategy::Relocate),
            other => Err(format!(
                "unknown strategy '{}' (expected traverse or relocate)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderConfig {
    #[serde(default)]
    pub strategy: ChainStrategy,
    /// Iteration bound for the relocate strategy. Absent = N³ for N elements.
    #[serde(default)]
    pub iteration_limit: Option<usize>,
    /// Rebuild the whole chain after every move and adopt that order
    #[serde(default = "default_true")]
    pub verify_after_move: bool,
}

impl Default for OrderConfig {
    fn default() -> Self {
        OrderConfig {
            strategy: ChainStrategy::default(),
            iteration_limit: None,
            verify_after_move: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_board_name() -> String {
    "todos".to_string()
}
