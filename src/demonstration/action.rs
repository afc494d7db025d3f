// Action labels - the five motor actions the classifier chooses between

use std::fmt;
use std::str::FromStr;

/// Number of classifier outputs
pub const ACTION_COUNT: usize = 5;

/// Discrete motor action
///
/// The output index of each label is fixed: STOP=0, FORWARD=1, BACKWARD=2,
/// LEFT=3, RIGHT=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionLabel {
    #[serde(alias = "stop")]
    Stop,
    #[serde(alias = "forward")]
    Forward,
    #[serde(alias = "backward")]
    Backward,
    #[serde(alias = "left")]
    Left,
    #[serde(alias = "right")]
    Right,
}

/// Labels in output-index order
pub const ALL_ACTIONS: [ActionLabel; ACTION_COUNT] = [
    ActionLabel::Stop,
    ActionLabel::Forward,
    ActionLabel::Backward,
    ActionLabel::Left,
    ActionLabel::Right,
];

impl ActionLabel {
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Label for an output index, `None` past the table
    pub fn from_index(index: usize) -> Option<Self> {
        ALL_ACTIONS.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionLabel::Stop => "STOP",
            ActionLabel::Forward => "FORWARD",
            ActionLabel::Backward => "BACKWARD",
            ActionLabel::Left => "LEFT",
            ActionLabel::Right => "RIGHT",
        }
    }

    /// One-hot target row for categorical cross-entropy
    pub fn one_hot(&self) -> [f32; ACTION_COUNT] {
        let mut row = [0.0; ACTION_COUNT];
        row[self.index()] = 1.0;
        row
    }
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_ACTIONS
            .iter()
            .copied()
            .find(|label| label.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown action label {:?}", s))
    }
}
