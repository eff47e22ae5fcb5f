/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use strum::{AsRefStr, Display, EnumString};

#[derive(
    Deserialize,
    Serialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    EnumString,
    AsRefStr,
    Display,
    sqlx::Type,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Whether a task in this state still counts against its due date.
    pub fn is_open(&self) -> bool {
        !matches!(self, TaskStatus::Completed)
    }
}

#[derive(
    Deserialize,
    Serialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    EnumString,
    AsRefStr,
    Display,
    sqlx::Type,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_wire_names() {
        assert_eq!("in-progress", TaskStatus::InProgress.as_ref());
        assert_eq!(Ok(TaskStatus::Completed), TaskStatus::from_str("completed"));
        assert!(TaskStatus::from_str("In-Progress").is_err());
        assert_eq!(
            json!("in-progress"),
            serde_json::to_value(TaskStatus::InProgress).unwrap()
        );
        assert_eq!("high", TaskPriority::High.to_string());
        assert_eq!(TaskPriority::Medium, TaskPriority::default());
        assert_eq!(TaskStatus::Todo, TaskStatus::default());
    }

    #[test]
    fn test_open_states() {
        assert!(TaskStatus::Todo.is_open());
        assert!(TaskStatus::InProgress.is_open());
        assert!(!TaskStatus::Completed.is_open());
    }
}
