use once_cell::sync::Lazy;
use regex::Regex;

use super::is_tool_noise;
use crate::scan::types::{GroupRecord, GroupState};

/// Line index of the state row in `--describe --group G --verbose --state` output
/// (a blank line, then the column header, then the row)
pub const GROUP_STATE_LINE: usize = 2;

const MEMBERS_HEADER: &str = "#MEMBERS";

static GROUP_STATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\S*)\s*(\S*)\s\((\d*)\)\s*(\S*)\s*(\S*)\s*(\d*)").unwrap_or_else(|_| unreachable!())
});

/// State row of a single-group state query, taken positionally
pub fn parse_group_state(raw: &str) -> Option<String> {
    raw.split('\n')
        .nth(GROUP_STATE_LINE)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
}

/// State row of output that may be prefixed by tool warnings (container exec)
pub fn parse_group_state_lenient(raw: &str) -> Option<String> {
    raw.lines()
        .find(|l| is_state_row(l))
        .map(|l| l.trim().to_string())
}

/// One record per state row of an `--all-groups --state` query
pub fn parse_group_state_rows(raw: &str) -> Vec<GroupRecord> {
    raw.lines()
        .filter(|l| is_state_row(l))
        .filter_map(|l| {
            let name = l.split_whitespace().next()?;
            Some(GroupRecord {
                name: name.to_string(),
                state: l.trim().to_string(),
                ..Default::default()
            })
        })
        .collect()
}

/// Members/describe output, minus tool warnings
pub fn parse_detail_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .filter(|l| !is_tool_noise(l))
        .map(str::to_string)
        .collect()
}

fn is_state_row(line: &str) -> bool {
    !line.contains(MEMBERS_HEADER) && !line.trim().is_empty() && !is_tool_noise(line)
}

impl GroupState {
    /// Split a state row into its columns.
    ///
    /// A group without assignment prints no strategy, so `Empty` lands in the strategy
    /// column and the member count in the state column; those are shifted back.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = GROUP_STATE_REGEX.captures(line)?;
        let (strategy, state, members) = if &caps[4] == "Empty" {
            ("-", &caps[4], &caps[5])
        } else {
            (&caps[4], &caps[5], &caps[6])
        };

        Some(Self {
            group: caps[1].to_string(),
            coordinator: caps[2].to_string(),
            coordinator_id: caps[3].to_string(),
            assignment_strategy: strategy.to_string(),
            state: state.to_string(),
            members: members.to_string(),
        })
    }
}

impl GroupRecord {
    pub fn state_columns(&self) -> Option<GroupState> {
        GroupState::parse(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STABLE: &str = "\n\
GROUP           COORDINATOR (ID)                     ASSIGNMENT-STRATEGY  STATE           #MEMBERS\n\
billing         bkuv1001.os.amadeus.net:9092 (1)     range                Stable          3\n";

    const EMPTY: &str = "\n\
GROUP           COORDINATOR (ID)                     ASSIGNMENT-STRATEGY  STATE           #MEMBERS\n\
audit           bkuv1002.os.amadeus.net:9092 (2)                          Empty           0\n";

    #[test]
    fn test_state_row_is_third_line() {
        let state = parse_group_state(STABLE).unwrap();
        assert!(state.starts_with("billing"));
        assert!(parse_group_state("\nheader only\n").is_none());
    }

    #[test]
    fn test_stable_columns() {
        let state = GroupState::parse(&parse_group_state(STABLE).unwrap()).unwrap();
        assert_eq!(state.group, "billing");
        assert_eq!(state.coordinator, "bkuv1001.os.amadeus.net:9092");
        assert_eq!(state.coordinator_id, "1");
        assert_eq!(state.assignment_strategy, "range");
        assert_eq!(state.state, "Stable");
        assert_eq!(state.members, "3");
    }

    #[test]
    fn test_empty_group_column_shift() {
        let state = GroupState::parse(&parse_group_state(EMPTY).unwrap()).unwrap();
        assert_eq!(state.group, "audit");
        assert_eq!(state.coordinator_id, "2");
        assert_eq!(state.assignment_strategy, "-");
        assert_eq!(state.state, "Empty");
        assert_eq!(state.members, "0");
    }

    #[test]
    fn test_lenient_skips_warnings_and_header() {
        let raw = "[2024-03-01 10:00:00,000] WARN something noisy\n\nGROUP COORDINATOR (ID) ASSIGNMENT-STRATEGY STATE #MEMBERS\nbilling host:9092 (1) range Stable 3\n";
        assert_eq!(
            parse_group_state_lenient(raw).unwrap(),
            "billing host:9092 (1) range Stable 3"
        );
    }

    #[test]
    fn test_all_groups_rows() {
        let raw = "\nGROUP COORDINATOR (ID) ASSIGNMENT-STRATEGY STATE #MEMBERS\nbilling host:9092 (1) range Stable 3\n\nGROUP COORDINATOR (ID) ASSIGNMENT-STRATEGY STATE #MEMBERS\naudit host:9092 (2)  Empty 0\n";
        let rows = parse_group_state_rows(raw);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "billing");
        assert_eq!(rows[1].name, "audit");
        assert_eq!(rows[1].state_columns().unwrap().state, "Empty");
    }

    #[test]
    fn test_detail_lines_drop_noise() {
        let raw = "[WARN] x\nGROUP TOPIC PARTITION\nbilling orders 0\n";
        assert_eq!(parse_detail_lines(raw), vec!["GROUP TOPIC PARTITION", "billing orders 0"]);
    }
}
