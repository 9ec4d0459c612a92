use std::collections::HashSet;

use crate::domain::{CursorPosition, PaneInfo};

use super::LIST_PANES_DELIM;

const LIST_PANES_FIELDS: usize = 7;

pub(super) fn list_panes_format() -> String {
    format!(
        "#{{session_name}}{d}#{{window_index}}{d}#{{window_name}}{d}#{{pane_id}}{d}#{{pane_index}}{d}#{{pane_current_command}}{d}#{{pane_dead}}",
        d = LIST_PANES_DELIM
    )
}

pub(super) fn parse_list_panes_output(output: &str) -> Result<Vec<PaneInfo>, String> {
    let mut panes = Vec::new();
    for line in output.lines().filter(|line| !line.trim().is_empty()) {
        let parts: Vec<&str> = if line.contains(LIST_PANES_DELIM) {
            line.split(LIST_PANES_DELIM).collect()
        } else if line.contains('\t') {
            line.split('\t').collect()
        } else {
            vec![line]
        };
        if parts.len() != LIST_PANES_FIELDS {
            return Err(format!(
                "unexpected list-panes field count {}, line: {}",
                parts.len(),
                line
            ));
        }

        let window_index = parts[1].parse::<i64>().map_err(|err| {
            format!(
                "invalid window_index value '{}' in line '{}': {err}",
                parts[1], line
            )
        })?;
        let pane_index = parts[4].parse::<i64>().map_err(|err| {
            format!(
                "invalid pane_index value '{}' in line '{}': {err}",
                parts[4], line
            )
        })?;
        let pane_dead = match parts[6] {
            "0" => false,
            "1" => true,
            other => {
                return Err(format!("invalid pane_dead value '{other}' in line: {line}"));
            }
        };

        panes.push(PaneInfo {
            session_name: parts[0].to_string(),
            window_index,
            window_name: parts[2].to_string(),
            pane_id: parts[3].to_string(),
            pane_index,
            current_command: parts[5].to_string(),
            pane_dead,
        });
    }
    Ok(panes)
}

pub(super) fn parse_pane_ids(output: &str) -> HashSet<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

pub(super) fn parse_cursor_position(output: &str) -> Result<CursorPosition, String> {
    let trimmed = output.trim();
    let (x, y) = trimmed
        .split_once(',')
        .ok_or_else(|| format!("invalid cursor position '{trimmed}'"))?;
    let x = x
        .trim()
        .parse::<u16>()
        .map_err(|err| format!("invalid cursor_x '{x}': {err}"))?;
    let y = y
        .trim()
        .parse::<u16>()
        .map_err(|err| format!("invalid cursor_y '{y}': {err}"))?;
    Ok(CursorPosition { x, y })
}
