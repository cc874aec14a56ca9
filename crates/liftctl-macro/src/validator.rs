use liftctl_frame::{AccessChannel, DeviceAction};
use serde::Serialize;

use crate::config::ValidationOptions;
use crate::error::{Column, ValidationError, ValidationErrors};
use crate::file::{MacroFile, MacroRow};

/// A validated macro row, ready to be packed into an ALL_STATUS frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchRow {
    pub access_channel: AccessChannel,
    pub channel_number: u16,
    pub action: DeviceAction,
    pub delay_seconds: u16,
}

/// A validated macro: rows replayed `repeat_count` times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchJob {
    pub rows: Vec<BatchRow>,
    pub repeat_count: u32,
}

impl BatchJob {
    /// Rows transmitted over a full run.
    pub fn total_transmissions(&self) -> u64 {
        self.rows.len() as u64 * u64::from(self.repeat_count)
    }
}

/// Validate every row of `file`.
///
/// All violations are collected; a job is returned only when there are none.
pub fn validate(
    file: &MacroFile,
    options: &ValidationOptions,
) -> std::result::Result<BatchJob, ValidationErrors> {
    let mut errors = Vec::new();
    let mut rows = Vec::with_capacity(file.rows.len());

    for (idx, raw) in file.rows.iter().enumerate() {
        if let Some(row) = validate_row(idx + 1, raw, options, &mut errors) {
            rows.push(row);
        }
    }

    if !errors.is_empty() {
        return Err(ValidationErrors(errors));
    }

    Ok(BatchJob {
        rows,
        repeat_count: file.loop_count,
    })
}

fn validate_row(
    row: usize,
    raw: &MacroRow,
    options: &ValidationOptions,
    errors: &mut Vec<ValidationError>,
) -> Option<BatchRow> {
    let before = errors.len();
    let mut fail = |column: Option<Column>, reason: String| {
        errors.push(ValidationError {
            row,
            column,
            reason,
        });
    };

    let empty = raw.cells().iter().filter(|c| c.is_empty()).count();
    if empty > 1 {
        fail(None, format!("{empty} empty cells, at most one allowed"));
    }

    let access_channel = if raw.access.is_empty() {
        fail(Some(Column::Access), "access channel is required".into());
        None
    } else {
        match AccessChannel::parse(&raw.access) {
            None => {
                fail(
                    Some(Column::Access),
                    format!("{:?} is not an access channel", raw.access),
                );
                None
            }
            Some(channel) => match options.enforce_access_mode {
                Some(mode) if channel.mode() != mode => {
                    fail(
                        Some(Column::Access),
                        format!("{:?} is not valid in {mode} mode", raw.access),
                    );
                    None
                }
                _ => Some(channel),
            },
        }
    };

    let action = if raw.action.is_empty() {
        fail(Some(Column::Action), "action is required".into());
        None
    } else {
        let parsed = DeviceAction::parse(&raw.action);
        if parsed.is_none() {
            fail(
                Some(Column::Action),
                format!("{:?} is not one of UP, STOP, DOWN", raw.action),
            );
        }
        parsed
    };

    let channel_number = parse_u16(&raw.channel, options.default_channel)
        .map_err(|reason| fail(Some(Column::Channel), reason))
        .ok();
    let delay_seconds = parse_u16(&raw.delay, 0)
        .map_err(|reason| fail(Some(Column::Delay), reason))
        .ok();

    if errors.len() != before {
        return None;
    }

    Some(BatchRow {
        access_channel: access_channel?,
        channel_number: channel_number?,
        action: action?,
        delay_seconds: delay_seconds?,
    })
}

fn parse_u16(cell: &str, default: u16) -> std::result::Result<u16, String> {
    if cell.is_empty() {
        return Ok(default);
    }
    if !cell.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("{cell:?} is not an unsigned number"));
    }
    cell.parse::<u16>()
        .map_err(|_| format!("{cell:?} is not below 65536"))
}

#[cfg(test)]
mod tests {
    use liftctl_frame::AfMode;

    use super::*;

    fn file(rows: &[[&str; 4]], loop_count: u32) -> MacroFile {
        MacroFile {
            rows: rows
                .iter()
                .map(|r| MacroRow::new(r[0], r[1], r[2], r[3]))
                .collect(),
            loop_count,
        }
    }

    #[test]
    fn valid_file_becomes_job() {
        let job = validate(
            &file(&[["A", "12", "UP", "3"], ["F7", "65535", "DOWN", "0"]], 2),
            &ValidationOptions::default(),
        )
        .unwrap();

        assert_eq!(job.repeat_count, 2);
        assert_eq!(job.rows[0].access_channel.to_string(), "A");
        assert_eq!(job.rows[0].channel_number, 12);
        assert_eq!(job.rows[1].action, DeviceAction::Down);
        assert_eq!(job.rows[1].channel_number, 65535);
        assert_eq!(job.total_transmissions(), 4);
    }

    #[test]
    fn empty_channel_and_delay_take_defaults() {
        let options = ValidationOptions {
            default_channel: 42,
            ..ValidationOptions::default()
        };
        let job = validate(&file(&[["B", "", "STOP", "1"], ["C", "3", "UP", ""]], 1), &options)
            .unwrap();
        assert_eq!(job.rows[0].channel_number, 42);
        assert_eq!(job.rows[1].delay_seconds, 0);
    }

    #[test]
    fn reports_every_violation() {
        let errors = validate(
            &file(
                &[
                    ["A", "1", "UP", "0"],
                    ["Q", "1", "SIDEWAYS", "0"],
                    ["B", "65536", "UP", "-1"],
                ],
                1,
            ),
            &ValidationOptions::default(),
        )
        .unwrap_err();

        let found: Vec<(usize, Option<Column>)> =
            errors.iter().map(|e| (e.row, e.column)).collect();
        assert_eq!(
            found,
            vec![
                (2, Some(Column::Access)),
                (2, Some(Column::Action)),
                (3, Some(Column::Channel)),
                (3, Some(Column::Delay)),
            ]
        );
    }

    #[test]
    fn more_than_one_empty_cell_is_rejected() {
        let errors = validate(&file(&[["A", "", "UP", ""]], 1), &ValidationOptions::default())
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.0[0].column, None);
    }

    #[test]
    fn empty_access_or_action_is_rejected() {
        let errors = validate(
            &file(&[["", "1", "UP", "0"], ["A", "1", "", "0"]], 1),
            &ValidationOptions::default(),
        )
        .unwrap_err();
        assert_eq!(errors.0[0].column, Some(Column::Access));
        assert_eq!(errors.0[1].column, Some(Column::Action));
    }

    #[test]
    fn access_mode_is_enforced_when_requested() {
        let rows = file(&[["F3", "1", "UP", "0"]], 1);
        assert!(validate(&rows, &ValidationOptions::default()).is_ok());

        let options = ValidationOptions {
            enforce_access_mode: Some(AfMode::A),
            ..ValidationOptions::default()
        };
        let errors = validate(&rows, &options).unwrap_err();
        assert!(errors.0[0].reason.contains("A mode"));
    }

    #[test]
    fn signs_and_spaces_are_not_numbers() {
        let errors = validate(&file(&[["A", "+5", "UP", "0"]], 1), &ValidationOptions::default())
            .unwrap_err();
        assert_eq!(errors.0[0].column, Some(Column::Channel));
    }
}
