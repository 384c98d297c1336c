//! Common validation utilities.

use validator::ValidationError;

/// Maximum export date range in days.
pub const MAX_EXPORT_RANGE_DAYS: i64 = 365;

/// Maximum lookback window for scheduled exports, in days.
pub const MAX_LOOKBACK_DAYS: i32 = 365;

/// Maximum length of a schedule name.
pub const MAX_SCHEDULE_NAME_LENGTH: usize = 100;

/// Validates that a weekly trigger day is within 0 (Sunday) to 6 (Saturday).
pub fn validate_day_of_week(day: i16) -> Result<(), ValidationError> {
    if (0..=6).contains(&day) {
        Ok(())
    } else {
        let mut err = ValidationError::new("day_of_week_range");
        err.message = Some("Day of week must be between 0 (Sunday) and 6 (Saturday)".into());
        Err(err)
    }
}

/// Validates that a monthly trigger day is within 1 to 31.
pub fn validate_day_of_month(day: i16) -> Result<(), ValidationError> {
    if (1..=31).contains(&day) {
        Ok(())
    } else {
        let mut err = ValidationError::new("day_of_month_range");
        err.message = Some("Day of month must be between 1 and 31".into());
        Err(err)
    }
}

/// Validates that a lookback window is within 1 to 365 days.
pub fn validate_lookback_days(days: i32) -> Result<(), ValidationError> {
    if (1..=MAX_LOOKBACK_DAYS).contains(&days) {
        Ok(())
    } else {
        let mut err = ValidationError::new("lookback_days_range");
        err.message = Some("Lookback must be between 1 and 365 days".into());
        Err(err)
    }
}

/// Validates a wall-clock trigger time given as "HH:MM".
pub fn validate_time_of_day(value: &str) -> Result<(u32, u32), ValidationError> {
    let invalid = || {
        let mut err = ValidationError::new("time_of_day_format");
        err.message = Some("Time of day must be HH:MM (24-hour)".into());
        err
    };

    let (h, m) = value.split_once(':').ok_or_else(invalid)?;
    if h.len() != 2 || m.len() != 2 {
        return Err(invalid());
    }
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

/// Validates a UTC offset in minutes. Real offsets span UTC-12:00 to UTC+14:00.
pub fn validate_tz_offset_minutes(offset: i32) -> Result<(), ValidationError> {
    if (-12 * 60..=14 * 60).contains(&offset) {
        Ok(())
    } else {
        let mut err = ValidationError::new("tz_offset_range");
        err.message = Some("Timezone offset must be between -720 and +840 minutes".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_day_of_week() {
        assert!(validate_day_of_week(0).is_ok());
        assert!(validate_day_of_week(6).is_ok());
        assert!(validate_day_of_week(7).is_err());
        assert!(validate_day_of_week(-1).is_err());
    }

    #[test]
    fn test_validate_day_of_week_error_message() {
        let err = validate_day_of_week(9).unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Day of week must be between 0 (Sunday) and 6 (Saturday)"
        );
    }

    #[test]
    fn test_validate_day_of_month() {
        assert!(validate_day_of_month(1).is_ok());
        assert!(validate_day_of_month(31).is_ok());
        assert!(validate_day_of_month(0).is_err());
        assert!(validate_day_of_month(32).is_err());
    }

    #[test]
    fn test_validate_lookback_days() {
        assert!(validate_lookback_days(1).is_ok());
        assert!(validate_lookback_days(7).is_ok());
        assert!(validate_lookback_days(365).is_ok());
        assert!(validate_lookback_days(0).is_err());
        assert!(validate_lookback_days(366).is_err());
    }

    #[test]
    fn test_validate_time_of_day() {
        assert_eq!(validate_time_of_day("09:00").unwrap(), (9, 0));
        assert_eq!(validate_time_of_day("23:59").unwrap(), (23, 59));
        assert_eq!(validate_time_of_day("00:00").unwrap(), (0, 0));
    }

    #[test]
    fn test_validate_time_of_day_rejects_bad_input() {
        assert!(validate_time_of_day("24:00").is_err());
        assert!(validate_time_of_day("12:60").is_err());
        assert!(validate_time_of_day("9:00").is_err());
        assert!(validate_time_of_day("0900").is_err());
        assert!(validate_time_of_day("morning").is_err());
        assert!(validate_time_of_day("12:00:00").is_err());
    }

    #[test]
    fn test_validate_tz_offset_minutes() {
        assert!(validate_tz_offset_minutes(0).is_ok());
        assert!(validate_tz_offset_minutes(-720).is_ok());
        assert!(validate_tz_offset_minutes(840).is_ok());
        assert!(validate_tz_offset_minutes(-721).is_err());
        assert!(validate_tz_offset_minutes(841).is_err());
    }
}
