use std::{fmt, str::FromStr};

use jiff::{
    civil::{Date, DateTime, Time},
    tz::TimeZone,
};

use super::{SensorName, error::KeyError};

pub const SEPARATOR: char = ':';
pub const READING_TAG: &str = "R";
pub const AGGREGATION_TAG: &str = "A";

const READING_DIGITS: usize = 10;
const AGGREGATION_DIGITS: usize = 6;
const CENTURY: i16 = 2000;

/// A storage key, rendered as
///  `<sensor>:R:YYMMDDHHmm` -> Reading (one minute of one sensor)
///  `<sensor>:A:YYMMDD` -> Aggregation (one day of one sensor)
///
/// For a fixed sensor, string order of keys is chronological order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// sensor, minute (seconds are always zero)
    Reading(SensorName, DateTime),
    /// sensor, calendar day
    Aggregation(SensorName, Date),
}

impl Key {
    pub fn reading(sensor: SensorName, at: DateTime) -> Result<Self, KeyError> {
        check_year(at.year())?;
        let minute = DateTime::new(at.year(), at.month(), at.day(), at.hour(), at.minute(), 0, 0)?;
        Ok(Self::Reading(sensor, minute))
    }

    pub fn aggregation(sensor: SensorName, day: Date) -> Result<Self, KeyError> {
        check_year(day.year())?;
        Ok(Self::Aggregation(sensor, day))
    }

    pub fn sensor(&self) -> &SensorName {
        match self {
            Self::Reading(sensor, _) => sensor,
            Self::Aggregation(sensor, _) => sensor,
        }
    }

    /// Calendar fields encoded in the key. Aggregation keys sit at midnight.
    pub fn at(&self) -> DateTime {
        match self {
            Self::Reading(_, at) => *at,
            Self::Aggregation(_, day) => day.to_datetime(Time::midnight()),
        }
    }

    pub fn day(&self) -> Date {
        self.at().date()
    }

    /// The day key this key rolls up into
    pub fn to_aggregation(&self) -> Self {
        Self::Aggregation(self.sensor().clone(), self.day())
    }

    /// Unix seconds of 00:00:00 UTC on the key's calendar day
    pub fn day_timestamp(&self) -> Result<i64, KeyError> {
        Ok(self.day().to_zoned(TimeZone::UTC)?.timestamp().as_second())
    }
}

fn check_year(year: i16) -> Result<(), KeyError> {
    match year {
        CENTURY..=2099 => Ok(()),
        _ => Err(KeyError::YearOutOfRange(year)),
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reading(sensor, at) => write!(
                f,
                "{sensor}{SEPARATOR}{READING_TAG}{SEPARATOR}{:02}{:02}{:02}{:02}{:02}",
                at.year() - CENTURY,
                at.month(),
                at.day(),
                at.hour(),
                at.minute()
            ),
            Self::Aggregation(sensor, day) => write!(
                f,
                "{sensor}{SEPARATOR}{AGGREGATION_TAG}{SEPARATOR}{:02}{:02}{:02}",
                day.year() - CENTURY,
                day.month(),
                day.day()
            ),
        }
    }
}

impl FromStr for Key {
    type Err = KeyError;

    /// The key type is decided by the length of the digit run and must agree
    /// with the tag: 10 digits for `R`, 6 digits for `A`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason| KeyError::MalformedKey {
            key: s.to_string(),
            reason,
        };

        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        let [sensor, tag, digits] = parts[..] else {
            return Err(malformed("expected `<sensor>:<R|A>:<digits>`"));
        };

        let sensor = SensorName::new(sensor).map_err(|_| malformed("invalid sensor name"))?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("time field contains non digits"));
        }

        let field = |at: usize| -> Result<i8, KeyError> {
            digits
                .get(at..at + 2)
                .and_then(|d| d.parse().ok())
                .ok_or_else(|| malformed("truncated time field"))
        };

        let is_reading = match (tag, digits.len()) {
            (READING_TAG, READING_DIGITS) => true,
            (AGGREGATION_TAG, AGGREGATION_DIGITS) => false,
            (READING_TAG | AGGREGATION_TAG, _) => {
                return Err(malformed("digit count does not match key type"));
            }
            _ => return Err(malformed("unknown key type")),
        };

        let (year, month, day) = (CENTURY + field(0)? as i16, field(2)?, field(4)?);
        if !(1..=12).contains(&month) {
            return Err(malformed("month out of range"));
        }
        if !(1..=31).contains(&day) {
            return Err(malformed("day out of range"));
        }
        let date = Date::new(year, month, day).map_err(|_| malformed("no such calendar day"))?;

        if !is_reading {
            return Ok(Self::Aggregation(sensor, date));
        }

        let (hour, minute) = (field(6)?, field(8)?);
        if !(0..=23).contains(&hour) {
            return Err(malformed("hour out of range"));
        }
        if !(0..=59).contains(&minute) {
            return Err(malformed("minute out of range"));
        }
        let time = Time::new(hour, minute, 0, 0).map_err(|_| malformed("invalid time of day"))?;
        Ok(Self::Reading(sensor, date.to_datetime(time)))
    }
}

#[cfg(test)]
mod test {
    use jiff::civil::{date, datetime};

    use super::*;

    fn sensor(s: &str) -> SensorName {
        SensorName::new(s).unwrap()
    }

    #[test]
    fn test_render() {
        let key = Key::reading(sensor("testXYZ"), datetime(2015, 11, 25, 18, 32, 21, 196)).unwrap();
        assert_eq!(key.to_string(), "testXYZ:R:1511251832");
        assert_eq!(key.to_aggregation().to_string(), "testXYZ:A:151125");

        let key = Key::aggregation(sensor("a1"), date(2001, 2, 3)).unwrap();
        assert_eq!(key.to_string(), "a1:A:010203");
    }

    #[test]
    fn test_parse() {
        let key: Key = "testABCD:R:1511241709".parse().unwrap();
        assert_eq!(key, Key::Reading(sensor("testABCD"), datetime(2015, 11, 24, 17, 9, 0, 0)));

        let key: Key = "testABCD:A:151124".parse().unwrap();
        assert_eq!(key, Key::Aggregation(sensor("testABCD"), date(2015, 11, 24)));
        assert_eq!(key.day_timestamp().unwrap(), 1448323200);
    }

    #[test]
    fn test_parse_rejects() {
        for bad in [
            "",
            "testABCD",
            "testABCD:R",
            "testABCD:R:1511241709:00",
            "test-ABCD:R:1511241709",
            ":R:1511241709",
            "testABCD:X:1511241709",
            "testABCD:R:151124",
            "testABCD:A:1511241709",
            "testABCD:R:15112417",
            "testABCD:R:15112417a9",
            "testABCD:R:1513241709",
            "testABCD:R:1500241709",
            "testABCD:R:1511321709",
            "testABCD:R:1502301709",
            "testABCD:R:1511242409",
            "testABCD:R:1511241760",
        ] {
            assert!(
                matches!(bad.parse::<Key>(), Err(KeyError::MalformedKey { .. })),
                "`{bad}` should not parse"
            );
        }
    }

    #[test]
    fn test_year_range() {
        assert_eq!(
            Key::reading(sensor("s"), datetime(1999, 12, 31, 23, 59, 0, 0)),
            Err(KeyError::YearOutOfRange(1999))
        );
        assert_eq!(
            Key::aggregation(sensor("s"), date(2100, 1, 1)),
            Err(KeyError::YearOutOfRange(2100))
        );
        assert!(Key::reading(sensor("s"), datetime(2099, 12, 31, 23, 59, 0, 0)).is_ok());
    }

    #[test]
    fn test_sorts_chronologically() {
        let times = [
            datetime(2015, 1, 1, 0, 0, 0, 0),
            datetime(2015, 1, 1, 0, 9, 0, 0),
            datetime(2015, 1, 1, 10, 0, 0, 0),
            datetime(2015, 1, 2, 0, 0, 0, 0),
            datetime(2015, 10, 1, 0, 0, 0, 0),
            datetime(2016, 1, 1, 0, 0, 0, 0),
        ];
        let keys: Vec<String> = times
            .iter()
            .map(|t| Key::reading(sensor("s1"), *t).unwrap().to_string())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
