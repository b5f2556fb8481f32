//! Calendar timestamp formatting
//!
//! Renders a point in time as fixed-width text into a caller-provided buffer.
//! The same formatter produces the `[timestamp]` field of every record and the
//! timestamp embedded in volume file names.

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Options;

/// Size of the buffer every formatted timestamp fits into
pub const TIMESTAMP_BUF_LEN: usize = 32;

/// Length of the date and time part without sub-second digits
const BASE_LEN: usize = 19;

/// Sub-second precision of a timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// `2018.12.11-13.58.59`
    Seconds,
    /// `2018.12.11-13.58.59-123`
    Millis,
    /// `2018.12.11-13.58.59-123456`
    Micros,
    /// `2018.12.11-13.58.59-123456789`
    Nanos,
}

impl Default for Resolution {
    fn default() -> Self {
        Self::Seconds
    }
}

impl Resolution {
    /// Pick the resolution selected by the options bitset, seconds if none is set
    pub fn from_options(options: Options) -> Self {
        if options.contains(Options::NSEC_RES) {
            Self::Nanos
        } else if options.contains(Options::USEC_RES) {
            Self::Micros
        } else if options.contains(Options::MSEC_RES) {
            Self::Millis
        } else {
            Self::Seconds
        }
    }

    /// Number of sub-second digits
    pub fn fraction_digits(&self) -> usize {
        match self {
            Self::Seconds => 0,
            Self::Millis => 3,
            Self::Micros => 6,
            Self::Nanos => 9,
        }
    }

    /// Exact length of a timestamp rendered at this resolution
    pub fn text_len(&self) -> usize {
        match self.fraction_digits() {
            0 => BASE_LEN,
            digits => BASE_LEN + 1 + digits,
        }
    }
}

/// Order of the calendar fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    /// year.month.day
    YearMonthDay,
    /// day.month.year
    DayMonthYear,
    /// month.day.year
    MonthDayYear,
}

impl Default for DateOrder {
    fn default() -> Self {
        Self::YearMonthDay
    }
}

/// Fixed-width timestamp layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampFormat {
    pub order: DateOrder,
    pub resolution: Resolution,
    /// Between year, month and day
    pub date_sep: u8,
    /// Between the date and the time
    pub field_sep: u8,
    /// Between hours, minutes and seconds
    pub time_sep: u8,
    /// Between seconds and the sub-second digits
    pub fraction_sep: u8,
}

impl Default for TimestampFormat {
    fn default() -> Self {
        Self::new(DateOrder::default(), Resolution::default())
    }
}

impl TimestampFormat {
    /// Layout safe to embed in file names on every platform
    pub fn new(order: DateOrder, resolution: Resolution) -> Self {
        Self {
            order,
            resolution,
            date_sep: b'.',
            field_sep: b'-',
            time_sep: b'.',
            fraction_sep: b'-',
        }
    }

    /// Use different separators
    pub fn with_separators(mut self, date_sep: u8, field_sep: u8, time_sep: u8) -> Self {
        self.date_sep = date_sep;
        self.field_sep = field_sep;
        self.time_sep = time_sep;
        self
    }

    /// Render `ts` into `buf`, returning the number of bytes placed
    pub fn format<Tz: TimeZone>(&self, ts: &DateTime<Tz>, buf: &mut [u8; TIMESTAMP_BUF_LEN]) -> usize {
        let year = ts.year().clamp(0, 9999) as u32;
        let month = ts.month();
        let day = ts.day();

        let mut pos = 0;
        let date: [(u32, usize); 3] = match self.order {
            DateOrder::YearMonthDay => [(year, 4), (month, 2), (day, 2)],
            DateOrder::DayMonthYear => [(day, 2), (month, 2), (year, 4)],
            DateOrder::MonthDayYear => [(month, 2), (day, 2), (year, 4)],
        };
        for (i, (value, width)) in date.iter().enumerate() {
            if i > 0 {
                buf[pos] = self.date_sep;
                pos += 1;
            }
            pos = put_digits(buf, pos, *value, *width);
        }

        buf[pos] = self.field_sep;
        pos += 1;

        let time = [ts.hour(), ts.minute(), ts.second()];
        for (i, value) in time.iter().enumerate() {
            if i > 0 {
                buf[pos] = self.time_sep;
                pos += 1;
            }
            pos = put_digits(buf, pos, *value, 2);
        }

        let digits = self.resolution.fraction_digits();
        if digits > 0 {
            // leap seconds report nanos past one second
            let nanos = ts.nanosecond().min(999_999_999);
            let fraction = nanos / 10u32.pow(9 - digits as u32);
            buf[pos] = self.fraction_sep;
            pos += 1;
            pos = put_digits(buf, pos, fraction, digits);
        }

        pos
    }

    /// Render the current time
    pub fn format_now(&self, utc: bool, buf: &mut [u8; TIMESTAMP_BUF_LEN]) -> usize {
        if utc {
            self.format(&Utc::now(), buf)
        } else {
            self.format(&Local::now(), buf)
        }
    }

    /// Render `ts` into a new string
    pub fn to_text<Tz: TimeZone>(&self, ts: &DateTime<Tz>) -> String {
        let mut buf = [0u8; TIMESTAMP_BUF_LEN];
        let len = self.format(ts, &mut buf);
        String::from_utf8_lossy(&buf[..len]).into_owned()
    }
}

/// Write `value` zero-padded to `width` digits
fn put_digits(buf: &mut [u8], pos: usize, mut value: u32, width: usize) -> usize {
    for i in (0..width).rev() {
        buf[pos + i] = b'0' + (value % 10) as u8;
        value /= 10;
    }
    pos + width
}
