//! Schedule expression parsing.
//!
//! A [`Parser`] turns a [`SpecInput`] into a [`Schedule`]. Textual specs are
//! cron expressions with a configurable field set, `@` descriptors, or
//! `@every <duration>`; an absolute [`DateTime`] produces a one-time
//! schedule. A `TZ=<IANA name>` or `CRON_TZ=<IANA name>` prefix pins the
//! expression to a specific timezone.

use std::ops::{BitOr, BitOrAssign};

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::delay::{ConstantDelaySchedule, OnceSchedule};
use crate::error::Error;
use crate::schedule::Schedule;
use crate::spec_schedule::{all, get_bits, Bounds, SpecSchedule, DOM, DOW, HOURS, MINUTES, MONTHS, SECONDS, STAR_BIT};
use crate::Result;

/// Configuration bits describing which cron fields a [`Parser`] reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseOption(u32);

impl ParseOption {
    /// Seconds field, default 0.
    pub const SECOND: ParseOption = ParseOption(1 << 0);
    /// Optional seconds field, default 0. Implies [`SECOND`](Self::SECOND).
    pub const SECOND_OPTIONAL: ParseOption = ParseOption(1 << 1);
    /// Minutes field, default 0.
    pub const MINUTE: ParseOption = ParseOption(1 << 2);
    /// Hours field, default 0.
    pub const HOUR: ParseOption = ParseOption(1 << 3);
    /// Day of month field, default `*`.
    pub const DOM: ParseOption = ParseOption(1 << 4);
    /// Month field, default `*`.
    pub const MONTH: ParseOption = ParseOption(1 << 5);
    /// Day of week field, default `*`.
    pub const DOW: ParseOption = ParseOption(1 << 6);
    /// Optional day of week field, default `*`. Implies [`DOW`](Self::DOW).
    pub const DOW_OPTIONAL: ParseOption = ParseOption(1 << 7);
    /// Allow descriptors such as `@monthly` and `@every`.
    pub const DESCRIPTOR: ParseOption = ParseOption(1 << 8);

    /// True when every bit of `other` is set in `self`.
    pub fn contains(self, other: ParseOption) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ParseOption {
    type Output = ParseOption;

    fn bitor(self, rhs: ParseOption) -> ParseOption {
        ParseOption(self.0 | rhs.0)
    }
}

impl BitOrAssign for ParseOption {
    fn bitor_assign(&mut self, rhs: ParseOption) {
        self.0 |= rhs.0;
    }
}

/// The canonical field order of a six-position cron expression.
const PLACES: [ParseOption; 6] = [
    ParseOption::SECOND,
    ParseOption::MINUTE,
    ParseOption::HOUR,
    ParseOption::DOM,
    ParseOption::MONTH,
    ParseOption::DOW,
];

/// Defaults substituted for positions the parser is not configured to read.
const DEFAULTS: [&str; 6] = ["0", "0", "0", "*", "*", "*"];

/// Input accepted by [`Parser::parse`]: either a textual expression or an
/// absolute target instant.
#[derive(Clone, Debug, PartialEq)]
pub enum SpecInput {
    Text(String),
    At(DateTime<Utc>),
}

impl From<&str> for SpecInput {
    fn from(spec: &str) -> SpecInput {
        SpecInput::Text(spec.to_string())
    }
}

impl From<String> for SpecInput {
    fn from(spec: String) -> SpecInput {
        SpecInput::Text(spec)
    }
}

impl<Z: TimeZone> From<DateTime<Z>> for SpecInput {
    fn from(at: DateTime<Z>) -> SpecInput {
        SpecInput::At(at.with_timezone(&Utc))
    }
}

/// A cron expression parser with a fixed set of recognized fields.
#[derive(Clone, Copy, Debug)]
pub struct Parser {
    options: ParseOption,
}

impl Parser {
    /// Create a parser reading the given field set.
    ///
    /// # Panics
    ///
    /// Panics when both optional fields are configured at once; the field
    /// count would be ambiguous.
    pub fn new(options: ParseOption) -> Parser {
        let mut optionals = 0;
        if options.contains(ParseOption::DOW_OPTIONAL) {
            optionals += 1;
        }
        if options.contains(ParseOption::SECOND_OPTIONAL) {
            optionals += 1;
        }
        if optionals > 1 {
            panic!("multiple optionals may not be configured");
        }
        Parser { options }
    }

    /// The standard five-field parser (`min hour dom month dow`) with
    /// descriptors enabled.
    pub fn standard() -> Parser {
        Parser::new(
            ParseOption::MINUTE
                | ParseOption::HOUR
                | ParseOption::DOM
                | ParseOption::MONTH
                | ParseOption::DOW
                | ParseOption::DESCRIPTOR,
        )
    }

    /// Parse `input` into a [`Schedule`]. Textual specs without a `TZ=`
    /// prefix are evaluated in `default_loc`.
    pub fn parse(&self, input: &SpecInput, default_loc: Tz) -> Result<Schedule> {
        match input {
            SpecInput::Text(spec) => self.parse_text(spec, default_loc),
            SpecInput::At(at) => {
                if *at < Utc::now() {
                    return Err(Error::InvalidInstant);
                }
                Ok(Schedule::Once(OnceSchedule { at: *at }))
            }
        }
    }

    fn parse_text(&self, spec: &str, default_loc: Tz) -> Result<Schedule> {
        if spec.is_empty() {
            return Err(Error::EmptySpec);
        }

        let mut loc = default_loc;
        let mut spec = spec;
        if spec.starts_with("TZ=") || spec.starts_with("CRON_TZ=") {
            let eq = if spec.starts_with("TZ=") { 2 } else { 7 };
            let Some(space) = spec.find(' ') else {
                return Err(Error::InvalidLocation {
                    name: spec.to_string(),
                    cause: "missing schedule after timezone".to_string(),
                });
            };
            let name = &spec[eq + 1..space];
            loc = name.parse::<Tz>().map_err(|e| Error::InvalidLocation {
                name: name.to_string(),
                cause: e.to_string(),
            })?;
            spec = spec[space..].trim_start();
        }

        if spec.starts_with('@') {
            if !self.options.contains(ParseOption::DESCRIPTOR) {
                return Err(Error::DescriptorNotAllowed(spec.to_string()));
            }
            return parse_descriptor(spec, loc);
        }

        let fields: Vec<&str> = spec.split_whitespace().collect();
        let fields = normalize_fields(fields, self.options)?;

        let bounds: [&Bounds; 6] = [&SECONDS, &MINUTES, &HOURS, &DOM, &MONTHS, &DOW];
        let mut masks = [0u64; 6];
        for (mask, (field, bound)) in masks.iter_mut().zip(fields.iter().zip(bounds)) {
            *mask = get_field(field, bound)?;
        }

        Ok(Schedule::Spec(SpecSchedule {
            second: masks[0],
            minute: masks[1],
            hour: masks[2],
            dom: masks[3],
            month: masks[4],
            dow: masks[5],
            location: loc,
        }))
    }
}

impl Default for Parser {
    fn default() -> Parser {
        Parser::standard()
    }
}

fn parse_descriptor(descriptor: &str, loc: Tz) -> Result<Schedule> {
    match descriptor {
        "@yearly" | "@annually" => {
            return Ok(Schedule::Spec(SpecSchedule {
                second: 1 << SECONDS.min,
                minute: 1 << MINUTES.min,
                hour: 1 << HOURS.min,
                dom: 1 << DOM.min,
                month: 1 << MONTHS.min,
                dow: all(&DOW),
                location: loc,
            }))
        }
        "@monthly" => {
            return Ok(Schedule::Spec(SpecSchedule {
                second: 1 << SECONDS.min,
                minute: 1 << MINUTES.min,
                hour: 1 << HOURS.min,
                dom: 1 << DOM.min,
                month: all(&MONTHS),
                dow: all(&DOW),
                location: loc,
            }))
        }
        "@weekly" => {
            return Ok(Schedule::Spec(SpecSchedule {
                second: 1 << SECONDS.min,
                minute: 1 << MINUTES.min,
                hour: 1 << HOURS.min,
                dom: all(&DOM),
                month: all(&MONTHS),
                dow: 1 << DOW.min,
                location: loc,
            }))
        }
        "@daily" | "@midnight" => {
            return Ok(Schedule::Spec(SpecSchedule {
                second: 1 << SECONDS.min,
                minute: 1 << MINUTES.min,
                hour: 1 << HOURS.min,
                dom: all(&DOM),
                month: all(&MONTHS),
                dow: all(&DOW),
                location: loc,
            }))
        }
        "@hourly" => {
            return Ok(Schedule::Spec(SpecSchedule {
                second: 1 << SECONDS.min,
                minute: 1 << MINUTES.min,
                hour: all(&HOURS),
                dom: all(&DOM),
                month: all(&MONTHS),
                dow: all(&DOW),
                location: loc,
            }))
        }
        _ => {}
    }

    if let Some(rest) = descriptor.strip_prefix("@every ") {
        let duration = humantime::parse_duration(rest).map_err(|e| Error::BadDuration {
            spec: descriptor.to_string(),
            cause: e.to_string(),
        })?;
        return Ok(Schedule::Every(ConstantDelaySchedule::every(duration)));
    }

    Err(Error::UnrecognizedDescriptor(descriptor.to_string()))
}

/// Reconcile the raw field count against the configured field set and expand
/// to the canonical six-position layout.
fn normalize_fields(mut fields: Vec<&str>, options: ParseOption) -> Result<[String; 6]> {
    let mut options = options;
    let mut optionals = 0;
    if options.contains(ParseOption::SECOND_OPTIONAL) {
        options |= ParseOption::SECOND;
        optionals += 1;
    }
    if options.contains(ParseOption::DOW_OPTIONAL) {
        options |= ParseOption::DOW;
        optionals += 1;
    }

    let max = PLACES.iter().filter(|place| options.contains(**place)).count();
    let min = max - optionals;

    if fields.len() < min || fields.len() > max {
        return Err(Error::FieldCount {
            min,
            max,
            got: fields.len(),
        });
    }

    // Fill in the optional field when it was omitted.
    if min < max && fields.len() == min {
        if options.contains(ParseOption::DOW_OPTIONAL) {
            fields.push(DEFAULTS[5]);
        } else {
            fields.insert(0, DEFAULTS[0]);
        }
    }

    let mut expanded: [String; 6] = DEFAULTS.map(String::from);
    let mut n = 0;
    for (i, place) in PLACES.iter().enumerate() {
        if options.contains(*place) {
            expanded[i] = fields[n].to_string();
            n += 1;
        }
    }
    Ok(expanded)
}

/// A field is a comma-separated list of ranges; OR the range masks together.
fn get_field(field: &str, bounds: &Bounds) -> Result<u64> {
    let mut bits = 0u64;
    for expr in field.split(',').filter(|expr| !expr.is_empty()) {
        bits |= get_range(expr, bounds)?;
    }
    Ok(bits)
}

/// Parse a single range of the form `BASE[-END][/STEP]`, where `BASE` is a
/// number, a named alias, or `*` / `?`.
fn get_range(expr: &str, bounds: &Bounds) -> Result<u64> {
    let range_and_step: Vec<&str> = expr.split('/').collect();
    if range_and_step.len() > 2 {
        return Err(Error::BadRange {
            reason: "too many slashes".to_string(),
            expr: expr.to_string(),
        });
    }

    let low_and_high: Vec<&str> = range_and_step[0].split('-').collect();
    if low_and_high.len() > 2 {
        return Err(Error::BadRange {
            reason: "too many hyphens".to_string(),
            expr: expr.to_string(),
        });
    }
    let single_value = low_and_high.len() == 1;

    let mut extra = 0u64;
    let start;
    let mut end;
    if low_and_high[0] == "*" || low_and_high[0] == "?" {
        start = bounds.min;
        end = bounds.max;
        extra = STAR_BIT;
    } else {
        start = parse_int_or_name(low_and_high[0], bounds.names)?;
        end = if low_and_high.len() == 2 {
            parse_int_or_name(low_and_high[1], bounds.names)?
        } else {
            start
        };
    }

    let step = if range_and_step.len() == 2 {
        let step = must_parse_int(range_and_step[1])?;
        // "N/step" means "N-max/step".
        if single_value {
            end = bounds.max;
        }
        // A stepped wildcard is no longer a pure star.
        if step > 1 {
            extra = 0;
        }
        step
    } else {
        1
    };

    if start < bounds.min {
        return Err(Error::BadRange {
            reason: format!("beginning of range ({}) below minimum ({})", start, bounds.min),
            expr: expr.to_string(),
        });
    }
    if end > bounds.max {
        return Err(Error::BadRange {
            reason: format!("end of range ({}) above maximum ({})", end, bounds.max),
            expr: expr.to_string(),
        });
    }
    if start > end {
        return Err(Error::BadRange {
            reason: format!("beginning of range ({}) beyond end of range ({})", start, end),
            expr: expr.to_string(),
        });
    }
    if step == 0 {
        return Err(Error::BadRange {
            reason: "step of range should be a positive number".to_string(),
            expr: expr.to_string(),
        });
    }

    Ok(get_bits(start, end, step) | extra)
}

fn parse_int_or_name(expr: &str, names: &'static [(&'static str, u32)]) -> Result<u32> {
    let lower = expr.to_ascii_lowercase();
    for (name, value) in names {
        if *name == lower {
            return Ok(*value);
        }
    }
    must_parse_int(expr)
}

fn must_parse_int(expr: &str) -> Result<u32> {
    let num: i64 = expr.parse().map_err(|e| Error::BadRange {
        reason: format!("failed to parse int ({})", e),
        expr: expr.to_string(),
    })?;
    if num < 0 {
        return Err(Error::BadRange {
            reason: format!("negative number ({}) not allowed", num),
            expr: expr.to_string(),
        });
    }
    Ok(num as u32)
}
