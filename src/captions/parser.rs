use std::time::Duration;

use nom::bytes::complete::{tag, take_while_m_n};
use nom::character::complete::{char, digit1, space0, space1};
use nom::combinator::{all_consuming, map_res, opt, rest, verify};
use nom::error::{Error, ErrorKind};
use nom::sequence::preceded;
use nom::IResult;

use super::Cue;
use crate::DebateError;

const HEADER: &str = "WEBVTT";
const SKIPPED_BLOCKS: &[&str] = &["NOTE", "STYLE", "REGION"];

/// Parse a WebVTT document into its cues, in file order.
pub fn parse_vtt(input: &str) -> Result<Vec<Cue>, DebateError> {
    let input = input.strip_prefix('\u{FEFF}').unwrap_or(input);
    let mut blocks = blocks(input).into_iter();

    match blocks.next() {
        Some((_, header)) if header[0].starts_with(HEADER) => {}
        _ => {
            return Err(DebateError::InvalidCaptions(
                "missing WEBVTT header".to_string(),
            ))
        }
    }

    let mut cues = Vec::new();
    for (line_no, block) in blocks {
        if is_skipped_block(block[0]) {
            continue;
        }

        // An identifier line may precede the timing line
        let (timing_offset, timing) = if block[0].contains("-->") {
            (0, block[0])
        } else if block.len() > 1 {
            (1, block[1])
        } else {
            return Err(DebateError::InvalidCaptions(format!(
                "line {}: expected a cue timing line, found {:?}",
                line_no, block[0]
            )));
        };

        let (_, (start, end)) = timing_line(timing).map_err(|_| {
            DebateError::InvalidCaptions(format!(
                "line {}: invalid cue timing {:?}",
                line_no + timing_offset,
                timing
            ))
        })?;

        let lines = block[timing_offset + 1..]
            .iter()
            .map(|l| l.to_string())
            .collect();
        cues.push(Cue::new(start, end, lines));
    }

    Ok(cues)
}

/// Parse a single WebVTT timestamp (`HH:MM:SS.mmm` or `MM:SS.mmm`).
pub fn parse_timestamp(input: &str) -> Result<Duration, DebateError> {
    all_consuming(timestamp)(input.trim())
        .map(|(_, ts)| ts)
        .map_err(|_| DebateError::InvalidTimestamp(input.to_string()))
}

/// NOTE, STYLE and REGION blocks, but not cue identifiers such as `NOTES-1`
fn is_skipped_block(first_line: &str) -> bool {
    SKIPPED_BLOCKS.iter().any(|kw| {
        first_line
            .strip_prefix(kw)
            .map_or(false, |rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    })
}

/// Split the document into blocks separated by empty lines, keeping the
/// 1-based line number each block starts on.
fn blocks(input: &str) -> Vec<(usize, Vec<&str>)> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start = 0;

    for (idx, line) in input.lines().enumerate() {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push((start, std::mem::take(&mut current)));
            }
            continue;
        }
        if current.is_empty() {
            start = idx + 1;
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push((start, current));
    }

    blocks
}

fn timing_line(input: &str) -> IResult<&str, (Duration, Duration)> {
    let (input, _) = space0(input)?;
    let (input, start) = timestamp(input)?;
    let (input, _) = space1(input)?;
    let (input, _) = tag("-->")(input)?;
    let (input, _) = space1(input)?;
    let (input, end) = timestamp(input)?;
    // Cue settings (position, align, ...) are not needed
    let (input, _) = rest(input)?;

    Ok((input, (start, end)))
}

fn timestamp(input: &str) -> IResult<&str, Duration> {
    let original = input;
    let (input, first) = digit1(input)?;
    let (input, _) = char(':')(input)?;
    let (input, second) = sexagesimal(input)?;
    let (input, third) = opt(preceded(char(':'), sexagesimal))(input)?;
    let (input, _) = char('.')(input)?;
    let (input, millis) = map_res(
        take_while_m_n(3, 3, |c: char| c.is_ascii_digit()),
        |s: &str| s.parse::<u64>(),
    )(input)?;

    // Hours may be any width; a leading minutes field must be 00-59
    let fields = match third {
        Some(seconds) => first.parse::<u64>().ok().map(|h| (h, second, seconds)),
        None => all_consuming(sexagesimal)(first)
            .ok()
            .map(|(_, minutes)| (0, minutes, second)),
    };

    fields
        .and_then(|(hours, minutes, seconds)| total_millis(hours, minutes, seconds, millis))
        .map(|ms| (input, Duration::from_millis(ms)))
        .ok_or_else(|| nom::Err::Error(Error::new(original, ErrorKind::Verify)))
}

/// Two-digit minutes or seconds field in 00-59
fn sexagesimal(input: &str) -> IResult<&str, u64> {
    verify(
        map_res(
            take_while_m_n(2, 2, |c: char| c.is_ascii_digit()),
            |s: &str| s.parse::<u64>(),
        ),
        |value| *value < 60,
    )(input)
}

fn total_millis(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Option<u64> {
    hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)?
        .checked_mul(1000)?
        .checked_add(millis)
}
