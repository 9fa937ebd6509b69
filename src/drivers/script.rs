// Scripted input for desktop runs and tests.
//
// One event per line, timed from when the script starts:
//
//   # comment
//   1500 down 240 400
//   1580 up 240 400
//   2000 key g
//   2100 turn -2
//   2500 press shutter
//   2540 release shutter
//   9000 quit
//
// Keys are single characters or one of left, right, up, down, enter,
// escape, delete. Lines must be in time order.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::board::{Button, InputEvent, Key};
use crate::drivers::EventSource;

#[derive(Debug, thiserror::Error)]
#[error("script line {line}: {reason}")]
pub struct ScriptError {
    pub line: usize,
    pub reason: String,
}

pub struct ScriptedInput {
    start: Option<Instant>,
    pending: VecDeque<(Duration, InputEvent)>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self {
            start: None,
            pending: VecDeque::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut script = Self::new();
        let mut last = Duration::ZERO;
        for (n, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let err = |reason: &str| ScriptError {
                line: n + 1,
                reason: reason.to_owned(),
            };
            let mut words = line.split_whitespace();
            let at = words
                .next()
                .and_then(|w| w.parse::<u64>().ok())
                .map(Duration::from_millis)
                .ok_or_else(|| err("expected a time in ms"))?;
            if at < last {
                return Err(err("out of order"));
            }
            last = at;
            let ev = parse_event(&mut words).ok_or_else(|| err("bad event"))?;
            if words.next().is_some() {
                return Err(err("trailing words"));
            }
            script.pending.push_back((at, ev));
        }
        Ok(script)
    }

    /// Queues `ev` at `at` after the first poll. Keep calls in time order.
    pub fn push(&mut self, at: Duration, ev: InputEvent) {
        self.pending.push_back((at, ev));
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl Default for ScriptedInput {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for ScriptedInput {
    fn poll(&mut self, now: Instant, out: &mut Vec<InputEvent>) {
        let start = *self.start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start);
        while let Some(&(at, ev)) = self.pending.front() {
            if at > elapsed {
                break;
            }
            out.push(ev);
            self.pending.pop_front();
        }
    }
}

fn parse_event<'a>(words: &mut impl Iterator<Item = &'a str>) -> Option<InputEvent> {
    let ev = match words.next()? {
        "down" => InputEvent::TouchDown {
            x: num(words)?,
            y: num(words)?,
        },
        "up" => InputEvent::TouchUp {
            x: num(words)?,
            y: num(words)?,
        },
        "key" => InputEvent::Key(parse_key(words.next()?)?),
        "turn" => InputEvent::EncoderTurn(words.next()?.parse().ok()?),
        "press" => InputEvent::ButtonDown(parse_button(words.next()?)?),
        "release" => InputEvent::ButtonUp(parse_button(words.next()?)?),
        "quit" => InputEvent::Quit,
        _ => return None,
    };
    Some(ev)
}

fn num<'a>(words: &mut impl Iterator<Item = &'a str>) -> Option<u16> {
    words.next()?.parse().ok()
}

fn parse_key(word: &str) -> Option<Key> {
    let key = match word {
        "left" => Key::Left,
        "right" => Key::Right,
        "up" => Key::Up,
        "down" => Key::Down,
        "enter" => Key::Enter,
        "escape" => Key::Escape,
        "delete" => Key::Delete,
        w => {
            let mut chars = w.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            Key::Char(c)
        }
    };
    Some(key)
}

fn parse_button(word: &str) -> Option<Button> {
    Button::ALL
        .into_iter()
        .find(|b| b.name().eq_ignore_ascii_case(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_event_kind() {
        let s = ScriptedInput::parse(
            "# warmup\n\
             0 down 10 20\n\
             5 up 10 20\n\
             10 key g\n\
             10 key escape\n\
             20 turn -2\n\
             30 press encoder\n\
             40 release Shutter\n\
             50 quit\n",
        )
        .unwrap();
        assert_eq!(s.remaining(), 8);
    }

    #[test]
    fn rejects_bad_lines() {
        let e = ScriptedInput::parse("10 key g\n5 quit\n").err().unwrap();
        assert_eq!(e.line, 2);
        assert!(ScriptedInput::parse("10 wave\n").is_err());
        assert!(ScriptedInput::parse("10 key gg\n").is_err());
        assert!(ScriptedInput::parse("10 down 5\n").is_err());
        assert!(ScriptedInput::parse("10 quit now\n").is_err());
    }

    #[test]
    fn releases_events_when_due() {
        let mut s = ScriptedInput::parse("0 key s\n100 turn 1\n").unwrap();
        let t0 = Instant::now();
        let mut out = Vec::new();

        s.poll(t0, &mut out);
        assert_eq!(out, [InputEvent::Key(Key::Char('s'))]);
        s.poll(t0 + Duration::from_millis(99), &mut out);
        assert_eq!(out.len(), 1);
        s.poll(t0 + Duration::from_millis(100), &mut out);
        assert_eq!(out[1], InputEvent::EncoderTurn(1));
        assert_eq!(s.remaining(), 0);
    }
}
