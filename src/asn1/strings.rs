// Character-string and time value codecs

use super::tag;
use crate::decode_bail;
use crate::error::ProbeResult;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

/// Characters allowed in a PrintableString
pub fn is_printable(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, ' ' | '\'' | '(' | ')' | '+' | ',' | '-' | '.' | '/' | ':' | '=' | '?')
}

pub(crate) fn decode_string(string_type: u32, v: &[u8]) -> ProbeResult<String> {
    match string_type {
        tag::UTF8_STRING => match String::from_utf8(v.to_vec()) {
            Ok(s) => Ok(s),
            Err(_) => decode_bail!("invalid UTF-8 in UTF8String"),
        },
        tag::NUMERIC_STRING => {
            narrow(v, |c| c.is_ascii_digit() || c == ' ', "NumericString")
        }
        tag::PRINTABLE_STRING => narrow(v, is_printable, "PrintableString"),
        tag::IA5_STRING => narrow(v, |c| c.is_ascii(), "IA5String"),
        tag::VISIBLE_STRING => narrow(v, |c| (' '..='~').contains(&c), "VisibleString"),
        // T.61 is approximated as Latin-1, like most decoders do
        tag::TELETEX_STRING => Ok(v.iter().map(|&b| char::from(b)).collect()),
        tag::UNIVERSAL_STRING => {
            if v.len() % 4 != 0 {
                decode_bail!("invalid UniversalString length: {}", v.len());
            }
            v.chunks(4)
                .map(|c| {
                    let cp = u32::from_be_bytes([c[0], c[1], c[2], c[3]]);
                    code_point(cp, "UniversalString")
                })
                .collect()
        }
        tag::BMP_STRING => {
            if v.len() % 2 != 0 {
                decode_bail!("invalid BMPString length: {}", v.len());
            }
            v.chunks(2)
                .map(|c| code_point(u32::from(u16::from_be_bytes([c[0], c[1]])), "BMPString"))
                .collect()
        }
        other => decode_bail!("not a character string type: {}", other),
    }
}

fn code_point(cp: u32, what: &str) -> ProbeResult<char> {
    match char::from_u32(cp) {
        Some(c) => Ok(c),
        None => decode_bail!("invalid code point U+{:04X} in {}", cp, what),
    }
}

fn narrow(v: &[u8], allowed: impl Fn(char) -> bool, what: &str) -> ProbeResult<String> {
    let mut s = String::with_capacity(v.len());
    for &b in v {
        let c = char::from(b);
        if b >= 0x80 || !allowed(c) {
            decode_bail!("invalid character 0x{:02X} in {}", b, what);
        }
        s.push(c);
    }
    Ok(s)
}

pub(crate) fn encode_string(string_type: u32, s: &str) -> ProbeResult<Vec<u8>> {
    let check = |allowed: &dyn Fn(char) -> bool, what: &str| -> ProbeResult<Vec<u8>> {
        if let Some(c) = s.chars().find(|&c| !allowed(c)) {
            decode_bail!("character U+{:04X} not allowed in {}", u32::from(c), what);
        }
        Ok(s.as_bytes().to_vec())
    };
    match string_type {
        tag::UTF8_STRING => Ok(s.as_bytes().to_vec()),
        tag::NUMERIC_STRING => check(&|c| c.is_ascii_digit() || c == ' ', "NumericString"),
        tag::PRINTABLE_STRING => check(&is_printable, "PrintableString"),
        tag::IA5_STRING => check(&|c| c.is_ascii(), "IA5String"),
        tag::VISIBLE_STRING => check(&|c| (' '..='~').contains(&c), "VisibleString"),
        tag::TELETEX_STRING => {
            let mut out = Vec::with_capacity(s.len());
            for c in s.chars() {
                match u8::try_from(u32::from(c)) {
                    Ok(b) => out.push(b),
                    Err(_) => decode_bail!("character U+{:04X} not allowed in TeletexString", u32::from(c)),
                }
            }
            Ok(out)
        }
        tag::UNIVERSAL_STRING => Ok(s.chars().flat_map(|c| u32::from(c).to_be_bytes()).collect()),
        tag::BMP_STRING => {
            let mut out = Vec::with_capacity(s.len() * 2);
            for c in s.chars() {
                match u16::try_from(u32::from(c)) {
                    Ok(u) => out.extend_from_slice(&u.to_be_bytes()),
                    Err(_) => decode_bail!("character U+{:04X} not allowed in BMPString", u32::from(c)),
                }
            }
            Ok(out)
        }
        other => decode_bail!("not a character string type: {}", other),
    }
}

struct Digits<'a> {
    s: &'a [u8],
    pos: usize,
}

impl<'a> Digits<'a> {
    fn take(&mut self, n: usize) -> ProbeResult<u32> {
        if self.pos + n > self.s.len() {
            decode_bail!("truncated time value");
        }
        let mut acc = 0u32;
        for &c in &self.s[self.pos..self.pos + n] {
            if !c.is_ascii_digit() {
                decode_bail!("invalid time value");
            }
            acc = acc * 10 + u32::from(c - b'0');
        }
        self.pos += n;
        Ok(acc)
    }

    fn peek_digit(&self) -> bool {
        self.s.get(self.pos).is_some_and(|c| c.is_ascii_digit())
    }

    fn rest(&self) -> &'a [u8] {
        &self.s[self.pos..]
    }
}

pub(crate) fn decode_utc_time(v: &[u8]) -> ProbeResult<DateTime<Utc>> {
    let mut d = Digits { s: v, pos: 0 };
    let yy = d.take(2)? as i32;
    let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
    finish_time(&mut d, year, false)
}

pub(crate) fn decode_generalized_time(v: &[u8]) -> ProbeResult<DateTime<Utc>> {
    let mut d = Digits { s: v, pos: 0 };
    let year = d.take(4)? as i32;
    finish_time(&mut d, year, true)
}

fn finish_time(d: &mut Digits<'_>, year: i32, allow_fraction: bool) -> ProbeResult<DateTime<Utc>> {
    let month = d.take(2)?;
    let day = d.take(2)?;
    let hour = d.take(2)?;
    let minute = d.take(2)?;
    let second = if d.peek_digit() { d.take(2)? } else { 0 };
    let mut millis = 0i64;
    if allow_fraction && matches!(d.rest().first(), Some(b'.') | Some(b',')) {
        d.pos += 1;
        let mut scale = 100;
        let mut any = false;
        while d.peek_digit() {
            let x = d.take(1)?;
            millis += i64::from(x) * scale;
            scale /= 10;
            any = true;
        }
        if !any {
            decode_bail!("invalid fractional seconds");
        }
    }
    let offset_secs: i64 = match d.rest() {
        b"Z" => 0,
        [sign @ (b'+' | b'-'), ..] if d.rest().len() == 5 => {
            let sign = if *sign == b'+' { 1 } else { -1 };
            d.pos += 1;
            let oh = d.take(2)?;
            let om = d.take(2)?;
            sign * i64::from(oh * 3600 + om * 60)
        }
        _ => decode_bail!("invalid time zone in time value"),
    };
    // 23:59:60 leap seconds are clamped rather than rejected
    let second = second.min(59);
    let naive = match NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
    {
        Some(n) => n,
        None => decode_bail!("invalid date/time value"),
    };
    let t = Utc.from_utc_datetime(&naive) + Duration::milliseconds(millis)
        - Duration::seconds(offset_secs);
    Ok(t)
}
