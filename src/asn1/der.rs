// DER decoding and encoding of element trees

use super::MAX_DEPTH;
use super::element::{Content, Element, TagClass};
use crate::decode_bail;
use crate::error::ProbeResult;
use bytes::{BufMut, BytesMut};

impl Element {
    /// Decode exactly one element spanning the whole input
    pub fn decode(buf: &[u8]) -> ProbeResult<Element> {
        let mut off = 0;
        let e = decode_at(buf, &mut off, 0)?;
        if off != buf.len() {
            decode_bail!("trailing garbage after element ({} bytes)", buf.len() - off);
        }
        Ok(e)
    }

    /// DER encoding of this element
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        let value = self.value();
        let mut buf = BytesMut::with_capacity(value.len() + 8);
        write_identifier(&mut buf, self.class, self.is_constructed(), self.tag);
        write_length(&mut buf, value.len());
        buf.put_slice(&value);
        out.extend_from_slice(&buf);
    }
}

fn decode_at(buf: &[u8], off: &mut usize, depth: usize) -> ProbeResult<Element> {
    if depth > MAX_DEPTH {
        decode_bail!("element nesting too deep");
    }
    let (class, constructed, tag) = read_identifier(buf, off)?;
    let len = read_length(buf, off)?;
    let end = match off.checked_add(len) {
        Some(end) if end <= buf.len() => end,
        _ => decode_bail!("truncated element: need {} bytes, have {}", len, buf.len() - *off),
    };
    let value = &buf[*off..end];
    let content = if constructed {
        let mut subs = Vec::new();
        let mut sub_off = 0;
        while sub_off < value.len() {
            subs.push(decode_at(value, &mut sub_off, depth + 1)?);
        }
        Content::Constructed(subs)
    } else {
        Content::Primitive(value.to_vec())
    };
    *off = end;
    Ok(Element { class, tag, content })
}

fn next_byte(buf: &[u8], off: &mut usize) -> ProbeResult<u8> {
    match buf.get(*off) {
        Some(&b) => {
            *off += 1;
            Ok(b)
        }
        None => decode_bail!("truncated element header"),
    }
}

fn read_identifier(buf: &[u8], off: &mut usize) -> ProbeResult<(TagClass, bool, u32)> {
    let b = next_byte(buf, off)?;
    let class = TagClass::from_bits(b >> 6);
    let constructed = b & 0x20 != 0;
    let mut tag = u32::from(b & 0x1F);
    if tag == 0x1F {
        tag = 0;
        let mut first = true;
        loop {
            let x = next_byte(buf, off)?;
            if first && x == 0x80 {
                decode_bail!("non-minimal tag encoding");
            }
            first = false;
            if tag > (u32::MAX >> 7) {
                decode_bail!("tag value overflow");
            }
            tag = (tag << 7) | u32::from(x & 0x7F);
            if x & 0x80 == 0 {
                break;
            }
        }
        if tag < 0x1F {
            decode_bail!("non-minimal tag encoding");
        }
    }
    Ok((class, constructed, tag))
}

fn read_length(buf: &[u8], off: &mut usize) -> ProbeResult<usize> {
    let b = next_byte(buf, off)?;
    if b < 0x80 {
        return Ok(usize::from(b));
    }
    let n = usize::from(b & 0x7F);
    if n == 0 {
        decode_bail!("indefinite length is not DER");
    }
    if n > 4 {
        decode_bail!("length field too large ({} bytes)", n);
    }
    let mut len = 0usize;
    for i in 0..n {
        let x = next_byte(buf, off)?;
        if i == 0 && x == 0 {
            decode_bail!("non-minimal length encoding");
        }
        len = (len << 8) | usize::from(x);
    }
    if len < 0x80 {
        decode_bail!("non-minimal length encoding");
    }
    Ok(len)
}

fn write_identifier(buf: &mut BytesMut, class: TagClass, constructed: bool, tag: u32) {
    let mut first = class.bits() << 6;
    if constructed {
        first |= 0x20;
    }
    if tag < 0x1F {
        buf.put_u8(first | tag as u8);
        return;
    }
    buf.put_u8(first | 0x1F);
    let mut groups = Vec::new();
    let mut t = tag;
    loop {
        groups.push((t & 0x7F) as u8);
        t >>= 7;
        if t == 0 {
            break;
        }
    }
    for (i, g) in groups.iter().enumerate().rev() {
        buf.put_u8(if i > 0 { g | 0x80 } else { *g });
    }
}

fn write_length(buf: &mut BytesMut, len: usize) {
    if len < 0x80 {
        buf.put_u8(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    buf.put_u8(0x80 | (bytes.len() - skip) as u8);
    buf.put_slice(&bytes[skip..]);
}
