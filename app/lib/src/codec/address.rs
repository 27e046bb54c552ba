//! Address text <-> binary conversion.
//!
//! IPv4 is dotted decimal. IPv6 is written in canonical colon-hex: the
//! longest run (two groups or more, leftmost on ties) of zero groups collapses
//! to `::`, and IPv4-mapped or IPv4-compatible addresses end in dotted decimal.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::number::write_decimal;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Parse dotted-decimal IPv4. Octets may carry leading zeros.
pub fn parse_ipv4(text: &[u8]) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut parts = text.split(|&c| c == b'.');
    for octet in octets.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 {
            return None;
        }
        let mut value: u16 = 0;
        for &c in part {
            if !c.is_ascii_digit() {
                return None;
            }
            value = value * 10 + (c - b'0') as u16;
        }
        *octet = u8::try_from(value).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}

fn parse_hex_group(piece: &[u8]) -> Option<u16> {
    if piece.is_empty() || piece.len() > 4 {
        return None;
    }
    let mut value: u16 = 0;
    for &c in piece {
        let nibble = match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            b'A'..=b'F' => c - b'A' + 10,
            _ => return None,
        };
        value = (value << 4) | nibble as u16;
    }
    Some(value)
}

/// Parse colon-hex IPv6, with at most one `::` and an optional dotted tail.
pub fn parse_ipv6(text: &[u8]) -> Option<Ipv6Addr> {
    let len = text.len();
    if len < 2 {
        return None;
    }

    let mut groups = [0u16; 8];
    let mut count = 0usize;
    let mut gap: Option<usize> = None;
    let mut i = 0;

    if text.starts_with(b"::") {
        gap = Some(0);
        i = 2;
    } else if text[0] == b':' {
        return None;
    }

    while i < len {
        let end = text[i..]
            .iter()
            .position(|&c| c == b':')
            .map_or(len, |p| i + p);
        let piece = &text[i..end];

        if piece.contains(&b'.') {
            if end != len || count + 2 > 8 {
                return None;
            }
            let [a, b, c, d] = parse_ipv4(piece)?.octets();
            groups[count] = u16::from_be_bytes([a, b]);
            groups[count + 1] = u16::from_be_bytes([c, d]);
            count += 2;
            break;
        }

        if count == 8 {
            return None;
        }
        groups[count] = parse_hex_group(piece)?;
        count += 1;

        if end == len {
            break;
        }
        if text.get(end + 1) == Some(&b':') {
            if gap.is_some() {
                return None;
            }
            gap = Some(count);
            i = end + 2;
        } else {
            i = end + 1;
            if i == len {
                return None;
            }
        }
    }

    match gap {
        Some(at) => {
            if count > 7 {
                return None;
            }
            let tail = count - at;
            groups.copy_within(at..count, 8 - tail);
            for g in &mut groups[at..8 - tail] {
                *g = 0;
            }
        }
        None if count != 8 => return None,
        None => {}
    }

    Some(Ipv6Addr::from(groups))
}

/// Parse either address family, trying IPv4 first.
pub fn parse_ip(text: &[u8]) -> Option<IpAddr> {
    parse_ipv4(text)
        .map(IpAddr::V4)
        .or_else(|| parse_ipv6(text).map(IpAddr::V6))
}

/// Append dotted-decimal IPv4.
pub fn write_ipv4(addr: Ipv4Addr, out: &mut Vec<u8>) {
    for (i, octet) in addr.octets().iter().enumerate() {
        if i > 0 {
            out.push(b'.');
        }
        write_decimal(*octet as u64, out);
    }
}

fn write_hex_group(group: u16, out: &mut Vec<u8>) {
    let mut started = false;
    for shift in [12u16, 8, 4, 0] {
        let nibble = ((group >> shift) & 0xf) as usize;
        if nibble != 0 || started || shift == 0 {
            out.push(HEX[nibble]);
            started = true;
        }
    }
}

/// Longest run of at least two zero groups as `(start, len)`; leftmost wins ties.
fn longest_zero_run(groups: &[u16; 8]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut i = 0;
    while i < 8 {
        if groups[i] != 0 {
            i += 1;
            continue;
        }
        let start = i;
        while i < 8 && groups[i] == 0 {
            i += 1;
        }
        let run = i - start;
        if run >= 2 && best.map_or(true, |(_, len)| run > len) {
            best = Some((start, run));
        }
    }
    best
}

/// Append canonical IPv6 text.
pub fn write_ipv6(addr: Ipv6Addr, out: &mut Vec<u8>) {
    let groups = addr.segments();
    let octets = addr.octets();
    let run = longest_zero_run(&groups);

    let dotted_tail = match run {
        Some((0, 5)) => groups[5] == 0xffff,
        Some((0, 6)) => true,
        Some((0, 7)) => addr != Ipv6Addr::LOCALHOST,
        _ => false,
    };
    let hex_groups = if dotted_tail { 6 } else { 8 };

    let mut i = 0;
    while i < hex_groups {
        match run {
            Some((start, len)) if start == i => {
                if i == 0 {
                    out.push(b':');
                }
                out.push(b':');
                i += len;
            }
            _ => {
                write_hex_group(groups[i], out);
                i += 1;
                if i < 8 {
                    out.push(b':');
                }
            }
        }
    }

    if dotted_tail {
        write_ipv4(
            Ipv4Addr::new(octets[12], octets[13], octets[14], octets[15]),
            out,
        );
    }
}

/// Append canonical text for either family.
pub fn write_ip(addr: IpAddr, out: &mut Vec<u8>) {
    match addr {
        IpAddr::V4(v4) => write_ipv4(v4, out),
        IpAddr::V6(v6) => write_ipv6(v6, out),
    }
}
