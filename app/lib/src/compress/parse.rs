//! Raw log line to [`CompressionRecord`].
//!
//! Columns: timestamp, client, server, qtype, rcode, qname, then zero or more
//! `type, count, value...` answer groups in CNAME, A, AAAA order.

use std::net::IpAddr;

use crate::codec::{parse_canonical_decimal, parse_ip, parse_ipv4, parse_ipv6};
use crate::config::{CodecConfig, REPLACEMENT_MARKER};
use crate::error::{DnslzError, Result};
use crate::record::{
    AddressRrSet, CompressionRecord, Slot, StringRrSet, GROUP_TYPE_LIMIT,
    MAX_ALLOWED_RRSET_SIZE, TYPE_A, TYPE_AAAA,
};
use crate::tokenizer::Row;

/// Columns before the first answer group.
const FIXED_COLUMNS: usize = 6;

/// Answer group kinds in the order they must appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKind {
    Cname,
    A,
    Aaaa,
}

impl GroupKind {
    fn of(rtype: u8) -> Self {
        match rtype {
            TYPE_A => GroupKind::A,
            TYPE_AAAA => GroupKind::Aaaa,
            _ => GroupKind::Cname,
        }
    }
}

struct Fields<'r, 'a> {
    row: &'r Row<'a>,
    line: u64,
    packed_delimiter: u8,
}

impl<'a> Fields<'_, 'a> {
    fn column(&self, index: usize, what: &str) -> Result<&'a [u8]> {
        self.row
            .get(index)
            .ok_or_else(|| DnslzError::malformed(self.line, format!("missing {}", what)))
    }

    fn number(&self, index: usize, max: u64, what: &str) -> Result<u64> {
        let text = self.column(index, what)?;
        match parse_canonical_decimal(text) {
            Some(value) if value <= max => Ok(value),
            _ => Err(DnslzError::malformed(
                self.line,
                format!("{} {:?} is not a decimal up to {}", what, lossy(text), max),
            )),
        }
    }

    /// Name text copied verbatim into the packed line, where the packed
    /// delimiter would split it into extra columns.
    fn name(&self, index: usize, what: &str) -> Result<&'a [u8]> {
        let text = self.column(index, what)?;
        if text.contains(&self.packed_delimiter) {
            return Err(DnslzError::malformed(
                self.line,
                format!(
                    "{} {:?} contains the packed delimiter {:?}",
                    what,
                    lossy(text),
                    self.packed_delimiter as char
                ),
            ));
        }
        Ok(text)
    }

    fn address(&self, index: usize, what: &str) -> Result<IpAddr> {
        let text = self.column(index, what)?;
        parse_ip(text).ok_or_else(|| {
            DnslzError::malformed(self.line, format!("invalid {} {:?}", what, lossy(text)))
        })
    }
}

fn lossy(text: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(text)
}

/// Parse `row` into the slot's record, sorting address sets and computing the
/// time delta when the config asks for it.
pub(super) fn parse_record(
    row: &Row<'_>,
    slot: Slot<'_, CompressionRecord>,
    config: &CodecConfig,
) -> Result<()> {
    let Slot {
        previous,
        current,
        pool,
    } = slot;
    let line = row.line_number();
    if row.len() < FIXED_COLUMNS {
        return Err(DnslzError::malformed(
            line,
            format!("expected at least {} columns, found {}", FIXED_COLUMNS, row.len()),
        ));
    }
    let fields = Fields {
        row,
        line,
        packed_delimiter: config.packed_delimiter,
    };

    let timestamp = fields.number(0, u32::MAX as u64, "timestamp")? as u32;
    current.client = fields.address(1, "client address")?;
    current.server = fields.address(2, "server address")?;
    current.qtype = fields.number(3, u16::MAX as u64, "query type")? as u16;
    current.rcode = fields.number(4, u8::MAX as u64, "response code")? as u8;

    let qname = fields.name(5, "query name")?;
    if qname.is_empty() || qname == [REPLACEMENT_MARKER] {
        return Err(DnslzError::malformed(
            line,
            format!("query name {:?} is reserved", lossy(qname)),
        ));
    }
    let base = &mut current.base;
    base.timestamp = timestamp;
    base.qname.extend_from_slice(qname);

    let mut index = FIXED_COLUMNS;
    let mut last_kind: Option<GroupKind> = None;
    while index < row.len() {
        let rtype = fields.number(index, (GROUP_TYPE_LIMIT - 1) as u64, "group type")? as u8;
        if rtype == 0 {
            return Err(DnslzError::malformed(line, "group type 0"));
        }
        let kind = GroupKind::of(rtype);
        if last_kind.is_some_and(|last| last >= kind) {
            return Err(DnslzError::malformed(
                line,
                format!("{:?} group out of order", kind),
            ));
        }
        last_kind = Some(kind);

        let count = fields.number(index + 1, MAX_ALLOWED_RRSET_SIZE as u64, "group count")?;
        if count == 0 {
            return Err(DnslzError::malformed(line, "empty answer group"));
        }
        let values = index + 2;
        index = values + count as usize;
        if index > row.len() {
            return Err(DnslzError::malformed(
                line,
                format!("group announces {} values, found {}", count, row.len() - values),
            ));
        }

        match kind {
            GroupKind::Cname => {
                let set = StringRrSet::allocate(pool, rtype, count as u8)?;
                for (i, name) in set.elements_mut(pool).iter_mut().enumerate() {
                    name.extend_from_slice(fields.name(values + i, "CNAME value")?);
                }
                base.cnames = set;
            }
            GroupKind::A | GroupKind::Aaaa => {
                let set = AddressRrSet::allocate(pool, rtype, count as u8)?;
                for (i, answer) in set.elements_mut(pool).iter_mut().enumerate() {
                    let text = fields.column(values + i, "address value")?;
                    let parsed = if kind == GroupKind::A {
                        parse_ipv4(text).map(IpAddr::V4)
                    } else {
                        parse_ipv6(text).map(IpAddr::V6)
                    };
                    answer.address = parsed.ok_or_else(|| {
                        DnslzError::malformed(
                            line,
                            format!("invalid {:?} answer {:?}", kind, lossy(text)),
                        )
                    })?;
                }
                if config.functions.sorts_addresses() {
                    set.sort_by_address(pool);
                }
                if kind == GroupKind::A {
                    base.addr4 = set;
                } else {
                    base.addr6 = set;
                }
            }
        }
    }

    current.timestamp_delta = match previous {
        Some(prev) if config.functions.time_difference() => {
            timestamp.checked_sub(prev.base.timestamp).ok_or_else(|| {
                DnslzError::malformed(
                    line,
                    format!(
                        "timestamp {} precedes previous {}",
                        timestamp, prev.base.timestamp
                    ),
                )
            })?
        }
        _ => timestamp,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FunctionMask;
    use crate::record::{Chunk, TYPE_CNAME};
    use crate::tokenizer::Tokenizer;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn parse_lines(input: &str, config: &CodecConfig) -> Result<Chunk<CompressionRecord>> {
        let mut chunk = Chunk::new(config);
        let mut tokenizer = Tokenizer::new(input.as_bytes(), b'\t', config.line_buffer_size);
        while let Some(row) = tokenizer.next_row()? {
            parse_record(&row, chunk.next_slot(), config)?;
            chunk.commit();
        }
        Ok(chunk)
    }

    fn config() -> CodecConfig {
        CodecConfig {
            chunk_capacity: 8,
            ..CodecConfig::default()
        }
    }

    #[test]
    fn test_parse_full_record() {
        let chunk = parse_lines(
            "1700000000\t10.0.0.1\t2001:db8::53\t1\t0\twww.example.com\t\
             5\t1\tedge.example.net\t1\t2\t192.0.2.9\t192.0.2.1\t28\t1\t2001:db8::1\n",
            &config(),
        )
        .unwrap();
        let record = &chunk.records()[0];
        let pool = chunk.pool();

        assert_eq!(record.base.timestamp, 1_700_000_000);
        assert_eq!(record.timestamp_delta, 1_700_000_000);
        assert_eq!(record.client, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(record.qtype, 1);
        assert_eq!(record.base.qname, b"www.example.com");
        assert_eq!(record.base.cnames.rtype(), TYPE_CNAME);
        assert_eq!(record.base.cnames.elements(pool)[0], b"edge.example.net");

        let a: Vec<(IpAddr, u8)> = record
            .base
            .addr4
            .elements(pool)
            .iter()
            .map(|r| (r.address, r.original_position))
            .collect();
        assert_eq!(
            a,
            vec![
                (IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 1),
                (IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9)), 0)
            ]
        );
        assert_eq!(
            record.base.addr6.elements(pool)[0].address,
            IpAddr::V6("2001:db8::1".parse::<Ipv6Addr>().unwrap())
        );
    }

    #[test]
    fn test_unsorted_when_address_transforms_off() {
        let config = CodecConfig {
            functions: FunctionMask::LINE_SORTING,
            ..config()
        };
        let chunk = parse_lines("1\t::1\t::1\t1\t0\tx.org\t1\t2\t9.9.9.9\t1.1.1.1\n", &config).unwrap();
        let set = chunk.records()[0].base.addr4;
        assert_eq!(
            set.elements(chunk.pool())[0].address,
            IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9))
        );
    }

    #[test]
    fn test_time_delta() {
        let chunk = parse_lines(
            "100\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\n105\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\n",
            &config(),
        )
        .unwrap();
        assert_eq!(chunk.records()[1].timestamp_delta, 5);
    }

    #[test]
    fn test_time_going_backwards_is_fatal() {
        let err = parse_lines(
            "100\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\n99\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\n",
            &config(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, DnslzError::MalformedRecord { line: 2, .. }));

        let config = CodecConfig {
            functions: FunctionMask::ALL.without(FunctionMask::TIME_DIFFERENCE),
            ..config()
        };
        assert!(parse_lines(
            "100\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\n99\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\n",
            &config
        )
        .is_ok());
    }

    #[test]
    fn test_rejects_malformed_lines() {
        let cases = [
            "1\t1.1.1.1\t2.2.2.2\t1\t0\n",
            "01\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\n",
            "1\t1.1.1.1\t2.2.2.2\t1\t256\ta.org\n",
            "1\tnot-an-ip\t2.2.2.2\t1\t0\ta.org\n",
            "1\t1.1.1.1\t2.2.2.2\t1\t0\t-\n",
            "1\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\t1\t0\n",
            "1\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\t1\t83\n",
            "1\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\t1\t2\t1.1.1.1\n",
            "1\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\t47\t1\tx\n",
            "1\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\t1\t1\t::1\n",
            "1\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\t1\t1\t1.1.1.1\t5\t1\tx\n",
            "1\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\t28\t1\t::1\t28\t1\t::2\n",
        ];
        for case in cases {
            let err = parse_lines(case, &config()).err();
            assert!(
                matches!(err, Some(DnslzError::MalformedRecord { .. })),
                "accepted {:?}",
                case
            );
        }
    }

    #[test]
    fn test_names_containing_packed_delimiter_rejected() {
        let config = CodecConfig {
            packed_delimiter: b' ',
            ..config()
        };
        for case in [
            "1\t1.1.1.1\t2.2.2.2\t1\t0\tmy host.org\n",
            "1\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\t5\t1\tedge net.org\n",
        ] {
            let err = parse_lines(case, &config).err();
            assert!(
                matches!(err, Some(DnslzError::MalformedRecord { line: 1, .. })),
                "accepted {:?}",
                case
            );
        }
        assert!(parse_lines("1\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\t5\t1\tb.org\n", &config).is_ok());
    }

    #[test]
    fn test_cname_type_tag_preserved() {
        let chunk = parse_lines("1\t1.1.1.1\t2.2.2.2\t1\t0\ta.org\t39\t1\tb.org\n", &config()).unwrap();
        assert_eq!(chunk.records()[0].base.cnames.rtype(), 39);
    }
}
